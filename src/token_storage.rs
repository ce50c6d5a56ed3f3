use crate::errors::StorageError;
use crate::models::TokenResponse;
use keyring::Entry;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Storage key of the access token
pub const ACCESS_TOKEN_KEY: &str = "dermoai_access_token";
/// Storage key of the refresh token
pub const REFRESH_TOKEN_KEY: &str = "dermoai_refresh_token";

const KEYRING_SERVICE: &str = "dermoai";

/// Access/refresh credential pair issued by login or refresh
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::new(access_token.into()),
            refresh_token: SecretString::new(refresh_token.into()),
        }
    }
}

impl From<TokenResponse> for TokenPair {
    fn from(response: TokenResponse) -> Self {
        TokenPair::new(response.access_token, response.refresh_token)
    }
}

/// Capability the request client depends on for credentials.
///
/// Writes never fail from the caller's point of view: implementations that
/// persist keep an in-process copy and log when persistence fails.
pub trait TokenStore: Send + Sync {
    fn access_token(&self) -> Option<SecretString>;
    fn refresh_token(&self) -> Option<SecretString>;
    fn set_tokens(&self, pair: &TokenPair);
    fn clear(&self);
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredTokens {
    #[serde(
        rename = "dermoai_access_token",
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_secret_option",
        deserialize_with = "deserialize_secret_option"
    )]
    access: Option<SecretString>,
    #[serde(
        rename = "dermoai_refresh_token",
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_secret_option",
        deserialize_with = "deserialize_secret_option"
    )]
    refresh: Option<SecretString>,
}

impl StoredTokens {
    fn is_empty(&self) -> bool {
        self.access.is_none() && self.refresh.is_none()
    }
}

impl From<&TokenPair> for StoredTokens {
    fn from(pair: &TokenPair) -> Self {
        StoredTokens {
            access: Some(pair.access_token.clone()),
            refresh: Some(pair.refresh_token.clone()),
        }
    }
}

fn serialize_secret_option<S>(secret: &Option<SecretString>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::ser::Serializer,
{
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

fn deserialize_secret_option<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|s| !s.is_empty()).map(SecretString::new))
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// In-process credential store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<StoredTokens>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the given values; either may be absent.
    pub fn with_tokens(access_token: Option<&str>, refresh_token: Option<&str>) -> Self {
        let tokens = StoredTokens {
            access: access_token.map(|t| SecretString::new(t.to_string())),
            refresh: refresh_token.map(|t| SecretString::new(t.to_string())),
        };
        Self {
            tokens: RwLock::new(tokens),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn access_token(&self) -> Option<SecretString> {
        read_lock(&self.tokens).access.clone()
    }

    fn refresh_token(&self) -> Option<SecretString> {
        read_lock(&self.tokens).refresh.clone()
    }

    fn set_tokens(&self, pair: &TokenPair) {
        *write_lock(&self.tokens) = StoredTokens::from(pair);
    }

    fn clear(&self) {
        *write_lock(&self.tokens) = StoredTokens::default();
    }
}

struct KeyringEntries {
    access: Entry,
    refresh: Entry,
}

impl KeyringEntries {
    fn open() -> Result<Self, keyring::Error> {
        Ok(KeyringEntries {
            access: Entry::new(KEYRING_SERVICE, ACCESS_TOKEN_KEY)?,
            refresh: Entry::new(KEYRING_SERVICE, REFRESH_TOKEN_KEY)?,
        })
    }
}

/// Credential store backed by the OS keychain, with a JSON file as fallback
/// when no keychain is available.
pub struct KeyringTokenStore {
    entries: Option<KeyringEntries>,
    token_file_path: PathBuf,
    cache: RwLock<StoredTokens>,
}

impl KeyringTokenStore {
    /// Opens the keychain entries (if the platform has a keychain) and loads
    /// any credentials persisted by a previous run.
    pub fn new(token_file_path: PathBuf) -> Self {
        let entries = match KeyringEntries::open() {
            Ok(entries) => Some(entries),
            Err(e) => {
                tracing::warn!(
                    "Keyring is not available on this system ({}), will use file-based storage.",
                    e
                );
                None
            }
        };
        Self::with_entries(entries, token_file_path)
    }

    /// Store that never touches the keychain.
    pub fn file_only(token_file_path: PathBuf) -> Self {
        Self::with_entries(None, token_file_path)
    }

    fn with_entries(entries: Option<KeyringEntries>, token_file_path: PathBuf) -> Self {
        let mut store = KeyringTokenStore {
            entries,
            token_file_path,
            cache: RwLock::new(StoredTokens::default()),
        };
        let loaded = store.load();
        *store.cache.get_mut().unwrap_or_else(PoisonError::into_inner) = loaded;
        store
    }

    pub fn token_file_path(&self) -> &Path {
        &self.token_file_path
    }

    fn load(&self) -> StoredTokens {
        if let Some(ref entries) = self.entries {
            match load_from_keyring(entries) {
                Ok(tokens) if !tokens.is_empty() => {
                    tracing::debug!("Tokens loaded from keyring");
                    return tokens;
                }
                Ok(_) => tracing::debug!("No tokens found in keyring, checking file storage"),
                Err(e) => tracing::warn!(
                    "Failed to load tokens from keyring: {}. Checking file storage.",
                    e
                ),
            }
        }

        match self.load_from_file() {
            Ok(tokens) => {
                if !tokens.is_empty()
                    && let Some(ref entries) = self.entries
                    && let Err(e) = save_to_keyring(entries, &tokens)
                {
                    tracing::warn!("Failed to migrate tokens to keyring: {}", e);
                }
                tokens
            }
            Err(e) => {
                tracing::warn!("Failed to load tokens from file: {}", e);
                StoredTokens::default()
            }
        }
    }

    fn load_from_file(&self) -> Result<StoredTokens, StorageError> {
        if !self.token_file_path.exists() {
            return Ok(StoredTokens::default());
        }

        let contents = fs::read_to_string(&self.token_file_path)?;
        if contents.trim().is_empty() {
            return Ok(StoredTokens::default());
        }

        Ok(serde_json::from_str(&contents)?)
    }

    fn persist(&self, tokens: &StoredTokens) -> Result<(), StorageError> {
        if let Some(ref entries) = self.entries {
            match save_to_keyring(entries, tokens) {
                Ok(()) => {
                    tracing::debug!("Tokens saved to keyring");
                    return Ok(());
                }
                Err(e) => tracing::warn!(
                    "Failed to save tokens to keyring: {}. Trying fallback storage.",
                    e
                ),
            }
        }

        self.save_to_file(tokens)
    }

    fn save_to_file(&self, tokens: &StoredTokens) -> Result<(), StorageError> {
        if let Some(parent) = self.token_file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string(tokens)?;
        fs::write(&self.token_file_path, contents)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.token_file_path, fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!("Tokens saved to file: {:?}", self.token_file_path);
        Ok(())
    }

    fn erase(&self) -> Result<(), StorageError> {
        if let Some(ref entries) = self.entries {
            for entry in [&entries.access, &entries.refresh] {
                match entry.delete_password() {
                    Ok(()) | Err(keyring::Error::NoEntry) => {}
                    Err(e) => tracing::warn!("Failed to delete token from keyring: {}", e),
                }
            }
        }

        if self.token_file_path.exists() {
            fs::remove_file(&self.token_file_path)?;
            tracing::debug!("Token file deleted: {:?}", self.token_file_path);
        }

        Ok(())
    }
}

fn load_from_keyring(entries: &KeyringEntries) -> Result<StoredTokens, StorageError> {
    Ok(StoredTokens {
        access: read_entry(&entries.access)?,
        refresh: read_entry(&entries.refresh)?,
    })
}

fn read_entry(entry: &Entry) -> Result<Option<SecretString>, StorageError> {
    match entry.get_password() {
        Ok(value) if !value.is_empty() => Ok(Some(SecretString::new(value))),
        Ok(_) | Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn save_to_keyring(entries: &KeyringEntries, tokens: &StoredTokens) -> Result<(), StorageError> {
    for (entry, value) in [(&entries.access, &tokens.access), (&entries.refresh, &tokens.refresh)] {
        match value {
            Some(secret) => entry.set_password(secret.expose_secret())?,
            None => match entry.delete_password() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => return Err(e.into()),
            },
        }
    }
    Ok(())
}

impl TokenStore for KeyringTokenStore {
    fn access_token(&self) -> Option<SecretString> {
        read_lock(&self.cache).access.clone()
    }

    fn refresh_token(&self) -> Option<SecretString> {
        read_lock(&self.cache).refresh.clone()
    }

    fn set_tokens(&self, pair: &TokenPair) {
        let tokens = StoredTokens::from(pair);
        if let Err(e) = self.persist(&tokens) {
            tracing::warn!(
                "Failed to persist tokens: {}. The session will not survive a restart.",
                e
            );
        }
        *write_lock(&self.cache) = tokens;
    }

    fn clear(&self) {
        *write_lock(&self.cache) = StoredTokens::default();
        if let Err(e) = self.erase() {
            tracing::warn!("Failed to remove persisted tokens: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn expose(secret: Option<SecretString>) -> Option<String> {
        secret.map(|s| s.expose_secret().clone())
    }

    #[test]
    fn test_memory_store_set_and_clear() {
        let store = MemoryTokenStore::new();
        assert!(store.access_token().is_none());

        store.set_tokens(&TokenPair::new("access-1", "refresh-1"));
        assert_eq!(expose(store.access_token()), Some("access-1".to_string()));
        assert_eq!(expose(store.refresh_token()), Some("refresh-1".to_string()));

        store.clear();
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
    }

    #[test]
    fn test_memory_store_partial_seed() {
        let store = MemoryTokenStore::with_tokens(Some("access-only"), None);
        assert_eq!(expose(store.access_token()), Some("access-only".to_string()));
        assert!(store.refresh_token().is_none());
    }

    #[test]
    fn test_file_store_survives_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("auth").join("tokens.json");

        let store = KeyringTokenStore::file_only(path.clone());
        store.set_tokens(&TokenPair::new("access-2", "refresh-2"));
        assert!(path.exists());

        let reopened = KeyringTokenStore::file_only(path.clone());
        assert_eq!(expose(reopened.access_token()), Some("access-2".to_string()));
        assert_eq!(expose(reopened.refresh_token()), Some("refresh-2".to_string()));
    }

    #[test]
    fn test_file_store_uses_fixed_key_names() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let store = KeyringTokenStore::file_only(path.clone());
        store.set_tokens(&TokenPair::new("a", "r"));

        let contents: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(contents[ACCESS_TOKEN_KEY], "a");
        assert_eq!(contents[REFRESH_TOKEN_KEY], "r");
    }

    #[test]
    fn test_file_store_clear_removes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let store = KeyringTokenStore::file_only(path.clone());
        store.set_tokens(&TokenPair::new("access-3", "refresh-3"));
        store.clear();

        assert!(!path.exists());
        assert!(store.access_token().is_none());
        assert!(KeyringTokenStore::file_only(path).access_token().is_none());
    }

    #[test]
    fn test_malformed_file_is_treated_as_logged_out() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        fs::write(&path, "{not json").unwrap();

        let store = KeyringTokenStore::file_only(path);
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
    }

    #[test]
    fn test_token_pair_from_response() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token": "new-a", "refresh_token": "new-r", "token_type": "bearer"}"#,
        )
        .unwrap();
        let pair = TokenPair::from(response);
        assert_eq!(pair.access_token.expose_secret(), "new-a");
        assert_eq!(pair.refresh_token.expose_secret(), "new-r");
    }
}
