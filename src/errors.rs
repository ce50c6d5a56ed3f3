use serde_json::Value;
use thiserror::Error;

/// Status reported for failures that never produced an HTTP response.
pub const NO_RESPONSE_STATUS: u16 = 500;

/// Application-wide error type used by the CLI and the long-running services.
#[derive(Error, Debug)]
pub enum AppError {
    /// Backend call failed
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Credential storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Offline queue failed
    #[error("Offline queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("{message}")]
    Generic { message: String },
}

/// Error surfaced by the request client.
///
/// Every variant reports an HTTP status and a human-readable detail, so
/// callers can treat them uniformly through [`ApiError::status`] and
/// [`ApiError::detail`]. Variants carry owned strings only: the same error is
/// handed to every request that was waiting on a failed token refresh.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The backend answered with a non-2xx status
    #[error("{detail} (HTTP {status})")]
    Http { status: u16, detail: String },

    /// The backend could not be reached
    #[error("Network error: {detail}")]
    Network { detail: String },

    /// The client-side timeout elapsed before a response arrived
    #[error("Request timed out: {detail}")]
    Timeout { detail: String },

    /// The response body did not match the expected schema
    #[error("Failed to decode response (HTTP {status}): {detail}")]
    Decode { status: u16, detail: String },

    /// The request could not be built
    #[error("Invalid request: {detail}")]
    InvalidRequest { detail: String },
}

impl ApiError {
    /// Builds the error for a non-2xx response, preferring the backend's
    /// `detail` field.
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let detail = serde_json::from_slice::<Value>(body)
            .ok()
            .and_then(|value| match value.get("detail") {
                Some(Value::String(detail)) if detail.is_empty() => None,
                Some(Value::String(detail)) => Some(detail.clone()),
                Some(Value::Null) | None => None,
                Some(structured) => Some(structured.to_string()),
            })
            .unwrap_or_else(|| format!("Request failed with status code {}", status));

        ApiError::Http { status, detail }
    }

    pub fn status(&self) -> u16 {
        match self {
            ApiError::Http { status, .. } | ApiError::Decode { status, .. } => *status,
            ApiError::Network { .. } | ApiError::Timeout { .. } | ApiError::InvalidRequest { .. } => {
                NO_RESPONSE_STATUS
            }
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            ApiError::Http { detail, .. }
            | ApiError::Network { detail }
            | ApiError::Timeout { detail }
            | ApiError::Decode { detail, .. }
            | ApiError::InvalidRequest { detail } => detail,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Http { status: 401, .. })
    }

    /// True when no response was received at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ApiError::Network { .. } | ApiError::Timeout { .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        let detail = error.to_string();
        if error.is_timeout() {
            ApiError::Timeout { detail }
        } else if error.is_builder() {
            ApiError::InvalidRequest { detail }
        } else if error.is_decode() {
            ApiError::Decode {
                status: error
                    .status()
                    .map(|s| s.as_u16())
                    .unwrap_or(NO_RESPONSE_STATUS),
                detail,
            }
        } else {
            ApiError::Network { detail }
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {source}")]
    LoadError {
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {source}")]
    ParseError {
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {source}")]
    SerializeError {
        #[source]
        source: toml::ser::Error,
    },

    #[error("Configuration validation failed: {reason}")]
    ValidationError { reason: String },
}

/// Credential storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Keyring error: {source}")]
    KeyringError {
        #[source]
        source: keyring::Error,
    },

    #[error("Token file error: {source}")]
    FileError {
        #[source]
        source: std::io::Error,
    },

    #[error("Token file is malformed: {source}")]
    JsonError {
        #[source]
        source: serde_json::Error,
    },
}

/// Offline queue errors
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Database error: {source}")]
    Database {
        #[source]
        source: rusqlite::Error,
    },

    #[error("Queued body is not valid JSON: {source}")]
    Body {
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported HTTP method in queue: {method}")]
    Method { method: String },

    #[error("Failed to create queue directory: {source}")]
    Directory {
        #[source]
        source: std::io::Error,
    },
}

impl From<std::io::Error> for ConfigError {
    fn from(error: std::io::Error) -> Self {
        ConfigError::LoadError { source: error }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(error: toml::de::Error) -> Self {
        ConfigError::ParseError { source: error }
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(error: toml::ser::Error) -> Self {
        ConfigError::SerializeError { source: error }
    }
}

impl From<keyring::Error> for StorageError {
    fn from(error: keyring::Error) -> Self {
        StorageError::KeyringError { source: error }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(error: std::io::Error) -> Self {
        StorageError::FileError { source: error }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(error: serde_json::Error) -> Self {
        StorageError::JsonError { source: error }
    }
}

impl From<rusqlite::Error> for QueueError {
    fn from(error: rusqlite::Error) -> Self {
        QueueError::Database { source: error }
    }
}

impl From<std::io::Error> for QueueError {
    fn from(error: std::io::Error) -> Self {
        QueueError::Directory { source: error }
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(error: serde_json::Error) -> Self {
        QueueError::Body { source: error }
    }
}
