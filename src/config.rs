use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Environment variable that overrides `api.base_url`
pub const API_URL_ENV: &str = "DERMOAI_API_URL";

const APP_DIR: &str = "dermoai";

/// Backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST backend (default: http://localhost:8000)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Client-side timeout applied to every request, in seconds
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_sec() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_sec: default_timeout_sec(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec)
    }
}

/// Local persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Keep credentials in the OS keychain (falls back to a file when unavailable)
    #[serde(default = "default_use_keyring")]
    pub use_keyring: bool,

    /// Token file used when the keychain is unavailable
    #[serde(default)]
    pub token_file_path: Option<PathBuf>,

    /// SQLite database holding writes that could not be sent
    #[serde(default)]
    pub offline_queue_path: Option<PathBuf>,
}

fn default_use_keyring() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            use_keyring: default_use_keyring(),
            token_file_path: None,
            offline_queue_path: None,
        }
    }
}

impl StorageConfig {
    pub fn token_file_path(&self) -> PathBuf {
        self.token_file_path
            .clone()
            .unwrap_or_else(|| app_config_dir().join("tokens.json"))
    }

    pub fn offline_queue_path(&self) -> PathBuf {
        self.offline_queue_path
            .clone()
            .unwrap_or_else(|| app_data_dir().join("offline.db"))
    }
}

/// Incoming-call watcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Polling interval in seconds
    #[serde(default = "default_watch_interval_sec")]
    pub interval_sec: u64,

    /// Keep call notifications on screen until dismissed
    #[serde(default = "default_persistent_notifications")]
    pub persistent_notifications: bool,
}

fn default_watch_interval_sec() -> u64 {
    15
}

fn default_persistent_notifications() -> bool {
    true
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_sec: default_watch_interval_sec(),
            persistent_notifications: default_persistent_notifications(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (default: info)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path; logs go to stderr when unset
    #[serde(default)]
    pub file_path: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn log_level(&self) -> &str {
        &self.logging.level
    }

    pub fn log_file_path(&self) -> &Option<String> {
        &self.logging.file_path
    }

    /// Applies environment overrides on top of the file values.
    pub fn apply_env(&mut self) {
        self.apply_api_url_override(std::env::var(API_URL_ENV).ok());
    }

    fn apply_api_url_override(&mut self, value: Option<String>) {
        if let Some(url) = value.filter(|u| !u.trim().is_empty()) {
            tracing::debug!("Using API base URL from {}: {}", API_URL_ENV, url);
            self.api.base_url = url.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.api.base_url).map_err(|e| ConfigError::ValidationError {
            reason: format!("api.base_url '{}' is not a valid URL: {}", self.api.base_url, e),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::ValidationError {
                reason: format!("api.base_url must use http or https, got '{}'", url.scheme()),
            });
        }
        if self.api.timeout_sec == 0 {
            return Err(ConfigError::ValidationError {
                reason: "api.timeout_sec must be greater than zero".to_string(),
            });
        }
        if self.watch.interval_sec == 0 {
            return Err(ConfigError::ValidationError {
                reason: "watch.interval_sec must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn app_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

fn app_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

pub fn config_file_path() -> PathBuf {
    app_config_dir().join("config.toml")
}

/// Loads the configuration from `path` (or the default location), then
/// applies environment overrides and validates the result.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(config_file_path);

    let mut config = if config_path.exists() {
        let contents = fs::read_to_string(&config_path)?;
        toml::from_str(&contents)?
    } else {
        Config::default()
    };

    config.apply_env();
    config.validate()?;
    Ok(config)
}

pub fn save_config(config: &Config, path: Option<&Path>) -> Result<(), ConfigError> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(config_file_path);

    if let Some(parent_dir) = config_path.parent()
        && !parent_dir.exists()
    {
        fs::create_dir_all(parent_dir)?;
    }

    let contents = toml::to_string_pretty(config)?;
    fs::write(config_path, contents)?;
    Ok(())
}
