//! Configuration management
//!
//! Configuration is loaded from `config.yml` and can be overridden with
//! `REVISTA_*` environment variables. Missing values fall back to defaults,
//! so an absent or empty file is a valid configuration.
//!
//! The same file configures both sides: `server`, `database` and `upload`
//! are read by the content service binary, `remote` and `store` by the
//! client core.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Remote content service, as seen by the client
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Local snapshot store
    #[serde(default)]
    pub store: StoreConfig,
    /// Image upload configuration
    #[serde(default)]
    pub upload: UploadConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    10000
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite path or URL (`:memory:` for a throwaway database)
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/revista.db".to_string()
}

/// Remote content service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL including the `/api` prefix
    #[serde(default = "default_remote_base_url")]
    pub base_url: String,
    /// Per-request timeout
    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_remote_base_url(),
            timeout_secs: default_remote_timeout(),
        }
    }
}

fn default_remote_base_url() -> String {
    "http://localhost:10000/api".to_string()
}

fn default_remote_timeout() -> u64 {
    10
}

/// Local store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Storage driver (memory or file)
    #[serde(default)]
    pub driver: StoreDriver,
    /// Directory for the file driver
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Maximum number of keys for the memory driver
    #[serde(default = "default_store_capacity")]
    pub capacity: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            driver: StoreDriver::default(),
            path: default_store_path(),
            capacity: default_store_capacity(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/local")
}

fn default_store_capacity() -> u64 {
    1_000
}

/// Local store driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreDriver {
    /// Process memory, lost on restart (default)
    #[default]
    Memory,
    /// One JSON file per key
    File,
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Directory where decoded images are written
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// Maximum decoded image size in bytes (default: 10MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("data/images")
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist or is empty, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - REVISTA_SERVER_HOST / REVISTA_SERVER_PORT / REVISTA_SERVER_CORS_ORIGIN
    /// - REVISTA_DATABASE_URL
    /// - REVISTA_REMOTE_BASE_URL / REVISTA_REMOTE_TIMEOUT_SECS
    /// - REVISTA_STORE_DRIVER / REVISTA_STORE_PATH
    /// - REVISTA_UPLOAD_PATH
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail later at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError("server.port must be non-zero".into()));
        }
        if self.remote.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "remote.timeout_secs must be non-zero".into(),
            ));
        }
        if self.remote.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError("remote.base_url is empty".into()));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("REVISTA_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("REVISTA_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("REVISTA_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        if let Ok(url) = std::env::var("REVISTA_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(base_url) = std::env::var("REVISTA_REMOTE_BASE_URL") {
            self.remote.base_url = base_url;
        }
        if let Ok(timeout) = std::env::var("REVISTA_REMOTE_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                self.remote.timeout_secs = timeout;
            }
        }

        if let Ok(driver) = std::env::var("REVISTA_STORE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "memory" => self.store.driver = StoreDriver::Memory,
                "file" => self.store.driver = StoreDriver::File,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(path) = std::env::var("REVISTA_STORE_PATH") {
            self.store.path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("REVISTA_UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
