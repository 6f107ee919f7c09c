//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ingest::{ConsistencyMode, DedupConfig, HumidityPrecision};

/// Prefix shared by all environment overrides
pub const ENV_PREFIX: &str = "SENSORSERVER_";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub dedup: DedupSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_database_file")]
    pub database_file: String,

    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("sensorserver").to_string_lossy().to_string())
        .unwrap_or_else(|| "./sensorserver_data".to_string())
}

fn default_database_file() -> String {
    "sensors.db".to_string()
}

fn default_busy_timeout() -> u64 {
    5000 // 5 seconds
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: default_database_file(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Dedup policy configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DedupSettings {
    #[serde(default)]
    pub humidity_precision: HumidityPrecision,

    #[serde(default)]
    pub consistency: ConsistencyMode,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    /// Whether the JSON formatter was requested
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Defaults with overrides applied
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_overrides(path, env_lookup)
    }

    fn load_with_overrides(
        path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, or from the first default location that exists
    ///
    /// Runs before logging is set up, so nothing is logged here; the returned
    /// [`ConfigSource`] says where the settings came from. A config file that
    /// exists but cannot be loaded is an error, never silently skipped.
    pub fn load_from(path: Option<&Path>) -> Result<(Self, ConfigSource), ConfigError> {
        match path {
            Some(path) => {
                let config = Self::load_with_env(path)?;
                Ok((config, ConfigSource::File(path.to_path_buf())))
            }
            None => Self::load_default(),
        }
    }

    /// Load from default locations or environment
    pub fn load_default() -> Result<(Self, ConfigSource), ConfigError> {
        Self::load_first(&default_config_paths(), env_lookup)
    }

    fn load_first(
        paths: &[PathBuf],
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(Self, ConfigSource), ConfigError> {
        match paths.iter().find(|p| p.exists()) {
            Some(path) => {
                let config = Self::load_with_overrides(path, lookup)?;
                Ok((config, ConfigSource::File(path.clone())))
            }
            None => Ok((Self::from_lookup(lookup)?, ConfigSource::Defaults)),
        }
    }

    /// Apply overrides from any key lookup (keys without the prefix)
    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        // Storage overrides
        if let Some(data_dir) = lookup("DATA_DIR") {
            self.storage.data_dir = data_dir;
        }
        if let Some(file) = lookup("DATABASE_FILE") {
            self.storage.database_file = file;
        }

        // API overrides
        if let Some(host) = lookup("HOST") {
            self.api.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.api.port = port
                .parse()
                .map_err(|_| invalid_override("PORT", format!("'{}' is not a port", port)))?;
        }

        // Dedup overrides
        if let Some(precision) = lookup("HUMIDITY_PRECISION") {
            self.dedup.humidity_precision = precision
                .parse()
                .map_err(|e| invalid_override("HUMIDITY_PRECISION", e))?;
        }
        if let Some(consistency) = lookup("CONSISTENCY") {
            self.dedup.consistency = consistency
                .parse()
                .map_err(|e| invalid_override("CONSISTENCY", e))?;
        }

        // Logging overrides
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Reject values serde accepts but the server cannot use
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.database_file.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "storage.database_file must not be empty".to_string(),
            ));
        }
        if !matches!(self.logging.format.to_lowercase().as_str(), "pretty" | "json") {
            return Err(ConfigError::Invalid(format!(
                "logging.format must be 'pretty' or 'json', got '{}'",
                self.logging.format
            )));
        }
        Ok(())
    }

    /// Storage engine settings
    pub fn storage_config(&self) -> crate::storage::StorageConfig {
        crate::storage::StorageConfig {
            data_dir: PathBuf::from(&self.storage.data_dir),
            database_file: self.storage.database_file.clone(),
            busy_timeout_ms: self.storage.busy_timeout_ms,
        }
    }

    /// HTTP listener settings
    pub fn api_config(&self) -> crate::api::ApiConfig {
        crate::api::ApiConfig::new(self.api.host.clone(), self.api.port)
    }

    /// Dedup policy settings
    pub fn dedup_config(&self) -> DedupConfig {
        DedupConfig {
            humidity_precision: self.dedup.humidity_precision,
            consistency: self.dedup.consistency,
        }
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, key)).ok()
}

fn invalid_override(key: &str, reason: String) -> ConfigError {
    ConfigError::Invalid(format!("{}{}: {}", ENV_PREFIX, key, reason))
}

/// Config file locations searched when no path is given, in order
pub fn default_config_paths() -> Vec<PathBuf> {
    [
        dirs::config_dir().map(|p| p.join("sensorserver").join("config.toml")),
        Some(PathBuf::from("/etc/sensorserver/config.toml")),
        Some(PathBuf::from("./config.toml")),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Where the loaded settings came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// A config file, with environment overrides applied
    File(PathBuf),
    /// Built-in defaults with environment overrides applied
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => write!(f, "built-in defaults"),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Sensor Server Configuration
#
# Environment variables override these settings:
# - SENSORSERVER_DATA_DIR
# - SENSORSERVER_DATABASE_FILE
# - SENSORSERVER_HOST
# - SENSORSERVER_PORT
# - SENSORSERVER_HUMIDITY_PRECISION
# - SENSORSERVER_CONSISTENCY
# - SENSORSERVER_LOG_LEVEL
# - SENSORSERVER_LOG_FORMAT

[storage]
# Directory holding the SQLite database
# data_dir = "~/.local/share/sensorserver"

# Database file name inside data_dir
database_file = "sensors.db"

# How long a writer waits for the database lock (ms)
busy_timeout_ms = 5000

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 3001

[dedup]
# Humidity rounding: integer or one_decimal
humidity_precision = "integer"

# relaxed: separate storage calls per step
# serializable: fetch, delete and insert in one transaction
consistency = "relaxed"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
