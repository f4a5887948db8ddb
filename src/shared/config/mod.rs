//! Engine configuration module
//!
//! Provides the configuration types for the sync engine. Values come from, in
//! increasing precedence: built-in defaults, an optional TOML file, and
//! `FIELDSYNC_*` environment variables.
//!
//! ```rust,no_run
//! use fieldsync::shared::config::AppConfig;
//!
//! let config = AppConfig::builder()
//!     .server_url("https://dispatch.example.com")
//!     .with_env()
//!     .build()
//!     .expect("valid config");
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default server URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Default number of failed attempts before a mutation is marked failed
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay schedule between delivery attempts, in milliseconds
pub const DEFAULT_RETRY_DELAYS_MS: [u64; 3] = [1_000, 5_000, 15_000];

const ENV_API_URL: &str = "FIELDSYNC_API_URL";
const ENV_TOKEN: &str = "FIELDSYNC_TOKEN";
const ENV_DB_PATH: &str = "FIELDSYNC_DB_PATH";
const ENV_LOG: &str = "FIELDSYNC_LOG";

/// Engine configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the remote API
    pub server_url: String,
    /// Bearer token attached to every remote request
    pub auth_token: Option<String>,
    /// SQLite file backing the local store; `None` uses the platform data dir
    pub database_path: Option<PathBuf>,
    /// Failed attempts after which a mutation becomes `failed`
    pub max_retries: u32,
    /// Delays between attempts of one mutation; the last entry is the cap
    pub retry_delays: Vec<Duration>,
    /// Timeout for a single remote request
    pub request_timeout: Duration,
    /// Interval of the periodic drain trigger
    pub sync_interval: Duration,
    /// Live channel: first reconnect delay
    pub reconnect_base_delay: Duration,
    /// Live channel: reconnect delay cap
    pub reconnect_max_delay: Duration,
    /// Live channel: automatic reconnect attempts before giving up
    pub reconnect_max_attempts: u32,
    /// Path of the inbox event stream on the remote API
    pub inbox_stream_path: String,
    /// Default tracing filter
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            auth_token: None,
            database_path: None,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delays: DEFAULT_RETRY_DELAYS_MS
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            request_timeout: Duration::from_secs(30),
            sync_interval: Duration::from_secs(60),
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(30),
            reconnect_max_attempts: 10,
            inbox_stream_path: "/api/inbox/stream".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Parse a TOML document on top of the defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Self::builder().toml_str(source)?.build()
    }

    /// Load a TOML file on top of the defaults, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            message: e.to_string(),
        })?;
        Self::builder().toml_str(&source)?.with_env().build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_url.trim().is_empty() {
            return Err(ConfigError::MissingValue("server_url"));
        }
        if !self.inbox_stream_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "inbox_stream_path",
                message: "must start with '/'".to_string(),
            });
        }
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(self.server_url.clone()));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_retries",
                message: "must be at least 1".to_string(),
            });
        }
        if self.retry_delays.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "retry_delays_ms",
                message: "must contain at least one delay".to_string(),
            });
        }
        if self.reconnect_max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reconnect_max_attempts",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Get the full URL for an API path
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url.trim_end_matches('/'), path)
    }

    /// Resolve the database file, falling back to the platform data directory
    pub fn database_path(&self) -> PathBuf {
        match &self.database_path {
            Some(path) => path.clone(),
            None => {
                let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
                path.push("fieldsync");
                path.push("offline.db");
                path
            }
        }
    }
}

/// On-disk representation; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    server_url: Option<String>,
    auth_token: Option<String>,
    database_path: Option<PathBuf>,
    max_retries: Option<u32>,
    retry_delays_ms: Option<Vec<u64>>,
    request_timeout_secs: Option<u64>,
    sync_interval_secs: Option<u64>,
    reconnect_base_delay_ms: Option<u64>,
    reconnect_max_delay_ms: Option<u64>,
    reconnect_max_attempts: Option<u32>,
    inbox_stream_path: Option<String>,
    log_level: Option<String>,
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.config.server_url = url.into();
        self
    }

    /// Set the bearer token
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.config.auth_token = Some(token.into());
        self
    }

    /// Set the SQLite file path
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.database_path = Some(path.into());
        self
    }

    /// Set the retry cap
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Set the retry delay schedule
    pub fn retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.config.retry_delays = delays;
        self
    }

    /// Set the per-request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the periodic drain interval
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.config.sync_interval = interval;
        self
    }

    /// Set the live channel reconnect schedule
    pub fn reconnect(mut self, base: Duration, max: Duration, max_attempts: u32) -> Self {
        self.config.reconnect_base_delay = base;
        self.config.reconnect_max_delay = max;
        self.config.reconnect_max_attempts = max_attempts;
        self
    }

    /// Set the inbox stream path
    pub fn inbox_stream_path(mut self, path: impl Into<String>) -> Self {
        self.config.inbox_stream_path = path.into();
        self
    }

    /// Set the default log filter
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = level.into();
        self
    }

    /// Apply values from a TOML document
    pub fn toml_str(mut self, source: &str) -> Result<Self, ConfigError> {
        let file: FileConfig =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let config = &mut self.config;
        if let Some(url) = file.server_url {
            config.server_url = url;
        }
        if file.auth_token.is_some() {
            config.auth_token = file.auth_token;
        }
        if file.database_path.is_some() {
            config.database_path = file.database_path;
        }
        if let Some(max_retries) = file.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(delays) = file.retry_delays_ms {
            config.retry_delays = delays.into_iter().map(Duration::from_millis).collect();
        }
        if let Some(secs) = file.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.sync_interval_secs {
            config.sync_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = file.reconnect_base_delay_ms {
            config.reconnect_base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = file.reconnect_max_delay_ms {
            config.reconnect_max_delay = Duration::from_millis(ms);
        }
        if let Some(attempts) = file.reconnect_max_attempts {
            config.reconnect_max_attempts = attempts;
        }
        if let Some(path) = file.inbox_stream_path {
            config.inbox_stream_path = path;
        }
        if let Some(level) = file.log_level {
            config.log_level = level;
        }
        Ok(self)
    }

    /// Apply `FIELDSYNC_*` environment overrides
    pub fn with_env(mut self) -> Self {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            self.config.server_url = url;
        }
        if let Ok(token) = std::env::var(ENV_TOKEN) {
            self.config.auth_token = Some(token);
        }
        if let Ok(path) = std::env::var(ENV_DB_PATH) {
            self.config.database_path = Some(PathBuf::from(path));
        }
        if let Ok(level) = std::env::var(ENV_LOG) {
            self.config.log_level = level;
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },
    #[error("failed to parse config: {0}")]
    Parse(String),
}
