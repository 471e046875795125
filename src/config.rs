//! Run configuration
//!
//! Provides centralized configuration management with:
//! - Config file loading (optional)
//! - Environment variable support
//! - Runtime defaults matching the production deployment
//! - Validation and type safety
//!
//! The loaded [`Config`] is an explicit immutable value handed to each
//! component at construction. Nothing in this crate reads configuration from
//! global state, so tests can inject alternate values (a shorter window, a
//! zero-delay retry policy) without touching process scope.

use crate::fetch::{RetryPolicy, UserFailureMode};
use crate::store::RecordingDedup;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Provider endpoints and OAuth parameters
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Time window configuration
    #[serde(default)]
    pub window: WindowConfig,

    /// Fetch, retry, and rate-limit configuration
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Paths configuration
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub authorization_url: String,
    pub token_url: String,
    pub reports_url: String,
    pub redirect_uri: String,
    pub scopes: String,
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Hours covered by one block of history
    pub block_hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub retry_attempts: u32,
    pub backoff_unit_ms: u64,
    pub rate_limit_ms: u64,
    pub page_size: u32,
    pub on_user_failure: UserFailureMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL; `{sql_username}` and `{sql_password}` placeholders are
    /// filled from the credentials file before connecting.
    pub url: String,
    pub recording_dedup: RecordingDedup,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub credentials_file: PathBuf,
    pub log_directory: PathBuf,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            authorization_url: "https://authentication.logmeininc.com/oauth/authorize".to_string(),
            token_url: "https://authentication.logmeininc.com/oauth/token".to_string(),
            reports_url: "https://api.jive.com/call-reports/v1/reports/user-activity".to_string(),
            redirect_uri: "https://iss-na.com/".to_string(),
            scopes: "cr.v1.read users.v1.lines.read".to_string(),
            // No reason to carry CSRF state through a non-interactive exchange yet.
            state: "NOTAPPLICABLE".to_string(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { block_hours: 256.0 }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 4,
            backoff_unit_ms: 1000,
            rate_limit_ms: 250,
            page_size: 10_000,
            on_user_failure: UserFailureMode::Abort,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://call_records.db".to_string(),
            recording_dedup: RecordingDedup::ByLeg,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            output: "console".to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            credentials_file: PathBuf::from("credentials.json"),
            log_directory: PathBuf::from("logs"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            window: WindowConfig::default(),
            fetch: FetchConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts,
            backoff_unit: Duration::from_millis(self.backoff_unit_ms),
            rate_limit: Duration::from_millis(self.rate_limit_ms),
        }
    }
}

impl Config {
    /// Load configuration from file, environment, and defaults
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        let config_paths = [
            PathBuf::from("call-sync.toml"),
            PathBuf::from(".call-sync.toml"),
            dirs::config_dir()
                .map(|d| d.join("call-sync").join("config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.exists() {
                config = Self::load_from_file(path)?;
                break;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific TOML file, then apply environment
    /// overrides and validate
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        // Logging overrides
        if let Ok(val) = env::var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("LOG_FORMAT") {
            self.logging.format = val;
        }
        if let Ok(val) = env::var("LOG_OUTPUT") {
            self.logging.output = val;
        }

        // Window overrides
        if let Ok(val) = env::var("CALL_SYNC_BLOCK_HOURS") {
            self.window.block_hours = val.parse().context("Invalid CALL_SYNC_BLOCK_HOURS")?;
        }

        // Fetch overrides
        if let Ok(val) = env::var("CALL_SYNC_RETRY_ATTEMPTS") {
            self.fetch.retry_attempts = val.parse().context("Invalid CALL_SYNC_RETRY_ATTEMPTS")?;
        }
        if let Ok(val) = env::var("CALL_SYNC_RATE_LIMIT_MS") {
            self.fetch.rate_limit_ms = val.parse().context("Invalid CALL_SYNC_RATE_LIMIT_MS")?;
        }
        if let Ok(val) = env::var("CALL_SYNC_PAGE_SIZE") {
            self.fetch.page_size = val.parse().context("Invalid CALL_SYNC_PAGE_SIZE")?;
        }

        // Database and path overrides
        if let Ok(val) = env::var("CALL_SYNC_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = env::var("CALL_SYNC_CREDENTIALS") {
            self.paths.credentials_file = PathBuf::from(val);
        }
        if let Ok(val) = env::var("CALL_SYNC_LOG_DIR") {
            self.paths.log_directory = PathBuf::from(val);
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(self.window.block_hours > 0.0) {
            return Err(anyhow::anyhow!(
                "Window block hours must be positive, got {}",
                self.window.block_hours
            ));
        }

        if self.fetch.retry_attempts == 0 {
            return Err(anyhow::anyhow!("Retry attempts must be greater than 0"));
        }

        if self.fetch.page_size == 0 {
            return Err(anyhow::anyhow!("Page size must be greater than 0"));
        }

        if self.database.url.is_empty() {
            return Err(anyhow::anyhow!("Database URL must not be empty"));
        }

        Ok(())
    }
}
