//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Upper bound for `storage.max_workers`.
pub const MAX_WORKERS_LIMIT: usize = 50;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Feed API connection and retry settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Object-store credentials and content fetch limits
    #[serde(default)]
    pub storage: StorageConfig,

    /// Query pipeline behavior
    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply credential and endpoint overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source.
    ///
    /// Empty values are ignored so an exported-but-blank variable does not
    /// clobber a value from the file.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = var("CARVER_API_KEY") {
            self.api.api_key = Some(key);
        }
        if let Some(url) = var("CARVER_BASE_URL") {
            self.api.base_url = url;
        }
        if let Some(profile) = var("AWS_PROFILE_NAME") {
            self.storage.profile = Some(profile);
        }
        if let Some(id) = var("AWS_ACCESS_KEY_ID") {
            self.storage.access_key_id = Some(id);
        }
        if let Some(secret) = var("AWS_SECRET_ACCESS_KEY") {
            self.storage.secret_access_key = Some(secret);
        }
        if let Some(region) = var("AWS_REGION") {
            self.storage.region = region;
        }
        self
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let base = Url::parse(&self.api.base_url)
            .map_err(|e| AppError::validation(format!("api.base_url is not a URL: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(AppError::validation("api.base_url must be http or https"));
        }
        if self.api.user_agent.trim().is_empty() {
            return Err(AppError::validation("api.user_agent is empty"));
        }
        if self.api.page_size == 0 {
            return Err(AppError::validation("api.page_size must be > 0"));
        }
        if self.api.timeout_secs == 0 || self.api.connect_timeout_secs == 0 {
            return Err(AppError::validation("api timeouts must be > 0"));
        }
        if self.storage.connect_timeout_secs == 0 || self.storage.read_timeout_secs == 0 {
            return Err(AppError::validation("storage timeouts must be > 0"));
        }
        if !(1..=MAX_WORKERS_LIMIT).contains(&self.storage.max_workers) {
            return Err(AppError::validation(format!(
                "storage.max_workers must be between 1 and {MAX_WORKERS_LIMIT}"
            )));
        }
        if self.storage.max_content_bytes == 0 {
            return Err(AppError::validation("storage.max_content_bytes must be > 0"));
        }
        if self.storage.access_key_id.is_some() != self.storage.secret_access_key.is_some() {
            return Err(AppError::validation(
                "storage.access_key_id and storage.secret_access_key must be set together",
            ));
        }
        Ok(())
    }
}

/// Feed API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Sent as the `X-API-Key` header
    #[serde(default)]
    pub api_key: Option<String>,

    /// Retries after the first attempt
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// First backoff delay; doubles on every retry
    #[serde(default = "defaults::initial_retry_delay")]
    pub initial_retry_delay_ms: u64,

    #[serde(default = "defaults::api_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "defaults::connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Requested page size, clamped to the server ceiling
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,

    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            api_key: None,
            max_retries: defaults::max_retries(),
            initial_retry_delay_ms: defaults::initial_retry_delay(),
            timeout_secs: defaults::api_timeout(),
            connect_timeout_secs: defaults::connect_timeout(),
            page_size: defaults::page_size(),
            user_agent: defaults::user_agent(),
        }
    }
}

/// Object-store settings for externally stored entry content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Named credential profile; wins over an explicit key pair
    #[serde(default)]
    pub profile: Option<String>,

    #[serde(default)]
    pub access_key_id: Option<String>,

    #[serde(default)]
    pub secret_access_key: Option<String>,

    #[serde(default = "defaults::region")]
    pub region: String,

    /// Parallel fetches per batch
    #[serde(default = "defaults::max_workers")]
    pub max_workers: usize,

    /// Per-object body limit in bytes
    #[serde(default = "defaults::max_content_bytes")]
    pub max_content_bytes: u64,

    #[serde(default = "defaults::connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "defaults::read_timeout")]
    pub read_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            profile: None,
            access_key_id: None,
            secret_access_key: None,
            region: defaults::region(),
            max_workers: defaults::max_workers(),
            max_content_bytes: defaults::max_content_bytes(),
            connect_timeout_secs: defaults::connect_timeout(),
            read_timeout_secs: defaults::read_timeout(),
        }
    }
}

/// Query pipeline settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Let a search without a topic or feed filter load every entry
    #[serde(default)]
    pub allow_full_scan: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // API defaults
    pub fn base_url() -> String {
        "https://app.carveragents.ai".into()
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn initial_retry_delay() -> u64 {
        1000
    }
    pub fn api_timeout() -> u64 {
        30
    }
    pub fn page_size() -> usize {
        100
    }
    pub fn user_agent() -> String {
        concat!("regfeeds/", env!("CARGO_PKG_VERSION")).into()
    }

    // Storage defaults
    pub fn region() -> String {
        "us-east-1".into()
    }
    pub fn max_workers() -> usize {
        10
    }
    pub fn max_content_bytes() -> u64 {
        10 * 1024 * 1024
    }
    pub fn connect_timeout() -> u64 {
        10
    }
    pub fn read_timeout() -> u64 {
        60
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
