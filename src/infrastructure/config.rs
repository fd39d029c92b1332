//! Configuration infrastructure
//!
//! Contains configuration loading and management for the price tracker.
//!
//! Configuration is organized into sections:
//! 1. `tracker` - polling cadence, pacing and pagination bounds
//! 2. `session` - proxy, captcha service and delivery location
//! 3. `telegram` - bot token, admin and allowed users
//! 4. `storage` - key-value database location
//! 5. `logging` - log level and outputs

#![allow(clippy::derivable_impls)]

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

/// Environment variable overriding the configuration file location
pub const CONFIG_PATH_ENV: &str = "PRICEWATCH_CONFIG";

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tracker: TrackerConfig,
    pub session: SessionConfig,
    pub telegram: TelegramConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Polling and pacing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Pause between polling cycles in seconds
    pub poll_interval_seconds: u64,

    /// Mandatory pause after every request before the next may start
    pub request_delay_ms: u64,

    /// Request timeout in seconds
    pub request_timeout_seconds: u64,

    /// Session resets attempted on retriable upstream errors
    pub max_session_resets: u32,

    /// Hard bound on offer pages fetched per item
    pub max_offer_pages: u32,

    /// Captcha revalidations allowed for a single fetch
    pub max_captcha_depth: u32,

    /// Lifetime of a notification fingerprint in seconds
    pub dedup_ttl_seconds: u64,

    /// Cap for the network-timeout backoff in seconds
    pub max_backoff_seconds: u64,

    /// Directory receiving page dumps when extraction fails
    pub diagnostics_dir: PathBuf,
}

/// Upstream session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Optional `http://`, `https://` or `socks5://` forwarding proxy
    pub proxy_url: Option<String>,

    /// Base URL of the captcha-solving service
    pub captcha_service_url: Option<String>,

    /// Postal code used where the storefront accepts one
    pub postal_code: String,

    /// Country code used by foreign storefronts
    pub country_code: String,
}

/// Chat front-end and delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API token; notifications are only logged without one
    pub bot_token: Option<String>,

    /// Bot API base URL
    pub api_base_url: String,

    /// Chat id receiving operational failures
    pub admin_chat_id: Option<i64>,

    /// Users allowed to issue commands (the admin is always allowed)
    pub allowed_users: Vec<i64>,
}

/// Key-value store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// sqlx SQLite URL
    pub database_url: String,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs in the log file
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Log directory; defaults to `logs/` next to the executable
    pub directory: Option<PathBuf>,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Module-specific log level filters (e.g., "sqlx": "warn", "reqwest": "info")
    pub module_filters: HashMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            session: SessionConfig::default(),
            telegram: TelegramConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: defaults::POLL_INTERVAL_SECONDS,
            request_delay_ms: defaults::REQUEST_DELAY_MS,
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_session_resets: defaults::MAX_SESSION_RESETS,
            max_offer_pages: defaults::MAX_OFFER_PAGES,
            max_captcha_depth: defaults::MAX_CAPTCHA_DEPTH,
            dedup_ttl_seconds: defaults::DEDUP_TTL_SECONDS,
            max_backoff_seconds: defaults::MAX_BACKOFF_SECONDS,
            diagnostics_dir: PathBuf::from(defaults::DIAGNOSTICS_DIR),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            proxy_url: None,
            captcha_service_url: Some(defaults::CAPTCHA_SERVICE_URL.to_string()),
            postal_code: defaults::POSTAL_CODE.to_string(),
            country_code: defaults::COUNTRY_CODE.to_string(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base_url: defaults::TELEGRAM_API_URL.to_string(),
            admin_chat_id: None,
            allowed_users: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: defaults::DATABASE_URL.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            directory: None,
            max_files: defaults::LOG_MAX_FILES,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("sqlx".to_string(), "warn".to_string());
                filters.insert("reqwest".to_string(), "info".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("html5ever".to_string(), "warn".to_string());
                filters.insert("pricewatch_lib".to_string(), "info".to_string());
                filters
            },
        }
    }
}

impl TrackerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup_ttl_seconds)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_seconds)
    }
}

impl AppConfig {
    /// Reject settings the tracker cannot run with
    pub fn validate(&self) -> Result<()> {
        let tracker = &self.tracker;
        if tracker.poll_interval_seconds == 0 {
            bail!("tracker.poll_interval_seconds must be greater than 0");
        }
        if !(defaults::MIN_REQUEST_DELAY_MS..=defaults::MAX_REQUEST_DELAY_MS).contains(&tracker.request_delay_ms) {
            bail!(
                "tracker.request_delay_ms must be between {} and {} (got {})",
                defaults::MIN_REQUEST_DELAY_MS,
                defaults::MAX_REQUEST_DELAY_MS,
                tracker.request_delay_ms
            );
        }
        if tracker.max_offer_pages == 0 {
            bail!("tracker.max_offer_pages must be greater than 0");
        }
        if tracker.request_timeout_seconds == 0 {
            bail!("tracker.request_timeout_seconds must be greater than 0");
        }
        if let Some(proxy) = &self.session.proxy_url {
            crate::infrastructure::session_transport::validate_proxy_url(proxy)
                .with_context(|| format!("invalid session.proxy_url {proxy}"))?;
        }
        if let Some(captcha) = &self.session.captcha_service_url {
            url::Url::parse(captcha.trim_end_matches('/'))
                .with_context(|| format!("invalid session.captcha_service_url {captcha}"))?;
        }
        Ok(())
    }

    /// Every user allowed to issue commands, admin included
    pub fn command_users(&self) -> Vec<i64> {
        let mut users = self.telegram.allowed_users.clone();
        if let Some(admin) = self.telegram.admin_chat_id {
            if !users.contains(&admin) {
                users.push(admin);
            }
        }
        users
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join("pricewatch");
        Ok(config_dir)
    }

    /// Configuration manager honouring `PRICEWATCH_CONFIG`
    pub fn new() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(Self::with_path(path));
        }
        let config_path = Self::get_config_dir()?.join("pricewatch.json");
        Ok(Self { config_path })
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!("Configuration file not found, creating default: {:?}", self.config_path);
            let default_config = AppConfig::default();
            self.save_config(&default_config).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .context("Failed to read configuration file")?;

        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                info!("Loaded configuration from: {:?}", self.config_path);
                Ok(config)
            }
            Err(parse_error) => {
                warn!("⚠️  Configuration parse error: {}", parse_error);

                let backup_path = self.config_path.with_extension("json.corrupted");
                if let Err(e) = fs::copy(&self.config_path, &backup_path).await {
                    warn!("Failed to create backup of corrupted config: {}", e);
                } else {
                    info!("Backed up corrupted config to: {:?}", backup_path);
                }

                let default_config = AppConfig::default();
                self.save_config(&default_config)
                    .await
                    .context("Failed to save default configuration")?;
                info!("✅ Reset to default configuration");
                Ok(default_config)
            }
        }
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create config directory")?;
            }
        }

        let content = serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }
}

/// Default configuration values
pub mod defaults {
    /// Default pause between polling cycles
    pub const POLL_INTERVAL_SECONDS: u64 = 5;

    /// Default pause after each request (human-like pacing)
    pub const REQUEST_DELAY_MS: u64 = 5000;

    /// Lower bound accepted for the pacing delay
    pub const MIN_REQUEST_DELAY_MS: u64 = 500;

    /// Upper bound accepted for the pacing delay
    pub const MAX_REQUEST_DELAY_MS: u64 = 60_000;

    /// Default request timeout in seconds
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    /// Default session resets on retriable errors
    pub const MAX_SESSION_RESETS: u32 = 1;

    /// Offer pages 0..=10
    pub const MAX_OFFER_PAGES: u32 = 11;

    /// Default captcha revalidation depth
    pub const MAX_CAPTCHA_DEPTH: u32 = 2;

    /// Six hours
    pub const DEDUP_TTL_SECONDS: u64 = 6 * 60 * 60;

    /// Network-timeout backoff cap
    pub const MAX_BACKOFF_SECONDS: u64 = 60;

    pub const DIAGNOSTICS_DIR: &str = "diagnostics";

    pub const CAPTCHA_SERVICE_URL: &str = "http://localhost:8080";

    pub const POSTAL_CODE: &str = "44001";

    pub const COUNTRY_CODE: &str = "ES";

    pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

    pub const DATABASE_URL: &str = "sqlite://pricewatch.db";

    /// Default log level
    pub const LOG_LEVEL: &str = "info";

    pub const LOG_JSON_FORMAT: bool = false;

    pub const LOG_CONSOLE_OUTPUT: bool = true;

    pub const LOG_FILE_OUTPUT: bool = true;

    /// Default maximum log files to keep
    pub const LOG_MAX_FILES: u32 = 5;
}
