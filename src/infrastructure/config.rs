//! Configuration infrastructure
//!
//! Settings are grouped by concern (site, HTTP, timing, cache, parsing, logging)
//! and persisted as pretty JSON in the user's config directory. Every field
//! falls back to a constant in [`defaults`].

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub http: HttpConfig,
    pub timing: TimingConfig,
    pub cache: CacheConfig,
    pub parsing: ParsingConfig,
    pub logging: LoggingConfig,
}

/// Upstream site layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Site root, also the warmup target for new sessions
    pub base_url: String,
    /// Path prefix of a listing page, joined with a bare listing id
    pub listing_view_path: String,
    /// Path of the search page that carries the filter form
    pub search_path: String,
}

/// HTTP client behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    /// Per-attempt timeout for listing and search requests
    pub request_timeout_seconds: u64,
    /// Timeout for the session warmup request
    pub session_timeout_seconds: u64,
    /// Attempt budget per fetch
    pub max_retries: u32,
    pub follow_redirects: bool,
    /// Request pacing applied before every attempt (0 disables pacing)
    pub max_requests_per_second: u32,
}

/// Delays used by the fetch layer, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Randomized pause after the session warmup request
    pub session_init_delay_ms: (u64, u64),
    /// Base of the exponential backoff schedule
    pub retry_base_delay_ms: u64,
    /// Randomized wait after a 429 response
    pub rate_limit_delay_ms: (u64, u64),
    /// Fixed pause after a failed attempt, before the backoff of the next one
    pub error_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a classified filter catalog is served without refreshing
    pub filter_ttl_seconds: u64,
    /// Warm the filter cache when the service starts
    pub warm_on_startup: bool,
}

/// Tunables for the extraction heuristics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    /// Marketing words removed from a title before inferring the model name
    pub model_stopwords: Vec<String>,
    /// Select option labels that are placeholders rather than real choices
    pub placeholder_labels: Vec<String>,
    /// Class marking a key/value row in the attribute grid
    pub table_row_class: String,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    pub file_name: String,
    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,
    pub auto_cleanup_logs: bool,
    /// Module-specific log level filters (e.g., "reqwest": "info")
    pub module_filters: HashMap<String, String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::BASE_URL.to_string(),
            listing_view_path: defaults::LISTING_VIEW_PATH.to_string(),
            search_path: defaults::SEARCH_PATH.to_string(),
        }
    }
}

impl SiteConfig {
    /// Absolute URL of the search form page
    pub fn search_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.search_path)
    }

    /// Resolve a relative URL against the site root
    pub fn resolve_url(&self, href: &str) -> String {
        match url::Url::parse(&self.base_url).and_then(|base| base.join(href)) {
            Ok(resolved) => resolved.to_string(),
            Err(_) => {
                let base = self.base_url.trim_end_matches('/');
                if href.starts_with('/') {
                    format!("{}{}", base, href)
                } else {
                    format!("{}/{}", base, href)
                }
            }
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            session_timeout_seconds: defaults::SESSION_TIMEOUT_SECONDS,
            max_retries: defaults::MAX_RETRIES,
            follow_redirects: true,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
        }
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_seconds)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            session_init_delay_ms: defaults::SESSION_INIT_DELAY_MS,
            retry_base_delay_ms: defaults::RETRY_BASE_DELAY_MS,
            rate_limit_delay_ms: defaults::RATE_LIMIT_DELAY_MS,
            error_delay_ms: defaults::ERROR_DELAY_MS,
        }
    }
}

impl TimingConfig {
    /// No waiting at all; used by tests and local fixtures
    pub fn immediate() -> Self {
        Self {
            session_init_delay_ms: (0, 0),
            retry_base_delay_ms: 0,
            rate_limit_delay_ms: (0, 0),
            error_delay_ms: 0,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            filter_ttl_seconds: defaults::FILTER_TTL_SECONDS,
            warm_on_startup: true,
        }
    }
}

impl CacheConfig {
    pub fn filter_ttl(&self) -> Duration {
        Duration::from_secs(self.filter_ttl_seconds)
    }
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            model_stopwords: defaults::MODEL_STOPWORDS.iter().map(|s| s.to_string()).collect(),
            placeholder_labels: defaults::PLACEHOLDER_LABELS.iter().map(|s| s.to_string()).collect(),
            table_row_class: defaults::TABLE_ROW_CLASS.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            file_name: defaults::LOG_FILE_NAME.to_string(),
            max_files: defaults::LOG_MAX_FILES,
            auto_cleanup_logs: true,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("reqwest".to_string(), "info".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("html5ever".to_string(), "warn".to_string());
                filters.insert("car_listings".to_string(), "info".to_string());
                filters
            },
        }
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
            .join(defaults::APP_DIR_NAME);
        Ok(config_dir)
    }

    /// Manager for the default config file location
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join(defaults::CONFIG_FILE_NAME);
        Ok(Self { config_path })
    }

    /// Manager for an explicit config file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { config_path: path.into() }
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
                warn!("⚠️  Resetting to default configuration");

                let backup_path = self.config_path.with_extension("json.corrupted");
                if let Err(e) = fs::copy(&self.config_path, &backup_path).await {
                    warn!("Failed to create backup of corrupted config: {}", e);
                } else {
                    info!("Backed up corrupted config to: {:?}", backup_path);
                }

                self.reset_to_defaults()
                    .await
                    .context("Failed to save default configuration")
            }
        }
    }

    /// Load from an explicit file (created with defaults when missing)
    pub async fn load_from(path: impl Into<PathBuf>) -> Result<AppConfig> {
        Self::with_path(path).load_config().await
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }

    /// Overwrite the file with the default configuration
    pub async fn reset_to_defaults(&self) -> Result<AppConfig> {
        info!("🔄 Resetting configuration to defaults");
        let default_config = AppConfig::default();
        self.save_config(&default_config).await?;
        Ok(default_config)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "car-listings";
    pub const CONFIG_FILE_NAME: &str = "config.json";

    pub const BASE_URL: &str = "https://www.car.gr";
    pub const LISTING_VIEW_PATH: &str = "/classifieds/cars/view/";
    pub const SEARCH_PATH: &str = "/classifieds/cars/";

    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 60;
    pub const SESSION_TIMEOUT_SECONDS: u64 = 30;
    pub const MAX_RETRIES: u32 = 3;
    pub const MAX_REQUESTS_PER_SECOND: u32 = 2;

    pub const SESSION_INIT_DELAY_MS: (u64, u64) = (1_000, 2_000);
    pub const RETRY_BASE_DELAY_MS: u64 = 2_000;
    pub const RATE_LIMIT_DELAY_MS: (u64, u64) = (5_000, 10_000);
    pub const ERROR_DELAY_MS: u64 = 1_000;

    pub const FILTER_TTL_SECONDS: u64 = 3_600;

    pub const MODEL_STOPWORDS: &[&str] = &["Professional", "Edition", "Pack", "Sport"];
    pub const PLACEHOLDER_LABELS: &[&str] = &["Όλα", "Από", "Έως", "-", "Μάρκα", "Μοντέλο"];
    pub const TABLE_ROW_CLASS: &str = "tw-grid";

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_FILE_NAME: &str = "car-listings.log";
    pub const LOG_MAX_FILES: u32 = 5;
}
