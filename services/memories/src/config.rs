use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the memories service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Hosted backend connection
    #[serde(default)]
    pub backend: BackendConfig,
    /// Object storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Image transform configuration
    #[serde(default)]
    pub image: ImageConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format (pretty, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

/// Hosted backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Backend base URL, e.g. https://xyzcompany.supabase.co
    #[serde(default)]
    pub url: String,
    /// Anonymous access token
    #[serde(default)]
    pub anon_key: String,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Object storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Bucket holding uploaded photos (must be publicly readable)
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Table holding memory rows
    #[serde(default = "default_table")]
    pub table: String,
}

/// Image transform applied to every picked photo
#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    /// Maximum output width in pixels
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    /// JPEG quality, 1-100
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Directory receiving transformed images
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

// Default value functions
fn default_service_name() -> String {
    "memories".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_bucket() -> String {
    "memories".to_string()
}

fn default_table() -> String {
    "memories".to_string()
}

fn default_max_width() -> u32 {
    1400
}

fn default_jpeg_quality() -> u8 {
    80
}

fn default_output_dir() -> PathBuf {
    std::env::temp_dir().join("memories")
}

impl Config {
    /// Load configuration from config files and environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            // SUPABASE_URL / SUPABASE_ANON_KEY are the lowest-priority source
            .set_default("backend.url", std::env::var("SUPABASE_URL").unwrap_or_default())
            .and_then(|b| {
                b.set_default(
                    "backend.anon_key",
                    std::env::var("SUPABASE_ANON_KEY").unwrap_or_default(),
                )
            })
            .map_err(config_error)?
            .add_source(config::File::with_name("config/memories").required(false))
            .add_source(config::File::with_name("/etc/memories/memories").required(false))
            // MEMORIES__BACKEND__URL -> backend.url
            .add_source(
                config::Environment::with_prefix("MEMORIES")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_error)?;

        let config: Self = config.try_deserialize().map_err(config_error)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.backend.validate()?;

        if self.storage.bucket.trim().is_empty() {
            return Err(Error::Configuration("storage.bucket must not be empty".to_string()));
        }
        if self.database.table.trim().is_empty() {
            return Err(Error::Configuration("database.table must not be empty".to_string()));
        }
        if self.image.max_width == 0 {
            return Err(Error::Configuration(
                "image.max_width must be greater than 0".to_string(),
            ));
        }
        if !(1..=100).contains(&self.image.jpeg_quality) {
            return Err(Error::Configuration(
                "image.jpeg_quality must be between 1 and 100".to_string(),
            ));
        }

        Ok(())
    }
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    /// Both the base URL and the anonymous token are required.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::Configuration(
                "missing backend url (set MEMORIES__BACKEND__URL or SUPABASE_URL)".to_string(),
            ));
        }
        if self.anon_key.trim().is_empty() {
            return Err(Error::Configuration(
                "missing backend anon key (set MEMORIES__BACKEND__ANON_KEY or SUPABASE_ANON_KEY)"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn config_error(err: config::ConfigError) -> Error {
    Error::Configuration(err.to_string())
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_width: default_max_width(),
            jpeg_quality: default_jpeg_quality(),
            output_dir: default_output_dir(),
        }
    }
}
