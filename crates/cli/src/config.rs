//! Configuration loading and management

use anyhow::{Context, Result};
use bizdir_domain::{DirectoryConfig, ListDefaults, RetryPolicy, SortDirection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub listing: ListingConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Fallbacks for list commands invoked without paging flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    #[serde(default = "default_take")]
    pub default_take: u32,

    #[serde(default = "default_order_by")]
    pub default_order_by: String,

    #[serde(default = "default_order_dir")]
    pub default_order_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Attempts per write transaction, including the first
    #[serde(default = "default_transaction_attempts")]
    pub transaction_attempts: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./bizdir.sqlite")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_take() -> u32 {
    10
}

fn default_order_by() -> String {
    "id".to_string()
}

fn default_order_dir() -> String {
    "asc".to_string()
}

fn default_transaction_attempts() -> u32 {
    5
}

fn default_retry_backoff_ms() -> u64 {
    25
}

fn default_max_connections() -> u32 {
    5
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_take: default_take(),
            default_order_by: default_order_by(),
            default_order_dir: default_order_dir(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            transaction_attempts: default_transaction_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_connections: default_max_connections(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./bizdir.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("BIZDIR")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Settings handed to the directory use cases
    pub fn directory_config(&self) -> Result<DirectoryConfig> {
        let order_dir: SortDirection = self
            .listing
            .default_order_dir
            .parse()
            .context("Invalid listing.default_order_dir")?;

        Ok(DirectoryConfig {
            listing: ListDefaults {
                take: self.listing.default_take,
                order_by: self.listing.default_order_by.clone(),
                order_dir,
            },
            retry: RetryPolicy::new(
                self.storage.transaction_attempts.max(1),
                Duration::from_millis(self.storage.retry_backoff_ms),
            ),
        })
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# bizdir configuration

[general]
database_path = "./bizdir.sqlite"
log_level = "info"

[listing]
# 0 lists every row on one page
default_take = 10
default_order_by = "id"
default_order_dir = "asc"  # asc, desc

[storage]
# attempts per write transaction before giving up
transaction_attempts = 5
# first retry delay, doubled on each further attempt
retry_backoff_ms = 25
max_connections = 5
"#
        .to_string()
    }
}
