//! Application configuration.
//!
//! Loaded from an optional YAML file and `STOCK__`-prefixed environment
//! variables, e.g. `STOCK__REMOTE__URL`.

use serde::Deserialize;
use std::path::PathBuf;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "STOCK_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "STOCK";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "STOCK_LOG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StockConfig {
    pub storage: StorageConfig,
    pub remote: RemoteConfig,
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// sled database directory
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/stock.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Spreadsheet web-app endpoint. Mirroring is off when unset.
    pub url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 10,
        }
    }
}

impl RemoteConfig {
    /// The url, if it is set to something non-blank.
    pub fn endpoint(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Single password shared by everyone with admin access.
    pub password: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            password: "Dsa21".to_string(),
        }
    }
}

impl StockConfig {
    /// Load configuration from file and environment.
    ///
    /// Sources, later overriding earlier:
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File given by `path` (if provided)
    /// 3. File named by `STOCK_CONFIG` (if set)
    /// 4. `STOCK__`-prefixed environment variables
    pub fn load(path: Option<&str>) -> Result<Self, ::config::ConfigError> {
        use ::config::{Config, Environment, File, FileFormat};

        let mut builder = Config::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
