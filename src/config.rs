//! Configuration System
//!
//! Layered configuration: built-in defaults, then an optional TOML file, then
//! `VANTAGE_<SECTION>__<FIELD>` environment variables. There is intentionally no
//! perspective setting; every read states its perspective explicitly.

use crate::error::ResolveError;
use crate::logging::LoggingConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// File picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "vantage.toml";

const ENV_PREFIX: &str = "VANTAGE";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VantageConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Document store connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Project identifier; determines the default host.
    #[serde(default)]
    pub project_id: String,

    #[serde(default = "default_dataset")]
    pub dataset: String,

    /// Dated API version, with or without a leading `v`.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Overrides `https://{project_id}.api.sanity.io`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Per-request transport timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_dataset() -> String {
    "production".to_string()
}

fn default_api_version() -> String {
    "2024-01-01".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            dataset: default_dataset(),
            api_version: default_api_version(),
            base_url: None,
            token: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Consistency cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_true() -> bool {
    true
}

fn default_ttl_secs() -> u64 {
    60
}

fn default_max_entries() -> usize {
    256
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Store(String),
    Cache(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Store(msg) => write!(f, "store: {}", msg),
            ValidationError::Cache(msg) => write!(f, "cache: {}", msg),
            ValidationError::Logging(msg) => write!(f, "logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl StoreConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.base_url.is_none() && self.project_id.is_empty() {
            errors.push("project_id is required when base_url is not set".to_string());
        }
        if !self.project_id.is_empty()
            && !self
                .project_id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            errors.push(format!("invalid project_id '{}'", self.project_id));
        }
        if self.dataset.is_empty()
            || self.dataset.len() > 64
            || !self
                .dataset
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            errors.push(format!("invalid dataset '{}'", self.dataset));
        }
        if let Some(url) = &self.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(format!("base_url '{}' must be an http(s) URL", url));
            }
        }
        if self.api_version.trim_start_matches('v').is_empty() {
            errors.push("api_version cannot be empty".to_string());
        }
        if self.timeout_ms == 0 {
            errors.push("timeout_ms must be greater than zero".to_string());
        }

        errors
    }
}

impl VantageConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors: Vec<ValidationError> = self
            .store
            .validate()
            .into_iter()
            .map(ValidationError::Store)
            .collect();

        if self.cache.enabled && self.cache.max_entries == 0 {
            errors.push(ValidationError::Cache(
                "max_entries must be greater than zero when the cache is enabled".to_string(),
            ));
        }

        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding every problem into one error.
    pub fn ensure_valid(&self) -> Result<(), ResolveError> {
        self.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ResolveError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                msgs.join("\n")
            ))
        })
    }

    /// Render as TOML with the store token redacted.
    pub fn to_toml(&self) -> Result<String, ResolveError> {
        let mut redacted = self.clone();
        if redacted.store.token.is_some() {
            redacted.store.token = Some("<redacted>".to_string());
        }
        toml::to_string_pretty(&redacted)
            .map_err(|e| ResolveError::ConfigError(format!("Failed to render config: {}", e)))
    }
}

/// Loads [`VantageConfig`] from defaults, file and environment.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration.
    ///
    /// With an explicit path the file must exist; otherwise `./vantage.toml`
    /// is used when present.
    pub fn load(path: Option<&Path>) -> Result<VantageConfig, ResolveError> {
        let builder = builder_with_defaults()?;
        let builder = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ResolveError::ConfigError(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                builder.add_source(File::from(path.to_path_buf()).required(true))
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                debug!(config_path = %default_path.display(), "Looking for default config file");
                builder.add_source(File::from(default_path).required(false))
            }
        };

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Load a single file on top of defaults, ignoring the environment.
    pub fn load_from_file(path: &Path) -> Result<VantageConfig, ResolveError> {
        let config = builder_with_defaults()?
            .add_source(File::from(path.to_path_buf()).required(true))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ResolveError> {
    Ok(Config::builder()
        .set_default("store.dataset", default_dataset())?
        .set_default("store.api_version", default_api_version())?
        .set_default("store.timeout_ms", default_timeout_ms())?
        .set_default("cache.enabled", true)?
        .set_default("cache.ttl_secs", default_ttl_secs())?
        .set_default("cache.max_entries", default_max_entries() as u64)?)
}
