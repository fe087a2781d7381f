use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::client_config::{ClientConfig, DEFAULT_TTL_MS};

/// Provider lookup endpoint
pub const DEFAULT_GEOLOCATION_URL: &str = "https://api.ipgeolocation.io/ipgeo";

/// Daily warm-up endpoint
pub const DEFAULT_WARM_UP_URL: &str =
    "https://us-central1-ipgeolocation-414906.cloudfunctions.net/task";

const CONFIG_DIR_NAME: &str = "ipgeolocation";
const API_KEY_ENV: &str = "IPGEO_API_KEY";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// All errors joined into one line
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the config file and the persistent cache
    pub config_dir: PathBuf,

    /// Lookup settings handed to the client
    #[serde(default)]
    pub client: ClientConfig,

    /// Persistent cache settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Remote endpoints
    #[serde(default)]
    pub endpoints: EndpointConfig,

    /// API key taken from the environment at load time, never written back
    #[serde(skip)]
    env_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file for the persistent tier, relative to `config_dir` unless absolute
    #[serde(default = "default_database_file")]
    pub database_file: String,
}

fn default_database_file() -> String {
    "cache.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: default_database_file(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_geolocation_url")]
    pub geolocation_url: String,

    #[serde(default = "default_warm_up_url")]
    pub warm_up_url: String,
}

fn default_geolocation_url() -> String {
    DEFAULT_GEOLOCATION_URL.to_string()
}

fn default_warm_up_url() -> String {
    DEFAULT_WARM_UP_URL.to_string()
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            geolocation_url: default_geolocation_url(),
            warm_up_url: default_warm_up_url(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR_NAME);

        Self {
            config_dir,
            client: ClientConfig::default(),
            storage: StorageConfig::default(),
            endpoints: EndpointConfig::default(),
            env_api_key: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing defaults there if it doesn't exist
    ///
    /// `IPGEO_API_KEY`, when set, overrides `client.api_key` from the file.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::load_with_env_key(path, std::env::var(API_KEY_ENV).ok())
    }

    fn load_with_env_key(path: &Path, env_api_key: Option<String>) -> Result<Self> {
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str::<Config>(&contents).context("Failed to parse config file")?
        } else {
            let config = Self::default();
            config.save_to(path)?;
            config
        };

        config.env_api_key = env_api_key.filter(|k| !k.is_empty());
        Ok(config)
    }

    /// Lookup settings with the environment API key applied
    pub fn client_config(&self) -> ClientConfig {
        let mut client = self.client.clone();
        if let Some(key) = &self.env_api_key {
            client.api_key = Some(key.clone());
        }
        client
    }

    /// Load configuration and validate it
    ///
    /// Warnings are logged; errors abort the load.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        validate_url(
            &self.endpoints.geolocation_url,
            "endpoints.geolocation_url",
            &mut result,
        );
        validate_url(&self.endpoints.warm_up_url, "endpoints.warm_up_url", &mut result);

        if self.storage.database_file.trim().is_empty() {
            result.add_error("storage.database_file", "Database file name must not be empty");
        }

        if self.client_config().api_key.as_deref().map_or(true, str::is_empty) {
            result.add_warning(
                "client.api_key",
                format!("No API key configured (set {} or client.api_key)", API_KEY_ENV),
            );
        }

        if self.client.lang.is_empty() {
            result.add_warning("client.lang", "Empty language; provider default applies");
        }

        if self.client.ttl_ms != DEFAULT_TTL_MS {
            result.add_warning(
                "client.ttl_ms",
                "Cached lookups always expire after 24 hours; ttl_ms is not applied",
            );
        }

        if !self.client.caches_results() {
            result.add_warning(
                "client",
                "No cache destination enabled; every lookup hits the provider",
            );
        }

        result
    }

    /// Location of the persistent cache database
    pub fn database_path(&self) -> PathBuf {
        let file = PathBuf::from(&self.storage.database_file);
        if file.is_absolute() {
            file
        } else {
            self.config_dir.join(file)
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join(CONFIG_DIR_NAME);

        Ok(config_dir.join("config.toml"))
    }
}

fn validate_url(url_str: &str, field_name: &str, result: &mut ValidationResult) {
    match Url::parse(url_str) {
        Ok(url) => {
            if url.scheme() != "http" && url.scheme() != "https" {
                result.add_error(
                    field_name,
                    format!("URL must use http or https scheme, got: {}", url.scheme()),
                );
            }

            if url.host().is_none() {
                result.add_error(field_name, "URL must have a host");
            }

            if url.query().is_some() {
                result.add_error(field_name, "URL must not carry a query string");
            }
        }
        Err(e) => {
            result.add_error(field_name, format!("Invalid URL: {}", e));
        }
    }
}
