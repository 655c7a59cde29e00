use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

const APP_DIR: &str = "skycard";
const CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "SKYCARD";
/// Fallback variable for the CWA authorization key.
pub const API_KEY_ENV: &str = "CWA_API_KEY";

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

    /// Get a user-friendly message summarizing all errors
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
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Weather settings
    #[serde(default)]
    pub weather: WeatherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// CWA open-data authorization key
    pub api_key: Option<String>,

    /// Datastore base URL
    pub base_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Retries per request after the first attempt
    pub max_retries: u32,

    /// Refresh interval in minutes (watch mode)
    pub refresh_minutes: u32,

    /// City shown when no preference has been saved yet
    pub default_city: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://opendata.cwa.gov.tw/api/v1/rest/datastore".to_string(),
            timeout_secs: 10,
            max_retries: 2,
            refresh_minutes: 10,
            default_city: "臺北市".to_string(),
        }
    }
}

impl WeatherConfig {
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::with_dir(&default_config_dir())
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl Config {
    pub fn with_dir(config_dir: &Path) -> Self {
        Self {
            config_dir: config_dir.to_path_buf(),
            weather: WeatherConfig::default(),
        }
    }

    /// Load from the platform config directory, creating a default file if missing.
    pub fn load() -> Result<Self> {
        Self::load_from(&default_config_dir())
    }

    /// Load `<config_dir>/config.toml` layered under `SKYCARD_*` environment variables.
    ///
    /// Nested keys use a double underscore, e.g. `SKYCARD_WEATHER__REFRESH_MINUTES=5`.
    pub fn load_from(config_dir: &Path) -> Result<Self> {
        Self::load_layered(config_dir, ENV_PREFIX)
    }

    fn load_layered(config_dir: &Path, env_prefix: &str) -> Result<Self> {
        let defaults = Self::with_dir(config_dir);
        let config_path = defaults.config_path();

        if !config_path.exists() {
            defaults.save()?;
            tracing::info!("Created default config at {}", config_path.display());
        }

        let settings = config::Config::builder()
            .add_source(
                config::Config::try_from(&defaults).context("Failed to build default config")?,
            )
            .add_source(config::File::from(config_path.as_path()).required(false))
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read config file")?;

        let mut config: Config = settings
            .try_deserialize()
            .context("Failed to parse config file")?;

        config.config_dir = config_dir.to_path_buf();
        if !config.weather.has_api_key() {
            config.weather.api_key = std::env::var(API_KEY_ENV)
                .ok()
                .filter(|k| !k.trim().is_empty());
        }

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated(config_dir: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let config = match config_dir {
            Some(dir) => Self::load_from(dir)?,
            None => Self::load()?,
        };
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

        self.validate_url(&self.weather.base_url, "weather.base_url", &mut result);

        if self.weather.timeout_secs == 0 {
            result.add_error("weather.timeout_secs", "Timeout must be greater than 0");
        } else if self.weather.timeout_secs > 120 {
            result.add_warning("weather.timeout_secs", "Timeout is unusually long (>120s)");
        }

        if self.weather.max_retries > 10 {
            result.add_warning("weather.max_retries", "More than 10 retries per request");
        }

        if self.weather.refresh_minutes == 0 {
            result.add_warning(
                "weather.refresh_minutes",
                "Weather refresh disabled (0 minutes)",
            );
        } else if self.weather.refresh_minutes > 1440 {
            result.add_warning(
                "weather.refresh_minutes",
                "Weather refresh interval is more than 24 hours",
            );
        }

        if self.weather.default_city.trim().is_empty() {
            result.add_error("weather.default_city", "Default city cannot be empty");
        }

        if !self.weather.has_api_key() {
            result.add_warning(
                "weather.api_key",
                format!("No CWA API key configured; set it in {} or {}", CONFIG_FILE, API_KEY_ENV),
            );
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
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

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to `<config_dir>/config.toml`
    pub fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir).context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(self.config_path(), contents).context("Failed to write config file")?;

        Ok(())
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }
}
