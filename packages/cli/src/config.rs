//! CLI configuration.
//!
//! Defaults are embedded from `config/default.toml`. A `--config` file
//! replaces them (missing keys fall back to the defaults), then `WOW_*`
//! environment variables override single keys:
//!
//! | Variable | Key |
//! |---|---|
//! | `WOW_API_URL` | `api.base_url` |
//! | `WOW_MAX_RETRIES` | `api.max_retries` |
//! | `WOW_PORTFOLIO_METHOD` | `api.portfolio_method` |
//! | `WOW_GEOCODER` | `geocoder.provider` |
//! | `WOW_GEOSEARCH_URL` | `geocoder.base_url` |
//! | `WOW_REQUEST_TIMEOUT_SECS` | `machine.request_timeout_secs` |
//!
//! A zero timeout would fail every request, so [`Config::load`] rejects
//! one wherever it came from.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use strum_macros::{AsRefStr, Display, EnumString};
use wow_api_client::{PortfolioMethod, RetryPolicy};
use wow_state_machine::{DEFAULT_REQUEST_TIMEOUT, MachineConfig, SummarySource};

const DEFAULT_TOML: &str = include_str!("../config/default.toml");

/// Errors loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// The file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The config file is not valid TOML for [`Config`].
    #[error("Invalid config {}: {source}", path.display())]
    Toml {
        /// The file.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },
    /// An environment override could not be parsed.
    #[error("Invalid value for {name}: '{value}'")]
    Env {
        /// The variable.
        name: &'static str,
        /// What it was set to.
        value: String,
    },
    /// A timeout was set to zero.
    #[error("{key} must be at least 1 second")]
    ZeroTimeout {
        /// The offending key.
        key: &'static str,
    },
}

/// Which address resolver to use.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum GeocoderProvider {
    /// NYC `GeoSearch`.
    #[default]
    Geosearch,
    /// The backend's Geoclient passthrough (`/api/address`).
    Backend,
}

/// `[api]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub max_retries: u32,
    /// Per HTTP attempt.
    pub request_timeout_secs: u64,
    pub portfolio_method: PortfolioMethod,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: wow_api_client::DEFAULT_BASE_URL.to_string(),
            max_retries: RetryPolicy::default().max_retries,
            request_timeout_secs: 10,
            portfolio_method: PortfolioMethod::default(),
        }
    }
}

impl ApiConfig {
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            ..RetryPolicy::default()
        }
    }
}

/// `[geocoder]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub provider: GeocoderProvider,
    /// `GeoSearch` endpoint. Unused by the backend provider.
    pub base_url: String,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            provider: GeocoderProvider::default(),
            base_url: wow_geocoder::geosearch::DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// `[machine]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MachineSection {
    /// Limit on each collaborator call, retries included.
    pub request_timeout_secs: u64,
    pub summary: SummarySource,
}

impl Default for MachineSection {
    fn default() -> Self {
        Self {
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            summary: SummarySource::default(),
        }
    }
}

/// `[nycha]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NychaConfig {
    /// A full development table. The embedded sample is used when unset.
    pub data_path: Option<PathBuf>,
}

/// Everything the CLI needs to build its services.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub geocoder: GeocoderConfig,
    pub machine: MachineSection,
    pub nycha: NychaConfig,
}

impl Config {
    /// The embedded defaults.
    ///
    /// # Panics
    ///
    /// Panics if the embedded `config/default.toml` is malformed.
    #[must_use]
    pub fn builtin() -> Self {
        toml::de::from_str(DEFAULT_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse embedded default config: {e}"))
    }

    /// Loads `path`, or the embedded defaults, then applies environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, an
    /// override is malformed, or the result fails [`Config::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::builtin(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that parse but cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroTimeout`] if either timeout is zero.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.api.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout {
                key: "api.request_timeout_secs",
            });
        }
        if self.machine.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout {
                key: "machine.request_timeout_secs",
            });
        }
        Ok(())
    }

    /// Reads a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Toml`].
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::de::from_str(&raw).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Applies `WOW_*` overrides read through `var`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] if a numeric or enum value does not
    /// parse.
    pub fn apply_overrides(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = var("WOW_API_URL") {
            self.api.base_url = url;
        }
        if let Some(url) = var("WOW_GEOSEARCH_URL") {
            self.geocoder.base_url = url;
        }
        if let Some(provider) = parse_var(&var, "WOW_GEOCODER")? {
            self.geocoder.provider = provider;
        }
        if let Some(secs) = parse_var(&var, "WOW_REQUEST_TIMEOUT_SECS")? {
            self.machine.request_timeout_secs = secs;
        }
        if let Some(retries) = parse_var(&var, "WOW_MAX_RETRIES")? {
            self.api.max_retries = retries;
        }
        if let Some(method) = parse_var(&var, "WOW_PORTFOLIO_METHOD")? {
            self.api.portfolio_method = method;
        }
        Ok(())
    }

    #[must_use]
    pub const fn machine_config(&self) -> MachineConfig {
        MachineConfig {
            request_timeout: Duration::from_secs(self.machine.request_timeout_secs),
            summary_source: self.machine.summary,
        }
    }
}

fn parse_var<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    var(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Env { name, value })
        })
        .transpose()
}
