//! Remote endpoint configuration.

use climagraph_core::{ConfigError, SeriesKind};
use serde::Deserialize;

/// Where and how series are fetched.
///
/// All fields are required when loaded from a file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    /// Scheme, host and optional prefix, e.g. `https://example.org/climate`.
    pub base_url: String,
    /// Path of the temperature feed relative to `base_url`.
    pub temperature_path: String,
    /// Path of the precipitation feed relative to `base_url`.
    pub precipitation_path: String,
    /// Whole-request timeout.
    pub request_timeout_ms: u64,
    pub user_agent: String,
}

impl RemoteConfig {
    /// Config for `base_url` with the conventional feed paths.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            temperature_path: "data/temperature.json".to_string(),
            precipitation_path: "data/precipitation.json".to_string(),
            request_timeout_ms: 30_000,
            user_agent: concat!("climagraph/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    fn path(&self, kind: SeriesKind) -> &str {
        match kind {
            SeriesKind::Temperature => &self.temperature_path,
            SeriesKind::Precipitation => &self.precipitation_path,
        }
    }

    /// Full URL of the feed for `kind`.
    pub fn endpoint(&self, kind: SeriesKind) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path(kind).trim_start_matches('/')
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "remote.base_url".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "remote.base_url".to_string(),
                reason: "must start with http:// or https://".to_string(),
            });
        }
        for kind in SeriesKind::ALL {
            if self.path(kind).trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("remote.{}_path", kind),
                    reason: "must not be empty".to_string(),
                });
            }
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "remote.request_timeout_ms".to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "remote.user_agent".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
