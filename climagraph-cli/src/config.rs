//! Configuration loading for the climagraph CLI.
//!
//! All fields are required. No defaults.

use std::path::{Path, PathBuf};

use climagraph_core::ConfigError;
use climagraph_remote::RemoteConfig;
use climagraph_storage::CacheConfig;
use serde::Deserialize;

use crate::error::CliError;

/// Environment variable consulted when `--config` is not given.
pub const CONFIG_ENV: &str = "CLIMAGRAPH_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub remote: RemoteConfig,
    pub store: StoreConfig,
    pub cache: CacheSection,
    pub render: RenderConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Lmdb,
    Memory,
    Disabled,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Lmdb => "lmdb",
            StoreBackend::Memory => "memory",
            StoreBackend::Disabled => "disabled",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// LMDB environment directory.
    pub path: PathBuf,
    pub max_size_mb: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSection {
    pub single_flight: bool,
    pub write_back: bool,
}

impl From<&CacheSection> for CacheConfig {
    fn from(section: &CacheSection) -> Self {
        CacheConfig::new()
            .with_single_flight(section.single_flight)
            .with_write_back(section.write_back)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderConfig {
    pub pixel_width: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl AppConfig {
    /// Load from `path`, falling back to `CLIMAGRAPH_CONFIG`, and validate.
    pub fn load(path: Option<PathBuf>) -> Result<Self, CliError> {
        let path = path.or_else(config_path_from_env);
        let path = path.ok_or(CliError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, CliError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, CliError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::from(&self.cache)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.remote.validate()?;

        if self.store.backend == StoreBackend::Lmdb {
            if self.store.path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "store.path".to_string(),
                    reason: "must not be empty for the lmdb backend".to_string(),
                });
            }
            if self.store.max_size_mb == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "store.max_size_mb".to_string(),
                    reason: "must be > 0".to_string(),
                });
            }
        }
        if self.render.pixel_width == 0 {
            return Err(ConfigError::InvalidValue {
                field: "render.pixel_width".to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        if self.log.filter.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "log.filter".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if let Err(e) = tracing_subscriber::EnvFilter::try_new(&self.log.filter) {
            return Err(ConfigError::InvalidValue {
                field: "log.filter".to_string(),
                reason: e.to_string(),
            });
        }
        Ok(())
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV).ok().map(PathBuf::from)
}
