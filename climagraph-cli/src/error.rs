//! CLI error type.

use climagraph_core::{ClimagraphError, ConfigError};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Missing configuration file path (use --config or CLIMAGRAPH_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to initialize logging: {0}")]
    Telemetry(String),
    #[error("Failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
    #[error("Render failed: {0}")]
    Render(String),
    #[error("Invalid argument {arg}: {reason}")]
    InvalidArgument { arg: &'static str, reason: String },
    #[error(transparent)]
    Climagraph(#[from] ClimagraphError),
}

pub type CliResult<T> = Result<T, CliError>;
