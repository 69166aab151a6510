//! climagraph CLI
//!
//! Configuration, logging setup and command implementations behind the
//! `climagraph` binary.

pub mod app;
pub mod config;
pub mod error;
pub mod telemetry;

pub use app::{open_store, App, GetReport, RenderReport, StoreReport, WarmReport};
pub use config::{AppConfig, StoreBackend, CONFIG_ENV};
pub use error::{CliError, CliResult};
pub use telemetry::init_tracing;
