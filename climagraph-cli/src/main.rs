//! `climagraph` command-line tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use climagraph_cli::{init_tracing, App, AppConfig, CliError};
use climagraph_core::{from_day_key, DateRange, SeriesKind, Timestamp};
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(name = "climagraph", version, about = "Tiered climate series cache and renderer")]
struct Cli {
    /// Path to the TOML config (falls back to CLIMAGRAPH_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Args)]
struct RangeArgs {
    /// Inclusive lower bound, YYYY-MM-DD
    #[arg(long, value_parser = parse_day)]
    from: Option<Timestamp>,

    /// Exclusive upper bound, YYYY-MM-DD
    #[arg(long, value_parser = parse_day)]
    to: Option<Timestamp>,
}

impl RangeArgs {
    fn range(&self) -> DateRange {
        DateRange::new(self.from, self.to)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read a series (or a date range of it) through the cache
    Get {
        #[arg(long)]
        kind: SeriesKind,

        #[command(flatten)]
        range: RangeArgs,
    },

    /// Reduce a series to one point per pixel column
    Render {
        #[arg(long)]
        kind: SeriesKind,

        #[command(flatten)]
        range: RangeArgs,

        /// Output width in pixels (default: render.pixel_width)
        #[arg(long)]
        width: Option<usize>,
    },

    /// Fetch and persist full series ahead of time
    Warm {
        /// Only this kind (default: all kinds)
        #[arg(long)]
        kind: Option<SeriesKind>,
    },

    /// Show what the persistent store holds
    Stats,
}

fn parse_day(s: &str) -> Result<Timestamp, String> {
    from_day_key(s).map_err(|e| e.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config)?;
    init_tracing(&config.log)?;

    let app = App::build(&config)?;
    match cli.command {
        Command::Get { kind, range } => print_json(&app.get(kind, range.range()).await?),
        Command::Render { kind, range, width } => {
            print_json(&app.render(kind, range.range(), width).await?)
        }
        Command::Warm { kind } => {
            let kinds = match kind {
                Some(kind) => vec![kind],
                None => SeriesKind::ALL.to_vec(),
            };
            print_json(&app.warm(&kinds).await?)
        }
        Command::Stats => print_json(&app.store_stats().await?),
    }
}
