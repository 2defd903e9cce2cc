//! CLI entry point for the `trestle` command-line tool.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use trestle_cache::cli::commands;
use trestle_cache::CacheError;

#[derive(Parser)]
#[command(
    name = "trestle",
    about = "Trestle cache CLI: bi-temporal object cache tools"
)]
struct Cli {
    /// Output format: "text" (default) or "json"
    #[arg(long, default_value = "text")]
    format: String,

    /// Enable debug logging
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which tree node owns an interval
    Locate {
        /// Finest subdivision level
        #[arg(long, default_value = "16")]
        max_depth: u32,
        /// Inclusive upper bound of the domain
        #[arg(long)]
        domain_max: u64,
        /// Interval start (inclusive)
        low: u64,
        /// Interval end (exclusive); omit for an open interval
        high: Option<u64>,
    },
    /// Replay a JSON workload against a fresh cache
    Replay {
        /// Path to the workload JSON file
        workload: PathBuf,
        /// Path to a TOML cache configuration
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the effective cache configuration
    Config {
        /// Path to a TOML cache configuration
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    let json = cli.format == "json";

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();

    let result = match cli.command {
        Commands::Locate {
            max_depth,
            domain_max,
            low,
            high,
        } => commands::cmd_locate(max_depth, domain_max, low, high, json),
        Commands::Replay { workload, config } => {
            commands::cmd_replay(&workload, config.as_deref(), json)
        }
        Commands::Config { config } => commands::cmd_config(config.as_deref(), json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let code = match &e {
            CacheError::Io(_) => 1,
            CacheError::Json(_) | CacheError::Config(_) => 2,
            CacheError::Domain { .. }
            | CacheError::MalformedInterval { .. }
            | CacheError::PointOutOfDomain { .. }
            | CacheError::InvalidDepth { .. } => 3,
            _ => 5,
        };
        process::exit(code);
    }
}
