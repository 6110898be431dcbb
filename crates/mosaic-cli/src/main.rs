//! Mosaic CLI - inspect micro-application configurations.
//!
//! Resolves application sources into the scripts and stylesheets the runtime
//! would insert, answers which configured applications a location activates,
//! and prints the merged configuration.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod theme;

use commands::{config, matcher, resolve};

/// Mosaic - micro-frontend runtime tooling
#[derive(Parser)]
#[command(name = "mosaic")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format: pretty (default) or json
    #[arg(long, global = true, default_value = "pretty")]
    format: String,

    /// Read a single configuration file instead of the layered lookup
    #[arg(short, long, global = true, env = "MOSAIC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve an entry document or a list of asset URLs
    Resolve {
        /// Entry URL, or script and stylesheet URLs
        sources: Vec<String>,

        /// Resolve the sources of a configured application instead
        #[arg(short, long, conflicts_with = "sources")]
        app: Option<String>,
    },

    /// List the configured applications active at a location
    Match {
        /// Location to test (absolute URL or path)
        url: String,

        /// Override the configured basename
        #[arg(short, long)]
        basename: Option<String>,
    },

    /// View and validate configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the resolved configuration
    Show {
        /// Output format: toml or json
        #[arg(short, long, default_value = "toml")]
        format: String,
        /// Show only one section (runtime, logging, app)
        #[arg(short, long)]
        section: Option<String>,
    },
    /// Validate the configuration and list its applications
    Validate,
}

/// How command results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    /// Colored, human-oriented text.
    Pretty,
    /// Machine-readable JSON on stdout.
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging comes from config when it loads; errors surface again below.
    let loaded = config::load(cli.config.as_deref()).ok();
    let log_config = match loaded
        .as_ref()
        .map(|r| mosaic_telemetry::LogConfig::from_section(&r.config.logging))
    {
        Some(Ok(mut lc)) => {
            if cli.verbose {
                "debug".clone_into(&mut lc.level);
            }
            lc
        },
        _ => {
            let level = if cli.verbose { "debug" } else { "warn" };
            mosaic_telemetry::LogConfig::new(level)
                .with_format(mosaic_telemetry::LogFormat::Compact)
        },
    };
    if let Err(e) = mosaic_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let output_format = match cli.format.as_str() {
        "json" => OutputFormat::Json,
        _ => OutputFormat::Pretty,
    };

    match cli.command {
        Commands::Resolve { sources, app } => {
            let resolved = config::load(cli.config.as_deref())?;
            resolve::run_resolve(&resolved.config, &sources, app.as_deref(), output_format)
                .await?;
        },
        Commands::Match { url, basename } => {
            let resolved = config::load(cli.config.as_deref())?;
            matcher::run_match(&resolved.config, &url, basename.as_deref(), output_format)?;
        },
        Commands::Config { command } => handle_config(command, cli.config.as_deref())?,
    }

    Ok(())
}

fn handle_config(command: ConfigCommands, path: Option<&std::path::Path>) -> Result<()> {
    match command {
        ConfigCommands::Show { format, section } => {
            config::show_config(path, &format, section.as_deref())
        },
        ConfigCommands::Validate => config::validate_config(path),
    }
}
