//! Marquee CLI - Headless Player and Manifest Tool
//!
//! Features:
//! - Manifest probing (master variants, media playlist stats)
//! - Episode listing from movie detail records
//! - Effective player configuration
//! - Headless playback sessions with injected engine failures

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

use commands::FailKind;

/// Marquee CLI - Adaptive playback toolkit
#[derive(Parser)]
#[command(name = "marquee-cli")]
#[command(version)]
#[command(about = "Headless HLS playback and manifest toolkit", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch an HLS manifest and summarize it
    Probe {
        /// Manifest URL
        url: String,
    },

    /// List servers and episodes of a movie detail record
    Episodes {
        /// Path to the movie detail JSON
        file: PathBuf,
    },

    /// Print the effective player configuration
    Config {
        /// JSON file with overrides
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Run a headless playback session
    Simulate {
        /// Source URL
        url: String,

        /// Surface plays HLS natively
        #[arg(long)]
        native: bool,

        /// No adaptive-streaming library available
        #[arg(long)]
        no_library: bool,

        /// Fatal errors to inject, in order (network, media, other)
        #[arg(long, value_enum, num_args = 1..)]
        fail: Vec<FailKind>,

        /// Request autoplay
        #[arg(long)]
        autoplay: bool,

        /// JSON file with player configuration overrides
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();

    marquee_core::init();

    match cli.command {
        Commands::Probe { url } => {
            commands::probe(&url, &cli.format).await?;
        }
        Commands::Episodes { file } => {
            commands::episodes(&file, &cli.format)?;
        }
        Commands::Config { file } => {
            commands::config(file.as_deref(), &cli.format)?;
        }
        Commands::Simulate {
            url,
            native,
            no_library,
            fail,
            autoplay,
            config,
        } => {
            let options = commands::SimulateOptions {
                native,
                library: !no_library,
                failures: fail,
                autoplay,
                config,
            };
            commands::simulate(&url, options, &cli.format).await?;
        }
    }

    Ok(())
}
