//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod consolidate;
mod crawl;
mod discover;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "vitrine")]
#[command(about = "Authenticated product catalog crawler")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl every configured category and write the consolidated catalog
    Run {
        /// Repeat the cycle until interrupted
        #[arg(long = "loop")]
        looping: bool,
        /// Minutes between cycles in loop mode
        #[arg(long, default_value = "30")]
        interval: u64,
        /// Number of product workers (overrides config)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Output file (overrides config)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Show the browser window
        #[arg(long)]
        no_headless: bool,
        /// Skip the slow retry pass
        #[arg(long)]
        no_slow_retry: bool,
    },

    /// List product URLs discovered for one category (no product fetches)
    Discover {
        /// Category label from the config (case-insensitive)
        category: String,
    },

    /// Merge previously written outputs into one catalog
    Consolidate {
        /// JSON files written by earlier runs
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Where to write the merged catalog
        #[arg(short, long)]
        out: PathBuf,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            looping,
            interval,
            workers,
            out,
            no_headless,
            no_slow_retry,
        } => {
            let mut config = Config::load(cli.config.as_deref())
                .await
                .context("Failed to load configuration")?;
            if let Some(workers) = workers {
                config.crawl.workers = workers;
            }
            if let Some(out) = out {
                config.output = Some(out.to_string_lossy().into_owned());
            }
            if no_headless {
                config.browser.headless = false;
            }
            if no_slow_retry {
                config.crawl.enable_slow_retry = false;
            }
            crawl::cmd_run(config, looping, interval).await
        }
        Commands::Discover { category } => {
            let config = Config::load(cli.config.as_deref())
                .await
                .context("Failed to load configuration")?;
            discover::cmd_discover(&config, &category).await
        }
        Commands::Consolidate { inputs, out } => consolidate::cmd_consolidate(&inputs, &out),
    }
}
