// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! Chunkmeta: inspect the scheduler's view of a chunkserver cluster.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chunkmeta_core::{Config, LogFormat};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod cli;
mod report;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Commands::Version) {
        println!("chunkmeta {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = load_config(&cli.config)?;
    init_logging(&config)?;
    debug!(
        create_copyset_timeout_ms = config.schedule.create_copyset_timeout_ms,
        pending_change_timeout_ms = config.schedule.pending_change_timeout_ms,
        "Loaded configuration"
    );

    match cli.command {
        Commands::Inspect(args) => {
            let adapter = report::load_adapter(&args.source.snapshot)?;
            report::emit(&report::inspect(&adapter), cli.format, report::print_inspect)
        }
        Commands::Scatter(args) => {
            let adapter = report::load_adapter(&args.source.snapshot)?;
            let scatter = report::scatter(&adapter, args.chunkserver)?;
            report::emit(&scatter, cli.format, report::print_scatter)
        }
        Commands::Copysets(args) => {
            let adapter = report::load_adapter(&args.source.snapshot)?;
            let copysets = report::copysets(&adapter, args.pool);
            report::emit(&copysets, cli.format, |c| report::print_copysets(c))
        }
        Commands::Version => Ok(()),
    }
}

fn load_config(path: &Option<PathBuf>) -> Result<Config> {
    Config::load(path.as_deref()).context("Failed to load configuration")
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    // Reports go to stdout; keep logs off it.
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry().with(filter).with(fmt_layer.json()).init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry().with(filter).with(fmt_layer).init();
        }
    }

    Ok(())
}
