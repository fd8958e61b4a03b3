// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! Command line interface definition.

use std::path::PathBuf;

use chunkmeta_core::{ChunkServerId, PoolId};
use clap::{Args, Parser, Subcommand};

/// Chunkmeta: inspect the scheduler's view of a chunkserver cluster.
#[derive(Parser)]
#[command(name = "chunkmeta")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (text, json).
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Summarize pools and chunkserver health.
    Inspect(InspectArgs),
    /// Show the scatter map of one chunkserver.
    Scatter(ScatterArgs),
    /// List copysets and their pending changes.
    Copysets(CopysetsArgs),
    /// Print version information.
    Version,
}

/// Topology snapshot to read.
#[derive(Args)]
pub struct SnapshotArgs {
    /// Path to a JSON topology snapshot.
    #[arg(short, long)]
    pub snapshot: PathBuf,
}

/// Arguments for the inspect command.
#[derive(Args)]
pub struct InspectArgs {
    #[command(flatten)]
    pub source: SnapshotArgs,
}

/// Arguments for the scatter command.
#[derive(Args)]
pub struct ScatterArgs {
    #[command(flatten)]
    pub source: SnapshotArgs,

    /// Chunkserver to report on.
    #[arg(long)]
    pub chunkserver: ChunkServerId,
}

/// Arguments for the copysets command.
#[derive(Args)]
pub struct CopysetsArgs {
    #[command(flatten)]
    pub source: SnapshotArgs,

    /// Only list copysets of this logical pool.
    #[arg(short, long)]
    pub pool: Option<PoolId>,
}

/// Output format for CLI commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["chunkmeta", "version"]);
        assert!(matches!(cli.command, Commands::Version));
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(cli.config.is_none());

        let cli = Cli::parse_from(["chunkmeta", "inspect", "--snapshot", "/tmp/topo.json"]);
        if let Commands::Inspect(args) = cli.command {
            assert_eq!(args.source.snapshot, PathBuf::from("/tmp/topo.json"));
        } else {
            panic!("Expected Inspect command");
        }
    }

    #[test]
    fn test_scatter_parsing() {
        let cli = Cli::parse_from([
            "chunkmeta",
            "scatter",
            "-s",
            "topo.json",
            "--chunkserver",
            "7",
            "--format",
            "json",
        ]);
        assert_eq!(cli.format, OutputFormat::Json);
        if let Commands::Scatter(args) = cli.command {
            assert_eq!(args.chunkserver, 7);
        } else {
            panic!("Expected Scatter command");
        }
    }

    #[test]
    fn test_copysets_parsing() {
        let cli = Cli::parse_from([
            "chunkmeta",
            "--config",
            "/etc/chunkmeta.toml",
            "copysets",
            "--snapshot",
            "topo.json",
            "--pool",
            "2",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/chunkmeta.toml")));
        if let Commands::Copysets(args) = cli.command {
            assert_eq!(args.pool, Some(2));
        } else {
            panic!("Expected Copysets command");
        }

        let cli = Cli::parse_from(["chunkmeta", "copysets", "-s", "topo.json"]);
        assert!(matches!(cli.command, Commands::Copysets(CopysetsArgs { pool: None, .. })));
    }

    #[test]
    fn test_scatter_requires_chunkserver() {
        let result = Cli::try_parse_from(["chunkmeta", "scatter", "-s", "topo.json"]);
        assert!(result.is_err());
    }
}
