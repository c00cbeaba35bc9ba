//! TreeMirror CLI - Command-line interface for TreeMirror
//!
//! Provides commands for:
//! - Running a sync cycle (reconcile, or rebuild when needed)
//! - Forcing a full rebuild
//! - Viewing mirror status

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{rebuild::RebuildCommand, status::StatusCommand, sync::SyncCommand};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "treemirror", version, about = "Mirror a remote drive tree into a local store")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one sync cycle against the remote tree
    Sync(SyncCommand),
    /// Discard the mirror and rebuild it from scratch
    Rebuild(RebuildCommand),
    /// Show mirror phase, node count, and orphan count
    Status(StatusCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(treemirror_core::config::Config::default_path);
    let config = treemirror_core::config::Config::load_or_default(&config_path);

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(&config, format).await,
        Commands::Rebuild(cmd) => cmd.execute(&config, format).await,
        Commands::Status(cmd) => cmd.execute(&config, format).await,
    }
}
