//! Dutyledger CLI - Cloud sync for the Dutyledger business ledger
//!
//! Provides commands for:
//! - Signing in to the cloud account
//! - Checking and running sync, resolving conflicts
//! - Exporting and importing (optionally encrypted) backups
//! - Clearing all cloud data
//! - Viewing and validating configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod output;

use commands::{
    auth::AuthCommand,
    backup::{ExportCommand, ImportCommand},
    clear::ClearRemoteCommand,
    config::ConfigCommand,
    status::StatusCommand,
    sync::{ResolveCommand, SyncCommand},
};
use context::AppContext;
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "dutyledger", version, about = "Cloud sync for Dutyledger")]
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
    /// Sign in, sign out, show the session
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Compare local data with the latest cloud version
    Status(StatusCommand),
    /// Synchronize local data with the cloud
    Sync(SyncCommand),
    /// Settle a sync conflict: use-local, use-cloud or cancel
    Resolve(ResolveCommand),
    /// Write local or cloud data to a backup file
    Export(ExportCommand),
    /// Replace local data with a backup file
    Import(ImportCommand),
    /// Delete every version stored in the cloud
    ClearRemote(ClearRemoteCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = OutputFormat::from_json_flag(cli.json);
    let ctx = AppContext::load(cli.config.as_deref())?;

    // -v flags win over the configured level; RUST_LOG wins over both
    let level = match cli.verbose {
        0 => ctx.config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = async {
        // Config commands must work on a file that does not validate
        if !matches!(cli.command, Commands::Config(_)) {
            ctx.ensure_valid()?;
        }
        match cli.command {
            Commands::Auth(cmd) => cmd.execute(&ctx, format).await,
            Commands::Status(cmd) => cmd.execute(&ctx, format).await,
            Commands::Sync(cmd) => cmd.execute(&ctx, format).await,
            Commands::Resolve(cmd) => cmd.execute(&ctx, format).await,
            Commands::Export(cmd) => cmd.execute(&ctx, format).await,
            Commands::Import(cmd) => cmd.execute(&ctx, format).await,
            Commands::ClearRemote(cmd) => cmd.execute(&ctx, format).await,
            Commands::Config(cmd) => cmd.execute(&ctx, format).await,
        }
    }
    .await;

    if let Err(e) = result {
        get_formatter(format).error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}
