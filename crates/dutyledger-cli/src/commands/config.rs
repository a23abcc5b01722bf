//! Config command - View and manage Dutyledger configuration
//!
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Validates the configuration file and reports every error
//! 3. Writes a default configuration file

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use dutyledger_core::config::Config;
use tracing::info;

use crate::{
    context::AppContext,
    output::{get_formatter, OutputFormat},
};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
    /// Write a configuration file with the default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(ctx, format),
            ConfigCommand::Validate => execute_validate(ctx, format),
            ConfigCommand::Init { force } => execute_init(&ctx.config_path, *force, format),
        }
    }
}

fn execute_show(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    info!(config_path = %ctx.config_path.display(), "Showing configuration");

    if format.is_json() {
        let json = serde_json::to_value(&ctx.config)
            .context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
        return Ok(());
    }

    let source = if ctx.config_path.exists() {
        ctx.config_path.display().to_string()
    } else {
        format!("defaults; {} not found", ctx.config_path.display())
    };
    formatter.success(&format!("Configuration ({})", source));
    formatter.info("");
    for line in ctx.config.to_yaml()?.lines() {
        formatter.info(line);
    }
    Ok(())
}

fn execute_validate(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let path = ctx.config_path.display().to_string();

    if !ctx.config_path.exists() {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "valid": true,
                "config_path": path,
                "errors": [],
                "defaults": true,
            }));
        } else {
            formatter.info(&format!("Configuration file not found at {}", path));
            formatter.info("Using defaults. Run 'dutyledger config init' to create one.");
        }
        return Ok(());
    }

    info!(config_path = %path, "Validating configuration");
    let errors = ctx.config.validate();

    if format.is_json() {
        let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": path,
            "errors": error_strings,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", path));
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        formatter.info(&format!("File: {}", path));
        formatter.info("");
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }

    if !errors.is_empty() {
        bail!("Invalid configuration");
    }
    Ok(())
}

fn execute_init(path: &Path, force: bool, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    write_default_config(path, force)?;

    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "created": path.display().to_string(),
        }));
    } else {
        formatter.success(&format!("Wrote default configuration to {}", path.display()));
        formatter.info("Set auth.client_id before signing in");
    }
    Ok(())
}

fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .context("Failed to create configuration directory")?;
    }
    let yaml = Config::default().to_yaml()?;
    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(config_path = %path.display(), "Wrote default configuration");
    Ok(())
}
