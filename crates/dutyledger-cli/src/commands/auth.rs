//! Auth commands - Sign in, sign out and session status
//!
//! Provides the `dutyledger auth` subcommands which:
//! 1. `login`  - Runs the interactive consent flow in the browser and keeps
//!    the session in the system keyring.
//! 2. `logout` - Forgets the session.
//! 3. `status` - Shows the stored session's identity and validity.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Subcommand;
use dutyledger_cloud::auth::KeyringSessionStorage;
use dutyledger_core::ports::SessionSink;
use dutyledger_sync::SyncError;
use tracing::info;

use crate::{
    context::AppContext,
    output::{format_timestamp, get_formatter, OutputFormat},
};

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Sign in through the browser
    Login,
    /// Remove the stored session
    Logout,
    /// Show the stored session
    Status,
}

impl AuthCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        match self {
            AuthCommand::Login => execute_login(ctx, format).await,
            AuthCommand::Logout => execute_logout(format),
            AuthCommand::Status => execute_status(ctx, format),
        }
    }
}

async fn execute_login(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let fmt = get_formatter(format);
    let keeper = ctx.session_keeper().await?;

    fmt.info("Opening browser for sign-in...");
    let session = keeper.sign_in().await.map_err(SyncError::from)?;
    let identity = session.identity();

    info!(email = %identity.email, "Signed in");
    if format.is_json() {
        fmt.print_json(&serde_json::json!({
            "authenticated": true,
            "email": identity.email,
            "display_name": identity.display_name,
            "expires_at": session.expires_at().to_rfc3339(),
        }));
    } else {
        fmt.success(&format!(
            "Signed in as {} ({})",
            identity.display_name, identity.email
        ));
        fmt.field("Expires", &format_timestamp(Some(session.expires_at())));
    }
    Ok(())
}

fn execute_logout(format: OutputFormat) -> Result<()> {
    let fmt = get_formatter(format);
    KeyringSessionStorage::new()
        .clear()
        .context("Failed to remove the session from the keyring")?;
    fmt.success("Signed out");
    Ok(())
}

fn execute_status(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let fmt = get_formatter(format);
    let session = KeyringSessionStorage::new()
        .load()
        .context("Failed to read the session from the keyring")?;

    let Some(session) = session else {
        if format.is_json() {
            fmt.print_json(&serde_json::json!({ "authenticated": false }));
        } else {
            fmt.info("Not signed in");
            fmt.info("Run 'dutyledger auth login' to sign in");
        }
        return Ok(());
    };

    let policy = ctx.config.session.policy();
    let now = Utc::now();
    let state = if policy.is_valid(&session, now) {
        if policy.is_expiring_soon(&session, now) {
            "valid (renewal due)"
        } else {
            "valid"
        }
    } else if session.expires_at() > now {
        "expiring"
    } else {
        "expired"
    };

    let identity = session.identity();
    if format.is_json() {
        fmt.print_json(&serde_json::json!({
            "authenticated": true,
            "email": identity.email,
            "display_name": identity.display_name,
            "expires_at": session.expires_at().to_rfc3339(),
            "state": state,
        }));
    } else {
        fmt.success(&format!(
            "Signed in as {} ({})",
            identity.display_name, identity.email
        ));
        fmt.field("Session", state);
        fmt.field("Expires", &format_timestamp(Some(session.expires_at())));
    }
    Ok(())
}
