//! Sync and resolve commands
//!
//! `dutyledger sync` runs one sync decision. When local and cloud data
//! differ it never picks a side on its own: the user chooses interactively,
//! passes `--resolve`, or runs `dutyledger resolve <choice>` later.

use std::io::{BufRead, IsTerminal, Write};

use anyhow::{Context, Result};
use clap::Args;
use dutyledger_core::domain::Resolution;
use dutyledger_sync::{ResolutionOutcome, SyncOrchestrator, SyncOutcome};
use tracing::info;

use crate::{
    context::AppContext,
    output::{format_timestamp, get_formatter, OutputFormat, OutputFormatter},
};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Apply this resolution if a conflict is found (use-local, use-cloud, cancel)
    #[arg(long, value_name = "CHOICE")]
    pub resolve: Option<Resolution>,
}

#[derive(Debug, Args)]
pub struct ResolveCommand {
    /// use-local, use-cloud or cancel
    pub choice: Resolution,
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format);
        let keeper = ctx.session_keeper().await?;
        // Keeps the session fresh while the user decides on a conflict
        let monitor = keeper.spawn_monitor(ctx.config.session.monitor_interval());
        let mut orchestrator = ctx.orchestrator(keeper);
        let result = self.run(&mut orchestrator, &*fmt, format).await;

        if let Some(e) = monitor.last_error() {
            fmt.warn(&format!("Background session renewal failed: {}", e));
        }
        monitor.shutdown().await;
        result
    }

    async fn run(
        &self,
        orchestrator: &mut SyncOrchestrator,
        fmt: &dyn OutputFormatter,
        format: OutputFormat,
    ) -> Result<()> {
        let (local_timestamp, remote_timestamp) = match orchestrator.sync_now().await? {
            SyncOutcome::Conflict {
                local_timestamp,
                remote_timestamp,
            } => (local_timestamp, remote_timestamp),
            other => {
                report_outcome(fmt, format, &other);
                return Ok(());
            }
        };

        fmt.warn("Local and cloud data differ");
        fmt.field("Last synced", &format_timestamp(local_timestamp));
        fmt.field("Cloud version", &format_timestamp(remote_timestamp));

        let choice = match self.resolve {
            Some(choice) => choice,
            None if !format.is_json() && std::io::stdin().is_terminal() => prompt_resolution()?,
            None => {
                if format.is_json() {
                    fmt.print_json(&serde_json::json!({
                        "outcome": "conflict",
                        "local_timestamp": local_timestamp.map(|t| t.to_rfc3339()),
                        "remote_timestamp": remote_timestamp.map(|t| t.to_rfc3339()),
                    }));
                } else {
                    fmt.info("Run 'dutyledger resolve use-local|use-cloud|cancel' to continue");
                }
                return Ok(());
            }
        };

        apply_resolution(orchestrator, fmt, format, choice).await
    }
}

impl ResolveCommand {
    /// Re-derives the status and applies `choice` if a conflict exists
    ///
    /// Nothing is written when the remote is empty or already matches.
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format);
        let keeper = ctx.session_keeper().await?;
        let mut orchestrator = ctx.orchestrator(keeper);

        if orchestrator.recheck_conflict().await?.is_none() {
            if format.is_json() {
                fmt.print_json(&serde_json::json!({ "outcome": "no_conflict" }));
            } else {
                fmt.info("No conflict to resolve; run 'dutyledger sync' first");
            }
            return Ok(());
        }
        apply_resolution(&mut orchestrator, &*fmt, format, self.choice).await
    }
}

async fn apply_resolution(
    orchestrator: &mut SyncOrchestrator,
    fmt: &dyn OutputFormatter,
    format: OutputFormat,
    choice: Resolution,
) -> Result<()> {
    info!(resolution = %choice, "Resolving sync conflict");
    let outcome = orchestrator.resolve(choice).await?;

    let json = match &outcome {
        ResolutionOutcome::Pushed { version, timestamp } => {
            fmt.success("Uploaded local data as the new cloud version");
            fmt.field("Cloud version", &format_timestamp(Some(*timestamp)));
            serde_json::json!({
                "outcome": "pushed",
                "version": version.name,
                "timestamp": timestamp.to_rfc3339(),
            })
        }
        ResolutionOutcome::Pulled { synced_at } => {
            fmt.success("Replaced local data with the cloud version");
            fmt.field("Last synced", &format_timestamp(Some(*synced_at)));
            serde_json::json!({
                "outcome": "pulled",
                "synced_at": synced_at.to_rfc3339(),
            })
        }
        ResolutionOutcome::Cancelled => {
            fmt.info("Sync cancelled; nothing was changed");
            serde_json::json!({ "outcome": "cancelled" })
        }
    };
    if format.is_json() {
        fmt.print_json(&json);
    }
    Ok(())
}

fn report_outcome(fmt: &dyn OutputFormatter, format: OutputFormat, outcome: &SyncOutcome) {
    let json = match outcome {
        SyncOutcome::Pushed { version, timestamp } => {
            fmt.success("Uploaded local data to the cloud");
            fmt.field("Cloud version", &format_timestamp(Some(*timestamp)));
            serde_json::json!({
                "outcome": "pushed",
                "version": version.name,
                "timestamp": timestamp.to_rfc3339(),
            })
        }
        SyncOutcome::UpToDate => {
            fmt.success("Already in sync");
            serde_json::json!({ "outcome": "up_to_date" })
        }
        SyncOutcome::Conflict {
            local_timestamp,
            remote_timestamp,
        } => serde_json::json!({
            "outcome": "conflict",
            "local_timestamp": local_timestamp.map(|t| t.to_rfc3339()),
            "remote_timestamp": remote_timestamp.map(|t| t.to_rfc3339()),
        }),
    };
    if format.is_json() {
        fmt.print_json(&json);
    }
}

fn prompt_resolution() -> Result<Resolution> {
    let stdin = std::io::stdin();
    loop {
        print!("Keep [l]ocal data, use [c]loud data, or [x] cancel? ");
        std::io::stdout().flush().context("Failed to write prompt")?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).context("Failed to read answer")? == 0 {
            return Ok(Resolution::Cancel);
        }
        if let Some(choice) = parse_answer(&line) {
            return Ok(choice);
        }
    }
}

fn parse_answer(answer: &str) -> Option<Resolution> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "l" => Some(Resolution::UseLocal),
        "c" => Some(Resolution::UseCloud),
        "x" | "" => Some(Resolution::Cancel),
        other => other.parse().ok(),
    }
}
