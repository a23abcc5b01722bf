//! Status command - Compare local data with the latest cloud version

use anyhow::Result;
use clap::Args;
use dutyledger_core::domain::SyncStatus;

use crate::{
    context::AppContext,
    output::{format_timestamp, get_formatter, OutputFormat, OutputFormatter},
};

#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format);
        let keeper = ctx.session_keeper().await?;
        let mut orchestrator = ctx.orchestrator(keeper);

        let status = orchestrator.status().await?;
        if format.is_json() {
            fmt.print_json(&serde_json::to_value(&status)?);
        } else {
            print_status(&*fmt, &status);
        }
        Ok(())
    }
}

pub fn describe(status: &SyncStatus) -> &'static str {
    if status.is_degraded() {
        "unknown (cloud unreachable)"
    } else if !status.has_remote_data {
        "no cloud data yet"
    } else if status.needs_sync {
        "local and cloud data differ"
    } else {
        "in sync"
    }
}

fn print_status(fmt: &dyn OutputFormatter, status: &SyncStatus) {
    if status.is_degraded() || status.needs_sync {
        fmt.warn(describe(status));
    } else {
        fmt.success(describe(status));
    }
    fmt.field("Last synced", &format_timestamp(status.local_timestamp));
    fmt.field("Cloud version", &format_timestamp(status.remote_timestamp));
    if let Some(error) = &status.probe_error {
        fmt.field("Cloud error", error);
    }
}
