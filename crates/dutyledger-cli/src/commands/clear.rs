//! Clear-remote command - Delete every cloud version

use anyhow::Result;
use clap::Args;

use crate::{
    context::AppContext,
    output::{get_formatter, OutputFormat},
};

#[derive(Debug, Args)]
pub struct ClearRemoteCommand {
    /// Confirm deletion of all cloud data
    #[arg(long)]
    pub yes: bool,
}

impl ClearRemoteCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format);
        if !self.yes {
            fmt.warn("This deletes every version stored in the cloud; local data is kept");
            fmt.info("Re-run with --yes to confirm");
            return Ok(());
        }

        let keeper = ctx.session_keeper().await?;
        let mut orchestrator = ctx.orchestrator(keeper);
        let deleted = orchestrator.clear_remote().await?;

        if format.is_json() {
            fmt.print_json(&serde_json::json!({ "deleted": deleted }));
        } else {
            fmt.success(&format!("Deleted {} cloud version(s)", deleted));
        }
        Ok(())
    }
}
