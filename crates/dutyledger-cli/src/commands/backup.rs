//! Export and import commands
//!
//! A backup is the full snapshot as JSON, optionally encrypted with a
//! password. Exporting from the cloud saves the latest cloud version as a
//! standalone file without touching local data.

use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Args;
use dutyledger_core::ports::LocalReplica;
use dutyledger_sync::backup::{export_backup, import_backup, is_encrypted};
use tracing::info;

use crate::{
    context::AppContext,
    output::{format_timestamp, get_formatter, OutputFormat},
};

#[derive(Debug, Args)]
pub struct ExportCommand {
    /// Output file (default: ./dutyledger-backup-<timestamp>.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Export the latest cloud version instead of local data
    #[arg(long)]
    pub from_cloud: bool,

    /// Encrypt the backup with a password
    #[arg(long)]
    pub encrypt: bool,

    /// Read the password from this environment variable instead of stdin
    #[arg(long, value_name = "VAR")]
    pub password_env: Option<String>,
}

#[derive(Debug, Args)]
pub struct ImportCommand {
    /// Backup file to import
    pub file: PathBuf,

    /// Read the password from this environment variable instead of stdin
    #[arg(long, value_name = "VAR")]
    pub password_env: Option<String>,
}

impl ExportCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format);

        let snapshot = if self.from_cloud {
            let keeper = ctx.session_keeper().await?;
            let mut orchestrator = ctx.orchestrator(keeper);
            match orchestrator.download_remote().await? {
                Some((version, snapshot)) => {
                    info!(version = %version.name, "Exporting cloud version");
                    snapshot
                }
                None => bail!("There is no cloud data to export"),
            }
        } else {
            ctx.replica().get_snapshot().await?
        };

        let password = if self.encrypt {
            Some(read_password(self.password_env.as_deref())?)
        } else {
            None
        };
        let bytes = export_backup(&snapshot, password.as_deref(), &ctx.cipher())?;

        let path = self.output.clone().unwrap_or_else(default_backup_path);
        write_file(&path, &bytes)?;

        if format.is_json() {
            fmt.print_json(&serde_json::json!({
                "path": path.display().to_string(),
                "encrypted": self.encrypt,
                "source": if self.from_cloud { "cloud" } else { "local" },
                "bytes": bytes.len(),
            }));
        } else {
            fmt.success(&format!("Backup written to {}", path.display()));
            fmt.field("Encrypted", if self.encrypt { "yes" } else { "no" });
            fmt.field("Data from", &format_timestamp(Some(snapshot.synced_at)));
        }
        Ok(())
    }
}

impl ImportCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format);
        let bytes = std::fs::read(&self.file)
            .with_context(|| format!("Failed to read {}", self.file.display()))?;

        let password = if is_encrypted(&bytes) {
            Some(read_password(self.password_env.as_deref())?)
        } else {
            None
        };
        let snapshot = import_backup(&bytes, password.as_deref())?;

        ctx.replica().apply_snapshot(&snapshot).await?;
        info!(file = %self.file.display(), "Imported backup");

        if format.is_json() {
            fmt.print_json(&serde_json::json!({
                "imported": self.file.display().to_string(),
                "synced_at": snapshot.synced_at.to_rfc3339(),
            }));
        } else {
            fmt.success(&format!("Imported {}", self.file.display()));
            fmt.field("Data from", &format_timestamp(Some(snapshot.synced_at)));
            fmt.info("Run 'dutyledger sync' to upload it");
        }
        Ok(())
    }
}

fn default_backup_path() -> PathBuf {
    PathBuf::from(format!(
        "dutyledger-backup-{}.json",
        Utc::now().format("%Y%m%d-%H%M%S")
    ))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}

/// Reads the password from `env_var`, or one unechoed line from stdin
fn read_password(env_var: Option<&str>) -> Result<String> {
    let password = match env_var {
        Some(name) => std::env::var(name)
            .with_context(|| format!("Environment variable {} is not set", name))?,
        None => {
            eprint!("Backup password: ");
            std::io::stderr().flush().ok();
            let line = read_hidden_line().context("Failed to read password")?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    if password.is_empty() {
        bail!("The password must not be empty");
    }
    Ok(password)
}

/// Reads one line from stdin with terminal echo switched off
fn read_hidden_line() -> std::io::Result<String> {
    #[cfg(unix)]
    let _echo = EchoGuard::disable(std::os::unix::io::AsRawFd::as_raw_fd(&std::io::stdin()));

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

/// Restores the terminal's original mode on drop
#[cfg(unix)]
struct EchoGuard {
    fd: std::os::unix::io::RawFd,
    original: libc::termios,
}

#[cfg(unix)]
impl EchoGuard {
    /// `None` when `fd` is not a terminal; input is then read as is
    fn disable(fd: std::os::unix::io::RawFd) -> Option<Self> {
        // termios is plain data; tcgetattr fills it or fails
        let mut original: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &mut original) } != 0 {
            return None;
        }

        let mut hidden = original;
        hidden.c_lflag &= !libc::ECHO;
        hidden.c_lflag |= libc::ECHONL;
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &hidden) } != 0 {
            return None;
        }
        Some(Self { fd, original })
    }
}

#[cfg(unix)]
impl Drop for EchoGuard {
    fn drop(&mut self) {
        unsafe {
            libc::tcsetattr(self.fd, libc::TCSANOW, &self.original);
        }
    }
}
