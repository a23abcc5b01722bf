//! File-backed local replica
//!
//! Stores the snapshot as one JSON file and the last-synced marker as an
//! RFC 3339 line next to it. Both are written to a temporary file and
//! renamed into place, so a crash never leaves a half-written replica.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use dutyledger_core::{config::ReplicaConfig, domain::Snapshot, ports::LocalReplica};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FileReplica {
    snapshot_path: PathBuf,
    marker_path: PathBuf,
}

impl FileReplica {
    pub fn new(snapshot_path: impl Into<PathBuf>, marker_path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: snapshot_path.into(),
            marker_path: marker_path.into(),
        }
    }

    pub fn from_config(config: &ReplicaConfig) -> Self {
        Self::new(&config.snapshot_path, &config.marker_path)
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }
}

#[async_trait::async_trait]
impl LocalReplica for FileReplica {
    /// A replica that was never written reads as an empty snapshot
    async fn get_snapshot(&self) -> Result<Snapshot> {
        let Some(bytes) = read_optional(&self.snapshot_path).await? else {
            debug!(path = %self.snapshot_path.display(), "No local snapshot yet");
            return Ok(Snapshot::empty(Utc::now()));
        };
        Snapshot::from_json_slice(&bytes)
            .with_context(|| format!("Failed to parse {}", self.snapshot_path.display()))
    }

    async fn apply_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let json = snapshot.to_json_vec()?;
        write_atomic(&self.snapshot_path, &json).await?;
        debug!(path = %self.snapshot_path.display(), bytes = json.len(), "Replaced local snapshot");
        Ok(())
    }

    async fn last_synced_marker(&self) -> Result<Option<DateTime<Utc>>> {
        let Some(bytes) = read_optional(&self.marker_path).await? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&bytes);
        let marker = DateTime::parse_from_rfc3339(text.trim())
            .with_context(|| format!("Invalid marker in {}", self.marker_path.display()))?;
        Ok(Some(marker.with_timezone(&Utc)))
    }

    async fn set_last_synced_marker(&self, at: DateTime<Utc>) -> Result<()> {
        let line = format!("{}\n", at.to_rfc3339_opts(SecondsFormat::Millis, true));
        write_atomic(&self.marker_path, line.as_bytes()).await?;
        debug!(%at, "Recorded last-synced marker");
        Ok(())
    }
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

/// Writes to `<path>.tmp` in the same directory, then renames over `path`
async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let tmp_path = {
        let mut p = path.as_os_str().to_owned();
        p.push(".tmp");
        PathBuf::from(p)
    };

    tokio::fs::write(&tmp_path, data)
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to move {} into place", tmp_path.display()))?;
    Ok(())
}
