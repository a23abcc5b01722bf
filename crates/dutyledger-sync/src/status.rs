//! Sync status / diff engine
//!
//! Compares the local snapshot with the latest remote version by hashing a
//! canonical form of the business fields only. Remote timestamps are
//! informational; they never decide which side wins.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dutyledger_core::{
    domain::{AccessToken, Snapshot, SyncStatus},
    ports::{RemoteError, VersionStore},
};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// SHA-256 (hex) over the canonical JSON of the snapshot's business fields
///
/// `synced_at` and the binary asset payloads are excluded, and object keys
/// are written in sorted order so equal data always hashes equally.
pub fn comparable_hash(snapshot: &Snapshot) -> String {
    let mut canonical = String::new();
    write_canonical(&snapshot.domain_fields(), &mut canonical);

    let digest = Sha256::digest(canonical.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

pub struct StatusEngine {
    store: Arc<dyn VersionStore>,
}

impl StatusEngine {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self { store }
    }

    /// Derives the current sync status
    ///
    /// Never fails: when the remote cannot be probed the conservative
    /// "no remote data, needs sync" status is returned with the error
    /// recorded in `probe_error`.
    ///
    /// # Arguments
    /// * `token` - Access token of a valid session
    /// * `local` - Current local snapshot
    /// * `local_marker` - The replica's last-synced marker
    pub async fn get_status(
        &self,
        token: &AccessToken,
        local: &Snapshot,
        local_marker: Option<DateTime<Utc>>,
    ) -> SyncStatus {
        match self.probe(token, local, local_marker).await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "Could not probe remote store; reporting unknown status");
                SyncStatus::unknown(local_marker, e.to_string())
            }
        }
    }

    async fn probe(
        &self,
        token: &AccessToken,
        local: &Snapshot,
        local_marker: Option<DateTime<Utc>>,
    ) -> Result<SyncStatus, RemoteError> {
        let Some((version, remote_timestamp)) = self.store.find_latest(token).await? else {
            debug!("Remote store is empty");
            return Ok(SyncStatus::empty_remote(local_marker));
        };

        let remote = self.store.fetch(token, &version).await?;
        let needs_sync = comparable_hash(local) != comparable_hash(&remote);

        debug!(
            version = %version.name,
            %remote_timestamp,
            needs_sync,
            "Compared local snapshot with latest remote version"
        );
        Ok(SyncStatus::compared(
            local_marker,
            version,
            remote_timestamp,
            remote,
            needs_sync,
        ))
    }
}
