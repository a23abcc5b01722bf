//! Derived sync status and conflict resolutions
//!
//! A [`SyncStatus`] is computed on demand by comparing the local snapshot with
//! the latest remote version. It is short-lived: any push, pull, delete or
//! local edit makes it stale, and it is never persisted.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{errors::DomainError, snapshot::Snapshot, version::RemoteVersion};

/// Result of comparing the local replica with the remote store
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Whether at least one remote version exists
    pub has_remote_data: bool,
    /// Embedded name timestamp of the latest remote version
    pub remote_timestamp: Option<DateTime<Utc>>,
    /// The local replica's last-synced marker
    pub local_timestamp: Option<DateTime<Utc>>,
    /// Whether the two replicas hold different business data
    pub needs_sync: bool,
    /// The latest remote version's metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_version: Option<RemoteVersion>,
    /// The latest remote snapshot, kept so a conflict can be resolved without a second fetch
    #[serde(skip)]
    pub remote_snapshot: Option<Box<Snapshot>>,
    /// Set when the remote could not be probed and the conservative fallback was used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_error: Option<String>,
}

impl SyncStatus {
    /// The remote folder holds no versions yet: a first push is needed
    pub fn empty_remote(local_timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            has_remote_data: false,
            remote_timestamp: None,
            local_timestamp,
            needs_sync: true,
            remote_version: None,
            remote_snapshot: None,
            probe_error: None,
        }
    }

    /// The remote could not be probed; "unknown" is reported as "needs attention"
    pub fn unknown(local_timestamp: Option<DateTime<Utc>>, error: impl Into<String>) -> Self {
        Self {
            probe_error: Some(error.into()),
            ..Self::empty_remote(local_timestamp)
        }
    }

    /// Status after a successful comparison with the latest remote version
    pub fn compared(
        local_timestamp: Option<DateTime<Utc>>,
        remote_version: RemoteVersion,
        remote_timestamp: DateTime<Utc>,
        remote_snapshot: Snapshot,
        needs_sync: bool,
    ) -> Self {
        Self {
            has_remote_data: true,
            remote_timestamp: Some(remote_timestamp),
            local_timestamp,
            needs_sync,
            remote_version: Some(remote_version),
            remote_snapshot: Some(Box::new(remote_snapshot)),
            probe_error: None,
        }
    }

    /// True when the conservative fallback was used
    pub fn is_degraded(&self) -> bool {
        self.probe_error.is_some()
    }

    /// True when both replicas exist and differ
    pub fn is_conflict(&self) -> bool {
        self.has_remote_data && self.needs_sync
    }
}

/// The human decision that settles a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Push the local snapshot as a new remote version
    UseLocal,
    /// Replace the local replica with the remote snapshot
    UseCloud,
    /// Leave both replicas untouched
    Cancel,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Resolution::UseLocal => "use_local",
            Resolution::UseCloud => "use_cloud",
            Resolution::Cancel => "cancel",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Resolution {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "use_local" | "local" => Ok(Resolution::UseLocal),
            "use_cloud" | "cloud" | "remote" => Ok(Resolution::UseCloud),
            "cancel" => Ok(Resolution::Cancel),
            other => Err(DomainError::InvalidResolution(other.to_string())),
        }
    }
}
