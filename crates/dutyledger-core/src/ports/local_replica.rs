//! Local replica port (driven/secondary port)
//!
//! The local store owns canonical application state. The sync engine only
//! ever reads a whole snapshot from it, hands a whole snapshot back after a
//! pull, and records the instant of the last successful sync.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific.
//! - `apply_snapshot` must replace local state in one atomic update.

use chrono::{DateTime, Utc};

use crate::domain::Snapshot;

#[async_trait::async_trait]
pub trait LocalReplica: Send + Sync {
    /// Returns the current local state, binary assets included
    async fn get_snapshot(&self) -> anyhow::Result<Snapshot>;

    /// Replaces the local state wholesale with `snapshot`
    async fn apply_snapshot(&self, snapshot: &Snapshot) -> anyhow::Result<()>;

    /// The instant recorded after the last successful push or pull
    async fn last_synced_marker(&self) -> anyhow::Result<Option<DateTime<Utc>>>;

    async fn set_last_synced_marker(&self, at: DateTime<Utc>) -> anyhow::Result<()>;
}
