//! Conflict resolution orchestrator
//!
//! Drives "sync now" from a freshly derived [`SyncStatus`]:
//!
//! | Status | Action |
//! |---|---|
//! | remote empty | push the local snapshot (bootstrap) |
//! | hashes equal | nothing to do |
//! | hashes differ | surface a conflict and wait for a [`Resolution`] |
//!
//! Divergence is never settled by comparing timestamps. While a conflict is
//! pending, "sync now" is refused with [`SyncError::ConflictUnresolved`].
//! Clearing the remote is an independent action: it is always allowed and
//! drops any pending conflict along with the cached status.
//!
//! Calls are serialized by `&mut self`; callers that share an orchestrator
//! wrap it in a mutex.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dutyledger_core::{
    domain::{self, AccessToken, RemoteVersion, Resolution, Snapshot, SyncStatus},
    ports::{LocalReplica, RemoteError, SessionSource, VersionStore},
};
use tracing::{debug, info, warn};

use crate::{status::StatusEngine, SyncError};

/// Result of [`SyncOrchestrator::sync_now`]
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// The remote was empty and the local snapshot became its first version
    Pushed {
        version: RemoteVersion,
        timestamp: DateTime<Utc>,
    },
    /// Local and remote business data are identical
    UpToDate,
    /// Both sides hold different data; a resolution is required
    Conflict {
        local_timestamp: Option<DateTime<Utc>>,
        remote_timestamp: Option<DateTime<Utc>>,
    },
}

/// Result of [`SyncOrchestrator::resolve`]
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    /// The local snapshot was pushed as a new version
    Pushed {
        version: RemoteVersion,
        timestamp: DateTime<Utc>,
    },
    /// The remote snapshot replaced local state
    Pulled { synced_at: DateTime<Utc> },
    /// Nothing changed on either side
    Cancelled,
}

pub struct SyncOrchestrator {
    sessions: Arc<dyn SessionSource>,
    store: Arc<dyn VersionStore>,
    replica: Arc<dyn LocalReplica>,
    engine: StatusEngine,
    /// Versions kept after a push; `None` keeps everything
    retention_keep: Option<usize>,
    cached_status: Option<SyncStatus>,
    pending_conflict: Option<SyncStatus>,
}

impl SyncOrchestrator {
    pub fn new(
        sessions: Arc<dyn SessionSource>,
        store: Arc<dyn VersionStore>,
        replica: Arc<dyn LocalReplica>,
    ) -> Self {
        Self {
            sessions,
            engine: StatusEngine::new(store.clone()),
            store,
            replica,
            retention_keep: None,
            cached_status: None,
            pending_conflict: None,
        }
    }

    /// Prunes the oldest versions beyond `keep` after every push
    pub fn with_retention(mut self, keep: Option<usize>) -> Self {
        self.retention_keep = keep.filter(|k| *k > 0);
        self
    }

    /// The status derived by the last probe, if still current
    pub fn cached_status(&self) -> Option<&SyncStatus> {
        self.cached_status.as_ref()
    }

    pub fn pending_conflict(&self) -> Option<&SyncStatus> {
        self.pending_conflict.as_ref()
    }

    /// Derives a fresh status without changing either replica
    pub async fn status(&mut self) -> Result<SyncStatus, SyncError> {
        let token = self.token().await?;
        let local = self.replica.get_snapshot().await.map_err(SyncError::Local)?;
        let marker = self
            .replica
            .last_synced_marker()
            .await
            .map_err(SyncError::Local)?;

        let status = self.engine.get_status(&token, &local, marker).await;
        self.cached_status = Some(status.clone());
        Ok(status)
    }

    /// Runs one sync decision
    ///
    /// # Errors
    /// - [`SyncError::ConflictUnresolved`] while a conflict is pending
    /// - [`SyncError::RemoteIo`] when the remote could not be probed or the push failed
    /// - authentication kinds from obtaining a session
    pub async fn sync_now(&mut self) -> Result<SyncOutcome, SyncError> {
        self.ensure_no_conflict()?;

        let token = self.token().await?;
        let local = self.replica.get_snapshot().await.map_err(SyncError::Local)?;
        let marker = self
            .replica
            .last_synced_marker()
            .await
            .map_err(SyncError::Local)?;

        let status = self.engine.get_status(&token, &local, marker).await;

        if let Some(probe_error) = &status.probe_error {
            // An unreachable remote is not an empty remote
            let error = RemoteError::Network(probe_error.clone());
            self.cached_status = Some(status);
            return Err(SyncError::RemoteIo(error));
        }

        if !status.has_remote_data {
            info!("Remote store is empty; pushing initial version");
            let (version, timestamp) = self.push(&token, local).await?;
            return Ok(SyncOutcome::Pushed { version, timestamp });
        }

        if !status.needs_sync {
            info!("Already in sync");
            self.cached_status = Some(status);
            return Ok(SyncOutcome::UpToDate);
        }

        info!(
            local = ?status.local_timestamp,
            remote = ?status.remote_timestamp,
            "Local and remote data differ; waiting for a resolution"
        );
        let outcome = SyncOutcome::Conflict {
            local_timestamp: status.local_timestamp,
            remote_timestamp: status.remote_timestamp,
        };
        self.cached_status = Some(status.clone());
        self.pending_conflict = Some(status);
        Ok(outcome)
    }

    /// Re-derives the status and records a conflict without writing anything
    ///
    /// Lets a resolution be applied by a later caller than the one that
    /// first saw the conflict. An empty or matching remote is left alone.
    ///
    /// # Returns
    /// The conflicting status, or `None` when there is nothing to resolve
    pub async fn recheck_conflict(&mut self) -> Result<Option<SyncStatus>, SyncError> {
        let status = self.status().await?;
        if let Some(probe_error) = &status.probe_error {
            return Err(SyncError::RemoteIo(RemoteError::Network(
                probe_error.clone(),
            )));
        }
        if !status.is_conflict() {
            debug!("No conflict on re-check");
            self.pending_conflict = None;
            return Ok(None);
        }

        self.pending_conflict = Some(status.clone());
        Ok(Some(status))
    }

    /// Settles the pending conflict
    ///
    /// A failed push or pull keeps the conflict pending so it can be retried.
    pub async fn resolve(&mut self, resolution: Resolution) -> Result<ResolutionOutcome, SyncError> {
        if self.pending_conflict.is_none() {
            return Err(SyncError::NoPendingConflict);
        }

        let outcome = match resolution {
            Resolution::Cancel => {
                info!("Conflict resolution cancelled; both replicas left untouched");
                ResolutionOutcome::Cancelled
            }
            Resolution::UseLocal => {
                let token = self.token().await?;
                let local = self.replica.get_snapshot().await.map_err(SyncError::Local)?;
                let (version, timestamp) = self.push(&token, local).await?;
                ResolutionOutcome::Pushed { version, timestamp }
            }
            Resolution::UseCloud => {
                let remote = self.pending_remote_snapshot().await?;
                self.replica
                    .apply_snapshot(&remote)
                    .await
                    .map_err(SyncError::Local)?;
                self.replica
                    .set_last_synced_marker(remote.synced_at)
                    .await
                    .map_err(SyncError::Local)?;
                info!(synced_at = %remote.synced_at, "Replaced local data with cloud version");
                ResolutionOutcome::Pulled {
                    synced_at: remote.synced_at,
                }
            }
        };

        // Every resolution invalidates the status it was based on
        self.pending_conflict = None;
        self.cached_status = None;
        Ok(outcome)
    }

    /// Fetches the latest remote version for saving as a standalone file
    ///
    /// # Returns
    /// `None` when the remote store is empty
    pub async fn download_remote(&mut self) -> Result<Option<(RemoteVersion, Snapshot)>, SyncError> {
        let token = self.token().await?;
        let Some((version, _)) = self.store.find_latest(&token).await? else {
            return Ok(None);
        };
        let snapshot = self.store.fetch(&token, &version).await?;
        debug!(version = %version.name, "Downloaded latest remote version");
        Ok(Some((version, snapshot)))
    }

    /// Deletes every remote version
    ///
    /// The cached status and any pending conflict are dropped whether or not
    /// every delete succeeded.
    pub async fn clear_remote(&mut self) -> Result<usize, SyncError> {
        let token = self.token().await?;

        let result = self.store.delete_all(&token).await;
        self.cached_status = None;
        if self.pending_conflict.take().is_some() {
            info!("Clearing the remote dropped the pending conflict");
        }

        let deleted = result?;
        info!(deleted, "Cleared all remote versions");
        Ok(deleted)
    }

    fn ensure_no_conflict(&self) -> Result<(), SyncError> {
        if self.pending_conflict.is_some() {
            return Err(SyncError::ConflictUnresolved);
        }
        Ok(())
    }

    async fn token(&self) -> Result<AccessToken, SyncError> {
        let session = self.sessions.valid_session().await?;
        Ok(session.access_token().clone())
    }

    async fn pending_remote_snapshot(&self) -> Result<Snapshot, SyncError> {
        let pending = self
            .pending_conflict
            .as_ref()
            .ok_or(SyncError::NoPendingConflict)?;
        if let Some(snapshot) = &pending.remote_snapshot {
            return Ok(snapshot.as_ref().clone());
        }

        let version = pending
            .remote_version
            .clone()
            .ok_or(SyncError::NoPendingConflict)?;
        let token = self.token().await?;
        Ok(self.store.fetch(&token, &version).await?)
    }

    /// Pushes `local` as a new version and moves the marker to its timestamp
    async fn push(
        &mut self,
        token: &AccessToken,
        local: Snapshot,
    ) -> Result<(RemoteVersion, DateTime<Utc>), SyncError> {
        let snapshot = local.with_synced_at(Utc::now());
        let version = self.store.put(token, &snapshot).await?;

        let timestamp = version
            .timestamp(self.store.prefix())
            .unwrap_or(snapshot.synced_at);
        self.replica
            .set_last_synced_marker(timestamp)
            .await
            .map_err(SyncError::Local)?;
        self.cached_status = None;

        info!(version = %version.name, %timestamp, "Pushed local data to cloud");
        self.prune(token, &version).await;
        Ok((version, timestamp))
    }

    /// Best-effort retention: deletes the oldest versions beyond the limit
    async fn prune(&self, token: &AccessToken, keep: &RemoteVersion) {
        let Some(limit) = self.retention_keep else {
            return;
        };

        let versions = match self.store.list_versions(token).await {
            Ok(versions) => versions,
            Err(e) => {
                warn!(error = %e, "Skipping retention: could not list versions");
                return;
            }
        };

        let dated = domain::sort_by_timestamp(&versions, self.store.prefix());
        let excess = dated.len().saturating_sub(limit);
        let doomed = dated
            .into_iter()
            .take(excess)
            .map(|(version, _)| version)
            .filter(|version| version.id != keep.id);

        let mut pruned = 0;
        for version in doomed {
            match self.store.delete(token, version).await {
                Ok(()) => pruned += 1,
                Err(e) => warn!(version = %version.name, error = %e, "Failed to prune old version"),
            }
        }
        if pruned > 0 {
            debug!(pruned, limit, "Pruned old remote versions");
        }
    }
}
