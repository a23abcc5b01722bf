//! Versioned remote store port (driven/secondary port)
//!
//! An append-only store of snapshot versions in an app-isolated cloud
//! folder. Every push creates a new object; nothing is ever updated in
//! place.
//!
//! ## Design Notes
//!
//! - Errors are typed ([`RemoteError`]) because the orchestrator surfaces
//!   them as a distinct failure kind.
//! - Callers pass the access token explicitly on every call; the store
//!   holds no session state.
//! - No automatic retry happens at this layer.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

use crate::domain::{self, AccessToken, RemoteVersion, Snapshot};

// ============================================================================
// RemoteError
// ============================================================================

/// Failure of a remote store operation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The provider answered with a non-success status
    #[error("remote store returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be decoded
    #[error("invalid response from remote store: {0}")]
    InvalidResponse(String),

    /// A bulk delete removed only some of the versions; nothing is rolled back
    #[error("deleted {deleted} of {} remote versions: {first_error}", .deleted + .failed)]
    PartialDelete {
        deleted: usize,
        failed: usize,
        first_error: String,
    },
}

// ============================================================================
// VersionStore
// ============================================================================

#[async_trait::async_trait]
pub trait VersionStore: Send + Sync {
    /// Name prefix identifying this application's versions
    fn prefix(&self) -> &str;

    /// Lists every object in the isolated folder matching the prefix, unsorted
    async fn list_versions(&self, token: &AccessToken) -> Result<Vec<RemoteVersion>, RemoteError>;

    /// Downloads and decodes one version
    async fn fetch(
        &self,
        token: &AccessToken,
        version: &RemoteVersion,
    ) -> Result<Snapshot, RemoteError>;

    /// Creates a new version named from the current time; never overwrites
    async fn put(
        &self,
        token: &AccessToken,
        snapshot: &Snapshot,
    ) -> Result<RemoteVersion, RemoteError>;

    /// Deletes one version by id
    async fn delete(&self, token: &AccessToken, version: &RemoteVersion)
        -> Result<(), RemoteError>;

    /// Returns the version with the greatest embedded name timestamp
    ///
    /// Server modification times are never consulted.
    async fn find_latest(
        &self,
        token: &AccessToken,
    ) -> Result<Option<(RemoteVersion, DateTime<Utc>)>, RemoteError> {
        let versions = self.list_versions(token).await?;
        Ok(domain::find_latest(&versions, self.prefix()).map(|(v, ts)| (v.clone(), ts)))
    }

    /// Lists, then deletes every version concurrently
    ///
    /// Best effort: deletions that succeeded stay deleted when others fail.
    ///
    /// # Returns
    /// The number of deleted versions, or [`RemoteError::PartialDelete`]
    async fn delete_all(&self, token: &AccessToken) -> Result<usize, RemoteError> {
        let versions = self.list_versions(token).await?;
        let results = futures_util::future::join_all(
            versions.iter().map(|version| self.delete(token, version)),
        )
        .await;

        let mut deleted = 0;
        let mut failures = Vec::new();
        for (version, result) in versions.iter().zip(results) {
            match result {
                Ok(()) => deleted += 1,
                Err(e) => {
                    warn!(version = %version.name, error = %e, "Failed to delete remote version");
                    failures.push(e);
                }
            }
        }

        match failures.first() {
            None => Ok(deleted),
            Some(first) => Err(RemoteError::PartialDelete {
                deleted,
                failed: failures.len(),
                first_error: first.to_string(),
            }),
        }
    }
}
