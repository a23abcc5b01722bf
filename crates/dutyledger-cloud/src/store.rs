//! DriveVersionStore - VersionStore implementation over the Drive API
//!
//! Wraps the [`DriveClient`] to fulfil the
//! [`VersionStore`](dutyledger_core::ports::VersionStore) contract.
//!
//! ## Design Notes
//!
//! - Listing follows `nextPageToken` until exhausted.
//! - The server name filter is a substring match, so names are re-checked
//!   against the prefix locally.
//! - `put` names the object from the wall clock at call time; a push never
//!   reuses an existing name.

use chrono::Utc;
use dutyledger_core::{
    domain::{AccessToken, RemoteVersion, Snapshot, VersionName},
    ports::{RemoteError, VersionStore},
};
use tracing::{debug, info};

use crate::client::DriveClient;

/// Safety valve against a provider that keeps returning page tokens
const MAX_PAGES: usize = 1_000;

pub struct DriveVersionStore {
    client: DriveClient,
    prefix: String,
    page_size: u32,
}

impl DriveVersionStore {
    /// Creates a store for versions named `prefix + millis + ".json"`
    ///
    /// # Arguments
    /// * `client` - Drive client (custom base URLs in tests)
    /// * `prefix` - Name prefix isolating this application's versions
    /// * `page_size` - Page size used when listing
    pub fn new(client: DriveClient, prefix: impl Into<String>, page_size: u32) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            page_size,
        }
    }

    pub fn client(&self) -> &DriveClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl VersionStore for DriveVersionStore {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn list_versions(&self, token: &AccessToken) -> Result<Vec<RemoteVersion>, RemoteError> {
        let mut versions = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let page = self
                .client
                .list_page(token, &self.prefix, self.page_size, page_token.as_deref())
                .await?;

            versions.extend(
                page.files
                    .into_iter()
                    .filter(|v| v.name.starts_with(&self.prefix)),
            );

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => {
                    debug!(count = versions.len(), "Listed remote versions");
                    return Ok(versions);
                }
            }
        }

        Err(RemoteError::InvalidResponse(format!(
            "listing did not terminate after {} pages",
            MAX_PAGES
        )))
    }

    async fn fetch(
        &self,
        token: &AccessToken,
        version: &RemoteVersion,
    ) -> Result<Snapshot, RemoteError> {
        let bytes = self.client.download(token, &version.id).await?;
        Snapshot::from_json_slice(&bytes).map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }

    async fn put(
        &self,
        token: &AccessToken,
        snapshot: &Snapshot,
    ) -> Result<RemoteVersion, RemoteError> {
        let content = snapshot
            .to_json_vec()
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;
        let name = VersionName::at(self.prefix.as_str(), Utc::now()).to_string();

        let version = self.client.create_json(token, &name, &content).await?;
        info!(version = %version.name, bytes = content.len(), "Pushed new remote version");
        Ok(version)
    }

    async fn delete(&self, token: &AccessToken, version: &RemoteVersion) -> Result<(), RemoteError> {
        self.client.delete(token, &version.id).await
    }
}
