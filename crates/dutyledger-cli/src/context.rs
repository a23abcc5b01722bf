//! Wiring shared by the commands
//!
//! Builds the adapters from the loaded configuration: the session keeper
//! over the keyring, the Drive version store, the file replica and the
//! orchestrator that ties them together.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use dutyledger_cloud::{
    auth::{CredentialSessionManager, KeyringSessionStorage, SessionKeeper},
    client::DriveClient,
    store::DriveVersionStore,
};
use dutyledger_core::config::Config;
use dutyledger_crypto::EnvelopeCipher;
use dutyledger_sync::{replica::FileReplica, SyncOrchestrator};
use tracing::debug;

pub struct AppContext {
    pub config: Config,
    pub config_path: PathBuf,
}

impl AppContext {
    /// Loads the config from `path` or the default location
    ///
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Config::default_path);
        let config = if config_path.exists() {
            Config::load(&config_path)
                .with_context(|| format!("Failed to load {}", config_path.display()))?
        } else {
            Config::default()
        };

        debug!(config_path = %config_path.display(), "Loaded configuration");
        Ok(Self {
            config,
            config_path,
        })
    }

    /// Fails with every validation error of the loaded configuration
    ///
    /// `config` subcommands skip this so a broken file can still be
    /// inspected and replaced.
    pub fn ensure_valid(&self) -> Result<()> {
        let errors = self.config.validate();
        if errors.is_empty() {
            return Ok(());
        }
        let details: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        bail!(
            "Invalid configuration in {}: {}",
            self.config_path.display(),
            details.join("; ")
        )
    }

    /// Keeper seeded from the keyring, authenticating through the browser
    pub async fn session_keeper(&self) -> Result<Arc<SessionKeeper>> {
        let manager = CredentialSessionManager::from_config(&self.config)
            .await
            .context("Failed to start the sign-in callback listener")?;
        let keeper = SessionKeeper::restore(
            Arc::new(manager),
            Arc::new(KeyringSessionStorage::new()),
        )?;
        Ok(Arc::new(keeper))
    }

    pub fn version_store(&self) -> DriveVersionStore {
        let remote = &self.config.remote;
        DriveVersionStore::new(
            DriveClient::with_base_urls(&remote.api_base_url, &remote.upload_base_url),
            &remote.file_prefix,
            remote.page_size,
        )
    }

    pub fn replica(&self) -> FileReplica {
        FileReplica::from_config(&self.config.replica)
    }

    pub fn cipher(&self) -> EnvelopeCipher {
        EnvelopeCipher::with_iterations(self.config.backup.kdf_iterations)
    }

    pub fn orchestrator(&self, keeper: Arc<SessionKeeper>) -> SyncOrchestrator {
        SyncOrchestrator::new(
            keeper,
            Arc::new(self.version_store()),
            Arc::new(self.replica()),
        )
        .with_retention(self.config.remote.retention_keep)
    }
}
