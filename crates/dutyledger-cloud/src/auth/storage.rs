//! Session persistence in the system keyring
//!
//! The whole [`CredentialSession`] is serialized as JSON and stored under the
//! service name "dutyledger" (GNOME Keyring, KDE Wallet, macOS Keychain).

use anyhow::{Context, Result};
use dutyledger_core::{domain::CredentialSession, ports::SessionSink};
use tracing::{debug, info};

/// Keyring service name
const KEYRING_SERVICE: &str = "dutyledger";

/// Keyring username for the single signed-in account
const DEFAULT_ACCOUNT: &str = "session";

pub struct KeyringSessionStorage {
    account: String,
}

impl Default for KeyringSessionStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringSessionStorage {
    pub fn new() -> Self {
        Self::for_account(DEFAULT_ACCOUNT)
    }

    /// Stores under a different keyring username
    pub fn for_account(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(KEYRING_SERVICE, &self.account).context("Failed to create keyring entry")
    }
}

impl SessionSink for KeyringSessionStorage {
    fn persist(&self, session: &CredentialSession) -> Result<()> {
        let json = serde_json::to_string(session).context("Failed to serialize session")?;
        self.entry()?
            .set_password(&json)
            .context("Failed to store session in keyring")?;

        debug!(expires_at = %session.expires_at(), "Stored session in keyring");
        Ok(())
    }

    fn load(&self) -> Result<Option<CredentialSession>> {
        match self.entry()?.get_password() {
            Ok(json) => {
                let session: CredentialSession = serde_json::from_str(&json)
                    .context("Failed to deserialize session from keyring")?;
                debug!("Loaded session from keyring");
                Ok(Some(session))
            }
            Err(keyring::Error::NoEntry) => {
                debug!("No session found in keyring");
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) => {
                info!("Cleared session from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => {
                debug!("No session to clear");
                Ok(())
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete from keyring")),
        }
    }
}
