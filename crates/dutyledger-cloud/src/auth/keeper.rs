//! Session keeper
//!
//! Owns the current [`CredentialSession`] and hands out valid ones to the
//! sync layer. Every change is persisted through the [`SessionSink`] before
//! it is published to subscribers; a session that cannot be persisted is
//! never installed.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use dutyledger_core::{
    domain::CredentialSession,
    ports::{AuthError, SessionSink, SessionSource},
};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

use super::{monitor::SessionSlot, Authenticator, SessionMonitor};

pub struct SessionKeeper {
    authenticator: Arc<dyn Authenticator>,
    sink: Arc<dyn SessionSink>,
    slot: Arc<SessionSlot>,
    /// Serializes callers of `valid_session` so only one sign-in runs
    gate: Mutex<()>,
}

impl SessionKeeper {
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        sink: Arc<dyn SessionSink>,
        initial: Option<CredentialSession>,
    ) -> Self {
        Self {
            authenticator,
            sink,
            slot: SessionSlot::new(initial),
            gate: Mutex::new(()),
        }
    }

    /// Creates a keeper seeded with the persisted session, if any
    pub fn restore(
        authenticator: Arc<dyn Authenticator>,
        sink: Arc<dyn SessionSink>,
    ) -> anyhow::Result<Self> {
        let initial = sink.load()?;
        if let Some(session) = &initial {
            debug!(expires_at = %session.expires_at(), "Restored persisted session");
        }
        Ok(Self::new(authenticator, sink, initial))
    }

    pub fn current(&self) -> Option<CredentialSession> {
        self.slot.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<CredentialSession>> {
        self.slot.subscribe()
    }

    /// Starts the background monitor over this keeper's session
    pub fn spawn_monitor(&self, interval: Duration) -> SessionMonitor {
        SessionMonitor::spawn(
            self.authenticator.clone(),
            self.sink.clone(),
            self.slot.clone(),
            interval,
        )
    }

    /// Runs an interactive sign-in and installs the result
    ///
    /// # Errors
    /// The sign-in failure, or [`AuthError::Storage`] when the new session
    /// could not be persisted
    pub async fn sign_in(&self) -> Result<CredentialSession, AuthError> {
        let _guard = self.gate.lock().await;
        let session = self.authenticator.authenticate_interactive().await?;
        self.slot.install(self.sink.as_ref(), session.clone())?;
        Ok(session)
    }

    /// Forgets the session in memory and in storage
    pub fn sign_out(&self) -> anyhow::Result<()> {
        self.slot.clear();
        self.sink.clear()?;
        info!("Signed out");
        Ok(())
    }

    /// One silent refresh, after any renewal already in flight has finished
    async fn renew(
        &self,
        current: CredentialSession,
    ) -> Result<Option<CredentialSession>, AuthError> {
        let policy = self.authenticator.policy();
        let _renewal = self.slot.lock_renewal().await;

        // The monitor may have renewed the session while we waited
        let latest = self.slot.current().unwrap_or(current);
        if policy.is_valid(&latest, Utc::now()) {
            debug!("Using session renewed in the background");
            return Ok(Some(latest));
        }
        if latest.expires_at() <= Utc::now() {
            return Ok(None);
        }

        match self.authenticator.refresh_silently(&latest).await {
            Some(renewed) if policy.is_valid(&renewed, Utc::now()) => {
                debug!("Renewed session silently");
                self.slot.install(self.sink.as_ref(), renewed.clone())?;
                Ok(Some(renewed))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl SessionSource for SessionKeeper {
    /// Returns a session valid for at least the validity margin
    ///
    /// A session that has not yet expired gets one silent refresh attempt
    /// before falling back to the interactive flow. A refresh already run
    /// by the monitor is waited for rather than duplicated.
    async fn valid_session(&self) -> Result<CredentialSession, AuthError> {
        let _guard = self.gate.lock().await;
        let policy = self.authenticator.policy();

        if let Some(current) = self.current() {
            if policy.is_valid(&current, Utc::now()) {
                return Ok(current);
            }
            if current.expires_at() > Utc::now() {
                if let Some(renewed) = self.renew(current).await? {
                    return Ok(renewed);
                }
            }
        }

        debug!("No usable session; starting interactive sign-in");
        let session = self.authenticator.authenticate_interactive().await?;
        self.slot.install(self.sink.as_ref(), session.clone())?;
        Ok(session)
    }
}
