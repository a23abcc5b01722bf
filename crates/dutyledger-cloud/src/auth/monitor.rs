//! Background session monitor
//!
//! Checks the current session once immediately and then on every interval
//! tick. A session inside the renewal window is refreshed silently; on
//! success the replacement is persisted and then published, on failure the
//! current session is left untouched. A replacement that cannot be persisted
//! is dropped and reported on the monitor's error channel.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use dutyledger_core::{
    domain::CredentialSession,
    ports::{AuthError, SessionSink},
};
use tokio::{
    sync::{watch, Mutex, MutexGuard},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Authenticator;

// ============================================================================
// SessionSlot
// ============================================================================

/// The current session, shared by the keeper and the monitor
pub struct SessionSlot {
    sessions: watch::Sender<Option<CredentialSession>>,
    /// Held for the whole of a silent refresh, by whoever runs it
    renewal: Mutex<()>,
}

impl SessionSlot {
    pub fn new(initial: Option<CredentialSession>) -> Arc<Self> {
        let (sessions, _rx) = watch::channel(initial);
        Arc::new(Self {
            sessions,
            renewal: Mutex::new(()),
        })
    }

    pub fn current(&self) -> Option<CredentialSession> {
        self.sessions.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<CredentialSession>> {
        self.sessions.subscribe()
    }

    /// Waits until no silent refresh is running and blocks new ones
    pub(crate) async fn lock_renewal(&self) -> MutexGuard<'_, ()> {
        self.renewal.lock().await
    }

    /// Persists `session` and publishes it
    pub(crate) fn install(
        &self,
        sink: &dyn SessionSink,
        session: CredentialSession,
    ) -> Result<(), AuthError> {
        persist(sink, &session)?;
        self.sessions.send_replace(Some(session));
        Ok(())
    }

    /// Replaces `expected` with `renewed` unless the slot changed meanwhile
    ///
    /// The renewal is persisted before it becomes visible; a failed persist
    /// leaves the slot untouched.
    ///
    /// # Returns
    /// `true` when the slot now holds `renewed`
    pub(crate) fn replace_if_current(
        &self,
        sink: &dyn SessionSink,
        expected: &CredentialSession,
        renewed: CredentialSession,
    ) -> Result<bool, AuthError> {
        let mut outcome = Ok(false);
        self.sessions.send_if_modified(|slot| {
            if slot.as_ref() != Some(expected) {
                return false;
            }
            match persist(sink, &renewed) {
                Ok(()) => {
                    *slot = Some(renewed.clone());
                    outcome = Ok(true);
                    true
                }
                Err(e) => {
                    outcome = Err(e);
                    false
                }
            }
        });
        outcome
    }

    pub(crate) fn clear(&self) {
        self.sessions.send_replace(None);
    }
}

fn persist(sink: &dyn SessionSink, session: &CredentialSession) -> Result<(), AuthError> {
    sink.persist(session)
        .map_err(|e| AuthError::Storage(format!("{:#}", e)))
}

// ============================================================================
// SessionMonitor
// ============================================================================

pub struct SessionMonitor {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    errors: watch::Receiver<Option<AuthError>>,
}

impl SessionMonitor {
    /// Starts the monitor task
    ///
    /// # Arguments
    /// * `authenticator` - Performs the silent refresh
    /// * `sink` - Persists every replacement session
    /// * `slot` - Slot the monitor reads from and publishes to
    /// * `interval` - Time between checks after the immediate first one
    pub fn spawn(
        authenticator: Arc<dyn Authenticator>,
        sink: Arc<dyn SessionSink>,
        slot: Arc<SessionSlot>,
        interval: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let (errors_tx, errors) = watch::channel(None);

        let handle = tokio::spawn(async move {
            // First tick completes immediately: the check-on-load
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        match renew_if_expiring(authenticator.as_ref(), sink.as_ref(), &slot).await {
                            Ok(true) => {
                                errors_tx.send_replace(None);
                            }
                            Ok(false) => {}
                            Err(e) => {
                                warn!(error = %e, "Renewed session was not installed");
                                errors_tx.send_replace(Some(e));
                            }
                        }
                    }
                }
            }
            debug!("Session monitor stopped");
        });

        info!(interval_secs = interval.as_secs(), "Started session monitor");
        Self {
            cancel,
            handle: Some(handle),
            errors,
        }
    }

    /// The failure of the latest renewal attempt, cleared by a later success
    pub fn last_error(&self) -> Option<AuthError> {
        self.errors.borrow().clone()
    }

    pub fn errors(&self) -> watch::Receiver<Option<AuthError>> {
        self.errors.clone()
    }

    /// Stops the monitor and waits for its task to finish
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for SessionMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// One monitor check
///
/// # Returns
/// `true` when the session was replaced
///
/// # Errors
/// [`AuthError::Storage`] when the renewal could not be persisted
pub(crate) async fn renew_if_expiring(
    authenticator: &dyn Authenticator,
    sink: &dyn SessionSink,
    slot: &SessionSlot,
) -> Result<bool, AuthError> {
    let Some(current) = slot.current() else {
        return Ok(false);
    };
    if !authenticator
        .policy()
        .is_expiring_soon(&current, Utc::now())
    {
        return Ok(false);
    }

    let _renewal = slot.lock_renewal().await;
    if slot.current().as_ref() != Some(&current) {
        debug!("Session replaced while waiting; skipping refresh");
        return Ok(false);
    }

    debug!(expires_at = %current.expires_at(), "Session expiring soon; refreshing silently");
    let Some(renewed) = authenticator.refresh_silently(&current).await else {
        debug!("Silent refresh unavailable; keeping current session");
        return Ok(false);
    };

    let expires_at = renewed.expires_at();
    let replaced = slot.replace_if_current(sink, &current, renewed)?;
    if replaced {
        info!(%expires_at, "Replaced session after silent refresh");
    } else {
        debug!("Session changed during refresh; discarding renewal");
    }
    Ok(replaced)
}
