//! Credential session manager
//!
//! Owns the token lifecycle: interactive acquisition through a consent
//! view, validity checks, and prompt-less silent renewal.
//!
//! ## Concurrency
//!
//! - Only one interactive attempt may be outstanding; a second call fails
//!   fast with [`AuthError::InProgress`].
//! - Only one silent refresh runs at a time; an overlapping request
//!   resolves to `None` immediately.
//! - Silent refresh is time-boxed and never returns an error.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use dutyledger_core::{
    config::{AuthConfig, Config, SessionConfig},
    domain::{AccessToken, CredentialSession, Identity, SessionPolicy},
    ports::AuthError,
};
use tokio::{sync::Mutex, time::MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{
    grant::{ImplicitGrantFlow, Prompt},
    identity::UserInfoClient,
    relay::{AuthMessage, CallbackRelay, PendingCallback},
    surface::{BrowserSurface, ConsentSurface, ConsentView, HeadlessSurface},
    Authenticator,
};

/// Timing knobs of the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    /// How often an open consent view is checked for closure
    pub view_poll_interval: Duration,
    /// Upper bound for one interactive sign-in
    pub interactive_timeout: Duration,
    /// Upper bound for one silent refresh
    pub silent_refresh_timeout: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SessionTimings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            view_poll_interval: config.view_poll_interval(),
            interactive_timeout: config.interactive_timeout(),
            silent_refresh_timeout: config.silent_refresh_timeout(),
        }
    }
}

pub struct CredentialSessionManager {
    /// `None` when no client id is configured
    flow: Option<ImplicitGrantFlow>,
    relay: Arc<CallbackRelay>,
    interactive_surface: Arc<dyn ConsentSurface>,
    silent_surface: Arc<dyn ConsentSurface>,
    userinfo: UserInfoClient,
    policy: SessionPolicy,
    timings: SessionTimings,
    interactive_gate: Mutex<()>,
    silent_gate: Mutex<()>,
}

impl CredentialSessionManager {
    /// Creates a manager around an already bound relay
    ///
    /// # Arguments
    /// * `auth` - Provider settings; a missing client id is reported on first use
    /// * `session` - Validity thresholds and timeouts
    /// * `relay` - Callback relay whose redirect URI is sent to the provider
    /// * `interactive_surface` - Where the consent view opens
    /// * `silent_surface` - Hidden context for prompt-less renewal
    pub fn new(
        auth: &AuthConfig,
        session: &SessionConfig,
        relay: Arc<CallbackRelay>,
        interactive_surface: Arc<dyn ConsentSurface>,
        silent_surface: Arc<dyn ConsentSurface>,
    ) -> Result<Self, AuthError> {
        let flow = match auth.client_id.as_deref() {
            Some(id) if !id.trim().is_empty() => Some(ImplicitGrantFlow::new(
                id,
                &auth.authorize_url,
                &relay.redirect_uri(),
                &auth.scopes,
            )?),
            _ => None,
        };

        Ok(Self {
            flow,
            relay,
            interactive_surface,
            silent_surface,
            userinfo: UserInfoClient::new(auth.userinfo_url.clone()),
            policy: session.policy(),
            timings: SessionTimings::from(session),
            interactive_gate: Mutex::new(()),
            silent_gate: Mutex::new(()),
        })
    }

    /// Binds the relay on the configured port and uses the system browser
    pub async fn from_config(config: &Config) -> Result<Self, AuthError> {
        let relay = CallbackRelay::bind(config.auth.callback_port).await?;
        let silent = Arc::new(HeadlessSurface::new(relay.clone())?);
        Self::new(
            &config.auth,
            &config.session,
            relay,
            Arc::new(BrowserSurface),
            silent,
        )
    }

    pub fn is_configured(&self) -> bool {
        self.flow.is_some()
    }

    pub fn is_valid(&self, session: &CredentialSession) -> bool {
        self.policy.is_valid(session, Utc::now())
    }

    pub fn is_expiring_soon(&self, session: &CredentialSession) -> bool {
        self.policy.is_expiring_soon(session, Utc::now())
    }

    /// Runs the interactive consent flow
    ///
    /// # Errors
    /// - [`AuthError::NotConfigured`] without a client id
    /// - [`AuthError::InProgress`] while another attempt is outstanding
    /// - [`AuthError::PopupBlocked`] when the view cannot open
    /// - [`AuthError::Cancelled`] when the view closes or times out
    /// - [`AuthError::Provider`] when the provider denies the request
    pub async fn authenticate_interactive(&self) -> Result<CredentialSession, AuthError> {
        let flow = self.flow.as_ref().ok_or(AuthError::NotConfigured)?;
        let _guard = self
            .interactive_gate
            .try_lock()
            .map_err(|_| AuthError::InProgress)?;

        info!("Starting interactive authentication");
        let request = flow.authorize(Prompt::SelectAccount, None);
        let mut pending = self.relay.register(&request.state);
        let view = self.interactive_surface.open(&request.url).await?;

        let outcome = self
            .await_message(
                &mut pending,
                view.as_ref(),
                self.timings.interactive_timeout,
            )
            .await;
        view.close();

        let message = match outcome {
            Err(e) if e.is_cancellation() => {
                info!("Authentication cancelled by the user");
                return Err(e);
            }
            other => other?,
        };

        match message {
            AuthMessage::Success {
                access_token,
                expires_in,
                email,
                name,
            } => {
                let received_at = Utc::now();
                let identity = self.resolve_identity(&access_token, email, name).await;
                let session = CredentialSession::from_expires_in(
                    access_token,
                    identity,
                    expires_in,
                    received_at,
                );
                info!(
                    email = %session.identity().email,
                    expires_at = %session.expires_at(),
                    "Authentication succeeded"
                );
                Ok(session)
            }
            AuthMessage::Error { error, description } => {
                warn!(code = %error, "Identity provider rejected authentication");
                Err(AuthError::Provider {
                    code: error,
                    description,
                })
            }
        }
    }

    /// Renews `session` without any prompt
    ///
    /// # Returns
    /// The replacement session, or `None` on timeout, provider error, or
    /// when another silent refresh is already running. Never an error.
    pub async fn refresh_silently(&self, session: &CredentialSession) -> Option<CredentialSession> {
        let flow = self.flow.as_ref()?;
        let Ok(_guard) = self.silent_gate.try_lock() else {
            debug!("Silent refresh already in flight");
            return None;
        };

        match tokio::time::timeout(
            self.timings.silent_refresh_timeout,
            self.silent_round_trip(flow, session),
        )
        .await
        {
            Ok(Ok(renewed)) => {
                info!(expires_at = %renewed.expires_at(), "Session renewed silently");
                Some(renewed)
            }
            Ok(Err(e)) => {
                debug!(error = %e, "Silent refresh failed");
                None
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.timings.silent_refresh_timeout.as_secs(),
                    "Silent refresh timed out"
                );
                None
            }
        }
    }

    async fn silent_round_trip(
        &self,
        flow: &ImplicitGrantFlow,
        session: &CredentialSession,
    ) -> Result<CredentialSession, AuthError> {
        let hint = Some(session.identity().email.as_str()).filter(|e| !e.is_empty());
        let request = flow.authorize(Prompt::None, hint);
        let mut pending = self.relay.register(&request.state);
        let view = self.silent_surface.open(&request.url).await?;

        let outcome = self
            .await_message(
                &mut pending,
                view.as_ref(),
                self.timings.silent_refresh_timeout,
            )
            .await;
        view.close();

        match outcome? {
            AuthMessage::Success {
                access_token,
                expires_in,
                email,
                name,
            } => {
                let identity = match email {
                    Some(email) => {
                        let display_name = name.unwrap_or_else(|| email.clone());
                        Identity::new(email, display_name)
                    }
                    None => session.identity().clone(),
                };
                Ok(CredentialSession::from_expires_in(
                    access_token,
                    identity,
                    expires_in,
                    Utc::now(),
                ))
            }
            AuthMessage::Error { error, description } => Err(AuthError::Provider {
                code: error,
                description,
            }),
        }
    }

    /// Waits for the relayed message while watching the view
    ///
    /// A closed view or an elapsed `limit` is [`AuthError::Cancelled`].
    async fn await_message(
        &self,
        pending: &mut PendingCallback,
        view: &dyn ConsentView,
        limit: Duration,
    ) -> Result<AuthMessage, AuthError> {
        let deadline = tokio::time::sleep(limit);
        tokio::pin!(deadline);

        let mut poll = tokio::time::interval(self.timings.view_poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                message = pending.recv() => return message,
                _ = &mut deadline => {
                    debug!(limit_secs = limit.as_secs(), "Consent view timed out");
                    return Err(AuthError::Cancelled);
                }
                _ = poll.tick() => {
                    if view.is_closed() {
                        return pending.try_recv().ok_or(AuthError::Cancelled);
                    }
                }
            }
        }
    }

    /// Fills in the identity the fragment did not carry
    async fn resolve_identity(
        &self,
        token: &AccessToken,
        email: Option<String>,
        name: Option<String>,
    ) -> Identity {
        if let Some(email) = email {
            let display_name = name.unwrap_or_else(|| email.clone());
            return Identity::new(email, display_name);
        }

        match self.userinfo.fetch(token).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Could not read user profile; continuing without identity");
                Identity::default()
            }
        }
    }
}

#[async_trait::async_trait]
impl Authenticator for CredentialSessionManager {
    async fn authenticate_interactive(&self) -> Result<CredentialSession, AuthError> {
        CredentialSessionManager::authenticate_interactive(self).await
    }

    async fn refresh_silently(&self, session: &CredentialSession) -> Option<CredentialSession> {
        CredentialSessionManager::refresh_silently(self, session).await
    }

    fn policy(&self) -> SessionPolicy {
        self.policy
    }
}
