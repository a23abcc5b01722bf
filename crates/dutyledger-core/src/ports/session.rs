//! Credential session ports
//!
//! [`SessionSource`] is what remote operations call to obtain a usable
//! session; [`SessionSink`] is where every session change is persisted.
//! The session itself is an explicit value: adapters never stash it in
//! hidden globals.

use thiserror::Error;

use crate::domain::CredentialSession;

// ============================================================================
// AuthError
// ============================================================================

/// Failure kinds of the authorization flow
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No OAuth client id is configured; not retried
    #[error("OAuth client id is not configured (set auth.client_id)")]
    NotConfigured,

    /// The consent view could not be opened
    #[error("consent view could not be opened: {0}")]
    PopupBlocked(String),

    /// The user closed the consent view or it timed out
    #[error("authentication cancelled")]
    Cancelled,

    /// The identity provider returned an error code
    #[error(
        "identity provider returned '{code}': {}",
        .description.as_deref().unwrap_or("no description")
    )]
    Provider {
        code: String,
        description: Option<String>,
    },

    /// Another interactive authentication is outstanding
    #[error("an interactive authentication is already in progress")]
    InProgress,

    /// The local callback relay failed
    #[error("authorization callback failed: {0}")]
    Callback(String),

    /// The signed-in user's profile could not be read
    #[error("identity lookup failed: {0}")]
    Identity(String),

    /// A new session could not be persisted; it was not installed
    #[error("session could not be stored: {0}")]
    Storage(String),
}

impl AuthError {
    /// True for the user-driven rejection that is not logged as an error
    pub fn is_cancellation(&self) -> bool {
        matches!(self, AuthError::Cancelled)
    }
}

// ============================================================================
// Ports
// ============================================================================

/// Source of currently valid credential sessions
#[async_trait::async_trait]
pub trait SessionSource: Send + Sync {
    /// Returns a session that is valid right now, authenticating if needed
    async fn valid_session(&self) -> Result<CredentialSession, AuthError>;
}

/// Durable storage for the current session
///
/// Callers must persist every successful session change immediately.
pub trait SessionSink: Send + Sync {
    fn persist(&self, session: &CredentialSession) -> anyhow::Result<()>;

    fn load(&self) -> anyhow::Result<Option<CredentialSession>>;

    fn clear(&self) -> anyhow::Result<()>;
}
