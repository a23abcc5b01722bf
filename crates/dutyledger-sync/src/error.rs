//! Orchestrator-level error kinds
//!
//! Lower layers return typed errors ([`AuthError`], [`RemoteError`],
//! [`CryptoError`]); the conversions below translate them into the kinds
//! the user interface distinguishes.

use dutyledger_core::ports::{AuthError, RemoteError};
use dutyledger_crypto::CryptoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// No OAuth client id is configured
    #[error("cloud sync is not configured: set auth.client_id")]
    AuthConfig,

    /// The consent view could not be opened; retry after allowing it
    #[error("could not open the sign-in window: {0}")]
    AuthPopupBlocked(String),

    /// The user closed the consent view
    #[error("sign-in cancelled")]
    AuthCancelled,

    /// The identity provider rejected the request
    #[error(
        "sign-in rejected by the provider ({code}): {}",
        .description.as_deref().unwrap_or("no details")
    )]
    AuthProvider {
        code: String,
        description: Option<String>,
    },

    /// Any other sign-in failure (relay, identity lookup, concurrent attempt)
    #[error("sign-in failed: {0}")]
    Auth(AuthError),

    #[error("cloud storage error: {0}")]
    RemoteIo(#[from] RemoteError),

    /// Wrong password or corrupted backup
    #[error("decryption failed: wrong password or corrupted data")]
    Decryption,

    /// The backup is encrypted and no password was given
    #[error("this backup is encrypted; a password is required")]
    PasswordRequired,

    /// A conflict is waiting for use-local, use-cloud or cancel
    #[error("a sync conflict is pending; resolve or cancel it first")]
    ConflictUnresolved,

    #[error("there is no sync conflict to resolve")]
    NoPendingConflict,

    #[error("local data error: {0:#}")]
    Local(anyhow::Error),

    /// Malformed or unsupported backup file
    #[error("invalid backup file: {0}")]
    Backup(String),
}

impl From<AuthError> for SyncError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotConfigured => SyncError::AuthConfig,
            AuthError::PopupBlocked(reason) => SyncError::AuthPopupBlocked(reason),
            AuthError::Cancelled => SyncError::AuthCancelled,
            AuthError::Provider { code, description } => {
                SyncError::AuthProvider { code, description }
            }
            other => SyncError::Auth(other),
        }
    }
}

impl From<CryptoError> for SyncError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Decryption => SyncError::Decryption,
            other => SyncError::Backup(other.to_string()),
        }
    }
}
