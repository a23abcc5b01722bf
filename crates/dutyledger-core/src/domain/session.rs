//! CredentialSession domain value
//!
//! A session is the result of one successful authorization round trip with
//! the identity provider. It is never mutated in place: interactive login and
//! silent renewal both produce a brand-new session that replaces the old one.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Sessions closer than this to expiry are no longer usable for requests
pub const DEFAULT_VALIDITY_MARGIN_SECS: i64 = 5 * 60;

/// Sessions closer than this to expiry should be renewed silently
pub const DEFAULT_RENEWAL_WINDOW_SECS: i64 = 10 * 60;

// ============================================================================
// AccessToken
// ============================================================================

/// Bearer token issued by the identity provider
///
/// `Debug` and `Display` never reveal the secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for use in an `Authorization` header
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

// ============================================================================
// Identity
// ============================================================================

/// Basic profile of the signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub email: String,
    pub display_name: String,
}

impl Identity {
    pub fn new(email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            display_name: display_name.into(),
        }
    }

    /// Returns true when neither field carries information
    pub fn is_empty(&self) -> bool {
        self.email.is_empty() && self.display_name.is_empty()
    }
}

// ============================================================================
// CredentialSession
// ============================================================================

/// An authenticated session with an absolute expiry instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSession {
    access_token: AccessToken,
    identity: Identity,
    expires_at: DateTime<Utc>,
}

impl CredentialSession {
    /// Creates a session from its parts
    pub fn new(access_token: AccessToken, identity: Identity, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token,
            identity,
            expires_at,
        }
    }

    /// Creates a session from a relative `expires_in` as returned by the provider
    ///
    /// # Arguments
    /// * `expires_in_secs` - Lifetime in seconds, counted from `issued_at`
    /// * `issued_at` - The instant the provider answered
    pub fn from_expires_in(
        access_token: AccessToken,
        identity: Identity,
        expires_in_secs: i64,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            access_token,
            identity,
            issued_at + Duration::seconds(expires_in_secs.max(0)),
        )
    }

    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

// ============================================================================
// SessionPolicy
// ============================================================================

/// Time thresholds that classify a session
///
/// - valid: `expires_at - now > validity_margin`
/// - expiring soon: `now < expires_at < now + renewal_window`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub validity_margin: Duration,
    pub renewal_window: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            validity_margin: Duration::seconds(DEFAULT_VALIDITY_MARGIN_SECS),
            renewal_window: Duration::seconds(DEFAULT_RENEWAL_WINDOW_SECS),
        }
    }
}

impl SessionPolicy {
    pub fn new(validity_margin: Duration, renewal_window: Duration) -> Self {
        Self {
            validity_margin,
            renewal_window,
        }
    }

    pub fn is_valid(&self, session: &CredentialSession, now: DateTime<Utc>) -> bool {
        session.expires_at > now + self.validity_margin
    }

    pub fn is_expiring_soon(&self, session: &CredentialSession, now: DateTime<Utc>) -> bool {
        session.expires_at < now + self.renewal_window && session.expires_at > now
    }
}
