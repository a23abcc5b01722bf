//! Domain error types
//!
//! Errors raised while validating domain values such as remote version
//! names and snapshot payloads.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A remote object name does not follow `prefix + millis + ".json"`
    #[error("Invalid version name: {0}")]
    InvalidVersionName(String),

    /// A timestamp could not be represented
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A snapshot payload could not be decoded
    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// An unknown conflict resolution was requested
    #[error("Invalid resolution: {0}")]
    InvalidResolution(String),
}
