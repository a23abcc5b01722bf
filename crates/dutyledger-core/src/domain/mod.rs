//! Domain values for the sync engine
//!
//! - Credential sessions and their validity rules
//! - Remote version naming (prefix + millisecond timestamp)
//! - Snapshots exchanged with the local replica
//! - Derived sync status and conflict resolutions
//! - Domain-specific error types

pub mod errors;
pub mod session;
pub mod snapshot;
pub mod status;
pub mod version;

// Re-export commonly used types
pub use errors::DomainError;
pub use session::{AccessToken, CredentialSession, Identity, SessionPolicy};
pub use snapshot::Snapshot;
pub use status::{Resolution, SyncStatus};
pub use version::{find_latest, sort_by_timestamp, RemoteVersion, VersionName};
