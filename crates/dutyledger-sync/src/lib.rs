//! Dutyledger Sync - Status derivation and conflict resolution
//!
//! Provides:
//! - Change detection by comparing canonical hashes of the business data
//! - Explicit, user-driven conflict resolution (never latest-wins)
//! - Plain and encrypted backup files
//! - A JSON-file local replica
//!
//! ## Modules
//!
//! - [`status`] - Status engine probing the latest remote version
//! - [`orchestrator`] - "Sync now", conflict gate, download and clear
//! - [`backup`] - Export/import of snapshot files
//! - [`replica`] - File-backed [`LocalReplica`](dutyledger_core::ports::LocalReplica)

pub mod backup;
pub mod orchestrator;
pub mod replica;
pub mod status;

mod error;

pub use error::SyncError;
pub use orchestrator::{ResolutionOutcome, SyncOrchestrator, SyncOutcome};
pub use status::{comparable_hash, StatusEngine};
