//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the boundaries the sync engine depends on. Their
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`VersionStore`] - Append-only remote store of snapshot versions
//! - [`LocalReplica`] - The local collaborator that owns canonical state
//! - [`SessionSource`] - Hands out a currently valid credential session
//! - [`SessionSink`] - Durable persistence for credential sessions

pub mod local_replica;
pub mod session;
pub mod version_store;

pub use local_replica::LocalReplica;
pub use session::{AuthError, SessionSink, SessionSource};
pub use version_store::{RemoteError, VersionStore};
