//! Dutyledger Core - Domain values and ports for cloud synchronization
//!
//! This crate contains the hexagonal core of the sync engine:
//! - **Domain values** - `CredentialSession`, `RemoteVersion`, `Snapshot`, `SyncStatus`
//! - **Port definitions** - Traits for adapters: `VersionStore`, `LocalReplica`,
//!   `SessionSource`, `SessionSink`
//! - **Configuration** - YAML-backed settings with defaults and validation
//!
//! # Architecture
//!
//! The domain module is pure: it never performs I/O and never interprets the
//! business fields carried inside a [`Snapshot`](domain::Snapshot).
//! Adapter crates implement the ports; the sync crate orchestrates them.

pub mod config;
pub mod domain;
pub mod ports;
