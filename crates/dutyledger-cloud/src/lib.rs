//! Dutyledger Cloud - identity provider and remote store adapters
//!
//! Provides async adapters for:
//! - OAuth 2.0 implicit-grant authentication with a loopback callback relay
//! - Silent session renewal and a background expiry monitor
//! - An append-only version store over the Drive `appDataFolder`
//!
//! ## Modules
//!
//! - [`auth`] - Session manager, callback relay, consent surfaces, monitor
//! - [`client`] - Drive REST client and error mapping
//! - [`store`] - [`VersionStore`](dutyledger_core::ports::VersionStore) implementation

pub mod auth;
pub mod client;
pub mod store;

pub use dutyledger_core::ports::{AuthError, RemoteError};
