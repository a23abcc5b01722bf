//! OAuth 2.0 implicit-grant authentication and session lifecycle
//!
//! ## Components
//!
//! - [`ImplicitGrantFlow`] - Authorization URL building (interactive and silent)
//! - [`CallbackRelay`] - Loopback server relaying the redirect fragment
//! - [`ConsentSurface`] - Browser and headless views for the authorization URL
//! - [`CredentialSessionManager`] - Interactive sign-in and silent renewal
//! - [`SessionMonitor`] - Background expiry check with silent renewal
//! - [`SessionKeeper`] - [`SessionSource`](dutyledger_core::ports::SessionSource)
//!   handing out valid sessions
//! - [`KeyringSessionStorage`] - Session persistence in the OS keyring

pub mod grant;
pub mod identity;
pub mod keeper;
pub mod manager;
pub mod monitor;
pub mod relay;
pub mod storage;
pub mod surface;

pub use grant::{AuthorizeRequest, ImplicitGrantFlow, Prompt};
pub use identity::UserInfoClient;
pub use keeper::SessionKeeper;
pub use manager::{CredentialSessionManager, SessionTimings};
pub use monitor::{SessionMonitor, SessionSlot};
pub use relay::{AuthMessage, CallbackRelay, PendingCallback};
pub use storage::KeyringSessionStorage;
pub use surface::{BrowserSurface, ConsentSurface, ConsentView, HeadlessSurface, ViewHandle};

use dutyledger_core::{
    domain::{CredentialSession, SessionPolicy},
    ports::AuthError,
};

/// The session operations the monitor and keeper depend on
#[async_trait::async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate_interactive(&self) -> Result<CredentialSession, AuthError>;

    /// Prompt-less renewal; `None` on any failure
    async fn refresh_silently(&self, session: &CredentialSession) -> Option<CredentialSession>;

    fn policy(&self) -> SessionPolicy;
}
