//! Consent surfaces
//!
//! A surface is where an authorization URL gets opened: the user's browser
//! for interactive sign-in, or a hidden redirect-capturing request for
//! prompt-less renewal. The session manager only needs to know whether the
//! view is still open, so it can tell a user who closed the window apart
//! from one who is still deciding.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use dutyledger_core::ports::AuthError;
use oauth2::url::Url;
use reqwest::{header::LOCATION, redirect::Policy, Client};
use tracing::{debug, info};

use super::relay::CallbackRelay;

/// An opened authorization view
pub trait ConsentView: Send + Sync {
    /// True once the view is gone (closed by the user or finished)
    fn is_closed(&self) -> bool;

    fn close(&self);
}

/// Something that can open an authorization URL
#[async_trait::async_trait]
pub trait ConsentSurface: Send + Sync {
    /// Opens `url`; fails with [`AuthError::PopupBlocked`] when it cannot
    async fn open(&self, url: &Url) -> Result<Box<dyn ConsentView>, AuthError>;
}

/// Shared closed flag used by the built-in views
#[derive(Debug, Clone, Default)]
pub struct ViewHandle {
    closed: Arc<AtomicBool>,
}

impl ViewHandle {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConsentView for ViewHandle {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// BrowserSurface
// ============================================================================

/// Opens the URL in the user's default browser
///
/// A system browser tab cannot be observed, so its view never reports
/// closure; the session manager's overall timeout covers abandonment.
pub struct BrowserSurface;

#[async_trait::async_trait]
impl ConsentSurface for BrowserSurface {
    async fn open(&self, url: &Url) -> Result<Box<dyn ConsentView>, AuthError> {
        info!("Opening browser for authentication");
        webbrowser::open(url.as_str()).map_err(|e| AuthError::PopupBlocked(e.to_string()))?;
        Ok(Box::new(ViewHandle::new()))
    }
}

// ============================================================================
// HeadlessSurface
// ============================================================================

/// Hidden execution context for prompt-less renewal
///
/// Requests the authorization URL without following redirects and hands
/// the `Location` fragment straight to the callback relay. The view closes
/// as soon as the request finishes, whether or not a message was relayed.
///
/// The request carries no browser cookies. A real identity provider answers
/// a cookieless `prompt=none` request with `error=login_required`, so silent
/// renewal through this surface only succeeds against providers (or local
/// mocks) that grant without an existing browser session. Against anything
/// else it fails fast and callers fall back to the interactive flow.
pub struct HeadlessSurface {
    client: Client,
    relay: Arc<CallbackRelay>,
}

impl HeadlessSurface {
    pub fn new(relay: Arc<CallbackRelay>) -> Result<Self, AuthError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .build()
            .map_err(|e| AuthError::PopupBlocked(e.to_string()))?;
        Ok(Self { client, relay })
    }
}

#[async_trait::async_trait]
impl ConsentSurface for HeadlessSurface {
    async fn open(&self, url: &Url) -> Result<Box<dyn ConsentView>, AuthError> {
        let view = ViewHandle::new();
        let task_view = view.clone();
        let client = self.client.clone();
        let relay = self.relay.clone();
        let url = url.clone();

        tokio::spawn(async move {
            match client.get(url).send().await {
                Ok(response) => {
                    let fragment = response
                        .headers()
                        .get(LOCATION)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|location| Url::parse(location).ok())
                        .and_then(|location| location.fragment().map(str::to_string));

                    match fragment {
                        Some(fragment) => {
                            let delivered = relay.deliver_fragment(&fragment);
                            debug!(delivered, "Silent authorization redirect captured");
                        }
                        None => debug!(
                            status = %response.status(),
                            "Silent authorization returned no redirect fragment"
                        ),
                    }
                }
                Err(e) => debug!(error = %e, "Silent authorization request failed"),
            }
            task_view.close();
        });

        Ok(Box::new(view))
    }
}
