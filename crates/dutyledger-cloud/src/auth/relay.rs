//! Loopback callback relay
//!
//! The implicit grant returns the token in the URL fragment, which never
//! reaches a server. The relay serves a tiny page at `/callback` whose
//! script forwards `location.hash` to `/relay`; the relay then hands the
//! parsed message to whoever registered the matching `state`.
//!
//! Each pending authorization is an async one-shot channel keyed by its
//! correlation id, so concurrent interactive and silent flows never see
//! each other's answers.

use std::{net::SocketAddr, sync::Arc};

use dashmap::DashMap;
use dutyledger_core::{domain::AccessToken, ports::AuthError};
use http_body_util::Full;
use hyper::{
    body::{Bytes, Incoming},
    header::{HeaderValue, CONTENT_TYPE},
    server::conn::http1,
    service::service_fn,
    Request, Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use tokio::{net::TcpListener, sync::oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifetime assumed when the provider omits `expires_in`
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

// ============================================================================
// AuthMessage
// ============================================================================

/// What the callback page relays back to the initiator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMessage {
    Success {
        access_token: AccessToken,
        expires_in: i64,
        email: Option<String>,
        name: Option<String>,
    },
    Error {
        error: String,
        description: Option<String>,
    },
}

/// Parses an implicit-grant fragment (or the equivalent query string)
///
/// # Returns
/// The `state` correlation id and the message, or `None` when the fragment
/// carries neither a token nor an error, or has no `state`.
pub fn parse_fragment(fragment: &str) -> Option<(String, AuthMessage)> {
    let fragment = fragment.trim_start_matches('#').trim_start_matches('?');
    let mut state = None;
    let mut access_token = None;
    let mut expires_in = None;
    let mut error = None;
    let mut description = None;
    let mut email = None;
    let mut name = None;

    for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
        let value = value.into_owned();
        match key.as_ref() {
            "state" => state = Some(value),
            "access_token" => access_token = Some(value),
            "expires_in" => expires_in = value.parse::<i64>().ok(),
            "error" => error = Some(value),
            "error_description" => description = Some(value),
            "email" => email = Some(value),
            "name" => name = Some(value),
            _ => {}
        }
    }

    let state = state.filter(|s| !s.is_empty())?;

    let message = if let Some(error) = error {
        AuthMessage::Error { error, description }
    } else {
        AuthMessage::Success {
            access_token: AccessToken::new(access_token.filter(|t| !t.is_empty())?),
            expires_in: expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
            email,
            name,
        }
    };

    Some((state, message))
}

// ============================================================================
// PendingCallback
// ============================================================================

type PendingMap = Arc<DashMap<String, oneshot::Sender<AuthMessage>>>;

/// Receiving half of one registered authorization
///
/// Dropping it unregisters the correlation id.
pub struct PendingCallback {
    state: String,
    rx: oneshot::Receiver<AuthMessage>,
    pending: PendingMap,
}

impl PendingCallback {
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Waits for the relayed message
    pub async fn recv(&mut self) -> Result<AuthMessage, AuthError> {
        (&mut self.rx)
            .await
            .map_err(|_| AuthError::Callback("callback relay shut down".to_string()))
    }

    /// Returns the message if one was already delivered
    pub fn try_recv(&mut self) -> Option<AuthMessage> {
        self.rx.try_recv().ok()
    }
}

impl Drop for PendingCallback {
    fn drop(&mut self) {
        self.pending.remove(&self.state);
    }
}

// ============================================================================
// CallbackRelay
// ============================================================================

/// Loopback HTTP server receiving implicit-grant redirects
pub struct CallbackRelay {
    addr: SocketAddr,
    pending: PendingMap,
    shutdown: CancellationToken,
}

impl CallbackRelay {
    /// Binds `127.0.0.1:port` and starts serving in the background
    ///
    /// Port 0 picks a free port, which tests use.
    pub async fn bind(port: u16) -> Result<Arc<Self>, AuthError> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| AuthError::Callback(format!("failed to bind 127.0.0.1:{}: {}", port, e)))?;
        let addr = listener
            .local_addr()
            .map_err(|e| AuthError::Callback(e.to_string()))?;

        let relay = Arc::new(Self {
            addr,
            pending: Arc::new(DashMap::new()),
            shutdown: CancellationToken::new(),
        });

        tokio::spawn(serve(
            listener,
            relay.pending.clone(),
            relay.shutdown.clone(),
        ));

        info!(%addr, "Started OAuth callback relay");
        Ok(relay)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// The `redirect_uri` to register with the provider
    pub fn redirect_uri(&self) -> String {
        format!("http://{}/callback", self.addr)
    }

    /// Registers a correlation id and returns its receiver
    pub fn register(&self, state: &str) -> PendingCallback {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(state.to_string(), tx);
        PendingCallback {
            state: state.to_string(),
            rx,
            pending: self.pending.clone(),
        }
    }

    /// Routes a message to the registered receiver
    ///
    /// # Returns
    /// `false` when no authorization is waiting for `state`
    pub fn deliver(&self, state: &str, message: AuthMessage) -> bool {
        deliver(&self.pending, state, message)
    }

    /// Parses a fragment and routes it
    pub fn deliver_fragment(&self, fragment: &str) -> bool {
        match parse_fragment(fragment) {
            Some((state, message)) => self.deliver(&state, message),
            None => false,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for CallbackRelay {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn deliver(pending: &PendingMap, state: &str, message: AuthMessage) -> bool {
    match pending.remove(state) {
        Some((_, tx)) => tx.send(message).is_ok(),
        None => {
            warn!("Dropping authorization callback with unknown state");
            false
        }
    }
}

async fn serve(listener: TcpListener, pending: PendingMap, shutdown: CancellationToken) {
    loop {
        let stream = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => stream,
                Err(e) => {
                    warn!(error = %e, "Callback relay accept failed");
                    continue;
                }
            },
        };

        let pending = pending.clone();
        let service = service_fn(move |req: Request<Incoming>| {
            let pending = pending.clone();
            async move { Ok::<_, hyper::Error>(handle(&req, &pending)) }
        });

        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!(error = %e, "Callback relay connection error");
            }
        });
    }
    debug!("Callback relay stopped");
}

fn handle(req: &Request<Incoming>, pending: &PendingMap) -> Response<Full<Bytes>> {
    let query = req.uri().query().unwrap_or_default();

    match req.uri().path() {
        "/callback" => html(StatusCode::OK, callback_html()),
        "/relay" => match parse_fragment(query) {
            Some((state, message)) => {
                let failed = matches!(message, AuthMessage::Error { .. });
                if !deliver(pending, &state, message) {
                    html(StatusCode::GONE, result_html("This sign-in request has expired."))
                } else if failed {
                    html(StatusCode::OK, result_html("Sign-in was not completed."))
                } else {
                    html(
                        StatusCode::OK,
                        result_html("Signed in. You can close this window."),
                    )
                }
            }
            None => html(
                StatusCode::BAD_REQUEST,
                result_html("Missing authorization response."),
            ),
        },
        _ => html(StatusCode::NOT_FOUND, result_html("Not found.")),
    }
}

fn html(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

/// Page served at the redirect URI; forwards the fragment to `/relay`
fn callback_html() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>Dutyledger - Signing in</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <p id="status">Completing sign-in...</p>
    <script>
        var fragment = window.location.hash.substring(1);
        fetch('/relay?' + fragment)
            .then(function (r) { return r.text(); })
            .then(function (page) { document.open(); document.write(page); document.close(); })
            .catch(function () { document.getElementById('status').textContent = 'Sign-in failed.'; });
        setTimeout(function () { window.close(); }, 3000);
    </script>
</body>
</html>"#
        .to_string()
}

fn result_html(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Dutyledger</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Dutyledger</h1>
    <p>{}</p>
</body>
</html>"#,
        message
    )
}
