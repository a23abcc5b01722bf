//! Prompt-less renewal through the headless surface and callback relay

use std::{sync::Arc, time::Duration};

use chrono::{Duration as ChronoDuration, Utc};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dutyledger_cloud::auth::{
    CallbackRelay, ConsentSurface, CredentialSessionManager, HeadlessSurface,
};
use dutyledger_core::{
    config::Config,
    domain::{AccessToken, CredentialSession, Identity},
};

use crate::common::ImplicitRedirect;

fn expiring_session() -> CredentialSession {
    CredentialSession::new(
        AccessToken::new("old-token"),
        Identity::new("dana@example.com", "Dana"),
        Utc::now() + ChronoDuration::minutes(8),
    )
}

async fn manager_for(server: &MockServer) -> CredentialSessionManager {
    let mut config = Config::default();
    config.auth.client_id = Some("test-client".to_string());
    config.auth.authorize_url = format!("{}/o/oauth2/v2/auth", server.uri());
    config.auth.userinfo_url = format!("{}/userinfo", server.uri());
    config.session.silent_refresh_timeout_secs = 2;
    config.session.view_poll_interval_ms = 20;

    let relay = CallbackRelay::bind(0).await.expect("bind relay");
    let headless: Arc<dyn ConsentSurface> =
        Arc::new(HeadlessSurface::new(relay.clone()).expect("headless client"));
    CredentialSessionManager::new(
        &config.auth,
        &config.session,
        relay,
        headless.clone(),
        headless,
    )
    .expect("manager")
}

#[tokio::test]
async fn test_silent_refresh_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/o/oauth2/v2/auth"))
        .and(query_param("response_type", "token"))
        .and(query_param("prompt", "none"))
        .and(query_param("login_hint", "dana@example.com"))
        .respond_with(ImplicitRedirect {
            access_token: "renewed-token",
            expires_in: 3600,
        })
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager_for(&server).await;
    let renewed = manager
        .refresh_silently(&expiring_session())
        .await
        .expect("silent refresh returned None");

    assert_eq!(renewed.access_token().secret(), "renewed-token");
    assert_eq!(renewed.identity().email, "dana@example.com");
    assert!(renewed.expires_at() > Utc::now() + ChronoDuration::minutes(55));
}

#[tokio::test]
async fn test_silent_refresh_provider_error_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/o/oauth2/v2/auth"))
        .respond_with(|request: &wiremock::Request| {
            let state = request
                .url
                .query_pairs()
                .find(|(k, _)| k == "state")
                .map(|(_, v)| v.into_owned())
                .unwrap_or_default();
            let redirect = request
                .url
                .query_pairs()
                .find(|(k, _)| k == "redirect_uri")
                .map(|(_, v)| v.into_owned())
                .unwrap_or_default();
            ResponseTemplate::new(302).insert_header(
                "Location",
                format!("{}#error=login_required&state={}", redirect, state).as_str(),
            )
        })
        .mount(&server)
        .await;

    let manager = manager_for(&server).await;
    assert!(manager.refresh_silently(&expiring_session()).await.is_none());
}

#[tokio::test]
async fn test_silent_refresh_without_redirect_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/o/oauth2/v2/auth"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>consent</html>"))
        .mount(&server)
        .await;

    let manager = manager_for(&server).await;
    let started = std::time::Instant::now();
    assert!(manager.refresh_silently(&expiring_session()).await.is_none());
    // The closed headless view ends the wait well before the timeout
    assert!(started.elapsed() < Duration::from_secs(2));
}
