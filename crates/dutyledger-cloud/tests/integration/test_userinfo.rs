//! Userinfo lookup after interactive sign-in

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dutyledger_cloud::auth::UserInfoClient;
use dutyledger_core::ports::AuthError;

use crate::common::token;

#[tokio::test]
async fn test_fetch_identity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", "Bearer test-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "1",
            "email": "dana@example.com",
            "name": "Dana Driver"
        })))
        .mount(&server)
        .await;

    let client = UserInfoClient::new(format!("{}/userinfo", server.uri()));
    let identity = client.fetch(&token()).await.unwrap();
    assert_eq!(identity.email, "dana@example.com");
    assert_eq!(identity.display_name, "Dana Driver");
}

#[tokio::test]
async fn test_display_name_falls_back_to_email() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"email": "dana@example.com"})),
        )
        .mount(&server)
        .await;

    let client = UserInfoClient::new(format!("{}/userinfo", server.uri()));
    let identity = client.fetch(&token()).await.unwrap();
    assert_eq!(identity.display_name, "dana@example.com");
}

#[tokio::test]
async fn test_rejected_token_is_identity_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = UserInfoClient::new(format!("{}/userinfo", server.uri()));
    let err = client.fetch(&token()).await.unwrap_err();
    assert!(matches!(err, AuthError::Identity(_)));
}
