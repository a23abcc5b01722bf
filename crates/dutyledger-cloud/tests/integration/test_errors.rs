//! Error mapping from provider responses

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use dutyledger_cloud::{client::DriveClient, store::DriveVersionStore};
use dutyledger_core::ports::{RemoteError, VersionStore};

use crate::common::{self, token, PREFIX};

#[tokio::test]
async fn test_status_error_carries_provider_message() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {
                "code": 403,
                "message": "The granted scopes do not give access to all of the requested spaces."
            }
        })))
        .mount(&server)
        .await;

    let err = store.list_versions(&token()).await.unwrap_err();
    assert_eq!(
        err,
        RemoteError::Status {
            status: 403,
            message: "The granted scopes do not give access to all of the requested spaces."
                .to_string(),
        }
    );
}

#[tokio::test]
async fn test_unauthorized_without_body() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = store.list_versions(&token()).await.unwrap_err();
    assert!(matches!(err, RemoteError::Status { status: 401, .. }));
    assert!(err.to_string().contains("Unauthorized"));
}

#[tokio::test]
async fn test_malformed_listing_is_invalid_response() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = store.list_versions(&token()).await.unwrap_err();
    assert!(matches!(err, RemoteError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    // Nothing listens on port 9 (discard) on a test machine
    let client = DriveClient::with_base_urls("http://127.0.0.1:9", "http://127.0.0.1:9");
    let store = DriveVersionStore::new(client, PREFIX, 100);

    let err = store.list_versions(&token()).await.unwrap_err();
    assert!(matches!(err, RemoteError::Network(_)));
}
