//! Bulk delete of every remote version

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use dutyledger_core::ports::{RemoteError, VersionStore};

use crate::common::{self, drive_file, token};

#[tokio::test]
async fn test_delete_all_removes_every_version() {
    let (server, store) = common::setup_drive_mock().await;
    common::mount_list(
        &server,
        json!([
            drive_file("a", "dutyledger_sync_1700000100000.json"),
            drive_file("b", "dutyledger_sync_1700000200000.json")
        ]),
    )
    .await;

    Mock::given(method("DELETE"))
        .and(path("/files/a"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/files/b"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(store.delete_all(&token()).await.unwrap(), 2);
}

#[tokio::test]
async fn test_delete_all_reports_partial_failure() {
    let (server, store) = common::setup_drive_mock().await;
    common::mount_list(
        &server,
        json!([
            drive_file("a", "dutyledger_sync_1700000100000.json"),
            drive_file("b", "dutyledger_sync_1700000200000.json"),
            drive_file("c", "dutyledger_sync_1700000300000.json")
        ]),
    )
    .await;

    Mock::given(method("DELETE"))
        .and(path("/files/b"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"code": 500, "message": "Backend Error"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let err = store.delete_all(&token()).await.unwrap_err();
    match err {
        RemoteError::PartialDelete {
            deleted,
            failed,
            first_error,
        } => {
            assert_eq!(deleted, 2);
            assert_eq!(failed, 1);
            assert!(first_error.contains("Backend Error"));
        }
        other => panic!("expected PartialDelete, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_all_on_empty_folder() {
    let (server, store) = common::setup_drive_mock().await;
    common::mount_list(&server, json!([])).await;

    assert_eq!(store.delete_all(&token()).await.unwrap(), 0);
}
