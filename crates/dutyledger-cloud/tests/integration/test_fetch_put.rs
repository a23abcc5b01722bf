//! Download and append-only upload

use chrono::{TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{header_regex, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use dutyledger_core::{
    domain::{RemoteVersion, Snapshot},
    ports::{RemoteError, VersionStore},
};

use crate::common::{self, token, PREFIX};

fn version(id: &str) -> RemoteVersion {
    RemoteVersion {
        id: id.to_string(),
        name: format!("{}1700000000000.json", PREFIX),
        modified_time: None,
        size_bytes: None,
    }
}

#[tokio::test]
async fn test_fetch_decodes_snapshot() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files/file-1"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "companyInfo": {"name": "Acme Haulage"},
            "vehicles": [{"plate": "AB-123"}],
            "entries": [],
            "syncedAt": "2026-03-01T12:00:00Z"
        })))
        .mount(&server)
        .await;

    let snapshot = store.fetch(&token(), &version("file-1")).await.unwrap();
    assert_eq!(snapshot.company_info["name"], "Acme Haulage");
    assert_eq!(snapshot.vehicles.len(), 1);
    assert_eq!(
        snapshot.synced_at,
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn test_fetch_rejects_non_snapshot_body() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files/file-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = store.fetch(&token(), &version("file-1")).await.unwrap_err();
    assert!(matches!(err, RemoteError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_put_creates_new_named_version() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("POST"))
        .and(path("/upload/files"))
        .and(query_param("uploadType", "multipart"))
        .and(header_regex("content-type", "^multipart/related; boundary=.+"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "created-1",
            "name": "dutyledger_sync_1760000000000.json",
            "modifiedTime": "2026-10-09T08:53:20.000Z",
            "size": "321"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let before = Utc::now();
    let snapshot = Snapshot::empty(before);
    let created = store.put(&token(), &snapshot).await.unwrap();
    assert_eq!(created.id, "created-1");

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    assert!(body.contains(r#""parents":["appDataFolder"]"#));
    assert!(body.contains(r#""syncedAt""#));

    // The metadata part names the object from the push time
    let name_start = body.find(PREFIX).unwrap();
    let millis: i64 = body[name_start + PREFIX.len()..]
        .split(".json")
        .next()
        .unwrap()
        .parse()
        .unwrap();
    assert!(millis >= before.timestamp_millis());
}
