//! Listing: paging, prefix filtering, latest-by-name

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use dutyledger_core::ports::VersionStore;

use crate::common::{self, drive_file, token, PREFIX};

#[tokio::test]
async fn test_list_follows_page_tokens() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [drive_file("c", "dutyledger_sync_1700000300000.json")]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .and(header("authorization", "Bearer test-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                drive_file("a", "dutyledger_sync_1700000100000.json"),
                drive_file("b", "dutyledger_sync_1700000200000.json")
            ],
            "nextPageToken": "page-2"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let versions = store.list_versions(&token()).await.expect("list failed");
    let ids: Vec<_> = versions.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(versions[0].size_bytes, Some(512));
}

#[tokio::test]
async fn test_list_sends_prefix_query() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param(
            "q",
            format!("name contains '{}' and trashed = false", PREFIX).as_str(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": [] })))
        .expect(1)
        .mount(&server)
        .await;

    assert!(store.list_versions(&token()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_drops_names_that_only_contain_the_prefix() {
    let (server, store) = common::setup_drive_mock().await;
    common::mount_list(
        &server,
        json!([
            drive_file("keep", "dutyledger_sync_1700000000000.json"),
            drive_file("drop", "old_dutyledger_sync_1700000000000.json")
        ]),
    )
    .await;

    let versions = store.list_versions(&token()).await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].id, "keep");
}

#[tokio::test]
async fn test_find_latest_orders_by_name_not_modified_time() {
    let (server, store) = common::setup_drive_mock().await;
    common::mount_list(
        &server,
        json!([
            {
                "id": "newer-name",
                "name": "dutyledger_sync_1700000900000.json",
                "modifiedTime": "2020-01-01T00:00:00.000Z"
            },
            {
                "id": "newer-mtime",
                "name": "dutyledger_sync_1700000100000.json",
                "modifiedTime": "2030-01-01T00:00:00.000Z"
            },
            drive_file("junk", "dutyledger_sync_notanumber.json")
        ]),
    )
    .await;

    let (latest, ts) = store.find_latest(&token()).await.unwrap().unwrap();
    assert_eq!(latest.id, "newer-name");
    assert_eq!(ts.timestamp_millis(), 1_700_000_900_000);
}

#[tokio::test]
async fn test_find_latest_on_empty_folder() {
    let (server, store) = common::setup_drive_mock().await;
    common::mount_list(&server, json!([])).await;

    assert!(store.find_latest(&token()).await.unwrap().is_none());
}
