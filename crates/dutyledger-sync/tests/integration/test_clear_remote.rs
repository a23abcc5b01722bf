//! Clearing every remote version, including partial failure

use chrono::Utc;

use dutyledger_core::ports::RemoteError;
use dutyledger_sync::SyncError;

use crate::common::{self, snapshot_with, MemoryReplica, MemoryStore};

#[tokio::test]
async fn test_clear_then_status_has_no_remote_data() {
    let store = MemoryStore::new();
    let replica = MemoryReplica::new(snapshot_with(&["e1"], Utc::now()));
    let mut orchestrator = common::orchestrator(&store, &replica);

    orchestrator.sync_now().await.unwrap();
    orchestrator.status().await.unwrap();
    assert!(orchestrator.cached_status().unwrap().has_remote_data);

    assert_eq!(orchestrator.clear_remote().await.unwrap(), 1);
    assert!(orchestrator.cached_status().is_none());
    assert!(!orchestrator.status().await.unwrap().has_remote_data);
}

#[tokio::test]
async fn test_partial_delete_is_not_rolled_back() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let a = store.seed(now, snapshot_with(&["e1"], now));
    store.seed(now + chrono::Duration::seconds(1), snapshot_with(&["e1"], now));
    store.seed(now + chrono::Duration::seconds(2), snapshot_with(&["e1"], now));
    store.fail_deletes_of(&a.id);

    let replica = MemoryReplica::new(snapshot_with(&["e1"], now));
    let mut orchestrator = common::orchestrator(&store, &replica);
    orchestrator.status().await.unwrap();

    let err = orchestrator.clear_remote().await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::RemoteIo(RemoteError::PartialDelete {
            deleted: 2,
            failed: 1,
            ..
        })
    ));
    assert_eq!(store.count(), 1);
    assert!(orchestrator.cached_status().is_none());
}

#[tokio::test]
async fn test_download_from_empty_remote() {
    let store = MemoryStore::new();
    let replica = MemoryReplica::new(snapshot_with(&["e1"], Utc::now()));
    let mut orchestrator = common::orchestrator(&store, &replica);

    assert!(orchestrator.download_remote().await.unwrap().is_none());
}
