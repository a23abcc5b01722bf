//! First sync against an empty remote, and the no-op case

use std::sync::atomic::Ordering;

use chrono::{Duration, Utc};

use dutyledger_core::ports::{AuthError, VersionStore};
use dutyledger_sync::{SyncError, SyncOrchestrator, SyncOutcome};

use crate::common::{
    self, entry_ids, snapshot_with, MemoryReplica, MemoryStore, StaticSessions, PREFIX,
};

#[tokio::test]
async fn test_bootstrap_creates_exactly_one_version() {
    let store = MemoryStore::new();
    let replica = MemoryReplica::new(snapshot_with(&["e1"], Utc::now()));
    let mut orchestrator = common::orchestrator(&store, &replica);

    let outcome = orchestrator.sync_now().await.unwrap();

    let SyncOutcome::Pushed { version, timestamp } = outcome else {
        panic!("expected a bootstrap push, got {:?}", outcome);
    };
    assert_eq!(store.count(), 1);
    assert!(version.name.starts_with(PREFIX));
    assert_eq!(version.timestamp(PREFIX), Some(timestamp));
    assert_eq!(replica.marker(), Some(timestamp));
    assert_eq!(entry_ids(&store.snapshots()[0]), vec!["e1"]);
}

#[tokio::test]
async fn test_second_sync_is_up_to_date_without_writes() {
    let store = MemoryStore::new();
    let replica = MemoryReplica::new(snapshot_with(&["e1"], Utc::now()));
    let mut orchestrator = common::orchestrator(&store, &replica);

    orchestrator.sync_now().await.unwrap();
    let outcome = orchestrator.sync_now().await.unwrap();

    assert_eq!(outcome, SyncOutcome::UpToDate);
    assert_eq!(store.puts.load(Ordering::SeqCst), 1);
    assert!(!orchestrator.cached_status().unwrap().needs_sync);
}

#[tokio::test]
async fn test_identical_data_with_different_synced_at_is_in_sync() {
    let store = MemoryStore::new();
    store.seed(
        Utc::now() - Duration::days(2),
        snapshot_with(&["e1", "e2"], Utc::now() - Duration::days(2)),
    );
    let replica = MemoryReplica::new(snapshot_with(&["e1", "e2"], Utc::now()));
    let mut orchestrator = common::orchestrator(&store, &replica);

    assert_eq!(orchestrator.sync_now().await.unwrap(), SyncOutcome::UpToDate);
    assert_eq!(store.puts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unreachable_remote_never_bootstraps() {
    let store = MemoryStore::new();
    store.fail_list.store(true, Ordering::SeqCst);
    let replica = MemoryReplica::new(snapshot_with(&["e1"], Utc::now()));
    let mut orchestrator = common::orchestrator(&store, &replica);

    let err = orchestrator.sync_now().await.unwrap_err();
    assert!(matches!(err, SyncError::RemoteIo(_)));
    assert_eq!(store.puts.load(Ordering::SeqCst), 0);

    let status = orchestrator.cached_status().unwrap();
    assert!(!status.has_remote_data);
    assert!(status.needs_sync);
    assert!(status.is_degraded());
}

#[tokio::test]
async fn test_status_reports_unknown_as_needs_attention() {
    let store = MemoryStore::new();
    store.fail_list.store(true, Ordering::SeqCst);
    let replica = MemoryReplica::new(snapshot_with(&["e1"], Utc::now()));
    let mut orchestrator = common::orchestrator(&store, &replica);

    let status = orchestrator.status().await.unwrap();
    assert!(!status.has_remote_data);
    assert!(status.needs_sync);
    assert!(status.probe_error.unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_missing_client_id_surfaces_config_error() {
    let store = MemoryStore::new();
    let replica = MemoryReplica::new(snapshot_with(&["e1"], Utc::now()));
    let mut orchestrator = SyncOrchestrator::new(
        std::sync::Arc::new(StaticSessions(Err(AuthError::NotConfigured))),
        store.clone(),
        replica,
    );

    assert!(matches!(
        orchestrator.sync_now().await.unwrap_err(),
        SyncError::AuthConfig
    ));
    assert!(store
        .list_versions(&dutyledger_core::domain::AccessToken::new("t"))
        .await
        .unwrap()
        .is_empty());
}
