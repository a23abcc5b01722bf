//! Divergent replicas: the conflict gate and each resolution

use std::sync::atomic::Ordering;

use chrono::{Duration, TimeZone, Utc};

use dutyledger_core::domain::Resolution;
use dutyledger_sync::{ResolutionOutcome, SyncError, SyncOutcome};

use crate::common::{self, entry_ids, snapshot_with, MemoryReplica, MemoryStore, PREFIX};

/// Remote holds [e1] at T1; local holds [e1, e2]
fn diverged() -> (
    std::sync::Arc<MemoryStore>,
    std::sync::Arc<MemoryReplica>,
    chrono::DateTime<Utc>,
) {
    let t1 = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let store = MemoryStore::new();
    store.seed(t1, snapshot_with(&["e1"], t1));
    let replica = MemoryReplica::new(snapshot_with(&["e1", "e2"], Utc::now()));
    (store, replica, t1)
}

#[tokio::test]
async fn test_divergence_surfaces_conflict_with_both_timestamps() {
    let (store, replica, t1) = diverged();
    let marker = t1 - Duration::hours(1);
    *replica.marker.lock().unwrap() = Some(marker);
    let mut orchestrator = common::orchestrator(&store, &replica);

    let outcome = orchestrator.sync_now().await.unwrap();
    assert_eq!(
        outcome,
        SyncOutcome::Conflict {
            local_timestamp: Some(marker),
            remote_timestamp: Some(t1),
        }
    );
    assert!(orchestrator.pending_conflict().is_some());
    assert_eq!(store.puts.load(Ordering::SeqCst), 0);
    assert_eq!(replica.applies.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_conflict_blocks_sync() {
    let (store, replica, _) = diverged();
    let mut orchestrator = common::orchestrator(&store, &replica);
    orchestrator.sync_now().await.unwrap();

    assert!(matches!(
        orchestrator.sync_now().await.unwrap_err(),
        SyncError::ConflictUnresolved
    ));
    assert_eq!(store.count(), 1);
    assert_eq!(store.puts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_clear_remote_drops_pending_conflict() {
    let (store, replica, _) = diverged();
    let mut orchestrator = common::orchestrator(&store, &replica);
    orchestrator.sync_now().await.unwrap();

    assert_eq!(orchestrator.clear_remote().await.unwrap(), 1);
    assert!(orchestrator.pending_conflict().is_none());
    assert!(orchestrator.cached_status().is_none());
    assert!(matches!(
        orchestrator.resolve(Resolution::UseCloud).await.unwrap_err(),
        SyncError::NoPendingConflict
    ));
    assert_eq!(replica.applies.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_recheck_finds_conflict_in_a_fresh_orchestrator() {
    let (store, replica, t1) = diverged();
    let mut orchestrator = common::orchestrator(&store, &replica);

    let status = orchestrator.recheck_conflict().await.unwrap().unwrap();
    assert_eq!(status.remote_timestamp, Some(t1));
    assert!(orchestrator.pending_conflict().is_some());

    assert_eq!(
        orchestrator.resolve(Resolution::Cancel).await.unwrap(),
        ResolutionOutcome::Cancelled
    );
    assert_eq!(store.puts.load(Ordering::SeqCst), 0);
    assert_eq!(replica.applies.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_recheck_on_empty_remote_writes_nothing() {
    let store = MemoryStore::new();
    let replica = MemoryReplica::new(snapshot_with(&["e1"], Utc::now()));
    let mut orchestrator = common::orchestrator(&store, &replica);

    assert!(orchestrator.recheck_conflict().await.unwrap().is_none());
    assert!(matches!(
        orchestrator.resolve(Resolution::Cancel).await.unwrap_err(),
        SyncError::NoPendingConflict
    ));
    assert_eq!(store.puts.load(Ordering::SeqCst), 0);
    assert_eq!(store.count(), 0);
    assert_eq!(replica.marker(), None);
}

#[tokio::test]
async fn test_recheck_on_unreachable_remote_is_an_error() {
    let (store, replica, _) = diverged();
    store.fail_list.store(true, Ordering::SeqCst);
    let mut orchestrator = common::orchestrator(&store, &replica);

    assert!(matches!(
        orchestrator.recheck_conflict().await.unwrap_err(),
        SyncError::RemoteIo(_)
    ));
    assert!(orchestrator.pending_conflict().is_none());
    assert_eq!(store.puts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_use_local_pushes_newer_version() {
    let (store, replica, t1) = diverged();
    let mut orchestrator = common::orchestrator(&store, &replica);
    orchestrator.sync_now().await.unwrap();

    let outcome = orchestrator.resolve(Resolution::UseLocal).await.unwrap();
    let ResolutionOutcome::Pushed { version, timestamp } = outcome else {
        panic!("expected a push, got {:?}", outcome);
    };

    assert!(timestamp > t1);
    assert_eq!(replica.marker(), Some(timestamp));
    assert_eq!(store.count(), 2, "remote history is left intact");

    let (_, latest) = orchestrator.download_remote().await.unwrap().unwrap();
    assert_eq!(entry_ids(&latest), vec!["e1", "e2"]);
    assert_eq!(version.timestamp(PREFIX), Some(timestamp));

    assert!(orchestrator.pending_conflict().is_none());
    assert_eq!(orchestrator.sync_now().await.unwrap(), SyncOutcome::UpToDate);
}

#[tokio::test]
async fn test_use_local_pushes_current_assets() {
    let (store, replica, _) = diverged();
    let mut orchestrator = common::orchestrator(&store, &replica);
    orchestrator.sync_now().await.unwrap();

    // The logo changes after the conflict was detected
    replica.snapshot.lock().unwrap().logo_asset = Some("bmV3LWxvZ28=".into());
    orchestrator.resolve(Resolution::UseLocal).await.unwrap();

    let pushed = store.snapshots().pop().unwrap();
    assert_eq!(pushed.logo_asset.as_deref(), Some("bmV3LWxvZ28="));
}

#[tokio::test]
async fn test_use_cloud_replaces_local_wholesale() {
    let (store, replica, t1) = diverged();
    let mut orchestrator = common::orchestrator(&store, &replica);
    orchestrator.sync_now().await.unwrap();

    let outcome = orchestrator.resolve(Resolution::UseCloud).await.unwrap();

    assert_eq!(outcome, ResolutionOutcome::Pulled { synced_at: t1 });
    assert_eq!(entry_ids(&replica.current()), vec!["e1"]);
    assert_eq!(replica.applies.load(Ordering::SeqCst), 1);
    assert_eq!(replica.marker(), Some(t1));
    assert_eq!(store.puts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancel_leaves_both_sides_and_clears_status() {
    let (store, replica, _) = diverged();
    let mut orchestrator = common::orchestrator(&store, &replica);
    orchestrator.sync_now().await.unwrap();

    let outcome = orchestrator.resolve(Resolution::Cancel).await.unwrap();

    assert_eq!(outcome, ResolutionOutcome::Cancelled);
    assert!(orchestrator.cached_status().is_none());
    assert!(orchestrator.pending_conflict().is_none());
    assert_eq!(entry_ids(&replica.current()), vec!["e1", "e2"]);
    assert_eq!(store.count(), 1);
    assert!(replica.marker().is_none());

    // The next sync derives the status again and finds the same conflict
    assert!(matches!(
        orchestrator.sync_now().await.unwrap(),
        SyncOutcome::Conflict { .. }
    ));
}

#[tokio::test]
async fn test_resolve_without_conflict() {
    let store = MemoryStore::new();
    let replica = MemoryReplica::new(snapshot_with(&["e1"], Utc::now()));
    let mut orchestrator = common::orchestrator(&store, &replica);

    assert!(matches!(
        orchestrator.resolve(Resolution::UseLocal).await.unwrap_err(),
        SyncError::NoPendingConflict
    ));
}

#[tokio::test]
async fn test_newer_remote_timestamp_never_wins_automatically() {
    let store = MemoryStore::new();
    let future = Utc::now() + Duration::days(365);
    store.seed(future, snapshot_with(&["remote-only"], future));
    let replica = MemoryReplica::new(snapshot_with(&["local-only"], Utc::now()));
    let mut orchestrator = common::orchestrator(&store, &replica);

    assert!(matches!(
        orchestrator.sync_now().await.unwrap(),
        SyncOutcome::Conflict { .. }
    ));
    assert_eq!(entry_ids(&replica.current()), vec!["local-only"]);
}
