//! In-memory fakes for the sync ports

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};

use dutyledger_core::{
    domain::{AccessToken, CredentialSession, Identity, RemoteVersion, Snapshot, VersionName},
    ports::{AuthError, LocalReplica, RemoteError, SessionSource, VersionStore},
};
use dutyledger_sync::SyncOrchestrator;

pub const PREFIX: &str = "dutyledger_sync_";

// ============================================================================
// Remote store
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    versions: Mutex<Vec<(RemoteVersion, Snapshot)>>,
    last_millis: Mutex<i64>,
    next_id: AtomicUsize,
    pub failing_deletes: Mutex<HashSet<String>>,
    pub fail_list: AtomicBool,
    pub puts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seeds a version stamped `at`
    pub fn seed(&self, at: DateTime<Utc>, snapshot: Snapshot) -> RemoteVersion {
        let version = RemoteVersion {
            id: format!("seed-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            name: VersionName::at(PREFIX, at).to_string(),
            modified_time: Some(at),
            size_bytes: None,
        };
        let mut last = self.last_millis.lock().unwrap();
        *last = (*last).max(at.timestamp_millis());
        self.versions.lock().unwrap().push((version.clone(), snapshot));
        version
    }

    pub fn count(&self) -> usize {
        self.versions.lock().unwrap().len()
    }

    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.versions
            .lock()
            .unwrap()
            .iter()
            .map(|(_, s)| s.clone())
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.versions
            .lock()
            .unwrap()
            .iter()
            .map(|(v, _)| v.name.clone())
            .collect()
    }

    pub fn fail_deletes_of(&self, id: &str) {
        self.failing_deletes.lock().unwrap().insert(id.to_string());
    }

    fn unavailable() -> RemoteError {
        RemoteError::Network("connection refused".into())
    }
}

#[async_trait::async_trait]
impl VersionStore for MemoryStore {
    fn prefix(&self) -> &str {
        PREFIX
    }

    async fn list_versions(&self, _: &AccessToken) -> Result<Vec<RemoteVersion>, RemoteError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(self
            .versions
            .lock()
            .unwrap()
            .iter()
            .map(|(v, _)| v.clone())
            .collect())
    }

    async fn fetch(&self, _: &AccessToken, version: &RemoteVersion) -> Result<Snapshot, RemoteError> {
        self.versions
            .lock()
            .unwrap()
            .iter()
            .find(|(v, _)| v.id == version.id)
            .map(|(_, s)| s.clone())
            .ok_or_else(|| RemoteError::Status {
                status: 404,
                message: format!("File not found: {}", version.id),
            })
    }

    async fn put(&self, _: &AccessToken, snapshot: &Snapshot) -> Result<RemoteVersion, RemoteError> {
        self.puts.fetch_add(1, Ordering::SeqCst);

        // Strictly increasing names even within one millisecond
        let millis = {
            let mut last = self.last_millis.lock().unwrap();
            *last = (*last + 1).max(Utc::now().timestamp_millis());
            *last
        };
        let at = Utc.timestamp_millis_opt(millis).unwrap();
        let version = RemoteVersion {
            id: format!("v-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            name: VersionName::at(PREFIX, at).to_string(),
            modified_time: Some(at),
            size_bytes: None,
        };
        self.versions
            .lock()
            .unwrap()
            .push((version.clone(), snapshot.clone()));
        Ok(version)
    }

    async fn delete(&self, _: &AccessToken, version: &RemoteVersion) -> Result<(), RemoteError> {
        if self.failing_deletes.lock().unwrap().contains(&version.id) {
            return Err(RemoteError::Status {
                status: 500,
                message: "Backend Error".into(),
            });
        }
        self.versions.lock().unwrap().retain(|(v, _)| v.id != version.id);
        Ok(())
    }
}

// ============================================================================
// Local replica
// ============================================================================

pub struct MemoryReplica {
    pub snapshot: Mutex<Snapshot>,
    pub marker: Mutex<Option<DateTime<Utc>>>,
    pub applies: AtomicUsize,
}

impl MemoryReplica {
    pub fn new(snapshot: Snapshot) -> Arc<Self> {
        Arc::new(Self {
            snapshot: Mutex::new(snapshot),
            marker: Mutex::new(None),
            applies: AtomicUsize::new(0),
        })
    }

    pub fn marker(&self) -> Option<DateTime<Utc>> {
        *self.marker.lock().unwrap()
    }

    pub fn current(&self) -> Snapshot {
        self.snapshot.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LocalReplica for MemoryReplica {
    async fn get_snapshot(&self) -> anyhow::Result<Snapshot> {
        Ok(self.current())
    }

    async fn apply_snapshot(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        self.applies.fetch_add(1, Ordering::SeqCst);
        *self.snapshot.lock().unwrap() = snapshot.clone();
        Ok(())
    }

    async fn last_synced_marker(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        Ok(self.marker())
    }

    async fn set_last_synced_marker(&self, at: DateTime<Utc>) -> anyhow::Result<()> {
        *self.marker.lock().unwrap() = Some(at);
        Ok(())
    }
}

// ============================================================================
// Sessions
// ============================================================================

pub struct StaticSessions(pub Result<CredentialSession, AuthError>);

impl StaticSessions {
    pub fn signed_in() -> Arc<Self> {
        Arc::new(Self(Ok(CredentialSession::new(
            AccessToken::new("test-access-token"),
            Identity::new("dana@example.com", "Dana"),
            Utc::now() + Duration::hours(1),
        ))))
    }
}

#[async_trait::async_trait]
impl SessionSource for StaticSessions {
    async fn valid_session(&self) -> Result<CredentialSession, AuthError> {
        self.0.clone()
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn entry(id: &str) -> Value {
    json!({"id": id, "date": "2026-03-01", "km": 42})
}

/// A snapshot holding `entries`
pub fn snapshot_with(entries: &[&str], synced_at: DateTime<Utc>) -> Snapshot {
    let mut snapshot = Snapshot::empty(synced_at);
    snapshot.company_info = json!({"name": "Acme Haulage"});
    snapshot.entries = entries.iter().map(|id| entry(id)).collect();
    snapshot
}

pub fn entry_ids(snapshot: &Snapshot) -> Vec<String> {
    snapshot
        .entries
        .iter()
        .filter_map(|e| e["id"].as_str().map(str::to_string))
        .collect()
}

pub fn orchestrator(store: &Arc<MemoryStore>, replica: &Arc<MemoryReplica>) -> SyncOrchestrator {
    SyncOrchestrator::new(StaticSessions::signed_in(), store.clone(), replica.clone())
}
