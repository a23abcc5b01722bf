//! Snapshot value object
//!
//! A snapshot is the complete serialized application state exchanged with the
//! local replica. The sync engine carries the business collections as opaque
//! JSON values and never looks inside them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::errors::DomainError;

/// Complete application state at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub company_info: Value,
    #[serde(default)]
    pub user_profile: Value,
    #[serde(default)]
    pub vehicles: Vec<Value>,
    #[serde(default)]
    pub clients: Vec<Value>,
    #[serde(default)]
    pub entries: Vec<Value>,
    #[serde(default)]
    pub invoices: Vec<Value>,
    #[serde(default)]
    pub backup_config: Value,
    #[serde(default)]
    pub branding_complete: bool,
    /// Encoded logo image (opaque)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_asset: Option<String>,
    /// Encoded signature image (opaque)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_asset: Option<String>,
    /// When the local replica produced this snapshot
    pub synced_at: DateTime<Utc>,
}

impl Snapshot {
    /// Creates an empty snapshot stamped with `synced_at`
    pub fn empty(synced_at: DateTime<Utc>) -> Self {
        Self {
            company_info: Value::Null,
            user_profile: Value::Null,
            vehicles: Vec::new(),
            clients: Vec::new(),
            entries: Vec::new(),
            invoices: Vec::new(),
            backup_config: Value::Null,
            branding_complete: false,
            logo_asset: None,
            signature_asset: None,
            synced_at,
        }
    }

    /// Decodes a snapshot from JSON bytes
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, DomainError> {
        serde_json::from_slice(bytes).map_err(|e| DomainError::MalformedSnapshot(e.to_string()))
    }

    /// Encodes the snapshot as JSON bytes
    pub fn to_json_vec(&self) -> Result<Vec<u8>, DomainError> {
        serde_json::to_vec(self).map_err(|e| DomainError::MalformedSnapshot(e.to_string()))
    }

    /// The business fields only, as one JSON object
    ///
    /// `synced_at` and the binary asset payloads are excluded so that
    /// re-exports and re-encoded images do not register as divergence.
    pub fn domain_fields(&self) -> Value {
        json!({
            "companyInfo": self.company_info,
            "userProfile": self.user_profile,
            "vehicles": self.vehicles,
            "clients": self.clients,
            "entries": self.entries,
            "invoices": self.invoices,
            "backupConfig": self.backup_config,
            "brandingComplete": self.branding_complete,
        })
    }

    /// Returns a copy re-stamped with `synced_at`
    pub fn with_synced_at(mut self, synced_at: DateTime<Utc>) -> Self {
        self.synced_at = synced_at;
        self
    }
}
