//! Backup files
//!
//! A backup is the JSON [`Snapshot`], optionally sealed in an
//! [`EncryptedEnvelope`]. Import detects which of the two it was given; an
//! envelope's `formatVersion` is checked before any key derivation.

use dutyledger_core::domain::Snapshot;
use dutyledger_crypto::{EncryptedEnvelope, EnvelopeCipher};
use serde_json::Value;
use tracing::{debug, info};

use crate::SyncError;

/// Serializes `snapshot` for export
///
/// # Arguments
/// * `snapshot` - State to export, assets included
/// * `password` - Seals the file when present
/// * `cipher` - Encryption settings for new envelopes
pub fn export_backup(
    snapshot: &Snapshot,
    password: Option<&str>,
    cipher: &EnvelopeCipher,
) -> Result<Vec<u8>, SyncError> {
    match password {
        Some(password) => {
            if password.is_empty() {
                return Err(SyncError::Backup("password must not be empty".to_string()));
            }
            let envelope = cipher.encrypt(snapshot, password)?;
            info!(iterations = cipher.iterations(), "Exported encrypted backup");
            Ok(envelope.to_json_pretty()?.into_bytes())
        }
        None => {
            let json = serde_json::to_vec_pretty(snapshot)
                .map_err(|e| SyncError::Backup(e.to_string()))?;
            info!("Exported plain backup");
            Ok(json)
        }
    }
}

/// True when `bytes` hold an encrypted envelope rather than a plain snapshot
pub fn is_encrypted(bytes: &[u8]) -> bool {
    serde_json::from_slice::<Value>(bytes)
        .map(|value| EncryptedEnvelope::is_envelope(&value))
        .unwrap_or(false)
}

/// Reads a backup file produced by [`export_backup`]
///
/// # Errors
/// - [`SyncError::PasswordRequired`] for an envelope without a password
/// - [`SyncError::Decryption`] for a wrong password or tampered file
/// - [`SyncError::Backup`] for anything that is neither format
pub fn import_backup(bytes: &[u8], password: Option<&str>) -> Result<Snapshot, SyncError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| SyncError::Backup(format!("not a JSON document: {}", e)))?;

    if EncryptedEnvelope::is_envelope(&value) {
        let password = password
            .filter(|p| !p.is_empty())
            .ok_or(SyncError::PasswordRequired)?;
        let envelope: EncryptedEnvelope = serde_json::from_value(value)
            .map_err(|e| SyncError::Backup(format!("malformed envelope: {}", e)))?;

        debug!(
            format_version = envelope.format_version,
            iterations = envelope.kdf.iterations,
            "Opening encrypted backup"
        );
        // Decryption reads the iteration count from the envelope itself
        let snapshot: Snapshot = EnvelopeCipher::default().decrypt(&envelope, password)?;
        return Ok(snapshot);
    }

    serde_json::from_value(value).map_err(|e| SyncError::Backup(format!("not a snapshot: {}", e)))
}
