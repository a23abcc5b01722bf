//! Remote version naming
//!
//! Every push creates a new object named `prefix + millis + ".json"`.
//! The embedded millisecond timestamp is the only ordering the engine
//! trusts; server-reported modification times may be skewed or normalized
//! by the provider.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

const VERSION_SUFFIX: &str = ".json";

// ============================================================================
// VersionName
// ============================================================================

/// A parsed remote object name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionName {
    prefix: String,
    timestamp_millis: i64,
}

impl VersionName {
    /// Builds the name for a version created at `created_at`
    pub fn at(prefix: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            prefix: prefix.into(),
            timestamp_millis: created_at.timestamp_millis(),
        }
    }

    /// Parses `name`, which must be `prefix` followed by decimal millis and `.json`
    pub fn parse(name: &str, prefix: &str) -> Result<Self, DomainError> {
        let digits = name
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(VERSION_SUFFIX))
            .ok_or_else(|| DomainError::InvalidVersionName(name.to_string()))?;

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::InvalidVersionName(name.to_string()));
        }

        let timestamp_millis = digits
            .parse::<i64>()
            .map_err(|_| DomainError::InvalidVersionName(name.to_string()))?;

        Ok(Self {
            prefix: prefix.to_string(),
            timestamp_millis,
        })
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp_millis
    }

    /// The embedded creation instant
    pub fn timestamp(&self) -> Result<DateTime<Utc>, DomainError> {
        Utc.timestamp_millis_opt(self.timestamp_millis)
            .single()
            .ok_or_else(|| DomainError::InvalidTimestamp(self.timestamp_millis.to_string()))
    }
}

impl std::fmt::Display for VersionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.prefix, self.timestamp_millis, VERSION_SUFFIX)
    }
}

// ============================================================================
// RemoteVersion
// ============================================================================

/// One immutable object in the app-isolated remote folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteVersion {
    /// Provider-assigned object id
    pub id: String,
    /// Object name, `prefix + millis + ".json"`
    pub name: String,
    /// Server-reported modification time (informational only)
    pub modified_time: Option<DateTime<Utc>>,
    /// Object size in bytes, when reported
    pub size_bytes: Option<u64>,
}

impl RemoteVersion {
    /// Parses the embedded name timestamp
    pub fn version_name(&self, prefix: &str) -> Result<VersionName, DomainError> {
        VersionName::parse(&self.name, prefix)
    }

    /// The embedded creation instant, if the name is well formed
    pub fn timestamp(&self, prefix: &str) -> Option<DateTime<Utc>> {
        self.version_name(prefix).ok()?.timestamp().ok()
    }
}

/// Returns the version with the greatest embedded timestamp
///
/// Names that do not parse are ignored. Ties keep the first occurrence.
pub fn find_latest<'a>(
    versions: &'a [RemoteVersion],
    prefix: &str,
) -> Option<(&'a RemoteVersion, DateTime<Utc>)> {
    let mut latest: Option<(&RemoteVersion, DateTime<Utc>)> = None;

    for version in versions {
        let Some(ts) = version.timestamp(prefix) else {
            continue;
        };
        match latest {
            Some((_, best)) if best >= ts => {}
            _ => latest = Some((version, ts)),
        }
    }

    latest
}

/// Orders versions oldest first by embedded timestamp, dropping unparsable names
pub fn sort_by_timestamp<'a>(
    versions: &'a [RemoteVersion],
    prefix: &str,
) -> Vec<(&'a RemoteVersion, DateTime<Utc>)> {
    let mut dated: Vec<_> = versions
        .iter()
        .filter_map(|v| v.timestamp(prefix).map(|ts| (v, ts)))
        .collect();
    dated.sort_by_key(|(_, ts)| *ts);
    dated
}
