//! Configuration module for Dutyledger.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::SessionPolicy;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Dutyledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub auth: AuthConfig,
    pub session: SessionConfig,
    pub remote: RemoteConfig,
    pub backup: BackupConfig,
    pub replica: ReplicaConfig,
    pub logging: LoggingConfig,
}

/// Identity provider (OAuth implicit grant) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// OAuth client id. `None` until the user configures one.
    pub client_id: Option<String>,
    /// Authorization endpoint of the identity provider.
    pub authorize_url: String,
    /// Endpoint returning the signed-in user's email and name.
    pub userinfo_url: String,
    /// Loopback port of the local callback relay.
    pub callback_port: u16,
    /// Minimum scopes: isolated app storage plus basic identity.
    pub scopes: Vec<String>,
}

/// Credential session timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions closer than this to expiry are not valid.
    pub validity_margin_secs: u64,
    /// Sessions closer than this to expiry are renewed silently.
    pub renewal_window_secs: u64,
    /// Seconds between background expiry checks.
    pub monitor_interval_secs: u64,
    /// Upper bound for one silent refresh.
    pub silent_refresh_timeout_secs: u64,
    /// How often an open consent view is checked for closure.
    pub view_poll_interval_ms: u64,
    /// Upper bound for one interactive authentication.
    pub interactive_timeout_secs: u64,
}

/// Remote object store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the metadata API.
    pub api_base_url: String,
    /// Base URL of the upload API.
    pub upload_base_url: String,
    /// Name prefix of this application's versions.
    pub file_prefix: String,
    /// Versions kept after a push. `None` keeps the full history.
    pub retention_keep: Option<usize>,
    /// Page size for listing.
    pub page_size: u32,
}

/// Encrypted backup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// PBKDF2 iterations for new envelopes.
    pub kdf_iterations: u32,
}

/// Location of the file-backed local replica.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicaConfig {
    pub snapshot_path: PathBuf,
    pub marker_path: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/dutyledger/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("dutyledger")
            .join("config.yaml")
    }

    /// Serialize to YAML, as written by `config init`.
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v3/userinfo".to_string(),
            callback_port: 8765,
            scopes: vec![
                "https://www.googleapis.com/auth/drive.appdata".to_string(),
                "email".to_string(),
                "profile".to_string(),
            ],
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            validity_margin_secs: 300,
            renewal_window_secs: 600,
            monitor_interval_secs: 300,
            silent_refresh_timeout_secs: 10,
            view_poll_interval_ms: 1000,
            interactive_timeout_secs: 300,
        }
    }
}

impl SessionConfig {
    /// The validity and renewal thresholds as a domain policy
    pub fn policy(&self) -> SessionPolicy {
        SessionPolicy::new(
            chrono::Duration::seconds(self.validity_margin_secs as i64),
            chrono::Duration::seconds(self.renewal_window_secs as i64),
        )
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }

    pub fn silent_refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.silent_refresh_timeout_secs)
    }

    pub fn view_poll_interval(&self) -> Duration {
        Duration::from_millis(self.view_poll_interval_ms)
    }

    pub fn interactive_timeout(&self) -> Duration {
        Duration::from_secs(self.interactive_timeout_secs)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://www.googleapis.com/drive/v3".to_string(),
            upload_base_url: "https://www.googleapis.com/upload/drive/v3".to_string(),
            file_prefix: "dutyledger_sync_".to_string(),
            retention_keep: Some(20),
            page_size: 100,
        }
    }
}

/// Iteration count for new envelopes.
pub const DEFAULT_KDF_ITERATIONS: u32 = 600_000;

/// Lowest iteration count accepted in configuration.
pub const MIN_KDF_ITERATIONS: u32 = 100_000;

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
        }
    }
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("dutyledger");
        Self {
            snapshot_path: data_dir.join("snapshot.json"),
            marker_path: data_dir.join("last_synced"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"session.monitor_interval_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn non_zero(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be greater than 0".into(),
        });
    }
}

fn http_url(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if !(value.starts_with("https://") || value.starts_with("http://")) {
        errors.push(ValidationError {
            field: field.into(),
            message: format!("must be an http(s) URL, got '{}'", value),
        });
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid. A missing
    /// `auth.client_id` is not a validation error: it is reported when
    /// authentication is attempted.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- auth ---
        if let Some(client_id) = &self.auth.client_id {
            if client_id.trim().is_empty() {
                errors.push(ValidationError {
                    field: "auth.client_id".into(),
                    message: "must not be empty when set".into(),
                });
            }
        }
        http_url(&mut errors, "auth.authorize_url", &self.auth.authorize_url);
        http_url(&mut errors, "auth.userinfo_url", &self.auth.userinfo_url);
        non_zero(
            &mut errors,
            "auth.callback_port",
            self.auth.callback_port as u64,
        );
        if self.auth.scopes.is_empty() {
            errors.push(ValidationError {
                field: "auth.scopes".into(),
                message: "at least one scope is required".into(),
            });
        }

        // --- session ---
        let s = &self.session;
        non_zero(&mut errors, "session.validity_margin_secs", s.validity_margin_secs);
        non_zero(&mut errors, "session.renewal_window_secs", s.renewal_window_secs);
        non_zero(&mut errors, "session.monitor_interval_secs", s.monitor_interval_secs);
        non_zero(
            &mut errors,
            "session.silent_refresh_timeout_secs",
            s.silent_refresh_timeout_secs,
        );
        non_zero(&mut errors, "session.view_poll_interval_ms", s.view_poll_interval_ms);
        non_zero(
            &mut errors,
            "session.interactive_timeout_secs",
            s.interactive_timeout_secs,
        );
        if s.validity_margin_secs >= s.renewal_window_secs {
            errors.push(ValidationError {
                field: "session.validity_margin_secs".into(),
                message: format!(
                    "validity_margin_secs ({}) must be less than renewal_window_secs ({})",
                    s.validity_margin_secs, s.renewal_window_secs
                ),
            });
        }

        // --- remote ---
        http_url(&mut errors, "remote.api_base_url", &self.remote.api_base_url);
        http_url(&mut errors, "remote.upload_base_url", &self.remote.upload_base_url);
        if self.remote.file_prefix.is_empty() {
            errors.push(ValidationError {
                field: "remote.file_prefix".into(),
                message: "must not be empty".into(),
            });
        } else if self.remote.file_prefix.contains('\'') {
            errors.push(ValidationError {
                field: "remote.file_prefix".into(),
                message: "must not contain quotes".into(),
            });
        }
        if self.remote.retention_keep == Some(0) {
            errors.push(ValidationError {
                field: "remote.retention_keep".into(),
                message: "must be at least 1 (omit to keep every version)".into(),
            });
        }
        if self.remote.page_size == 0 || self.remote.page_size > 1000 {
            errors.push(ValidationError {
                field: "remote.page_size".into(),
                message: "must be in range 1..=1000".into(),
            });
        }

        // --- backup ---
        if self.backup.kdf_iterations < MIN_KDF_ITERATIONS {
            errors.push(ValidationError {
                field: "backup.kdf_iterations".into(),
                message: format!("must be at least {}", MIN_KDF_ITERATIONS),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use dutyledger_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .auth_client_id("1234.apps.googleusercontent.com")
///     .remote_retention_keep(Some(50))
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- auth ---

    pub fn auth_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.auth.client_id = Some(client_id.into());
        self
    }

    pub fn auth_authorize_url(mut self, url: impl Into<String>) -> Self {
        self.config.auth.authorize_url = url.into();
        self
    }

    pub fn auth_userinfo_url(mut self, url: impl Into<String>) -> Self {
        self.config.auth.userinfo_url = url.into();
        self
    }

    pub fn auth_callback_port(mut self, port: u16) -> Self {
        self.config.auth.callback_port = port;
        self
    }

    // --- session ---

    pub fn session_validity_margin_secs(mut self, secs: u64) -> Self {
        self.config.session.validity_margin_secs = secs;
        self
    }

    pub fn session_renewal_window_secs(mut self, secs: u64) -> Self {
        self.config.session.renewal_window_secs = secs;
        self
    }

    pub fn session_monitor_interval_secs(mut self, secs: u64) -> Self {
        self.config.session.monitor_interval_secs = secs;
        self
    }

    pub fn session_silent_refresh_timeout_secs(mut self, secs: u64) -> Self {
        self.config.session.silent_refresh_timeout_secs = secs;
        self
    }

    pub fn session_interactive_timeout_secs(mut self, secs: u64) -> Self {
        self.config.session.interactive_timeout_secs = secs;
        self
    }

    // --- remote ---

    pub fn remote_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.api_base_url = url.into();
        self
    }

    pub fn remote_upload_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.upload_base_url = url.into();
        self
    }

    pub fn remote_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.remote.file_prefix = prefix.into();
        self
    }

    pub fn remote_retention_keep(mut self, keep: Option<usize>) -> Self {
        self.config.remote.retention_keep = keep;
        self
    }

    pub fn remote_page_size(mut self, size: u32) -> Self {
        self.config.remote.page_size = size;
        self
    }

    // --- backup ---

    pub fn backup_kdf_iterations(mut self, iterations: u32) -> Self {
        self.config.backup.kdf_iterations = iterations;
        self
    }

    // --- replica ---

    pub fn replica_snapshot_path(mut self, path: PathBuf) -> Self {
        self.config.replica.snapshot_path = path;
        self
    }

    pub fn replica_marker_path(mut self, path: PathBuf) -> Self {
        self.config.replica.marker_path = path;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
