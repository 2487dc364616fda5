//! Configuration types for zipload

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, net::SocketAddr, path::Path, time::Duration};

/// Main configuration for the service
///
/// Loaded once at startup and shared read-only for the lifetime of the process.
/// Every field has a default, so a partial JSON file is enough.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Request and capacity limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Outbound HTTP settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Archive assembly settings
    #[serde(default)]
    pub archive: ArchiveConfig,
}

impl Config {
    /// Read and validate a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject limits that would make the service unusable
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("limits.max_sources", self.limits.max_sources),
            ("limits.max_tasks", self.limits.max_tasks),
            ("limits.max_task_files", self.limits.max_task_files),
            ("archive.queue_capacity", self.archive.queue_capacity),
        ];
        for (key, value) in checks {
            if value == 0 {
                return Err(Error::Config {
                    message: format!("{key} must be greater than zero"),
                    key: Some(key.to_string()),
                });
            }
        }
        if self.fetch.timeout.is_zero() {
            return Err(Error::Config {
                message: "fetch.timeout must be greater than zero".to_string(),
                key: Some("fetch.timeout".to_string()),
            });
        }
        Ok(())
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8080)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
        }
    }
}

/// Request and capacity limits
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// MIME types that may be placed in an archive
    #[serde(default = "default_allowed_mimes")]
    pub allowed_mimes: HashSet<String>,

    /// Maximum sources per batch request (default: 3)
    #[serde(default = "default_limit")]
    pub max_sources: usize,

    /// Maximum number of live tasks (default: 3)
    #[serde(default = "default_limit")]
    pub max_tasks: usize,

    /// Maximum sources per task (default: 3)
    #[serde(default = "default_limit")]
    pub max_task_files: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            allowed_mimes: default_allowed_mimes(),
            max_sources: default_limit(),
            max_tasks: default_limit(),
            max_task_files: default_limit(),
        }
    }
}

/// Outbound HTTP configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-source request timeout in seconds (default: 30)
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Archive assembly configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Files that may wait for the writer before producers are held back (default: 16)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Upper bound on the summed size of archived files (None = unlimited)
    #[serde(default)]
    pub max_archive_bytes: Option<u64>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_archive_bytes: None,
        }
    }
}

// Default value functions
fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_true() -> bool {
    true
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

fn default_allowed_mimes() -> HashSet<String> {
    ["image/jpeg", "image/png", "application/pdf"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_limit() -> usize {
    3
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("zipload/{}", env!("CARGO_PKG_VERSION"))
}

fn default_queue_capacity() -> usize {
    16
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_object_yields_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();

        assert_eq!(config.api.bind_address, default_bind_address());
        assert_eq!(config.limits.max_sources, 3);
        assert_eq!(config.limits.max_tasks, 3);
        assert_eq!(config.limits.max_task_files, 3);
        assert!(config.limits.allowed_mimes.contains("image/jpeg"));
        assert_eq!(config.fetch.timeout, Duration::from_secs(30));
        assert_eq!(config.archive.queue_capacity, 16);
        assert!(config.archive.max_archive_bytes.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let json = r#"{
            "limits": { "allowed_mimes": ["text/plain"], "max_task_files": 2 },
            "fetch": { "timeout": 5 }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.limits.max_task_files, 2);
        assert_eq!(config.limits.max_sources, 3, "unset field keeps default");
        assert_eq!(config.limits.allowed_mimes.len(), 1);
        assert!(config.limits.allowed_mimes.contains("text/plain"));
        assert_eq!(config.fetch.timeout, Duration::from_secs(5));
        assert!(config.fetch.user_agent.starts_with("zipload/"));
    }

    #[test]
    fn zero_limits_are_rejected_with_key() {
        let mut config = Config::default();
        config.limits.max_tasks = 0;

        match config.validate().unwrap_err() {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("limits.max_tasks")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = Config::default();
        config.fetch.timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_file_reads_and_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "api": {{ "bind_address": "0.0.0.0:9000" }}, "limits": {{ "max_sources": 10 }} }}"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.api.bind_address.port(), 9000);
        assert_eq!(config.limits.max_sources, 10);
    }

    #[test]
    fn from_file_reports_missing_file_as_config_error() {
        let err = Config::from_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn from_file_rejects_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            Config::from_file(file.path()).unwrap_err(),
            Error::Serialization(_)
        ));
    }
}
