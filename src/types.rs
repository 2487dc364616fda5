//! Core types for zipload

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::FetchError;

/// A file retrieved from one source, ready to be archived
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedFile {
    /// The source this file was fetched from
    pub source: String,
    /// Display name used as the archive entry name
    pub name: String,
    /// Response body
    pub content: Vec<u8>,
    /// Resolved MIME type (lower-case essence, no parameters)
    pub mime: String,
    /// HTTP status code of the response that produced `content`
    pub status: u16,
}

/// Result of fetching one source; exactly one is produced per requested source
pub type FetchOutcome = std::result::Result<FetchedFile, FetchError>;

/// Why a single source did not end up in an archive
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SourceFailure {
    /// Transport-level failure
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// The server answered with a non-success status
    #[error("server responded with HTTP {0}")]
    HttpStatus(u16),
    /// The content type is not in the allow-list
    #[error("forbidden content type {0}")]
    ForbiddenMime(String),
}

impl SourceFailure {
    /// Whether this failure is a content-type rejection
    pub fn is_forbidden_mime(&self) -> bool {
        matches!(self, SourceFailure::ForbiddenMime(_))
    }
}

/// A failure recorded against one source of a batch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceError {
    /// The source that failed
    pub source: String,
    /// What went wrong
    pub reason: SourceFailure,
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.reason)
    }
}

/// How a batch that produced an archive went
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every source was archived
    Success,
    /// Some sources failed; the archive holds the rest
    PartialSuccess {
        /// One entry per source that was left out
        errors: Vec<SourceError>,
    },
}

/// A finished batch: the archive plus how complete it is
///
/// Total failures are reported as [`crate::Error`] values instead.
#[derive(Clone, Debug)]
pub struct BatchResult {
    /// Zip archive bytes
    pub archive: Vec<u8>,
    /// Success or partial success
    pub outcome: BatchOutcome,
}

impl BatchResult {
    /// Whether some sources are missing from the archive
    pub fn is_partial(&self) -> bool {
        matches!(self.outcome, BatchOutcome::PartialSuccess { .. })
    }
}

/// Opaque identifier of an asynchronous task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Allocate a fresh random ID
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Per-source status inside a task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    /// Fetch still in flight
    Downloading,
    /// Fetched and queued for the archive
    Done,
    /// Fetch or acceptance failed
    Failed,
}

impl DownloadStatus {
    /// Whether the status can no longer change
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DownloadStatus::Downloading)
    }
}

/// Status of one tracked source
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FileStatus {
    /// The source URL
    pub url: String,
    /// Its current status
    pub status: DownloadStatus,
}

/// Point-in-time view of a task
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskSnapshot {
    /// Every tracked source, ordered by URL
    pub files: Vec<FileStatus>,
    /// Whether the archive can be downloaded
    pub ready: bool,
}
