//! Error types for zipload
//!
//! This module provides the error taxonomy for the service:
//! - Domain-specific error types (fetching, archiving, task tracking)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use crate::types::{SourceError, TaskId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for zipload operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for zipload
///
/// Per-source failures inside a batch are not surfaced through this type; they are
/// collected as [`SourceError`]s and only become an `Error` when no source succeeded.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "limits.max_sources")
        key: Option<String>,
    },

    /// Request body could not be parsed
    #[error("malformed request: {0}")]
    MalformedInput(String),

    /// Task identifier is not a valid UUID
    #[error("malformed task ID: {0}")]
    MalformedId(String),

    /// More sources were requested than a batch may contain
    #[error("too many sources: {requested} requested, at most {max} allowed")]
    TooManySources {
        /// Number of sources in the request
        requested: usize,
        /// Configured maximum
        max: usize,
    },

    /// Every source was rejected because of its content type
    #[error("all sources had a forbidden content type")]
    ForbiddenContentType {
        /// The rejected MIME types, in arrival order
        mimes: Vec<String>,
    },

    /// No source could be downloaded
    #[error("all {} sources failed to download", .errors.len())]
    AllDownloadsFailed {
        /// One entry per failed source
        errors: Vec<SourceError>,
    },

    /// Task tracking error
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    /// Archive assembly failed
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// The operation was cancelled before it completed
    #[error("operation cancelled")]
    Cancelled,

    /// Shutdown in progress - not accepting new work
    #[error("shutdown in progress: not accepting new work")]
    ShuttingDown,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

/// Errors raised while fetching one source
///
/// Messages are kept as strings so outcomes can be cloned and reported after the
/// underlying transport error is gone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The source is not a usable URL
    #[error("invalid source URL {url}: {reason}")]
    InvalidUrl {
        /// The offending source
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// The request exceeded the configured timeout
    #[error("timed out fetching {url}")]
    Timeout {
        /// The source being fetched
        url: String,
    },

    /// The remote host could not be reached
    #[error("connection failed for {url}: {reason}")]
    Connect {
        /// The source being fetched
        url: String,
        /// Transport error message
        reason: String,
    },

    /// Any other transport failure
    #[error("request to {url} failed: {reason}")]
    Request {
        /// The source being fetched
        url: String,
        /// Transport error message
        reason: String,
    },

    /// The response body could not be read to completion
    #[error("failed to read response body from {url}: {reason}")]
    Body {
        /// The source being fetched
        url: String,
        /// Transport error message
        reason: String,
    },

    /// The fetch was abandoned because its batch was cancelled
    #[error("fetch of {url} was cancelled")]
    Cancelled {
        /// The source being fetched
        url: String,
    },
}

impl FetchError {
    /// The source this error refers to
    pub fn url(&self) -> &str {
        match self {
            FetchError::InvalidUrl { url, .. }
            | FetchError::Timeout { url }
            | FetchError::Connect { url, .. }
            | FetchError::Request { url, .. }
            | FetchError::Body { url, .. }
            | FetchError::Cancelled { url } => url,
        }
    }
}

/// Archive pipeline errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchiveError {
    /// The zip writer failed on an entry
    #[error("failed to write entry {name}: {reason}")]
    Write {
        /// Entry name
        name: String,
        /// Writer error message
        reason: String,
    },

    /// Closing the zip container failed
    #[error("failed to finalize archive: {0}")]
    Finalize(String),

    /// Adding an entry would exceed the configured archive size
    #[error("archive would exceed {limit} bytes while adding {name}")]
    TooLarge {
        /// Entry that did not fit
        name: String,
        /// Configured byte limit
        limit: u64,
    },

    /// The writer worker stopped after an earlier failure
    #[error("archive writer has stopped after a failure")]
    WorkerFailed,

    /// The writer worker panicked or was aborted
    #[error("archive writer terminated unexpectedly: {0}")]
    WorkerLost(String),

    /// The pipeline no longer accepts files
    #[error("archive is closed to new files")]
    Closed,

    /// `finish` was already called on this pipeline
    #[error("archive was already finished")]
    AlreadyFinished,

    /// Waiting for the archive was cancelled
    #[error("archive finalization cancelled")]
    Cancelled,
}

/// Task registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// No task with this ID exists (never created, or already retrieved)
    #[error("task {id} not found")]
    NotFound {
        /// The requested task ID
        id: TaskId,
    },

    /// The registry already holds the maximum number of tasks
    #[error("maximum number of tasks ({max}) reached")]
    TooManyTasks {
        /// Configured maximum
        max: usize,
    },

    /// The task already tracks the maximum number of files
    #[error("task {id} already holds the maximum of {max} files")]
    TooManyFiles {
        /// The task that is full
        id: TaskId,
        /// Configured maximum
        max: usize,
    },
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "task_not_found",
///     "message": "task error: task 5f0c... not found",
///     "details": {
///       "task_id": "5f0c..."
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "task_not_found", "forbidden_content_type")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input or limits)
            Error::Config { .. } => 400,
            Error::MalformedInput(_) => 400,
            Error::MalformedId(_) => 400,
            Error::TooManySources { .. } => 400,
            Error::ForbiddenContentType { .. } => 400,
            Error::Task(TaskError::TooManyFiles { .. }) => 400,

            // 404 Not Found
            Error::Task(TaskError::NotFound { .. }) => 404,

            // 502 Bad Gateway - Every remote source failed
            Error::AllDownloadsFailed { .. } => 502,

            // 503 Service Unavailable
            Error::Task(TaskError::TooManyTasks { .. }) => 503,
            Error::Cancelled => 503,
            Error::ShuttingDown => 503,

            // 500 Internal Server Error - Server-side issues
            Error::Archive(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::MalformedInput(_) => "malformed_request",
            Error::MalformedId(_) => "malformed_id",
            Error::TooManySources { .. } => "too_many_sources",
            Error::ForbiddenContentType { .. } => "forbidden_content_type",
            Error::AllDownloadsFailed { .. } => "download_failed",
            Error::Task(e) => match e {
                TaskError::NotFound { .. } => "task_not_found",
                TaskError::TooManyTasks { .. } => "too_many_tasks",
                TaskError::TooManyFiles { .. } => "too_many_task_files",
            },
            Error::Archive(_) => "archive_error",
            Error::Cancelled => "cancelled",
            Error::ShuttingDown => "shutting_down",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::TooManySources { requested, max } => Some(serde_json::json!({
                "requested": requested,
                "max_sources": max,
            })),
            Error::ForbiddenContentType { mimes } => Some(serde_json::json!({
                "mimes": mimes,
            })),
            Error::AllDownloadsFailed { errors } => Some(serde_json::json!({
                "sources": errors
                    .iter()
                    .map(|e| serde_json::json!({ "url": e.source, "reason": e.reason.to_string() }))
                    .collect::<Vec<_>>(),
            })),
            Error::Task(TaskError::NotFound { id }) => Some(serde_json::json!({
                "task_id": id,
            })),
            Error::Task(TaskError::TooManyTasks { max }) => Some(serde_json::json!({
                "max_tasks": max,
            })),
            Error::Task(TaskError::TooManyFiles { id, max }) => Some(serde_json::json!({
                "task_id": id,
                "max_task_files": max,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
