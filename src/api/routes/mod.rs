//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`batch`] - Synchronous batch downloads
//! - [`tasks`] - Asynchronous task lifecycle
//! - [`system`] - Health and OpenAPI

use axum::{
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::types::{FileStatus, TaskId};

mod batch;
mod system;
mod tasks;

// Re-export all handlers so `routes::function_name` works
pub use batch::*;
pub use system::*;
pub use tasks::*;

/// Response header carrying the number of sources missing from a partial archive
pub const FAILED_SOURCES_HEADER: &str = "x-failed-sources";

// ============================================================================
// Request/Response Types (shared across handlers)
// ============================================================================

/// Request body for POST /downloadBatch
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct DownloadBatchRequest {
    /// URLs to fetch and archive
    pub sources: Vec<String>,
}

/// Response for POST /createTask
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CreateTaskResponse {
    /// ID of the new task
    pub id: TaskId,
}

/// Request body for POST /appendTask
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct AppendTaskRequest {
    /// Task ID (UUID)
    pub id: String,
    /// URL to add to the task
    pub source: String,
}

/// Response for GET /checkTask/:id
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct TaskResponse {
    /// Status of every source in the task, ordered by URL
    pub files: Vec<FileStatus>,
    /// Where to download the archive; only present once the task is ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Parse a task ID from a path or body field
pub(crate) fn parse_task_id(raw: &str) -> crate::Result<TaskId> {
    raw.trim()
        .parse()
        .map_err(|_| crate::Error::MalformedId(raw.to_string()))
}

/// Build a zip download response
pub(crate) fn zip_response(status: StatusCode, archive: Vec<u8>) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, "application/zip"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"archive.zip\"",
            ),
        ],
        archive,
    )
        .into_response()
}

/// Mark a zip response as partial
pub(crate) fn with_failed_sources(mut response: Response, failed: usize) -> Response {
    response
        .headers_mut()
        .insert(
            HeaderName::from_static(FAILED_SOURCES_HEADER),
            HeaderValue::from(failed),
        );
    response
}
