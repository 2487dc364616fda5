//! OpenAPI documentation and schema generation
//!
//! Defines the OpenAPI specification for the zipload REST API using utoipa for
//! compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the zipload REST API
///
/// Served as JSON at `/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "zipload REST API",
        version = "0.1.0",
        description = "Fetch remote files over HTTP and bundle them into zip archives, synchronously or as incrementally built tasks",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    paths(
        // Batch
        crate::api::routes::download_batch,

        // Tasks
        crate::api::routes::create_task,
        crate::api::routes::append_task,
        crate::api::routes::check_task,
        crate::api::routes::download_task,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::TaskId,
        crate::types::DownloadStatus,
        crate::types::FileStatus,

        // API request/response types from routes
        crate::api::routes::DownloadBatchRequest,
        crate::api::routes::CreateTaskResponse,
        crate::api::routes::AppendTaskRequest,
        crate::api::routes::TaskResponse,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "batch", description = "Batch downloads - Fetch a list of sources and receive one archive"),
        (name = "tasks", description = "Tasks - Build an archive incrementally and download it once"),
        (name = "system", description = "System endpoints - Health checks and OpenAPI spec"),
    )
)]
pub struct ApiDoc;
