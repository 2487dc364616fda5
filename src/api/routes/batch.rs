//! Batch download handler.

use super::{DownloadBatchRequest, with_failed_sources, zip_response};
use crate::api::AppState;
use crate::types::BatchOutcome;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::Response,
};

/// POST /downloadBatch - Fetch sources and return them as one zip archive
///
/// Responds 206 with the same body shape when some sources could not be included.
#[utoipa::path(
    post,
    path = "/downloadBatch",
    tag = "batch",
    request_body = DownloadBatchRequest,
    responses(
        (status = 200, description = "Archive with every source", content_type = "application/zip"),
        (status = 206, description = "Archive missing some sources; see X-Failed-Sources", content_type = "application/zip"),
        (status = 400, description = "Malformed body, too many sources, or every source had a forbidden content type", body = crate::error::ApiError),
        (status = 502, description = "No source could be downloaded", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn download_batch(
    State(state): State<AppState>,
    payload: Result<Json<DownloadBatchRequest>, JsonRejection>,
) -> crate::Result<Response> {
    let Json(request) = payload?;

    let result = state
        .service
        .batch()
        .download_all(&request.sources, state.service.shutdown_token())
        .await?;

    Ok(match result.outcome {
        BatchOutcome::Success => zip_response(StatusCode::OK, result.archive),
        BatchOutcome::PartialSuccess { errors } => {
            for error in &errors {
                tracing::info!(
                    source = %error.source,
                    reason = %error.reason,
                    "source left out of archive"
                );
            }
            with_failed_sources(
                zip_response(StatusCode::PARTIAL_CONTENT, result.archive),
                errors.len(),
            )
        }
    })
}
