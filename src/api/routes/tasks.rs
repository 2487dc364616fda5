//! Task lifecycle handlers.

use super::{
    AppendTaskRequest, CreateTaskResponse, TaskResponse, parse_task_id, zip_response,
};
use crate::api::AppState;
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// POST /createTask - Create an empty task
#[utoipa::path(
    post,
    path = "/createTask",
    tag = "tasks",
    responses(
        (status = 201, description = "Task created", body = CreateTaskResponse),
        (status = 503, description = "Task limit reached or shutting down", body = crate::error::ApiError)
    )
)]
pub async fn create_task(State(state): State<AppState>) -> crate::Result<Response> {
    let id = state.service.tasks().create().await?;
    Ok((StatusCode::CREATED, Json(CreateTaskResponse { id })).into_response())
}

/// POST /appendTask - Add a source to a task and start fetching it
#[utoipa::path(
    post,
    path = "/appendTask",
    tag = "tasks",
    request_body = AppendTaskRequest,
    responses(
        (status = 202, description = "Source accepted; fetching in the background"),
        (status = 400, description = "Malformed body or ID, or the task is full", body = crate::error::ApiError),
        (status = 404, description = "Task not found", body = crate::error::ApiError)
    )
)]
pub async fn append_task(
    State(state): State<AppState>,
    payload: Result<Json<AppendTaskRequest>, JsonRejection>,
) -> crate::Result<StatusCode> {
    let Json(request) = payload?;
    let id = parse_task_id(&request.id)?;

    state
        .service
        .tasks()
        .append_file(id, request.source)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

/// GET /checkTask/:id - Per-source status, with a download link once ready
#[utoipa::path(
    get,
    path = "/checkTask/{id}",
    tag = "tasks",
    params(
        ("id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Task status", body = TaskResponse),
        (status = 400, description = "Malformed ID", body = crate::error::ApiError),
        (status = 404, description = "Task not found", body = crate::error::ApiError)
    )
)]
pub async fn check_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> crate::Result<Json<TaskResponse>> {
    let id = parse_task_id(&id)?;
    let snapshot = state.service.tasks().check(id).await?;

    Ok(Json(TaskResponse {
        files: snapshot.files,
        link: snapshot.ready.then(|| format!("/downloadTask/{id}")),
    }))
}

/// GET /downloadTask/:id - Retrieve the task's archive; the task is removed
#[utoipa::path(
    get,
    path = "/downloadTask/{id}",
    tag = "tasks",
    params(
        ("id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Task archive", content_type = "application/zip"),
        (status = 400, description = "Malformed ID", body = crate::error::ApiError),
        (status = 404, description = "Task not found or already downloaded", body = crate::error::ApiError),
        (status = 500, description = "Archive could not be assembled", body = crate::error::ApiError)
    )
)]
pub async fn download_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> crate::Result<Response> {
    let id = parse_task_id(&id)?;
    let archive = state
        .service
        .tasks()
        .pop_archive(id, state.service.shutdown_token())
        .await?;
    Ok(zip_response(StatusCode::OK, archive))
}
