//! REST API server module
//!
//! Exposes the batch and task modes over HTTP, plus health and OpenAPI endpoints.

use crate::{Result, Zipload};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Batch
/// - `POST /downloadBatch` - Fetch sources and return a zip archive
///
/// ## Tasks
/// - `POST /createTask` - Create an empty task
/// - `POST /appendTask` - Add a source to a task
/// - `GET /checkTask/:id` - Per-source status and download link
/// - `GET /downloadTask/:id` - Retrieve (and remove) the task's archive
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
pub fn create_router(service: Arc<Zipload>) -> Router {
    let state = AppState::new(service);
    let config = Arc::clone(&state.config);

    let router = Router::new()
        // Batch
        .route("/downloadBatch", post(routes::download_batch))
        // Tasks
        .route("/createTask", post(routes::create_task))
        .route("/appendTask", post(routes::append_task))
        .route("/checkTask/:id", get(routes::check_task))
        .route("/downloadTask/:id", get(routes::download_task))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    // Apply CORS middleware if enabled in config
    if config.api.cors_enabled {
        let cors = build_cors_layer(&config.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` or an empty list allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the service's shutdown token is cancelled, then finishes in-flight
/// requests and returns.
///
/// # Example
///
/// ```no_run
/// use zipload::{Config, Zipload};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = Arc::new(Zipload::new(Config::default())?);
///
/// // Start API server (blocks until shutdown)
/// zipload::api::start_api_server(service).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(service: Arc<Zipload>) -> Result<()> {
    let bind_address = service.config.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    serve(listener, service).await
}

/// Serve the API on an already bound listener until shutdown begins
pub async fn serve(listener: TcpListener, service: Arc<Zipload>) -> Result<()> {
    let address = listener.local_addr().map_err(crate::error::Error::Io)?;
    tracing::info!(address = %address, "API server listening");

    let shutdown = service.shutdown_token().clone();
    let app = create_router(service);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
