//! # zipload
//!
//! Fetch remote files over HTTP and bundle them into zip archives.
//!
//! ## Delivery modes
//!
//! - **Batch** - the caller sends a list of URLs and waits for one archive holding
//!   every source that could be fetched and has an allowed content type
//! - **Task** - the caller creates a task, appends URLs over several requests, polls
//!   its status, and downloads the finished archive exactly once
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use zipload::{Config, Zipload};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = Arc::new(Zipload::new(Config::default())?);
//!
//!     // Serve the REST API until SIGINT/SIGTERM
//!     let server = service.spawn_api_server();
//!     zipload::run_with_shutdown(Arc::clone(&service)).await;
//!     server.await??;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Zip assembly pipeline
pub mod archive;
/// Synchronous batch downloads
pub mod batch;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Source fetching and fan-out
pub mod fetch;
/// Service facade and lifecycle
pub mod service;
/// Asynchronous tasks
pub mod task;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use archive::ArchivePipeline;
pub use batch::BatchService;
pub use config::Config;
pub use error::{
    ApiError, ArchiveError, Error, ErrorDetail, FetchError, Result, TaskError, ToHttpStatus,
};
pub use fetch::{AcceptancePolicy, Fetcher, HttpFetcher};
pub use service::Zipload;
pub use task::{Task, TaskRegistry};
pub use types::{
    BatchOutcome, BatchResult, DownloadStatus, FetchedFile, FileStatus, SourceError,
    SourceFailure, TaskId, TaskSnapshot,
};

/// Wait for a termination signal, then shut the service down gracefully.
///
/// Listens for Ctrl+C everywhere and additionally for SIGTERM on Unix.
pub async fn run_with_shutdown(service: std::sync::Arc<Zipload>) {
    wait_for_signal().await;
    service.shutdown().await;
}

async fn wait_for_signal() {
    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            Err(e) => {
                tracing::warn!(error = %e, "Could not listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = interrupt => {}
        _ = terminate() => tracing::info!("Received SIGTERM signal"),
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            // Restricted environments (containers, tests) may refuse the handler
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
