//! Service facade tying the batch and task modes together.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::batch::BatchService;
use crate::config::Config;
use crate::error::Result;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::task::TaskRegistry;

/// How long shutdown waits for background task fetches
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// The zip download service.
///
/// Owns the shared fetcher, the batch orchestrator, the task registry and the root
/// cancellation token that every request-scoped operation derives from.
pub struct Zipload {
    /// Process configuration
    pub config: Arc<Config>,
    batch: BatchService,
    tasks: TaskRegistry,
    shutdown: CancellationToken,
}

impl Zipload {
    /// Create a service that fetches sources over HTTP
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let fetcher = HttpFetcher::new(&config.fetch)?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    /// Create a service around a custom [`Fetcher`]
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            batch: BatchService::new(Arc::clone(&fetcher), &config),
            tasks: TaskRegistry::new(fetcher, &config),
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }

    /// Batch orchestrator
    pub fn batch(&self) -> &BatchService {
        &self.batch
    }

    /// Task registry
    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    /// Root token; cancelled when shutdown begins
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Gracefully shut the service down
    ///
    /// 1. Cancels the root token: the API server stops accepting connections and
    ///    in-flight batches abort
    /// 2. Refuses new tasks and appends
    /// 3. Waits up to 30 seconds for background task fetches to settle
    pub async fn shutdown(&self) {
        tracing::info!("Initiating graceful shutdown");
        self.shutdown.cancel();
        self.tasks.shutdown(SHUTDOWN_GRACE).await;
        tracing::info!("Graceful shutdown complete");
    }

    /// Spawn the REST API server in a background task
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let service = Arc::clone(self);
        tokio::spawn(async move { crate::api::start_api_server(service).await })
    }
}
