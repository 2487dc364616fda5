//! Application state for the API server

use crate::{Config, Zipload};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clones).
#[derive(Clone)]
pub struct AppState {
    /// The service handling batches and tasks
    pub service: Arc<Zipload>,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(service: Arc<Zipload>) -> Self {
        let config = Arc::clone(&service.config);
        Self { service, config }
    }
}
