//! Shared test helpers: scriptable fetchers and archive inspection.

use crate::error::FetchError;
use crate::fetch::Fetcher;
use crate::types::{FetchOutcome, FetchedFile};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Build a successful 200 response for `source`
pub(crate) fn fetched(source: &str, name: &str, mime: &str, content: &[u8]) -> FetchedFile {
    FetchedFile {
        source: source.to_string(),
        name: name.to_string(),
        content: content.to_vec(),
        mime: mime.to_string(),
        status: 200,
    }
}

/// Fetcher whose answers are scripted per source.
///
/// Sources without a script fail with a connection error. A gated source blocks
/// until its [`Notify`] is triggered; a hanging source never answers and a panicking
/// source panics inside the fetch.
#[derive(Default)]
pub(crate) struct FakeFetcher {
    outcomes: HashMap<String, FetchOutcome>,
    gates: HashMap<String, Arc<Notify>>,
    delays: HashMap<String, Duration>,
    hanging: Vec<String>,
    panicking: Vec<String>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Answer with a 200 response carrying `content`
    pub(crate) fn file(mut self, source: &str, name: &str, mime: &str, content: &[u8]) -> Self {
        self.outcomes
            .insert(source.to_string(), Ok(fetched(source, name, mime, content)));
        self
    }

    /// Answer with an HTTP status and a small text body
    pub(crate) fn status(mut self, source: &str, status: u16) -> Self {
        let mut file = fetched(source, "error.txt", "text/plain", b"error");
        file.status = status;
        self.outcomes.insert(source.to_string(), Ok(file));
        self
    }

    /// Fail with a transport error
    pub(crate) fn error(mut self, source: &str, error: FetchError) -> Self {
        self.outcomes.insert(source.to_string(), Err(error));
        self
    }

    /// Hold the answer for `source` until the returned notifier fires
    pub(crate) fn gate(&mut self, source: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gates.insert(source.to_string(), Arc::clone(&notify));
        notify
    }

    /// Delay the answer for `source`
    pub(crate) fn delay(mut self, source: &str, delay: Duration) -> Self {
        self.delays.insert(source.to_string(), delay);
        self
    }

    /// Never answer for `source`
    pub(crate) fn hang(mut self, source: &str) -> Self {
        self.hanging.push(source.to_string());
        self
    }

    /// Panic while fetching `source`
    pub(crate) fn panic(mut self, source: &str) -> Self {
        self.panicking.push(source.to_string());
        self
    }

    /// Number of fetches started so far
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, source: &str) -> Result<FetchedFile, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.hanging.iter().any(|s| s == source) {
            std::future::pending::<()>().await;
        }
        if self.panicking.iter().any(|s| s == source) {
            panic!("scripted panic while fetching {source}");
        }
        if let Some(gate) = self.gates.get(source) {
            gate.notified().await;
        }
        if let Some(delay) = self.delays.get(source) {
            tokio::time::sleep(*delay).await;
        }

        self.outcomes
            .get(source)
            .cloned()
            .unwrap_or_else(|| {
                Err(FetchError::Connect {
                    url: source.to_string(),
                    reason: "no scripted response".to_string(),
                })
            })
    }
}

/// Read every entry of a zip archive as `(name, content)` in archive order
pub(crate) fn read_zip_entries(archive: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(archive)).unwrap();
    (0..zip.len())
        .map(|i| {
            let mut file = zip.by_index(i).unwrap();
            let mut content = Vec::new();
            file.read_to_end(&mut content).unwrap();
            (file.name().to_string(), content)
        })
        .collect()
}

/// Names of the entries of a zip archive, in archive order
pub(crate) fn zip_entry_names(archive: &[u8]) -> Vec<String> {
    read_zip_entries(archive)
        .into_iter()
        .map(|(name, _)| name)
        .collect()
}
