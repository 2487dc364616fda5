//! Concurrent fan-out of fetches with outcomes delivered in completion order.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;

use super::Fetcher;
use crate::error::FetchError;
use crate::types::FetchOutcome;

/// Handle over a set of in-flight fetches.
///
/// Yields exactly one [`FetchOutcome`] per launched source, in whatever order the
/// fetches finish. Dropping the handle cancels and aborts every fetch that is
/// still running, so no fetch outlives its owner.
pub struct FanOut {
    outcomes: mpsc::Receiver<FetchOutcome>,
    tasks: JoinSet<()>,
    sources: HashMap<task::Id, String>,
    cancel: CancellationToken,
    launched: usize,
}

/// Launch one fetch task per source.
///
/// The fetches run under a child of `parent`, so cancelling the caller's scope stops
/// them while dropping the [`FanOut`] never touches the parent. Each task races its
/// fetch against that token; a cancelled fetch still reports an
/// outcome ([`FetchError::Cancelled`]), and so does a fetch that panics. The outcome
/// channel has room for every source, so senders never wait on the consumer.
pub fn dispatch(
    fetcher: Arc<dyn Fetcher>,
    sources: &[String],
    parent: &CancellationToken,
) -> FanOut {
    let cancel = parent.child_token();
    let (tx, outcomes) = mpsc::channel(sources.len().max(1));
    let mut tasks = JoinSet::new();
    let mut ids = HashMap::with_capacity(sources.len());

    for source in sources {
        let tx = tx.clone();
        let fetcher = Arc::clone(&fetcher);
        let cancel = cancel.clone();
        let owned = source.clone();

        let handle = tasks.spawn(async move {
            let source = owned;
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(FetchError::Cancelled { url: source.clone() }),
                result = fetcher.fetch(&source) => result,
            };

            if tx.try_send(outcome).is_err() {
                tracing::trace!(source = %source, "outcome discarded, consumer is gone");
            }
        });
        ids.insert(handle.id(), source.clone());
    }

    FanOut {
        outcomes,
        tasks,
        sources: ids,
        cancel,
        launched: sources.len(),
    }
}

impl FanOut {
    /// Wait for the next outcome; `None` once every launched fetch has reported
    pub async fn next(&mut self) -> Option<FetchOutcome> {
        if let Some(outcome) = self.outcomes.recv().await {
            return Some(outcome);
        }

        // All senders are gone, so every task has finished. A task that panicked
        // never sent, so its outcome is produced here.
        while let Some(joined) = self.tasks.join_next_with_id().await {
            if let Err(e) = joined
                && e.is_panic()
                && let Some(source) = self.sources.remove(&e.id())
            {
                tracing::error!(source = %source, error = %e, "fetch task panicked");
                return Some(Err(FetchError::Request {
                    url: source,
                    reason: "fetch task panicked".to_string(),
                }));
            }
        }
        None
    }

    /// Ask every outstanding fetch to stop; each still reports a cancelled outcome
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Number of fetches launched
    pub fn launched(&self) -> usize {
        self.launched
    }
}

impl Drop for FanOut {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.tasks.abort_all();
    }
}
