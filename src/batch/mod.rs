//! Synchronous batch mode: fetch every source concurrently and archive the accepted ones.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::archive::ArchivePipeline;
use crate::config::{ArchiveConfig, Config};
use crate::error::{ArchiveError, Error, Result};
use crate::fetch::{AcceptancePolicy, Fetcher, dispatch};
use crate::types::{BatchOutcome, BatchResult, SourceError, SourceFailure};

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

/// Batch orchestrator
///
/// Each call to [`download_all`](Self::download_all) owns its own archive pipeline and
/// fan-out; nothing is shared between concurrent batches except the fetcher.
pub struct BatchService {
    fetcher: Arc<dyn Fetcher>,
    policy: AcceptancePolicy,
    max_sources: usize,
    archive: ArchiveConfig,
}

impl BatchService {
    /// Create a batch service using the configured limits
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &Config) -> Self {
        Self {
            fetcher,
            policy: AcceptancePolicy::new(&config.limits.allowed_mimes),
            max_sources: config.limits.max_sources,
            archive: config.archive.clone(),
        }
    }

    /// Fetch all sources and bundle the accepted ones into a zip archive.
    ///
    /// Per-source failures are collected; the batch only fails as a whole when no
    /// source was accepted, when the archive cannot be assembled, or when `cancel`
    /// fires. Too many sources are rejected before any request is made.
    pub async fn download_all(
        &self,
        sources: &[String],
        cancel: &CancellationToken,
    ) -> Result<BatchResult> {
        if sources.len() > self.max_sources {
            tracing::warn!(
                requested = sources.len(),
                max = self.max_sources,
                "rejecting batch with too many sources"
            );
            return Err(Error::TooManySources {
                requested: sources.len(),
                max: self.max_sources,
            });
        }

        let scope = cancel.child_token();
        let pipeline = ArchivePipeline::new(&self.archive);
        let mut fan_out = dispatch(Arc::clone(&self.fetcher), sources, &scope);

        let mut errors: Vec<SourceError> = Vec::new();
        let mut accepted = 0usize;

        while let Some(outcome) = fan_out.next().await {
            if pipeline.is_failed() {
                return Err(abort(&scope, &pipeline, ArchiveError::WorkerFailed).await);
            }

            let file = match outcome {
                Ok(file) => file,
                Err(e) => {
                    tracing::debug!(error = %e, "source failed");
                    errors.push(SourceError {
                        source: e.url().to_string(),
                        reason: SourceFailure::Fetch(e),
                    });
                    continue;
                }
            };

            if let Err(reason) = self.policy.check(&file) {
                tracing::debug!(source = %file.source, reason = %reason, "source rejected");
                errors.push(SourceError {
                    source: file.source,
                    reason,
                });
                continue;
            }

            accepted += 1;
            if let Err(e) = pipeline.add_file(file.name, file.content).await {
                return Err(abort(&scope, &pipeline, e).await);
            }
        }

        if scope.is_cancelled() {
            tracing::info!("batch cancelled");
            return Err(Error::Cancelled);
        }

        if accepted == 0 && !errors.is_empty() {
            return Err(total_failure(errors));
        }

        let archive = pipeline.finish(cancel).await.map_err(|e| match e {
            ArchiveError::Cancelled => Error::Cancelled,
            e => {
                tracing::error!(error = %e, "failed to finalize batch archive");
                Error::Archive(e)
            }
        })?;

        tracing::info!(
            sources = sources.len(),
            archived = accepted,
            failed = errors.len(),
            bytes = archive.len(),
            "batch complete"
        );

        let outcome = if errors.is_empty() {
            BatchOutcome::Success
        } else {
            BatchOutcome::PartialSuccess { errors }
        };
        Ok(BatchResult { archive, outcome })
    }
}

/// Stop outstanding fetches and surface the pipeline's own error.
///
/// Whatever was archived so far is discarded.
async fn abort(
    scope: &CancellationToken,
    pipeline: &ArchivePipeline,
    fallback: ArchiveError,
) -> Error {
    scope.cancel();
    let error = match pipeline.finish(&CancellationToken::new()).await {
        Err(e) => e,
        Ok(_) => fallback,
    };
    tracing::error!(error = %error, "archive pipeline failed, aborting batch");
    Error::Archive(error)
}

/// Classify a batch in which nothing was accepted
fn total_failure(errors: Vec<SourceError>) -> Error {
    if errors.iter().all(|e| e.reason.is_forbidden_mime()) {
        let mimes = errors
            .into_iter()
            .filter_map(|e| match e.reason {
                SourceFailure::ForbiddenMime(mime) => Some(mime),
                _ => None,
            })
            .collect();
        return Error::ForbiddenContentType { mimes };
    }
    tracing::warn!(failed = errors.len(), "every source in the batch failed");
    Error::AllDownloadsFailed { errors }
}
