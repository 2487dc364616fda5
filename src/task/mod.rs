//! Asynchronous task mode.
//!
//! A [`Task`] is an incrementally built batch: sources are appended one at a time,
//! each one is fetched in the background, and the finished archive is retrieved once.
//! [`TaskRegistry`] owns every live task.

use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::archive::ArchivePipeline;
use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, TaskError};
use crate::types::{
    DownloadStatus, FetchedFile, FileStatus, SourceFailure, TaskId, TaskSnapshot,
};

pub mod registry;

pub use registry::TaskRegistry;


/// One task: its per-source status map and its private archive pipeline.
///
/// The status map is only read or written while holding its lock, including by the
/// background fetches that resolve a source.
pub struct Task {
    id: TaskId,
    statuses: Mutex<BTreeMap<String, DownloadStatus>>,
    pipeline: ArchivePipeline,
    max_files: usize,
}

impl Task {
    pub(crate) fn new(id: TaskId, max_files: usize, archive: &ArchiveConfig) -> Self {
        Self {
            id,
            statuses: Mutex::new(BTreeMap::new()),
            pipeline: ArchivePipeline::new(archive),
            max_files,
        }
    }

    /// The task's identifier
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Start tracking `source` as downloading.
    ///
    /// A full task is rejected, even for a source it already tracks. Below the cap,
    /// returns `false` when the source is already tracked, in which case nothing
    /// changes.
    pub(crate) async fn track(&self, source: &str) -> Result<bool, TaskError> {
        let mut statuses = self.statuses.lock().await;
        if statuses.len() >= self.max_files {
            return Err(TaskError::TooManyFiles {
                id: self.id,
                max: self.max_files,
            });
        }
        if statuses.contains_key(source) {
            return Ok(false);
        }
        statuses.insert(source.to_string(), DownloadStatus::Downloading);
        Ok(true)
    }

    /// Resolve a tracked source, feeding the pipeline if the file was accepted
    pub(crate) async fn complete(
        &self,
        source: &str,
        outcome: Result<FetchedFile, SourceFailure>,
    ) {
        let mut statuses = self.statuses.lock().await;

        let status = match outcome {
            Ok(file) => match self.pipeline.add_file(file.name, file.content).await {
                Ok(()) => DownloadStatus::Done,
                Err(e) => {
                    tracing::warn!(
                        task_id = %self.id,
                        source,
                        error = %e,
                        "could not archive file"
                    );
                    DownloadStatus::Failed
                }
            },
            Err(reason) => {
                tracing::debug!(task_id = %self.id, source, reason = %reason, "source failed");
                DownloadStatus::Failed
            }
        };

        if let Some(slot) = statuses.get_mut(source) {
            *slot = status;
        }
    }

    /// Current statuses and readiness.
    ///
    /// Ready means every tracked source is resolved and the task holds exactly its
    /// maximum number of files.
    pub async fn snapshot(&self) -> TaskSnapshot {
        let statuses = self.statuses.lock().await;
        let ready = statuses.len() == self.max_files
            && statuses.values().all(DownloadStatus::is_terminal);
        let files = statuses
            .iter()
            .map(|(url, status)| FileStatus {
                url: url.clone(),
                status: *status,
            })
            .collect();

        TaskSnapshot { files, ready }
    }

    pub(crate) async fn finish(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ArchiveError> {
        self.pipeline.finish(cancel).await
    }
}
