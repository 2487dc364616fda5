//! Streaming zip assembly.
//!
//! An [`ArchivePipeline`] owns one blocking writer worker. Files reach it through a
//! bounded queue and are written one at a time into an in-memory zip container;
//! nothing else ever touches the writer.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

use crate::config::ArchiveConfig;
use crate::error::ArchiveError;
use crate::utils::DEFAULT_FILE_NAME;

/// One file queued for the archive
#[derive(Clone, Debug)]
pub struct ArchiveEntry {
    /// Requested entry name (sanitized and de-duplicated by the writer)
    pub name: String,
    /// File content
    pub content: Vec<u8>,
}

type WriterResult = Result<Vec<u8>, ArchiveError>;

/// Single-use zip assembler fed through a bounded queue.
///
/// Entry order is the order in which files reach the queue. After
/// [`finish`](Self::finish) the pipeline rejects new files, and it can be finished
/// only once. If the writer fails, it stops draining and raises a failure signal
/// that every [`add_file`](Self::add_file) observes, so producers never wait on a
/// dead worker.
pub struct ArchivePipeline {
    sender: Mutex<Option<mpsc::Sender<ArchiveEntry>>>,
    worker: Mutex<Option<JoinHandle<WriterResult>>>,
    failed: CancellationToken,
}

impl ArchivePipeline {
    /// Start a pipeline and its writer worker
    pub fn new(config: &ArchiveConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let failed = CancellationToken::new();

        let worker = tokio::task::spawn_blocking({
            let failed = failed.clone();
            let limit = config.max_archive_bytes;
            move || run_writer(rx, limit, failed)
        });

        Self {
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            failed,
        }
    }

    /// Queue a file for the archive.
    ///
    /// Waits while the queue is full, but returns [`ArchiveError::WorkerFailed`] as
    /// soon as the writer has failed and [`ArchiveError::Closed`] once the pipeline
    /// was finished.
    pub async fn add_file(
        &self,
        name: impl Into<String>,
        content: Vec<u8>,
    ) -> Result<(), ArchiveError> {
        let sender = self
            .sender
            .lock()
            .await
            .clone()
            .ok_or(ArchiveError::Closed)?;

        if self.failed.is_cancelled() {
            return Err(ArchiveError::WorkerFailed);
        }

        let entry = ArchiveEntry {
            name: name.into(),
            content,
        };
        tokio::select! {
            biased;
            _ = self.failed.cancelled() => Err(ArchiveError::WorkerFailed),
            sent = sender.send(entry) => sent.map_err(|_| ArchiveError::WorkerFailed),
        }
    }

    /// Whether the writer has failed; the pipeline is unusable from then on
    pub fn is_failed(&self) -> bool {
        self.failed.is_cancelled()
    }

    /// Close the queue, wait for the writer and return the archive.
    ///
    /// Propagates the writer's error if it failed, and returns
    /// [`ArchiveError::Cancelled`] if `cancel` fires first.
    pub async fn finish(&self, cancel: &CancellationToken) -> Result<Vec<u8>, ArchiveError> {
        self.sender.lock().await.take();
        let worker = self
            .worker
            .lock()
            .await
            .take()
            .ok_or(ArchiveError::AlreadyFinished)?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ArchiveError::Cancelled),
            joined = worker => joined.map_err(|e| ArchiveError::WorkerLost(e.to_string()))?,
        }
    }
}

fn run_writer(
    mut rx: mpsc::Receiver<ArchiveEntry>,
    limit: Option<u64>,
    failed: CancellationToken,
) -> WriterResult {
    let result = write_entries(&mut rx, limit);
    if let Err(e) = &result {
        tracing::warn!(error = %e, "archive writer failed, discarding archive");
        failed.cancel();
        // Wake producers blocked on a full queue
        rx.close();
    }
    result
}

fn write_entries(rx: &mut mpsc::Receiver<ArchiveEntry>, limit: Option<u64>) -> WriterResult {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut names = EntryNames::default();
    let mut total_bytes: u64 = 0;

    while let Some(entry) = rx.blocking_recv() {
        let name = names.claim(&entry.name);

        total_bytes = total_bytes.saturating_add(entry.content.len() as u64);
        if let Some(limit) = limit
            && total_bytes > limit
        {
            return Err(ArchiveError::TooLarge { name, limit });
        }

        zip.start_file(name.clone(), options)
            .map_err(|e| ArchiveError::Write {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        zip.write_all(&entry.content)
            .map_err(|e| ArchiveError::Write {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        tracing::trace!(entry = %name, bytes = entry.content.len(), "archived entry");
    }

    let cursor = zip
        .finish()
        .map_err(|e| ArchiveError::Finalize(e.to_string()))?;
    Ok(cursor.into_inner())
}

/// Tracks entry names already used in one archive
#[derive(Default)]
struct EntryNames {
    used: HashSet<String>,
}

impl EntryNames {
    /// Turn a requested name into a unique, flat entry name.
    ///
    /// Directory components are dropped; clashes become `name (1).ext`, `name (2).ext`, ...
    fn claim(&mut self, requested: &str) -> String {
        let base = sanitize_entry_name(requested);
        if self.used.insert(base.clone()) {
            return base;
        }

        let (stem, ext) = match base.rfind('.') {
            Some(idx) if idx > 0 => base.split_at(idx),
            _ => (base.as_str(), ""),
        };
        let mut n = 1;
        loop {
            let candidate = format!("{stem} ({n}){ext}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

fn sanitize_entry_name(requested: &str) -> String {
    let flat = requested
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    match flat {
        "" | "." | ".." => DEFAULT_FILE_NAME.to_string(),
        name => name.chars().filter(|c| !c.is_control()).collect(),
    }
}
