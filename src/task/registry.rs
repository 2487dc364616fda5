//! Bounded store of live tasks

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::Task;
use crate::config::{ArchiveConfig, Config};
use crate::error::{ArchiveError, Error, Result, TaskError};
use crate::fetch::{AcceptancePolicy, Fetcher};
use crate::types::{SourceFailure, TaskId, TaskSnapshot};

/// Registry of live tasks, keyed by ID.
///
/// The ID map sits behind a single lock that every operation takes. Per-source
/// fetches run detached on a [`TaskTracker`] so they outlive the request that
/// started them, and are awaited on shutdown.
pub struct TaskRegistry {
    tasks: Mutex<HashMap<TaskId, Arc<Task>>>,
    fetcher: Arc<dyn Fetcher>,
    policy: AcceptancePolicy,
    max_tasks: usize,
    max_task_files: usize,
    archive: ArchiveConfig,
    tracker: TaskTracker,
    accepting_new: AtomicBool,
}

impl TaskRegistry {
    /// Create an empty registry using the configured limits
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &Config) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            fetcher,
            policy: AcceptancePolicy::new(&config.limits.allowed_mimes),
            max_tasks: config.limits.max_tasks,
            max_task_files: config.limits.max_task_files,
            archive: config.archive.clone(),
            tracker: TaskTracker::new(),
            accepting_new: AtomicBool::new(true),
        }
    }

    /// Create an empty task
    pub async fn create(&self) -> Result<TaskId> {
        self.ensure_accepting()?;

        let mut tasks = self.tasks.lock().await;
        if tasks.len() >= self.max_tasks {
            tracing::warn!(max = self.max_tasks, "task limit reached");
            return Err(TaskError::TooManyTasks {
                max: self.max_tasks,
            }
            .into());
        }

        let id = TaskId::new();
        tasks.insert(
            id,
            Arc::new(Task::new(id, self.max_task_files, &self.archive)),
        );
        tracing::info!(task_id = %id, active = tasks.len(), "task created");
        Ok(id)
    }

    /// Track `source` in a task and start fetching it in the background.
    ///
    /// Appending a source the task already tracks is a no-op.
    pub async fn append_file(&self, id: TaskId, source: String) -> Result<()> {
        self.ensure_accepting()?;

        let tasks = self.tasks.lock().await;
        let task = tasks.get(&id).ok_or(TaskError::NotFound { id })?;

        if !task.track(&source).await? {
            tracing::debug!(task_id = %id, source = %source, "source already tracked");
            return Ok(());
        }

        let task = Arc::clone(task);
        drop(tasks);

        tracing::debug!(task_id = %id, source = %source, "fetching source for task");

        let fetcher = Arc::clone(&self.fetcher);
        let policy = self.policy.clone();
        self.tracker.spawn(async move {
            let outcome = match fetcher.fetch(&source).await {
                Ok(file) => policy.check(&file).map(|()| file),
                Err(e) => Err(SourceFailure::Fetch(e)),
            };
            task.complete(&source, outcome).await;
        });

        Ok(())
    }

    /// Snapshot a task's statuses
    pub async fn check(&self, id: TaskId) -> Result<TaskSnapshot> {
        let task = self
            .tasks
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(TaskError::NotFound { id })?;
        Ok(task.snapshot().await)
    }

    /// Remove a task and return its finished archive.
    ///
    /// The task is gone as soon as this is called, so a second call reports
    /// [`TaskError::NotFound`] even if finalizing the archive failed.
    pub async fn pop_archive(&self, id: TaskId, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let task = self
            .tasks
            .lock()
            .await
            .remove(&id)
            .ok_or(TaskError::NotFound { id })?;

        tracing::info!(task_id = %id, "task removed, finalizing archive");

        task.finish(cancel).await.map_err(|e| match e {
            ArchiveError::Cancelled => Error::Cancelled,
            e => {
                tracing::error!(task_id = %id, error = %e, "task archive failed");
                Error::Archive(e)
            }
        })
    }

    /// Number of live tasks
    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Whether no task is live
    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }

    /// Stop accepting tasks and appends, then wait for background fetches.
    ///
    /// Fetches still running after `grace` are left to the runtime.
    pub async fn shutdown(&self, grace: Duration) {
        self.accepting_new.store(false, Ordering::SeqCst);
        self.tracker.close();

        if tokio::time::timeout(grace, self.tracker.wait()).await.is_err() {
            tracing::warn!(
                pending = self.tracker.len(),
                grace_secs = grace.as_secs(),
                "task fetches still running after grace period"
            );
        } else {
            tracing::info!("all task fetches settled");
        }
    }

    fn ensure_accepting(&self) -> Result<()> {
        if self.accepting_new.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }
}
