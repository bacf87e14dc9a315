//! Concurrent execution of download tasks.
//!
//! Every task runs resolve, then fetch, then write as one independent unit
//! of work in its own Tokio task. A semaphore bounds how many units run at
//! once. Failures are captured per task and never abort siblings; the run
//! always returns one [`TaskResult`] per submitted task, in submission order.
//!
//! # Cancellation
//!
//! Cancelling the scheduler's [`CancellationToken`] stops new tasks from
//! starting and drops in-flight ones at their next await point. Both are
//! reported as [`TaskError::Cancelled`]; the writer's temp-file guard removes
//! any partial output.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::artifact::{DownloadTask, ResolvedArtifact};
use crate::download::{DownloadError, HttpClient};
use crate::resolver::{ResolveError, VersionResolver};
use crate::writer::{ArtifactWriter, WriteOutcome};

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Error type for scheduler construction.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Why a single task failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The artifact does not exist upstream.
    #[error("not found upstream: {identifier}")]
    ArtifactNotFound {
        /// Extension id or `platform/build` pair.
        identifier: String,
    },
    /// The pinned version is not published.
    #[error("version {version} of {identifier} is not published")]
    VersionNotFound {
        /// Extension id or `platform/build` pair.
        identifier: String,
        /// The requested version.
        version: String,
    },
    /// Upstream request failed or returned unusable data.
    #[error("network error: {reason}")]
    Network {
        /// Rendered cause.
        reason: String,
    },
    /// Local file system failure.
    #[error("I/O error: {reason}")]
    Io {
        /// Rendered cause.
        reason: String,
    },
    /// The run was interrupted before this task finished.
    #[error("cancelled")]
    Cancelled,
    /// The task's worker panicked.
    #[error("task panicked: {reason}")]
    Panicked {
        /// Join error text.
        reason: String,
    },
}

impl From<ResolveError> for TaskError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::ArtifactNotFound { identifier } => Self::ArtifactNotFound { identifier },
            ResolveError::VersionNotFound {
                identifier,
                version,
            } => Self::VersionNotFound {
                identifier,
                version,
            },
            other @ (ResolveError::Network { .. } | ResolveError::InvalidMetadata { .. }) => {
                Self::Network {
                    reason: other.to_string(),
                }
            }
        }
    }
}

impl TaskError {
    /// Maps a fetch or write failure for an already resolved artifact.
    fn from_transfer(resolved: &ResolvedArtifact, error: &DownloadError) -> Self {
        if error.is_not_found() {
            let descriptor = &resolved.task.descriptor;
            if descriptor.version().is_pinned() {
                Self::VersionNotFound {
                    identifier: descriptor.identifier(),
                    version: resolved.concrete_version.clone(),
                }
            } else {
                Self::ArtifactNotFound {
                    identifier: descriptor.identifier(),
                }
            }
        } else if error.is_io() {
            Self::Io {
                reason: error.to_string(),
            }
        } else {
            Self::Network {
                reason: error.to_string(),
            }
        }
    }
}

/// Final state of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The artifact was downloaded and written.
    Success {
        /// Written file.
        path: PathBuf,
        /// Concrete version.
        version: String,
    },
    /// The artifact was already present.
    Skipped {
        /// Existing file.
        path: PathBuf,
        /// Concrete version.
        version: String,
    },
    /// The task failed.
    Failure(TaskError),
}

impl TaskOutcome {
    /// Returns true for [`TaskOutcome::Failure`].
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}

/// A task paired with its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    /// The submitted task.
    pub task: DownloadTask,
    /// What happened.
    pub outcome: TaskOutcome,
}

/// Live counters for a scheduler run.
///
/// Updated atomically by worker tasks so a progress UI can poll them.
#[derive(Debug, Default)]
pub struct RunStats {
    succeeded: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl RunStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of artifacts written.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }

    /// Number of artifacts already present.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Number of failed tasks.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Number of finished tasks.
    #[must_use]
    pub fn finished(&self) -> usize {
        self.succeeded() + self.skipped() + self.failed()
    }

    fn record(&self, outcome: &TaskOutcome) {
        let counter = match outcome {
            TaskOutcome::Success { .. } => &self.succeeded,
            TaskOutcome::Skipped { .. } => &self.skipped,
            TaskOutcome::Failure(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn reset(&self) {
        self.succeeded.store(0, Ordering::SeqCst);
        self.skipped.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
    }
}

/// Runs download tasks with bounded parallelism.
///
/// # Concurrency Model
///
/// - Each task runs in its own Tokio task
/// - A semaphore permit is acquired before starting each task
/// - Permits are released automatically when tasks complete (RAII)
/// - All tasks share one [`HttpClient`] (one connection pool) and nothing else
#[derive(Debug)]
pub struct DownloadScheduler {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    resolver: Arc<VersionResolver>,
    http: HttpClient,
    cancel: CancellationToken,
    stats: Arc<RunStats>,
}

enum Pending {
    Spawned(DownloadTask, JoinHandle<TaskOutcome>),
    NotStarted(DownloadTask),
}

impl DownloadScheduler {
    /// Creates a scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConcurrency`] if `concurrency` is
    /// outside 1-100.
    #[instrument(level = "debug", skip(resolver, http))]
    pub fn new(
        concurrency: usize,
        resolver: Arc<VersionResolver>,
        http: HttpClient,
    ) -> Result<Self, SchedulerError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(SchedulerError::InvalidConcurrency { value: concurrency });
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            resolver,
            http,
            cancel: CancellationToken::new(),
            stats: Arc::new(RunStats::new()),
        })
    }

    /// Uses `cancel` to interrupt runs.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Live counters for the current run; zeroed when a run starts.
    #[must_use]
    pub fn stats(&self) -> Arc<RunStats> {
        Arc::clone(&self.stats)
    }

    /// Executes all tasks and returns one result per task, in submission order.
    ///
    /// Individual failures do NOT fail the run; they are reported in the
    /// returned results.
    #[instrument(skip(self, tasks), fields(task_count = tasks.len(), output_dir = %output_dir.display()))]
    pub async fn run(&self, tasks: Vec<DownloadTask>, output_dir: &Path) -> Vec<TaskResult> {
        let writer = ArtifactWriter::new(output_dir);
        let mut pending = Vec::with_capacity(tasks.len());
        self.stats.reset();

        info!(concurrency = self.concurrency, "starting downloads");

        for task in tasks {
            let permit = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                permit = Arc::clone(&self.semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                pending.push(Pending::NotStarted(task));
                continue;
            };

            let resolver = Arc::clone(&self.resolver);
            let http = self.http.clone();
            let writer = writer.clone();
            let cancel = self.cancel.clone();
            let stats = Arc::clone(&self.stats);
            let unit = task.clone();

            pending.push(Pending::Spawned(
                task,
                tokio::spawn(async move {
                    // Permit is dropped when this block exits (RAII)
                    let _permit = permit;
                    let outcome = tokio::select! {
                        biased;
                        () = cancel.cancelled() => TaskOutcome::Failure(TaskError::Cancelled),
                        outcome = execute(&unit, &resolver, &http, &writer) => outcome,
                    };
                    log_outcome(&unit, &outcome);
                    stats.record(&outcome);
                    outcome
                }),
            ));
        }

        debug!(task_count = pending.len(), "waiting for tasks to complete");

        let mut results = Vec::with_capacity(pending.len());
        for entry in pending {
            let result = match entry {
                Pending::Spawned(task, handle) => {
                    let outcome = handle.await.unwrap_or_else(|e| {
                        warn!(error = %e, "download task panicked");
                        let outcome = TaskOutcome::Failure(TaskError::Panicked {
                            reason: e.to_string(),
                        });
                        self.stats.record(&outcome);
                        outcome
                    });
                    TaskResult { task, outcome }
                }
                Pending::NotStarted(task) => {
                    let outcome = TaskOutcome::Failure(TaskError::Cancelled);
                    self.stats.record(&outcome);
                    TaskResult { task, outcome }
                }
            };
            results.push(result);
        }

        info!(
            succeeded = self.stats.succeeded(),
            skipped = self.stats.skipped(),
            failed = self.stats.failed(),
            "downloads finished"
        );
        results
    }
}

/// One unit of work: resolve, skip if present, fetch, write.
async fn execute(
    task: &DownloadTask,
    resolver: &VersionResolver,
    http: &HttpClient,
    writer: &ArtifactWriter,
) -> TaskOutcome {
    let resolved = match resolver.resolve(task).await {
        Ok(resolved) => resolved,
        Err(e) => return TaskOutcome::Failure(e.into()),
    };
    let version = resolved.concrete_version.clone();

    match writer.existing(&resolved).await {
        Ok(Some(path)) => return TaskOutcome::Skipped { path, version },
        Ok(None) => {}
        Err(e) => return TaskOutcome::Failure(TaskError::from_transfer(&resolved, &e)),
    }

    let body = match http.fetch_stream(&resolved.source_uri).await {
        Ok(body) => body,
        Err(e) => return TaskOutcome::Failure(TaskError::from_transfer(&resolved, &e)),
    };

    match writer.write(&resolved, body).await {
        Ok(WriteOutcome::Written(path)) => TaskOutcome::Success { path, version },
        Ok(WriteOutcome::Skipped(path)) => TaskOutcome::Skipped { path, version },
        Err(e) => TaskOutcome::Failure(TaskError::from_transfer(&resolved, &e)),
    }
}

fn log_outcome(task: &DownloadTask, outcome: &TaskOutcome) {
    let artifact = task.descriptor.identifier();
    let destination = task.destination_display();
    match outcome {
        TaskOutcome::Success { path, version } => {
            info!(%artifact, %version, path = %path.display(), "downloaded");
        }
        TaskOutcome::Skipped { path, version } => {
            info!(%artifact, %version, path = %path.display(), "already present, skipped");
        }
        TaskOutcome::Failure(error) => {
            warn!(%artifact, %destination, error = %error, "download failed");
        }
    }
}
