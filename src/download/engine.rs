//! Bounded-concurrency audio downloader.
//!
//! # Concurrency Model
//!
//! - Each download task runs in its own Tokio task
//! - A semaphore permit is acquired inside the task before any I/O
//! - Permits are released automatically when the task finishes (RAII)
//! - Finished tasks report `(index, outcome)` over a channel to the
//!   coordinating call, which owns the final report
//!
//! # Failure Containment
//!
//! A failed download never aborts the batch. Transient errors are retried
//! per task with the configured [`RetryPolicy`]; backoff waits only suspend
//! that task. A panic inside a task is caught and reported as
//! [`DownloadOutcome::Failed`] for that task alone.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::FutureExt;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, info, instrument, warn};

use super::client::part_path;
use super::{DownloadError, HttpClient};
use crate::retry::{RetryPolicy, with_retry_notify};

/// Minimum allowed worker count.
const MIN_WORKERS: usize = 1;

/// Maximum allowed worker count.
const MAX_WORKERS: usize = 64;

/// Default number of concurrent audio downloads.
pub const DEFAULT_WORKERS: usize = 8;

/// Error type for downloader configuration.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid worker count provided.
    #[error("invalid worker count {value}: must be between {MIN_WORKERS} and {MAX_WORKERS}")]
    InvalidWorkerCount {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Transport used by the downloader to fetch one file.
///
/// [`HttpClient`] is the production implementation.
pub trait FileFetcher: Send + Sync + 'static {
    /// Fetches `url` into `destination`, returning bytes written.
    ///
    /// Implementations must leave nothing at `destination` on failure.
    fn fetch(
        &self,
        url: &str,
        destination: &Path,
    ) -> impl Future<Output = Result<u64, DownloadError>> + Send;
}

impl FileFetcher for HttpClient {
    fn fetch(
        &self,
        url: &str,
        destination: &Path,
    ) -> impl Future<Output = Result<u64, DownloadError>> + Send {
        self.download_to_path(url, destination)
    }
}

/// One file to download.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloadTask {
    /// Remote URL.
    pub url: String,
    /// Local destination path.
    pub destination: PathBuf,
}

impl DownloadTask {
    /// Creates a task.
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
        }
    }
}

/// Terminal outcome of one [`DownloadTask`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The file was downloaded.
    Success {
        /// Attempts it took, including the successful one.
        attempts: u32,
        /// Bytes written.
        bytes: u64,
    },
    /// A non-empty file was already present; no request was made.
    Skipped,
    /// The download failed after the retry policy gave up.
    Failed {
        /// Human-readable reason (the last error).
        reason: String,
        /// Attempts made (0 when the task never reached the network).
        attempts: u32,
    },
}

impl DownloadOutcome {
    /// True for [`DownloadOutcome::Success`] and [`DownloadOutcome::Skipped`].
    #[must_use]
    pub fn has_file(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Outcomes of a [`AudioDownloader::download_all`] batch.
///
/// Holds exactly one outcome per distinct task, in submission order.
#[derive(Debug, Default)]
pub struct DownloadReport {
    entries: Vec<(DownloadTask, DownloadOutcome)>,
    index: HashMap<DownloadTask, usize>,
    retried: usize,
}

impl DownloadReport {
    /// Outcome for `task`, if it was part of the batch.
    #[must_use]
    pub fn outcome(&self, task: &DownloadTask) -> Option<&DownloadOutcome> {
        self.index.get(task).map(|&i| &self.entries[i].1)
    }

    /// All `(task, outcome)` pairs in submission order.
    pub fn iter(&self) -> impl Iterator<Item = (&DownloadTask, &DownloadOutcome)> {
        self.entries.iter().map(|(task, outcome)| (task, outcome))
    }

    /// Number of downloaded files.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::Success { .. }))
    }

    /// Number of tasks skipped because the file already existed.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::Skipped))
    }

    /// Number of failed tasks.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::Failed { .. }))
    }

    /// Total number of tasks (always `succeeded + skipped + failed`).
    #[must_use]
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    /// Number of retry waits across the whole batch.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.retried
    }

    /// Failed tasks with their reasons.
    pub fn failures(&self) -> impl Iterator<Item = (&DownloadTask, &str)> {
        self.entries.iter().filter_map(|(task, outcome)| match outcome {
            DownloadOutcome::Failed { reason, .. } => Some((task, reason.as_str())),
            _ => None,
        })
    }

    fn count(&self, predicate: impl Fn(&DownloadOutcome) -> bool) -> usize {
        self.entries.iter().filter(|(_, o)| predicate(o)).count()
    }
}

/// Downloads batches of files with a bounded worker pool.
#[derive(Debug, Clone)]
pub struct AudioDownloader<F = HttpClient> {
    fetcher: Arc<F>,
    policy: RetryPolicy,
}

impl<F: FileFetcher> AudioDownloader<F> {
    /// Creates a downloader over `fetcher` using `policy` for each task.
    pub fn new(fetcher: F, policy: RetryPolicy) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            policy,
        }
    }

    /// Returns the retry policy applied to each task.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Downloads every task with at most `worker_count` in flight.
    ///
    /// Duplicate tasks are collapsed. Returns once every task has an outcome.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidWorkerCount`] if `worker_count` is outside 1..=64.
    /// Individual download failures never cause an error.
    pub async fn download_all(
        &self,
        tasks: Vec<DownloadTask>,
        worker_count: usize,
    ) -> Result<DownloadReport, EngineError> {
        self.download_all_with_progress(tasks, worker_count, |_, _| {})
            .await
    }

    /// Same as [`download_all`](Self::download_all), calling `on_outcome` as
    /// each task finishes.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidWorkerCount`] if `worker_count` is outside 1..=64.
    #[instrument(skip(self, tasks, on_outcome), fields(task_count = tasks.len()))]
    pub async fn download_all_with_progress<P>(
        &self,
        tasks: Vec<DownloadTask>,
        worker_count: usize,
        mut on_outcome: P,
    ) -> Result<DownloadReport, EngineError>
    where
        P: FnMut(&DownloadTask, &DownloadOutcome),
    {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&worker_count) {
            return Err(EngineError::InvalidWorkerCount {
                value: worker_count,
            });
        }

        let tasks = dedupe(tasks);
        info!(tasks = tasks.len(), worker_count, "starting audio downloads");

        let semaphore = Arc::new(Semaphore::new(worker_count));
        let retried = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, DownloadOutcome)>();
        let mut handles = Vec::with_capacity(tasks.len());

        for (index, task) in tasks.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let fetcher = Arc::clone(&self.fetcher);
            let retried = Arc::clone(&retried);
            let policy = self.policy.clone();
            let task = task.clone();
            let tx = tx.clone();

            handles.push(tokio::spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(permit) => {
                        // Permit is dropped when this block exits (RAII)
                        let _permit = permit;
                        match AssertUnwindSafe(run_task(&*fetcher, &policy, &task, &retried))
                            .catch_unwind()
                            .await
                        {
                            Ok(outcome) => outcome,
                            Err(panic) => {
                                let reason = panic_reason(panic.as_ref());
                                warn!(url = %task.url, %reason, "download worker panicked");
                                let part = part_path(&task.destination);
                                let _ = tokio::fs::remove_file(part).await;
                                DownloadOutcome::Failed {
                                    reason: format!("worker panicked: {reason}"),
                                    attempts: 0,
                                }
                            }
                        }
                    }
                    Err(_) => DownloadOutcome::Failed {
                        reason: "worker pool closed".to_string(),
                        attempts: 0,
                    },
                };
                // Receiver outlives every sender; a send error cannot occur.
                let _ = tx.send((index, outcome));
            }));
        }
        drop(tx);

        let mut outcomes: Vec<Option<DownloadOutcome>> = vec![None; tasks.len()];
        while let Some((index, outcome)) = rx.recv().await {
            on_outcome(&tasks[index], &outcome);
            outcomes[index] = Some(outcome);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "download task did not complete");
            }
        }

        let mut report = DownloadReport {
            entries: Vec::with_capacity(tasks.len()),
            index: HashMap::with_capacity(tasks.len()),
            retried: retried.load(Ordering::SeqCst),
        };
        for (index, (task, outcome)) in tasks.into_iter().zip(outcomes).enumerate() {
            let outcome = outcome.unwrap_or_else(|| DownloadOutcome::Failed {
                reason: "download task ended without reporting an outcome".to_string(),
                attempts: 0,
            });
            report.index.insert(task.clone(), index);
            report.entries.push((task, outcome));
        }

        info!(
            succeeded = report.succeeded(),
            skipped = report.skipped(),
            failed = report.failed(),
            retried = report.retried(),
            total = report.total(),
            "audio downloads complete"
        );
        Ok(report)
    }
}

/// Collapses duplicate tasks, keeping first occurrences in order.
fn dedupe(tasks: Vec<DownloadTask>) -> Vec<DownloadTask> {
    let mut seen = HashSet::with_capacity(tasks.len());
    tasks
        .into_iter()
        .filter(|task| seen.insert(task.clone()))
        .collect()
}

async fn already_present(destination: &Path) -> bool {
    tokio::fs::metadata(destination)
        .await
        .is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}

#[instrument(level = "debug", skip(fetcher, policy, task, retried), fields(url = %task.url))]
async fn run_task<F: FileFetcher>(
    fetcher: &F,
    policy: &RetryPolicy,
    task: &DownloadTask,
    retried: &AtomicUsize,
) -> DownloadOutcome {
    if already_present(&task.destination).await {
        debug!(path = %task.destination.display(), "file exists, skipping");
        return DownloadOutcome::Skipped;
    }

    let mut retries = 0u32;
    let result = with_retry_notify(
        policy,
        || fetcher.fetch(&task.url, &task.destination),
        |error, next_attempt, delay| {
            retries += 1;
            retried.fetch_add(1, Ordering::SeqCst);
            info!(
                url = %task.url,
                attempt = next_attempt,
                max_attempts = policy.max_attempts(),
                delay_ms = delay.as_millis(),
                error = %error,
                "retrying download"
            );
        },
    )
    .await;

    match result {
        Ok(bytes) => DownloadOutcome::Success {
            attempts: retries + 1,
            bytes,
        },
        Err(err) => {
            warn!(
                url = %task.url,
                error = %err.error,
                attempts = err.attempts,
                "download failed after all attempts"
            );
            DownloadOutcome::Failed {
                reason: err.error.to_string(),
                attempts: err.attempts,
            }
        }
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
