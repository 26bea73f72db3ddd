//! Exit code logic for the export process.
//!
//! Single responsibility: map run results and errors to the process exit outcome.

use thiserror::Error;
use yoyo_export::FetchFailure;

use crate::ProcessExit;

/// Invalid invocation or configuration, reported with exit code 2.
#[derive(Debug, Error)]
#[error("{message}")]
pub(crate) struct UsageError {
    message: String,
}

impl UsageError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// What went missing during an otherwise completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RunShortfall {
    /// A page gave up after retries, so later pages were never fetched.
    pub(crate) fetch_incomplete: bool,
    /// Records dropped by the normalizer.
    pub(crate) rejected_records: usize,
    /// Audio files that failed to download.
    pub(crate) failed_downloads: usize,
}

/// Determines the exit outcome for a run that wrote its decks.
pub(crate) fn determine_exit_outcome(shortfall: RunShortfall) -> ProcessExit {
    if shortfall.fetch_incomplete
        || shortfall.rejected_records > 0
        || shortfall.failed_downloads > 0
    {
        ProcessExit::Partial
    } else {
        ProcessExit::Success
    }
}

/// Maps an error that ended the run to its exit outcome.
pub(crate) fn exit_for_error(error: &anyhow::Error) -> ProcessExit {
    if has_cause::<FetchFailure>(error) {
        ProcessExit::FetchAborted
    } else if has_cause::<UsageError>(error) {
        ProcessExit::Usage
    } else {
        ProcessExit::Failure
    }
}

// `downcast_ref` also matches context values; `chain` covers wrapped sources.
fn has_cause<T>(error: &anyhow::Error) -> bool
where
    T: std::error::Error + Send + Sync + 'static,
{
    error.downcast_ref::<T>().is_some() || error.chain().any(|cause| cause.is::<T>())
}
