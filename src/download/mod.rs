//! Concurrent audio download.
//!
//! [`HttpClient`] streams a single file to disk without leaving partial
//! files behind; [`AudioDownloader`] runs many of those with a bounded
//! worker pool, skipping files that are already present.

mod client;
mod engine;
mod error;

pub use client::HttpClient;
pub use engine::{
    AudioDownloader, DEFAULT_WORKERS, DownloadOutcome, DownloadReport, DownloadTask, EngineError,
    FileFetcher,
};
pub use error::DownloadError;

// Note: no module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
