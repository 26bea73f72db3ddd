//! YoYo Chinese flashcard export library.
//!
//! Fetches a user's flashcards from the site's authenticated API, normalizes
//! them, downloads pronunciation audio and writes import-ready deck files.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`api`] - Authenticated session wrapper and the paginated fetcher
//! - [`retry`] - Retry/backoff policy shared by page fetches and downloads
//! - [`download`] - Bounded-concurrency audio downloader
//! - [`card`] - Raw and normalized card records
//! - [`catalog`] - Known courses and their level IDs
//! - [`export`] - TSV deck output
//! - [`pipeline`] - Order-preserving glue between the stages

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod card;
pub mod catalog;
pub mod download;
pub mod export;
pub(crate) mod http;
pub mod pipeline;
pub mod retry;
#[cfg(test)]
pub mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use api::{
    ApiClient, ApiError, FetchFailure, FetchResult, FilterSet, PageFetcher, SessionConfig,
    fetch_all, fetch_levels,
};
pub use card::{AudioSpeed, Card, CardError, Classification, Normalizer, RawCard};
pub use download::{
    AudioDownloader, DEFAULT_WORKERS, DownloadError, DownloadOutcome, DownloadReport,
    DownloadTask, EngineError, HttpClient,
};
pub use export::{ExportError, RowFormat, TsvExporter};
pub use retry::{FailureType, RetryDecision, RetryError, RetryPolicy, Retryable, with_retry};
