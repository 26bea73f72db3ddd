//! Sequential, lazily paginated card fetcher.
//!
//! Pages are requested strictly in order (1, 2, ...). Page `n + 1` is only
//! requested after page `n` has been fully received, and the record cap is
//! checked between pages so that a satisfied cap costs no further requests.

use thiserror::Error;
use tracing::{info, instrument, warn};

use super::client::ApiClient;
use super::error::ApiError;
use super::filters::FilterSet;
use crate::card::RawCard;
use crate::retry::{FailureType, RetryPolicy, Retryable, with_retry};

/// Terminal failure of one page request.
#[derive(Debug, Error)]
#[error("page {page} failed after {attempts} attempt(s)")]
pub struct FetchFailure {
    /// 1-based page index that failed.
    pub page: u32,
    /// Attempts made for that page.
    pub attempts: u32,
    /// Last error observed.
    #[source]
    pub error: ApiError,
}

impl FetchFailure {
    /// Failure class of the underlying error.
    #[must_use]
    pub fn failure_type(&self) -> FailureType {
        self.error.failure_type()
    }

    /// Returns true when the run should abort rather than continue with partial data.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.failure_type() != FailureType::Transient
    }
}

/// Records collected by [`fetch_all`].
#[derive(Debug, Default)]
pub struct FetchResult {
    /// Raw records in page order, then within-page order.
    pub records: Vec<RawCard>,
    /// Set when a page exhausted its retries; `records` then holds every
    /// page before it.
    pub failure: Option<FetchFailure>,
}

impl FetchResult {
    /// True when fetching stopped early on a transient failure.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.failure.is_some()
    }
}

/// Lazy page iterator over the card listing.
#[derive(Debug)]
pub struct PageFetcher<'a> {
    client: &'a ApiClient,
    filters: &'a FilterSet,
    policy: &'a RetryPolicy,
    next_page: u32,
    fetched: usize,
    reported_total: Option<u64>,
    done: bool,
}

impl<'a> PageFetcher<'a> {
    /// Creates a fetcher positioned before page 1. No request is made yet.
    #[must_use]
    pub fn new(client: &'a ApiClient, filters: &'a FilterSet, policy: &'a RetryPolicy) -> Self {
        Self {
            client,
            filters,
            policy,
            next_page: 1,
            fetched: 0,
            reported_total: None,
            done: false,
        }
    }

    /// Records returned so far.
    #[must_use]
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    /// Total reported by the server on the latest page, if any.
    #[must_use]
    pub fn reported_total(&self) -> Option<u64> {
        self.reported_total
    }

    fn remaining_cap(&self) -> Option<usize> {
        self.filters
            .max_records
            .map(|max| max.saturating_sub(self.fetched))
    }

    /// Fetches the next page.
    ///
    /// Returns `Ok(None)` once the listing is exhausted or the cap is reached.
    /// After an error the fetcher is finished and keeps returning `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchFailure`] when the page cannot be retrieved within the
    /// retry policy or the failure is not retryable.
    pub async fn next_page(&mut self) -> Result<Option<Vec<RawCard>>, FetchFailure> {
        if self.done || self.remaining_cap() == Some(0) {
            self.done = true;
            return Ok(None);
        }

        let page = self.next_page;
        if page > 1 && !self.filters.page_delay.is_zero() {
            tokio::time::sleep(self.filters.page_delay).await;
        }

        let (client, filters) = (self.client, self.filters);
        let outcome = with_retry(self.policy, || client.post_page(filters, page)).await;
        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                self.done = true;
                return Err(FetchFailure {
                    page,
                    attempts: err.attempts,
                    error: err.error,
                });
            }
        };

        let page_size = self.filters.effective_page_size() as usize;
        let received = response.flashcards.len();
        let mut records = response.flashcards;
        if let Some(total) = response.total {
            self.reported_total = Some(total);
        }

        if let Some(remaining) = self.remaining_cap() {
            records.truncate(remaining);
        }
        self.fetched += records.len();
        self.next_page += 1;

        let reached_total = self
            .reported_total
            .is_some_and(|total| self.fetched as u64 >= total);
        if received < page_size || reached_total || self.remaining_cap() == Some(0) {
            self.done = true;
        }

        info!(
            page,
            received,
            kept = records.len(),
            fetched = self.fetched,
            total = ?self.reported_total,
            "fetched page"
        );

        Ok(Some(records))
    }
}

/// Fetches every page matching `filters`.
///
/// A page that exhausts its retries on transient errors ends the fetch with a
/// partial result: every earlier page is returned with the failure attached.
///
/// # Errors
///
/// Returns the [`FetchFailure`] directly when the failure is an auth or
/// permanent client error.
#[instrument(skip(client, filters, policy), fields(course = %filters.course_id, level = %filters.level_id))]
pub async fn fetch_all(
    client: &ApiClient,
    filters: &FilterSet,
    policy: &RetryPolicy,
) -> Result<FetchResult, FetchFailure> {
    let mut fetcher = PageFetcher::new(client, filters, policy);
    let mut records = Vec::new();

    loop {
        match fetcher.next_page().await {
            Ok(Some(page)) => records.extend(page),
            Ok(None) => break,
            Err(failure) if failure.is_fatal() => return Err(failure),
            Err(failure) => {
                warn!(
                    page = failure.page,
                    attempts = failure.attempts,
                    kept = records.len(),
                    error = %failure.error,
                    "giving up on page, keeping records fetched so far"
                );
                return Ok(FetchResult {
                    records,
                    failure: Some(failure),
                });
            }
        }
    }

    info!(records = records.len(), "fetch complete");
    Ok(FetchResult {
        records,
        failure: None,
    })
}

/// Result of fetching one level of a course.
#[derive(Debug)]
pub struct LevelFetch {
    /// 1-based level number within the course.
    pub level: usize,
    /// Level ID sent to the API.
    pub level_id: String,
    /// Records for this level.
    pub result: FetchResult,
}

/// Fetches each level of a course in turn.
///
/// `filters` supplies the shared settings; its level, unit and lesson filters
/// are replaced per level. The record cap applies to each level separately.
/// Levels are fetched sequentially in the order given.
///
/// # Errors
///
/// Returns the first fatal [`FetchFailure`]. Transient failures only mark the
/// affected level as partial.
pub async fn fetch_levels(
    client: &ApiClient,
    filters: &FilterSet,
    level_ids: &[&str],
    policy: &RetryPolicy,
) -> Result<Vec<LevelFetch>, FetchFailure> {
    let mut levels = Vec::with_capacity(level_ids.len());
    for (index, level_id) in level_ids.iter().enumerate() {
        let level = index + 1;
        info!(level, level_id, "fetching level");
        let level_filters = filters.for_level(level_id);
        let result = fetch_all(client, &level_filters, policy).await?;
        levels.push(LevelFetch {
            level,
            level_id: (*level_id).to_string(),
            result,
        });
    }
    Ok(levels)
}
