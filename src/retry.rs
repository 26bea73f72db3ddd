//! Retry logic with exponential backoff for transient network failures.
//!
//! Both the paginated API fetcher and the audio downloader wrap every single
//! network action in [`with_retry`]. Errors describe themselves through the
//! [`Retryable`] trait:
//! - [`FailureType::Transient`] - timeouts, connection resets, incomplete
//!   responses, 5xx. Retried with exponential backoff.
//! - [`FailureType::Auth`] - 401/403. Surfaced immediately.
//! - [`FailureType::Permanent`] - other 4xx, local I/O. Surfaced immediately.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use yoyo_export::retry::{FailureType, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::new(3, Duration::from_millis(100)).without_jitter();
//!
//! match policy.should_retry(FailureType::Transient, 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         assert_eq!(delay, Duration::from_millis(100));
//!         assert_eq!(attempt, 2);
//!     }
//!     RetryDecision::DoNotRetry { reason } => panic!("unexpected: {reason}"),
//! }
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, SystemTime};

use rand::Rng;
use tracing::{debug, instrument, warn};

/// Default maximum attempts (including the initial attempt).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Default base delay for exponential backoff.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(750);

/// Default maximum delay cap.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

/// Default upper bound of random jitter added to each delay.
const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(250);

/// Longest server-provided Retry-After hint we are willing to honor.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Classification of a failed network operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    ///
    /// Examples: timeout, connection reset, truncated body, 5xx.
    Transient,

    /// The credential was rejected (401/403). Never retried.
    Auth,

    /// Failure that won't succeed regardless of retries.
    ///
    /// Examples: 400, 404, unwritable destination.
    Permanent,
}

/// Errors that can be classified for retry decisions.
pub trait Retryable {
    /// Returns how the failure should be treated by a [`RetryPolicy`].
    fn failure_type(&self) -> FailureType;

    /// Server-mandated wait before the next attempt, if any (e.g. `Retry-After`).
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Decision on whether to retry a failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Terminal failure of a retried operation: the last error plus how many
/// attempts were made.
#[derive(Debug, thiserror::Error)]
#[error("{error} (after {attempts} attempt(s))")]
pub struct RetryError<E> {
    /// The error returned by the final attempt.
    #[source]
    pub error: E,
    /// Total number of attempts performed.
    pub attempts: u32,
}

impl<E: Retryable> RetryError<E> {
    /// Returns the classification of the final error.
    #[must_use]
    pub fn failure_type(&self) -> FailureType {
        self.error.failure_type()
    }
}

/// Configuration for retry behavior with exponential backoff.
///
/// # Delay Calculation
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + jitter
/// ```
///
/// With defaults, delays are approximately: 0.75s, 1.5s, 3s.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Delay before the first retry.
    base_delay: Duration,

    /// Maximum delay cap.
    max_delay: Duration,

    /// Upper bound of random jitter; zero disables jitter.
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with explicit attempts and base delay.
    ///
    /// `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::default()
        }
    }

    /// Creates a policy with a custom `max_attempts`, using defaults for other settings.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self::new(max_attempts, DEFAULT_BASE_DELAY)
    }

    /// Overrides the delay cap.
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Disables random jitter so delays are exactly `base_delay * 2^(attempt-1)`.
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.max_jitter = Duration::ZERO;
        self
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the base delay.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Determines whether to retry after `attempt` (1-indexed) failed.
    #[instrument(level = "trace", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        match failure_type {
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure - retry would not help".to_string(),
                };
            }
            FailureType::Auth => {
                return RetryDecision::DoNotRetry {
                    reason: "authentication rejected - retry with the same cookie would not help"
                        .to_string(),
                };
            }
            FailureType::Transient => {}
        }

        if attempt >= self.max_attempts {
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        RetryDecision::Retry {
            delay: self.backoff_delay(attempt) + self.calculate_jitter(),
            attempt: attempt + 1,
        }
    }

    /// Deterministic part of the delay after `attempt` failed:
    /// `base_delay * 2^(attempt-1)`, capped at `max_delay`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 2u32.saturating_pow(exponent);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn calculate_jitter(&self) -> Duration {
        if self.max_jitter.is_zero() {
            return Duration::ZERO;
        }
        let max_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter_ms = rand::thread_rng().gen_range(0..=max_ms);
        Duration::from_millis(jitter_ms)
    }
}

/// Runs `operation` until it succeeds or the policy gives up.
///
/// # Errors
///
/// Returns [`RetryError`] wrapping the last error when the failure is not
/// retryable or attempts are exhausted.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    with_retry_notify(policy, operation, |_, _, _| {}).await
}

/// Same as [`with_retry`], but calls `on_retry(error, next_attempt, delay)`
/// right before each backoff wait.
///
/// The wait is a plain `tokio::time::sleep`, so it only suspends the calling
/// task.
///
/// # Errors
///
/// Returns [`RetryError`] wrapping the last error when the failure is not
/// retryable or attempts are exhausted.
pub async fn with_retry_notify<T, E, F, Fut, N>(
    policy: &RetryPolicy,
    mut operation: F,
    mut on_retry: N,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
    N: FnMut(&E, u32, Duration),
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        match policy.should_retry(error.failure_type(), attempt) {
            RetryDecision::Retry {
                delay: backoff,
                attempt: next_attempt,
            } => {
                let server_hint = error.retry_after().map(|hint| hint.min(MAX_RETRY_AFTER));
                let delay = server_hint.unwrap_or(backoff);
                debug!(
                    attempt = next_attempt,
                    max_attempts = policy.max_attempts(),
                    delay_ms = delay.as_millis(),
                    using_retry_after = server_hint.is_some(),
                    error = %error,
                    "retrying"
                );
                on_retry(&error, next_attempt, delay);
                tokio::time::sleep(delay).await;
            }
            RetryDecision::DoNotRetry { reason } => {
                debug!(attempt, %reason, error = %error, "not retrying");
                return Err(RetryError {
                    error,
                    attempts: attempt,
                });
            }
        }
    }
}

/// Parses a `Retry-After` header value (delta-seconds or HTTP-date).
///
/// Values beyond [`MAX_RETRY_AFTER`] are capped. Negative seconds and dates in
/// the past yield `None`.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        let Ok(seconds) = u64::try_from(seconds) else {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        };
        return Some(cap_retry_after(Duration::from_secs(seconds)));
    }

    let datetime = httpdate::parse_http_date(header_value).ok()?;
    let duration = datetime.duration_since(SystemTime::now()).ok()?;
    Some(cap_retry_after(duration))
}

fn cap_retry_after(duration: Duration) -> Duration {
    if duration > MAX_RETRY_AFTER {
        warn!(
            delay_secs = duration.as_secs(),
            max_secs = MAX_RETRY_AFTER.as_secs(),
            "Retry-After exceeds maximum, capping at 1 hour"
        );
        return MAX_RETRY_AFTER;
    }
    duration
}
