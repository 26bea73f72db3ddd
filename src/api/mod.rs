//! Client for the flashcard listing API.
//!
//! [`ApiClient`] performs single authenticated requests; [`fetch_all`] and
//! [`PageFetcher`] walk the paginated listing through a
//! [`RetryPolicy`](crate::retry::RetryPolicy).

mod client;
mod error;
mod fetcher;
mod filters;

pub use client::{ApiClient, DEFAULT_API_URL, PageResponse, SessionConfig, normalize_cookie};
pub use error::{AUTH_SUGGESTION, ApiError};
pub use fetcher::{FetchFailure, FetchResult, LevelFetch, PageFetcher, fetch_all, fetch_levels};
pub use filters::{DEFAULT_MASTERY_TYPE, DEFAULT_PAGE_DELAY, DEFAULT_PAGE_SIZE, FilterSet};
