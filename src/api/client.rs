//! Authenticated session wrapper around the card-listing endpoint.
//!
//! Every request carries the user's browser cookie verbatim. Responses are
//! classified into success, [`ApiError::Auth`], or a status/network error
//! whose [`Retryable`](crate::retry::Retryable) classification decides
//! whether the fetcher retries it.

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, COOKIE, HeaderValue, RETRY_AFTER};
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::error::ApiError;
use super::filters::FilterSet;
use crate::card::RawCard;
use crate::http::{self, API_REQUEST_TIMEOUT, CONNECT_TIMEOUT};

/// Card-listing endpoint of the production site.
pub const DEFAULT_API_URL: &str = "https://yoyochinese.com/api/v1/flashcards/manage/cards";

/// Immutable session settings for the lifetime of one run.
#[derive(Clone)]
pub struct SessionConfig {
    cookie: String,
    api_url: String,
    connect_timeout: Duration,
    request_timeout: Duration,
}

// The cookie is a live credential; keep it out of debug logs.
impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("cookie", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl SessionConfig {
    /// Creates a session for the production endpoint.
    ///
    /// `cookie` may be the bare header value or a full `Cookie: ...` line.
    #[must_use]
    pub fn new(cookie: &str) -> Self {
        Self {
            cookie: normalize_cookie(cookie),
            api_url: DEFAULT_API_URL.to_string(),
            connect_timeout: CONNECT_TIMEOUT,
            request_timeout: API_REQUEST_TIMEOUT,
        }
    }

    /// Points the session at a different endpoint.
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Overrides the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Returns the normalized cookie header value.
    #[must_use]
    pub fn cookie(&self) -> &str {
        &self.cookie
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

/// Strips an optional leading `Cookie:` label (any case) and surrounding whitespace.
#[must_use]
pub fn normalize_cookie(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.split_once(':') {
        Some((label, rest)) if label.trim().eq_ignore_ascii_case("cookie") => {
            rest.trim().to_string()
        }
        _ => trimmed.to_string(),
    }
}

/// One page of the card listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageResponse {
    /// Card entries on this page. Required: a body without it is not a page.
    pub flashcards: Vec<RawCard>,
    /// Total matching cards, when the server reports it.
    #[serde(default, rename = "totalFlashcards")]
    pub total: Option<u64>,
}

/// HTTP session wrapper for the flashcard API.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    config: SessionConfig,
    cookie_header: HeaderValue,
}

impl ApiClient {
    /// Builds a client for the given session.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] when the cookie is empty or not a
    /// valid header value or the endpoint is not a URL, and [`ApiError::Client`]
    /// when the HTTP client cannot be built.
    #[instrument(level = "debug", skip(config), fields(api_url = %config.api_url()))]
    pub fn new(config: SessionConfig) -> Result<Self, ApiError> {
        if config.cookie.is_empty() {
            return Err(ApiError::invalid_request("session cookie is empty"));
        }
        Url::parse(&config.api_url).map_err(|e| {
            ApiError::invalid_request(format!("API URL '{}' is invalid: {e}", config.api_url))
        })?;
        let mut cookie_header = HeaderValue::from_str(&config.cookie).map_err(|_| {
            ApiError::invalid_request("session cookie contains characters not allowed in a header")
        })?;
        cookie_header.set_sensitive(true);

        let client = http::build_client(config.connect_timeout, config.request_timeout)
            .map_err(ApiError::Client)?;

        Ok(Self {
            client,
            config,
            cookie_header,
        })
    }

    /// Returns the session settings.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Requests one page of cards (1-indexed). Performs exactly one HTTP call.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Auth`] on 401/403
    /// - [`ApiError::Status`] on any other non-success status
    /// - [`ApiError::Timeout`] / [`ApiError::Network`] on transport failures
    /// - [`ApiError::Malformed`] when the body is not a page of cards
    #[instrument(skip(self, filters), fields(page_size = filters.effective_page_size()))]
    pub async fn post_page(&self, filters: &FilterSet, page: u32) -> Result<PageResponse, ApiError> {
        let url = self.config.api_url.as_str();

        let response = self
            .client
            .post(url)
            .header(COOKIE, self.cookie_header.clone())
            .header(ACCEPT, "*/*")
            .header("is-native", "false")
            .json(&filters.request_body(page))
            .send()
            .await
            .map_err(|e| ApiError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            if matches!(status_code, 401 | 403) {
                return Err(ApiError::auth(url, status_code));
            }
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string);
            return Err(ApiError::status(url, status_code, retry_after));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::network(url, e))?;

        let parsed: PageResponse = serde_json::from_slice(&body)
            .map_err(|e| ApiError::malformed(url, e.to_string()))?;

        debug!(
            cards = parsed.flashcards.len(),
            total = ?parsed.total,
            "page received"
        );
        Ok(parsed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_cookie_strips_label() {
        assert_eq!(normalize_cookie("Cookie: a=1; b=2"), "a=1; b=2");
        assert_eq!(normalize_cookie("cookie:a=1"), "a=1");
        assert_eq!(normalize_cookie("  a=1; b=2  "), "a=1; b=2");
    }

    #[test]
    fn test_normalize_cookie_keeps_colons_in_values() {
        assert_eq!(normalize_cookie("session=abc:def"), "session=abc:def");
    }

    #[test]
    fn test_session_debug_redacts_cookie() {
        let config = SessionConfig::new("secret-session=xyz");
        let debug = format!("{config:?}");
        assert!(!debug.contains("xyz"), "cookie leaked: {debug}");
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_client_rejects_empty_cookie() {
        let err = ApiClient::new(SessionConfig::new("Cookie:   ")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest { .. }));
    }

    #[test]
    fn test_client_rejects_header_breaking_cookie() {
        let err = ApiClient::new(SessionConfig::new("a=1\nInjected: yes")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest { .. }));
    }

    #[test]
    fn test_client_rejects_bad_url() {
        let err = ApiClient::new(SessionConfig::new("a=1").with_api_url("not a url")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest { .. }));
    }

    #[test]
    fn test_page_response_total_is_optional() {
        let page: PageResponse = serde_json::from_str(r#"{"flashcards": []}"#).unwrap();
        assert!(page.flashcards.is_empty());
        assert_eq!(page.total, None);
    }

    #[test]
    fn test_page_response_requires_flashcards() {
        assert!(serde_json::from_str::<PageResponse>("{}").is_err());
        assert!(serde_json::from_str::<PageResponse>(r#"{"message":"session expired"}"#).is_err());
    }
}
