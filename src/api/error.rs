//! Error types for the flashcard API client.

use std::time::Duration;

use thiserror::Error;

use crate::http::{classify_http_status, is_tls_error};
use crate::retry::{FailureType, Retryable, parse_retry_after};

/// Actionable hint shown whenever the site rejects the session cookie.
pub const AUTH_SUGGESTION: &str = "Log in to yoyochinese.com in your browser, copy a fresh \
     `Cookie` header from the developer tools, and pass it with --cookie or YOYO_COOKIE.";

/// Errors that can occur while talking to the flashcard API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The session cookie was rejected (HTTP 401/403).
    #[error("[AUTH] session cookie rejected (HTTP {status}) requesting {url}\n  Suggestion: {suggestion}")]
    Auth {
        /// The endpoint that rejected the request.
        url: String,
        /// The HTTP status code (401 or 403).
        status: u16,
        /// User-facing suggestion for resolving the auth issue.
        suggestion: &'static str,
    },

    /// Any other non-success HTTP response.
    #[error("HTTP {status} requesting {url}")]
    Status {
        /// The endpoint that returned the error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present.
        retry_after: Option<String>,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The endpoint that timed out.
        url: String,
    },

    /// Network-level error (DNS, connection reset, TLS, truncated body).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The endpoint that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The response body was not the expected JSON page.
    #[error("malformed response from {url}: {detail}")]
    Malformed {
        /// The endpoint that returned the body.
        url: String,
        /// Parser detail.
        detail: String,
    },

    /// The request could not be built from the supplied configuration.
    #[error("invalid request configuration: {reason}")]
    InvalidRequest {
        /// What was wrong.
        reason: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl ApiError {
    /// Creates an authentication error carrying the standard suggestion.
    pub fn auth(url: impl Into<String>, status: u16) -> Self {
        Self::Auth {
            url: url.into(),
            status,
            suggestion: AUTH_SUGGESTION,
        }
    }

    /// Creates an HTTP status error.
    pub fn status(url: impl Into<String>, status: u16, retry_after: Option<String>) -> Self {
        Self::Status {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::timeout(url);
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a malformed-response error.
    pub fn malformed(url: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Malformed {
            url: url.into(),
            detail: detail.into(),
        }
    }

    /// Creates an invalid-request error.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Returns true when the credential was rejected.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

impl Retryable for ApiError {
    fn failure_type(&self) -> FailureType {
        match self {
            Self::Auth { .. } => FailureType::Auth,
            Self::Status { status, .. } => classify_http_status(*status),
            Self::Timeout { .. } | Self::Malformed { .. } => FailureType::Transient,
            Self::Network { source, .. } => {
                if is_tls_error(source) {
                    FailureType::Permanent
                } else {
                    FailureType::Transient
                }
            }
            Self::InvalidRequest { .. } | Self::Client(_) => FailureType::Permanent,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Status {
                retry_after: Some(value),
                ..
            } => parse_retry_after(value),
            _ => None,
        }
    }
}
