//! Error types for audio downloads.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::api::AUTH_SUGGESTION;
use crate::retry::{FailureType, Retryable, parse_retry_after};

/// Why a single audio file could not be fetched.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Connection-level failure, including a body cut off mid-stream.
    #[error("audio request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("audio request to {url} timed out")]
    Timeout { url: String },

    /// Non-success status other than 401/403.
    #[error("audio server answered HTTP {status} for {url}")]
    HttpStatus {
        url: String,
        status: u16,
        /// Raw `Retry-After` header, parsed lazily by [`Retryable::retry_after`].
        retry_after: Option<String>,
    },

    #[error("[AUTH] audio host refused {url} (HTTP {status})\n  Suggestion: {suggestion}")]
    AuthRequired {
        url: String,
        status: u16,
        suggestion: &'static str,
    },

    #[error("cannot write audio file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not a valid audio URL: {url}")]
    InvalidUrl { url: String },

    /// Fewer bytes arrived than the response advertised.
    #[error("audio file {path} truncated: got {received} of {expected} bytes")]
    Truncated {
        path: PathBuf,
        expected: u64,
        received: u64,
    },

    #[error("cannot build audio HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl DownloadError {
    /// Wraps a transport error; reqwest timeouts become [`DownloadError::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::timeout(url);
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// 401 and 403 become [`DownloadError::AuthRequired`].
    pub fn http_status(url: impl Into<String>, status: u16, retry_after: Option<String>) -> Self {
        let url = url.into();
        match status {
            401 | 403 => Self::AuthRequired {
                url,
                status,
                suggestion: AUTH_SUGGESTION,
            },
            _ => Self::HttpStatus {
                url,
                status,
                retry_after,
            },
        }
    }

    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    pub fn truncated(path: impl Into<PathBuf>, expected: u64, received: u64) -> Self {
        Self::Truncated {
            path: path.into(),
            expected,
            received,
        }
    }
}

impl Retryable for DownloadError {
    fn failure_type(&self) -> FailureType {
        match self {
            Self::AuthRequired { .. } => FailureType::Auth,
            Self::HttpStatus { status, .. } => crate::http::classify_http_status(*status),
            Self::Timeout { .. } | Self::Truncated { .. } => FailureType::Transient,
            Self::Network { source, .. } => {
                if crate::http::is_tls_error(source) {
                    FailureType::Permanent
                } else {
                    FailureType::Transient
                }
            }
            Self::Io { .. } | Self::InvalidUrl { .. } | Self::Client(_) => FailureType::Permanent,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::HttpStatus {
                retry_after: Some(value),
                ..
            } => parse_retry_after(value),
            _ => None,
        }
    }
}
