//! Shared HTTP client construction for the API session and the audio downloader.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};

use crate::retry::FailureType;
use crate::user_agent;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default API request timeout (30 seconds).
pub const API_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default audio download timeout (60 seconds per file).
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Builds a reqwest client with project-wide defaults.
///
/// # Errors
///
/// Returns the reqwest builder error if the TLS backend cannot initialize.
pub(crate) fn build_client(
    connect_timeout: Duration,
    request_timeout: Duration,
) -> Result<Client, reqwest::Error> {
    base_client_builder(connect_timeout, request_timeout).build()
}

fn base_client_builder(connect_timeout: Duration, request_timeout: Duration) -> ClientBuilder {
    Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .gzip(true)
        .user_agent(user_agent::default_user_agent())
}

/// Classifies an HTTP status code into a failure type.
///
/// | Status | Type |
/// |--------|------|
/// | 401, 403 | Auth |
/// | 408, 429 | Transient |
/// | other 4xx | Permanent |
/// | 5xx | Transient |
#[allow(clippy::match_same_arms)]
pub(crate) fn classify_http_status(status: u16) -> FailureType {
    match status {
        401 | 403 => FailureType::Auth,
        408 => FailureType::Transient, // Request Timeout
        429 => FailureType::Transient, // Too Many Requests
        status if (400..500).contains(&status) => FailureType::Permanent,
        status if (500..600).contains(&status) => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

/// Checks if a reqwest error is a TLS/certificate error.
pub(crate) fn is_tls_error(error: &reqwest::Error) -> bool {
    chain_mentions_tls(error)
}

/// Matches TLS markers anywhere in the error source chain.
fn chain_mentions_tls(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        let message = err.to_string().to_lowercase();
        if ["certificate", "tls", "ssl", "handshake"]
            .iter()
            .any(|needle| message.contains(needle))
        {
            return true;
        }
        current = err.source();
    }
    false
}
