//! HTTP client that streams one audio file to disk.
//!
//! Bytes are written to a sibling `<name>.part` file and renamed onto the
//! destination only after the body has been fully received and its length
//! checked against `Content-Length`. Any failure removes the part file, so a
//! destination path either holds a complete file or nothing at all.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::DownloadError;
use crate::http::{self, CONNECT_TIMEOUT, DOWNLOAD_TIMEOUT};

/// HTTP client for downloading audio files.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with default timeouts (30s connect, 60s per file).
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Client`] when the HTTP client cannot be built.
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_timeouts(CONNECT_TIMEOUT, DOWNLOAD_TIMEOUT)
    }

    /// Creates a client with the default connect timeout and a custom per-file timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Client`] when the HTTP client cannot be built.
    pub fn with_request_timeout(request_timeout: Duration) -> Result<Self, DownloadError> {
        Self::with_timeouts(CONNECT_TIMEOUT, request_timeout)
    }

    /// Creates a client with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Client`] when the HTTP client cannot be built.
    pub fn with_timeouts(
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, DownloadError> {
        let client =
            http::build_client(connect_timeout, request_timeout).map_err(DownloadError::Client)?;
        Ok(Self { client })
    }

    /// Downloads `url` to `destination`, returning the number of bytes written.
    ///
    /// The parent directory is created if needed. An existing file at
    /// `destination` is replaced only on success.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] describing the failure. No partial file is
    /// left at `destination` or at its `.part` sibling.
    #[instrument(level = "debug", skip(self), fields(dest = %destination.display()))]
    pub async fn download_to_path(&self, url: &str, destination: &Path) -> Result<u64, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string);
            return Err(DownloadError::http_status(url, status.as_u16(), retry_after));
        }

        let content_length = response.content_length();
        let part_path = part_path(destination);

        let result = write_part_file(response, url, &part_path, content_length).await;
        let bytes = match result {
            Ok(bytes) => bytes,
            Err(error) => {
                debug!(path = %part_path.display(), "cleaning up partial file after error");
                let _ = tokio::fs::remove_file(&part_path).await;
                return Err(error);
            }
        };

        if let Err(e) = tokio::fs::rename(&part_path, destination).await {
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(DownloadError::io(destination, e));
        }

        debug!(bytes, "download complete");
        Ok(bytes)
    }
}

/// Sibling path used while a download is in flight.
pub(crate) fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

async fn write_part_file(
    response: reqwest::Response,
    url: &str,
    part_path: &Path,
    content_length: Option<u64>,
) -> Result<u64, DownloadError> {
    let file = File::create(part_path)
        .await
        .map_err(|e| DownloadError::io(part_path, e))?;
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(part_path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(part_path, e))?;

    if let Some(expected) = content_length.filter(|&expected| expected != bytes_written) {
        return Err(DownloadError::truncated(part_path, expected, bytes_written));
    }
    if bytes_written == 0 {
        // Empty files count as missing on the next run.
        return Err(DownloadError::truncated(part_path, content_length.unwrap_or(0), 0));
    }

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("/tmp/media/abc.mp3")),
            PathBuf::from("/tmp/media/abc.mp3.part")
        );
    }

    #[tokio::test]
    async fn test_download_success_writes_destination() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();
        let body = b"ID3 fake mp3 bytes";

        Mock::given(method("GET"))
            .and(path("/audio/a1.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new().unwrap();
        let dest = temp_dir.path().join("media").join("a1.mp3");
        let url = format!("{}/audio/a1.mp3", mock_server.uri());

        let bytes = client.download_to_path(&url, &dest).await.unwrap();
        assert_eq!(bytes, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_download_404_leaves_nothing() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new().unwrap();
        let dest = temp_dir.path().join("missing.mp3");
        let url = format!("{}/missing.mp3", mock_server.uri());

        let result = client.download_to_path(&url, &dest).await;
        assert!(matches!(
            result,
            Err(DownloadError::HttpStatus { status: 404, .. })
        ));
        let entries: Vec<_> = std::fs::read_dir(temp_dir.path()).unwrap().collect();
        assert!(entries.is_empty(), "unexpected files: {entries:?}");
    }

    #[tokio::test]
    async fn test_download_cleanup_on_read_timeout() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/slow.mp3"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"data".to_vec())
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let client =
            HttpClient::with_timeouts(Duration::from_secs(5), Duration::from_secs(1)).unwrap();
        let dest = temp_dir.path().join("slow.mp3");
        let url = format!("{}/slow.mp3", mock_server.uri());

        let result = client.download_to_path(&url, &dest).await;
        assert!(result.is_err(), "expected timeout or network error");

        let entries: Vec<_> = std::fs::read_dir(temp_dir.path()).unwrap().collect();
        assert!(
            entries.is_empty(),
            "partial file must be cleaned up after stream error, found: {entries:?}"
        );
    }

    #[tokio::test]
    async fn test_download_empty_body_is_rejected() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new().unwrap();
        let dest = temp_dir.path().join("empty.mp3");
        let url = format!("{}/empty.mp3", mock_server.uri());

        let result = client.download_to_path(&url, &dest).await;
        assert!(matches!(result, Err(DownloadError::Truncated { .. })));
        assert!(!dest.exists());
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_download_invalid_url() {
        let temp_dir = TempDir::new().unwrap();
        let client = HttpClient::new().unwrap();
        let result = client
            .download_to_path("not a url", &temp_dir.path().join("x.mp3"))
            .await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }
}
