//! Streaming HTTP implementation of the platform download collaborator.
//!
//! `enqueue` returns as soon as the transfer task is spawned. The body is
//! streamed into `<file>.part` next to the reserved destination and renamed
//! over it on completion, so a half-written file never carries the final name.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use super::error::DownloadError;
use super::{DownloadRequest, PlatformDownloader};
use crate::user_agent;

const CONNECT_TIMEOUT_SECS: u64 = 10;
/// Idle time allowed between body chunks; total transfer time is unbounded.
const READ_TIMEOUT_SECS: u64 = 60;

/// Downloads media over HTTP on background tokio tasks.
///
/// # Example
///
/// ```no_run
/// use grabber_core::download::HttpDownloader;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let downloader = HttpDownloader::new()?;
/// // ... hand it to a DownloadCoordinator, submit jobs ...
/// downloader.wait_idle().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
    tasks: TaskTracker,
    failures: Arc<AtomicUsize>,
}

impl HttpDownloader {
    /// Creates a downloader with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Setup`] when the HTTP client cannot be built.
    pub fn new() -> Result<Self, DownloadError> {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a downloader with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Setup`] when the HTTP client cannot be built.
    pub fn new_with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .user_agent(user_agent::default_download_user_agent())
            .build()
            .map_err(|e| DownloadError::Setup {
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            tasks: TaskTracker::new(),
            failures: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Number of transfers still running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Number of background transfers that ended in an error.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    /// Waits until every transfer spawned so far has finished.
    pub async fn wait_idle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Performs one transfer in the current task, returning bytes written.
    ///
    /// On failure the partial file and the reserved destination are removed.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] for network, status, or filesystem failures.
    #[instrument(skip(self, request), fields(url = %request.media_url, path = %request.destination.display()))]
    pub async fn transfer(&self, request: &DownloadRequest) -> Result<u64, DownloadError> {
        let part_path = part_path_for(&request.destination);
        let result = self.transfer_inner(request, &part_path).await;

        if result.is_err() {
            debug!(path = %part_path.display(), "cleaning up partial file after error");
            let _ = tokio::fs::remove_file(&part_path).await;
            let _ = tokio::fs::remove_file(&request.destination).await;
        }
        result
    }

    async fn transfer_inner(
        &self,
        request: &DownloadRequest,
        part_path: &Path,
    ) -> Result<u64, DownloadError> {
        let url = request.media_url.as_str();
        let response = self
            .client
            .get(request.media_url.clone())
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let mut file = File::create(part_path)
            .await
            .map_err(|e| DownloadError::io(part_path, e))?;
        let bytes_written = stream_to_file(&mut file, response, url, part_path).await?;
        drop(file);

        tokio::fs::rename(part_path, &request.destination)
            .await
            .map_err(|e| DownloadError::io(request.destination.clone(), e))?;

        info!(
            path = %request.destination.display(),
            bytes = bytes_written,
            "download complete"
        );
        Ok(bytes_written)
    }
}

#[async_trait]
impl PlatformDownloader for HttpDownloader {
    async fn enqueue(&self, request: DownloadRequest) -> Result<(), DownloadError> {
        if self.tasks.is_closed() {
            return Err(DownloadError::platform_rejected(
                request.media_url.as_str(),
                "downloader is shutting down",
            ));
        }

        let downloader = self.clone();
        self.tasks.spawn(async move {
            if let Err(error) = downloader.transfer(&request).await {
                downloader.failures.fetch_add(1, Ordering::SeqCst);
                warn!(
                    provider = %request.provider,
                    path = %request.destination.display(),
                    error = %error,
                    "download failed"
                );
            }
        });
        Ok(())
    }
}

fn part_path_for(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::from_reqwest(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;
    use url::Url;
    use wiremock::matchers::{header_regex, method, path};
    use wiremock::{Mock, ResponseTemplate};

    use super::*;
    use crate::provider::Provider;
    use crate::test_support::socket_guard::start_mock_server_or_skip;

    fn request_for(url: &str, destination: PathBuf) -> DownloadRequest {
        DownloadRequest {
            media_url: Url::parse(url).unwrap(),
            destination,
            provider: Provider::Likee,
        }
    }

    #[test]
    fn test_part_path_for_appends_suffix() {
        assert_eq!(
            part_path_for(Path::new("/tmp/LikeeDownloads/clip.mp4")),
            PathBuf::from("/tmp/LikeeDownloads/clip.mp4.part")
        );
    }

    #[test]
    fn test_transfer_unreachable_host_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("clip.mp4");
        std::fs::write(&destination, b"").unwrap();
        let downloader = HttpDownloader::new().unwrap();
        let request = request_for("http://127.0.0.1:9/clip.mp4", destination.clone());

        let result = tokio_test::block_on(downloader.transfer(&request));

        assert!(matches!(result, Err(DownloadError::Network { .. })));
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn test_transfer_writes_body_and_removes_part_file() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();
        Mock::given(method("GET"))
            .and(path("/v/clip.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp4 bytes here"))
            .mount(&mock_server)
            .await;

        let destination = temp_dir.path().join("clip.mp4");
        std::fs::write(&destination, b"").unwrap();
        let downloader = HttpDownloader::new().unwrap();
        let request = request_for(&format!("{}/v/clip.mp4", mock_server.uri()), destination.clone());

        let bytes = downloader.transfer(&request).await.unwrap();

        assert_eq!(bytes, 14);
        assert_eq!(std::fs::read(&destination).unwrap(), b"mp4 bytes here");
        assert!(!part_path_for(&destination).exists());
    }

    #[tokio::test]
    async fn test_transfer_404_removes_reserved_file() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let destination = temp_dir.path().join("gone.mp4");
        std::fs::write(&destination, b"").unwrap();
        let downloader = HttpDownloader::new().unwrap();
        let request = request_for(&format!("{}/gone.mp4", mock_server.uri()), destination.clone());

        let err = downloader.transfer(&request).await.unwrap_err();

        assert!(matches!(err, DownloadError::HttpStatus { status: 404, .. }));
        assert!(!destination.exists());
        assert!(std::fs::read_dir(temp_dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_enqueue_returns_before_transfer_and_wait_idle_completes() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();
        Mock::given(method("GET"))
            .and(header_regex("user-agent", r"^grabber/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"slow body")
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&mock_server)
            .await;

        let destination = temp_dir.path().join("slow.mp4");
        std::fs::write(&destination, b"").unwrap();
        let downloader = HttpDownloader::new().unwrap();
        let request = request_for(&format!("{}/slow.mp4", mock_server.uri()), destination.clone());

        downloader.enqueue(request).await.unwrap();
        assert_eq!(downloader.in_flight(), 1);

        downloader.wait_idle().await;
        assert_eq!(downloader.in_flight(), 0);
        assert_eq!(downloader.failed_count(), 0);
        assert_eq!(std::fs::read(&destination).unwrap(), b"slow body");
    }

    #[tokio::test]
    async fn test_background_failure_is_counted() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("never.mp4");
        std::fs::write(&destination, b"").unwrap();
        let downloader = HttpDownloader::new().unwrap();

        downloader
            .enqueue(request_for("http://127.0.0.1:9/never.mp4", destination.clone()))
            .await
            .unwrap();
        downloader.wait_idle().await;

        assert_eq!(downloader.failed_count(), 1);
        assert!(!destination.exists());
    }
}
