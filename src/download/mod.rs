//! Download orchestration: turning a resolved media URL into a queued transfer.
//!
//! # Architecture
//!
//! - [`DownloadCoordinator`] - Checks write access, places the file in the provider's
//!   directory, claims a collision-free name, and hands the job to the platform
//! - [`PlatformDownloader`] - The platform's background transfer mechanism
//! - [`HttpDownloader`] - Streaming reqwest implementation of [`PlatformDownloader`]
//!
//! The coordinator never waits for bytes to move; its job ends once the
//! platform accepts the request.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use grabber_core::Provider;
//! use grabber_core::download::{DownloadCoordinator, HttpDownloader};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = Arc::new(HttpDownloader::new()?);
//! let coordinator = DownloadCoordinator::new("./downloads", downloader.clone());
//! let job = coordinator.job(
//!     Provider::Roposo,
//!     url::Url::parse("https://cdn.example.com/clip.mp4")?,
//!     "clip.mp4",
//! );
//! let path = coordinator.start_download(&job, true).await?;
//! println!("saving to {}", path.display());
//! downloader.wait_idle().await;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod filename;

pub use client::HttpDownloader;
pub use error::DownloadError;
pub use filename::{DEFAULT_MEDIA_EXTENSION, generated_file_name, media_file_name};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};
use url::Url;

use crate::provider::Provider;

use filename::reserve_unique_path;

/// A fully specified download, created from a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    /// Direct media URL.
    pub media_url: Url,
    /// Provider-specific directory the file goes into.
    pub destination_directory: PathBuf,
    /// Requested filename; may be suffixed on collision.
    pub file_name: String,
    /// Provider the media came from.
    pub provider: Provider,
}

/// What the platform receives: the URL and the already-claimed destination path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Direct media URL.
    pub media_url: Url,
    /// Reserved, collision-free destination file.
    pub destination: PathBuf,
    /// Provider the media came from.
    pub provider: Provider,
}

/// The platform's background download mechanism.
///
/// `enqueue` must return once the transfer is accepted, without waiting for
/// it to complete.
#[async_trait]
pub trait PlatformDownloader: Send + Sync {
    /// Accepts a transfer.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::PlatformRejected`] when the platform refuses the job.
    async fn enqueue(&self, request: DownloadRequest) -> Result<(), DownloadError>;
}

/// Validates write access and submits jobs to a [`PlatformDownloader`].
#[derive(Clone)]
pub struct DownloadCoordinator {
    root: PathBuf,
    platform: Arc<dyn PlatformDownloader>,
}

impl DownloadCoordinator {
    /// Creates a coordinator writing under `root`.
    pub fn new(root: impl Into<PathBuf>, platform: Arc<dyn PlatformDownloader>) -> Self {
        Self {
            root: root.into(),
            platform,
        }
    }

    /// Download root shared by all providers.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fixed per-provider destination directory.
    #[must_use]
    pub fn destination_dir(&self, provider: Provider) -> PathBuf {
        self.root.join(provider.directory_name())
    }

    /// Builds a job targeting the provider's destination directory.
    pub fn job(&self, provider: Provider, media_url: Url, file_name: impl Into<String>) -> DownloadJob {
        DownloadJob {
            media_url,
            destination_directory: self.destination_dir(provider),
            file_name: file_name.into(),
            provider,
        }
    }

    /// Submits `job` to the platform and returns the path the file will land at.
    ///
    /// Never overwrites: when `file_name` is taken a numeric suffix is added.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::PermissionRequired`] when `write_access_granted` is false
    /// - [`DownloadError::Io`] when the destination cannot be created
    /// - [`DownloadError::PlatformRejected`] when the platform refuses the job
    #[instrument(skip(self, job), fields(provider = %job.provider, file_name = %job.file_name))]
    pub async fn start_download(
        &self,
        job: &DownloadJob,
        write_access_granted: bool,
    ) -> Result<PathBuf, DownloadError> {
        if !write_access_granted {
            return Err(DownloadError::permission_required(job.provider));
        }

        tokio::fs::create_dir_all(&job.destination_directory)
            .await
            .map_err(|e| DownloadError::io(job.destination_directory.clone(), e))?;

        let directory = job.destination_directory.clone();
        let file_name = job.file_name.clone();
        let destination = tokio::task::spawn_blocking(move || reserve_unique_path(&directory, &file_name))
            .await
            .map_err(|e| {
                DownloadError::io(
                    job.destination_directory.clone(),
                    std::io::Error::other(e.to_string()),
                )
            })?
            .map_err(|e| DownloadError::io(job.destination_directory.clone(), e))?;
        debug!(path = %destination.display(), "reserved destination");

        let request = DownloadRequest {
            media_url: job.media_url.clone(),
            destination: destination.clone(),
            provider: job.provider,
        };
        if let Err(error) = self.platform.enqueue(request).await {
            let _ = tokio::fs::remove_file(&destination).await;
            return Err(error);
        }

        info!(path = %destination.display(), "download started");
        Ok(destination)
    }
}

impl std::fmt::Debug for DownloadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadCoordinator")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use tempfile::TempDir;

    use super::*;

    #[derive(Default)]
    struct RecordingPlatform {
        requests: Mutex<Vec<DownloadRequest>>,
        reject: bool,
    }

    #[async_trait]
    impl PlatformDownloader for RecordingPlatform {
        async fn enqueue(&self, request: DownloadRequest) -> Result<(), DownloadError> {
            if self.reject {
                return Err(DownloadError::platform_rejected(
                    request.media_url.as_str(),
                    "queue full",
                ));
            }
            self.requests.lock().unwrap().push(request);
            Ok(())
        }
    }

    fn media() -> Url {
        Url::parse("https://cdn.example.com/video.mp4").unwrap()
    }

    #[test]
    fn test_destination_dirs_are_distinct_per_provider() {
        let coordinator = DownloadCoordinator::new("/data", Arc::new(RecordingPlatform::default()));
        let dirs: Vec<PathBuf> = Provider::all()
            .iter()
            .map(|p| coordinator.destination_dir(*p))
            .collect();
        assert_eq!(dirs[0], PathBuf::from("/data/ChingariDownloads"));
        assert_eq!(dirs[1], PathBuf::from("/data/LikeeDownloads"));
        assert_eq!(dirs[2], PathBuf::from("/data/RoposoDownloads"));
    }

    #[tokio::test]
    async fn test_start_download_without_access_fails_and_enqueues_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let platform = Arc::new(RecordingPlatform::default());
        let coordinator = DownloadCoordinator::new(temp_dir.path(), platform.clone());
        let job = coordinator.job(Provider::Likee, media(), "video.mp4");

        let err = coordinator.start_download(&job, false).await.unwrap_err();

        assert!(matches!(err, DownloadError::PermissionRequired { .. }));
        assert!(platform.requests.lock().unwrap().is_empty());
        assert!(!job.destination_directory.exists());
    }

    #[tokio::test]
    async fn test_start_download_creates_provider_dir_and_enqueues() {
        let temp_dir = TempDir::new().unwrap();
        let platform = Arc::new(RecordingPlatform::default());
        let coordinator = DownloadCoordinator::new(temp_dir.path(), platform.clone());
        let job = coordinator.job(Provider::Chingari, media(), "video.mp4");

        let path = coordinator.start_download(&job, true).await.unwrap();

        assert_eq!(path, temp_dir.path().join("ChingariDownloads").join("video.mp4"));
        let requests = platform.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].destination, path);
        assert_eq!(requests[0].media_url, media());
    }

    #[tokio::test]
    async fn test_start_download_never_overwrites_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let platform = Arc::new(RecordingPlatform::default());
        let coordinator = DownloadCoordinator::new(temp_dir.path(), platform.clone());
        let dir = coordinator.destination_dir(Provider::Roposo);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("video.mp4"), b"existing").unwrap();

        let job = coordinator.job(Provider::Roposo, media(), "video.mp4");
        let path = coordinator.start_download(&job, true).await.unwrap();

        assert_ne!(path, dir.join("video.mp4"));
        assert_eq!(path, dir.join("video_1.mp4"));
        assert_eq!(std::fs::read(dir.join("video.mp4")).unwrap(), b"existing");
    }

    #[tokio::test]
    async fn test_start_download_rejected_releases_reservation() {
        let temp_dir = TempDir::new().unwrap();
        let platform = Arc::new(RecordingPlatform {
            reject: true,
            ..RecordingPlatform::default()
        });
        let coordinator = DownloadCoordinator::new(temp_dir.path(), platform);
        let job = coordinator.job(Provider::Likee, media(), "video.mp4");

        let err = coordinator.start_download(&job, true).await.unwrap_err();

        assert!(matches!(err, DownloadError::PlatformRejected { .. }));
        assert!(!job.destination_directory.join("video.mp4").exists());
    }

    #[tokio::test]
    async fn test_concurrent_jobs_get_distinct_names() {
        let temp_dir = TempDir::new().unwrap();
        let platform = Arc::new(RecordingPlatform::default());
        let coordinator = DownloadCoordinator::new(temp_dir.path(), platform.clone());
        let job = coordinator.job(Provider::Likee, media(), "video.mp4");

        let (a, b) = tokio::join!(
            coordinator.start_download(&job, true),
            coordinator.start_download(&job, true)
        );

        assert_ne!(a.unwrap(), b.unwrap());
        assert_eq!(platform.requests.lock().unwrap().len(), 2);
    }
}
