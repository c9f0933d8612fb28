//! Error types for the download module.
//!
//! `PermissionRequired` and `PlatformRejected` are returned synchronously by
//! [`super::DownloadCoordinator::start_download`]. The transfer variants
//! (`Network`, `HttpStatus`, `Timeout`) only occur inside the background
//! transfer and are logged there.

use std::path::PathBuf;

use thiserror::Error;

use crate::provider::Provider;

/// Errors that can occur while starting or performing a download.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Write access has not been granted; the caller must obtain it first.
    #[error("storage write access required to save {provider} media\n  Suggestion: Grant storage permission and submit the link again")]
    PermissionRequired {
        /// Provider whose download was refused
        provider: Provider,
    },

    /// The platform download mechanism refused the job.
    #[error("download of {url} was rejected: {reason}")]
    PlatformRejected {
        /// Media URL of the rejected job
        url: String,
        /// Why the platform refused
        reason: String,
    },

    /// File system error (creating the destination, reserving the name, writing).
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Network-level error during transfer.
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Media host answered with a non-success status.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Transfer timed out.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The HTTP client used for transfers could not be built.
    #[error("download client could not be initialized: {reason}")]
    Setup {
        /// Builder failure text
        reason: String,
    },
}

impl DownloadError {
    /// Creates a `PermissionRequired` error.
    #[must_use]
    pub fn permission_required(provider: Provider) -> Self {
        Self::PermissionRequired { provider }
    }

    /// Creates a `PlatformRejected` error.
    pub fn platform_rejected(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PlatformRejected {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classifies a reqwest failure.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            return Self::Timeout { url };
        }
        if let Some(status) = source.status() {
            return Self::HttpStatus {
                url,
                status: status.as_u16(),
            };
        }
        Self::Network { url, source }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Short message suitable for a toast or status line.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::PermissionRequired { .. } => "App needs storage permission to download files",
            Self::PlatformRejected { .. } | Self::Setup { .. } => "Download could not be started",
            Self::Io { .. } => "Could not save to the download folder",
            Self::Network { .. } | Self::HttpStatus { .. } | Self::Timeout { .. } => {
                "Download failed"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_required_message() {
        let err = DownloadError::permission_required(Provider::Likee);
        assert_eq!(
            err.user_message(),
            "App needs storage permission to download files"
        );
        assert!(err.to_string().contains("Likee"));
        assert!(err.to_string().contains("Suggestion"));
    }

    #[test]
    fn test_platform_rejected_display() {
        let err = DownloadError::platform_rejected("https://cdn/v.mp4", "queue full");
        assert_eq!(
            err.to_string(),
            "download of https://cdn/v.mp4 was rejected: queue full"
        );
    }

    #[test]
    fn test_io_error_display_includes_path() {
        let err = DownloadError::io(
            "/tmp/x/clip.mp4",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/tmp/x/clip.mp4"));
        assert_eq!(err.user_message(), "Could not save to the download folder");
    }

    #[test]
    fn test_http_status_message() {
        let err = DownloadError::http_status("https://cdn/v.mp4", 403);
        assert_eq!(err.to_string(), "HTTP 403 downloading https://cdn/v.mp4");
        assert_eq!(err.user_message(), "Download failed");
    }
}
