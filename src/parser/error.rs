//! Error types for link extraction and validation.

use thiserror::Error;

use crate::provider::Provider;

/// Maximum URL length to accept (standard browser limit).
/// URLs longer than this are rejected to prevent memory issues.
pub const MAX_URL_LENGTH: usize = 2000;

/// Why a single URL-looking candidate found in pasted text was discarded.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// URL is malformed or uses unsupported scheme
    #[error("invalid URL '{url}': {reason}\n  Suggestion: {suggestion}")]
    InvalidUrl {
        /// The URL that failed validation
        url: String,
        /// Why the URL is invalid
        reason: String,
        /// How to fix the issue
        suggestion: String,
    },

    /// URL exceeds maximum allowed length
    #[error(
        "URL too long ({length} chars, max {max}): {url_preview}...\n  Suggestion: Copy the share link again from the app"
    )]
    UrlTooLong {
        /// Truncated URL for display
        url_preview: String,
        /// Actual length
        length: usize,
        /// Maximum allowed
        max: usize,
    },
}

impl ParseError {
    /// Creates an `InvalidUrl` error for a non-web URL scheme.
    #[must_use]
    pub fn unsupported_scheme(url: &str, scheme: &str) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: format!("scheme '{scheme}' is not supported"),
            suggestion: "Use http:// or https:// URLs".to_string(),
        }
    }

    /// Creates an `InvalidUrl` error for a malformed URL.
    #[must_use]
    pub fn malformed(url: &str, parse_error: &str) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: parse_error.to_string(),
            suggestion: "Check the URL format and try again".to_string(),
        }
    }

    /// Creates an `InvalidUrl` error for a URL without a host.
    #[must_use]
    pub fn no_host(url: &str) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: "URL has no host".to_string(),
            suggestion: "Ensure the URL includes a domain (e.g., likee.video)".to_string(),
        }
    }

    /// Creates a `UrlTooLong` error for URLs exceeding the maximum length.
    #[must_use]
    pub fn too_long(url: &str) -> Self {
        Self::UrlTooLong {
            url_preview: url.chars().take(50).collect(),
            length: url.len(),
            max: MAX_URL_LENGTH,
        }
    }
}

/// Why a pasted string was rejected for a provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Input was empty or whitespace only
    #[error("no link entered\n  Suggestion: Paste a share link from the app")]
    Empty,

    /// No well-formed http(s) URL was found anywhere in the input
    #[error("no valid link found in input\n  Suggestion: Copy the share link again and paste the whole message")]
    NoUrlFound,

    /// A URL was found but it does not belong to the expected provider
    #[error("'{url}' is not a {provider} link\n  Suggestion: Paste a link shared from the {provider} app")]
    WrongProvider {
        /// The extracted URL
        url: String,
        /// The provider the link was checked against
        provider: Provider,
    },
}

impl ValidationError {
    /// Short message suitable for a toast or status line.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Empty => "Enter URL",
            Self::NoUrlFound | Self::WrongProvider { .. } => "Enter valid URL",
        }
    }
}
