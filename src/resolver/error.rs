//! Error types for link resolution.
//!
//! Each variant keeps the What/Why/Fix shape used across the project, and maps
//! to one [`ResolutionFailure`] class so callers can tell a dead network apart
//! from a bad link or a page that no longer looks the way the scraper expects.

use thiserror::Error;

use crate::provider::Provider;

/// Coarse failure classes surfaced to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionFailure {
    /// The provider could not be reached at all
    NetworkUnreachable,
    /// The provider answered but refused the link (404, 403, removed post, ...)
    UpstreamRejected,
    /// The provider answered with a server error (5xx)
    ServerUnavailable,
    /// The page was fetched but no media URL could be extracted from it
    ParseFailure,
    /// The request exceeded the configured timeout
    TimedOut,
    /// The resolver itself faulted
    Internal,
}

/// Errors that can occur while resolving a shared link to a media URL.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// Connection-level failure (DNS, refused, TLS, reset)
    #[error("could not reach {provider} for '{url}': {reason}\n  Suggestion: Check your internet connection and try again")]
    NetworkUnreachable {
        /// Provider being contacted
        provider: Provider,
        /// The link being resolved
        url: String,
        /// Underlying transport error text
        reason: String,
    },

    /// Provider responded with a non-success status or an error payload
    #[error("{provider} rejected '{url}' (HTTP {status}): {reason}\n  Suggestion: Copy the share link again; the post may be private or deleted")]
    UpstreamRejected {
        /// Provider being contacted
        provider: Provider,
        /// The link being resolved
        url: String,
        /// HTTP status code, or 0 when the rejection came in the body
        status: u16,
        /// Why the provider refused
        reason: String,
    },

    /// Provider answered with a server error
    #[error("{provider} is unavailable for '{url}' (HTTP {status})\n  Suggestion: The service may be down; try again later")]
    ServerUnavailable {
        /// Provider being contacted
        provider: Provider,
        /// The link being resolved
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Page fetched but nothing downloadable was found in it
    #[error("no media found for '{url}' on {provider}: {reason}\n  Suggestion: The page layout may have changed; try again later")]
    ParseFailure {
        /// Provider being contacted
        provider: Provider,
        /// The link being resolved
        url: String,
        /// What was missing or malformed
        reason: String,
    },

    /// Resolution exceeded the per-request timeout
    #[error("resolving '{url}' timed out after {seconds}s\n  Suggestion: Try again on a faster connection")]
    TimedOut {
        /// The link being resolved
        url: String,
        /// Timeout that elapsed
        seconds: u64,
    },

    /// A resolver faulted unexpectedly
    #[error("resolver for {provider} failed unexpectedly: {reason}")]
    Internal {
        /// Provider whose resolver faulted
        provider: Provider,
        /// Fault description
        reason: String,
    },
}

impl ResolveError {
    /// Creates a `NetworkUnreachable` error.
    #[must_use]
    pub fn network(provider: Provider, url: &str, reason: &str) -> Self {
        Self::NetworkUnreachable {
            provider,
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates an `UpstreamRejected` error.
    #[must_use]
    pub fn rejected(provider: Provider, url: &str, status: u16, reason: &str) -> Self {
        Self::UpstreamRejected {
            provider,
            url: url.to_string(),
            status,
            reason: reason.to_string(),
        }
    }

    /// Creates a `ServerUnavailable` error.
    #[must_use]
    pub fn unavailable(provider: Provider, url: &str, status: u16) -> Self {
        Self::ServerUnavailable {
            provider,
            url: url.to_string(),
            status,
        }
    }

    /// Creates the error matching a non-success HTTP status.
    #[must_use]
    pub fn from_status(provider: Provider, url: &str, status: u16, reason: &str) -> Self {
        if status >= 500 {
            Self::unavailable(provider, url, status)
        } else {
            Self::rejected(provider, url, status, reason)
        }
    }

    /// Creates a `ParseFailure` error.
    #[must_use]
    pub fn parse_failure(provider: Provider, url: &str, reason: &str) -> Self {
        Self::ParseFailure {
            provider,
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates a `TimedOut` error.
    #[must_use]
    pub fn timed_out(url: &str, seconds: u64) -> Self {
        Self::TimedOut {
            url: url.to_string(),
            seconds,
        }
    }

    /// Creates an `Internal` error.
    #[must_use]
    pub fn internal(provider: Provider, reason: &str) -> Self {
        Self::Internal {
            provider,
            reason: reason.to_string(),
        }
    }

    /// Classifies a reqwest failure into the matching variant.
    #[must_use]
    pub fn from_reqwest(provider: Provider, url: &str, error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::timed_out(url, super::http_client::read_timeout_secs());
        }
        if let Some(status) = error.status() {
            return Self::from_status(provider, url, status.as_u16(), &error.to_string());
        }
        if error.is_decode() || error.is_body() {
            return Self::parse_failure(provider, url, &error.to_string());
        }
        Self::network(provider, url, &error.to_string())
    }

    /// Failure class of this error.
    #[must_use]
    pub fn kind(&self) -> ResolutionFailure {
        match self {
            Self::NetworkUnreachable { .. } => ResolutionFailure::NetworkUnreachable,
            Self::UpstreamRejected { .. } => ResolutionFailure::UpstreamRejected,
            Self::ServerUnavailable { .. } => ResolutionFailure::ServerUnavailable,
            Self::ParseFailure { .. } => ResolutionFailure::ParseFailure,
            Self::TimedOut { .. } => ResolutionFailure::TimedOut,
            Self::Internal { .. } => ResolutionFailure::Internal,
        }
    }

    /// Short message suitable for a toast or status line.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        self.kind().user_message()
    }
}

impl ResolutionFailure {
    /// Short message suitable for a toast or status line.
    #[must_use]
    pub fn user_message(self) -> &'static str {
        match self {
            Self::NetworkUnreachable => "No Internet connection available",
            Self::UpstreamRejected => "Enter valid URL",
            Self::ServerUnavailable => "Service unavailable, please try again later",
            Self::ParseFailure => "Could not find a video at this link",
            Self::TimedOut => "Request timed out",
            Self::Internal => "Something went wrong, please try again",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_distinguishable() {
        let url = "https://likee.video/v/1";
        let errors = [
            ResolveError::network(Provider::Likee, url, "connection refused"),
            ResolveError::rejected(Provider::Likee, url, 404, "not found"),
            ResolveError::parse_failure(Provider::Likee, url, "no video_url"),
        ];
        let kinds: Vec<_> = errors.iter().map(ResolveError::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ResolutionFailure::NetworkUnreachable,
                ResolutionFailure::UpstreamRejected,
                ResolutionFailure::ParseFailure,
            ]
        );
    }

    #[test]
    fn test_user_messages() {
        let url = "https://roposo.com/story/1";
        assert_eq!(
            ResolveError::network(Provider::Roposo, url, "dns").user_message(),
            "No Internet connection available"
        );
        assert_eq!(
            ResolveError::rejected(Provider::Roposo, url, 404, "gone").user_message(),
            "Enter valid URL"
        );
        assert_eq!(
            ResolveError::timed_out(url, 30).user_message(),
            "Request timed out"
        );
    }

    #[test]
    fn test_server_errors_are_not_reported_as_bad_links() {
        let url = "https://chingari.io/s/x";
        let err = ResolveError::from_status(Provider::Chingari, url, 503, "unavailable");
        assert_eq!(err.kind(), ResolutionFailure::ServerUnavailable);
        assert_eq!(err.user_message(), "Service unavailable, please try again later");

        let err = ResolveError::from_status(Provider::Chingari, url, 404, "not found");
        assert_eq!(err.kind(), ResolutionFailure::UpstreamRejected);
        assert_eq!(err.user_message(), "Enter valid URL");
    }

    #[test]
    fn test_rejected_message_contains_status_and_suggestion() {
        let err = ResolveError::rejected(Provider::Chingari, "https://chingari.io/s/x", 403, "private");
        let msg = err.to_string();
        assert!(msg.contains("403"));
        assert!(msg.contains("Chingari"));
        assert!(msg.contains("Suggestion"));
    }

    #[test]
    fn test_resolve_error_clone() {
        let err = ResolveError::parse_failure(Provider::Likee, "u", "r");
        assert_eq!(err.to_string(), err.clone().to_string());
    }
}
