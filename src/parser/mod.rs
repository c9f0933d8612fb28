//! Link validation for pasted or typed input.
//!
//! Users paste whatever the provider's share sheet produced, which is often a
//! sentence with the link buried inside. This module pulls the first usable
//! http(s) URL out of that text and checks it belongs to the expected provider.
//!
//! # Example
//!
//! ```
//! use grabber_core::Provider;
//! use grabber_core::parser::validate;
//!
//! let url = validate("check this out https://chingari.io/s/abc123 lol", Provider::Chingari)
//!     .unwrap();
//! assert_eq!(url.as_str(), "https://chingari.io/s/abc123");
//! ```

mod error;
mod url;

pub use error::{MAX_URL_LENGTH, ParseError, ValidationError};
pub use self::url::{UrlExtractionResult, extract_urls, first_url};

use std::fmt;

use tracing::debug;

use crate::provider::Provider;

/// A link that passed [`validate`] for a specific provider.
///
/// Always an absolute http(s) URL whose host or path carries the provider's marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedUrl {
    url: ::url::Url,
    provider: Provider,
}

impl ValidatedUrl {
    /// The validated URL.
    #[must_use]
    pub fn url(&self) -> &::url::Url {
        &self.url
    }

    /// The URL as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// The provider this URL was validated against.
    #[must_use]
    pub fn provider(&self) -> Provider {
        self.provider
    }
}

impl fmt::Display for ValidatedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Validates raw pasted text against a provider's link shape.
///
/// Pure and deterministic: no I/O happens here.
///
/// # Errors
///
/// - [`ValidationError::Empty`] when the input is empty or whitespace only
/// - [`ValidationError::NoUrlFound`] when no well-formed http(s) URL appears in the text
/// - [`ValidationError::WrongProvider`] when the first URL lacks the provider's marker
pub fn validate(raw: &str, provider: Provider) -> Result<ValidatedUrl, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }

    let Some(url) = first_url(trimmed) else {
        debug!(provider = %provider, "no URL in submitted text");
        return Err(ValidationError::NoUrlFound);
    };

    if !provider.matches_url(&url) {
        debug!(provider = %provider, url = %url, "URL does not carry provider marker");
        return Err(ValidationError::WrongProvider {
            url: url.to_string(),
            provider,
        });
    }

    Ok(ValidatedUrl { url, provider })
}

/// Extracts the link to place in the input field from clipboard text.
///
/// Uses the same URL search as [`validate`]; returns `None` when the text holds
/// no URL at all.
#[must_use]
pub fn extract_link(text: &str) -> Option<String> {
    first_url(text).map(String::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_extracts_link_from_prose() {
        let url = validate(
            "check this out https://chingari.io/s/abc123 lol",
            Provider::Chingari,
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://chingari.io/s/abc123");
        assert_eq!(url.provider(), Provider::Chingari);
    }

    #[test]
    fn test_validate_empty_and_whitespace() {
        assert_eq!(validate("", Provider::Likee), Err(ValidationError::Empty));
        assert_eq!(
            validate("   \n\t ", Provider::Likee),
            Err(ValidationError::Empty)
        );
    }

    #[test]
    fn test_validate_no_url() {
        assert_eq!(
            validate("just some words", Provider::Roposo),
            Err(ValidationError::NoUrlFound)
        );
        assert_eq!(
            validate("ftp://roposo.com/x", Provider::Roposo),
            Err(ValidationError::NoUrlFound)
        );
    }

    #[test]
    fn test_validate_wrong_provider() {
        let err = validate("https://example.com/x", Provider::Likee).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::WrongProvider {
                provider: Provider::Likee,
                ..
            }
        ));
    }

    #[test]
    fn test_validate_other_provider_link_is_wrong_provider() {
        let err = validate("https://likee.video/v/1", Provider::Chingari).unwrap_err();
        assert!(matches!(err, ValidationError::WrongProvider { .. }));
    }

    #[test]
    fn test_validate_is_deterministic() {
        let raw = "see https://www.roposo.com/story/abc.";
        assert_eq!(
            validate(raw, Provider::Roposo),
            validate(raw, Provider::Roposo)
        );
    }

    #[test]
    fn test_extract_link_returns_first_url() {
        assert_eq!(
            extract_link("a https://likee.video/v/1 b https://likee.video/v/2").as_deref(),
            Some("https://likee.video/v/1")
        );
        assert_eq!(extract_link("nothing here"), None);
    }
}
