//! Shared scraping utilities for provider resolvers: meta-tag extraction, JSON
//! string unescaping, and URL absolutization.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::Client;
use reqwest::header::ACCEPT;
use tracing::debug;
use url::Url;

use crate::provider::Provider;

use super::ResolveError;

/// Compiles a regex at static init; panics on invalid pattern.
pub fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// `og:video`, `og:video:url` or `og:video:secure_url` with `property` before `content`.
pub static OG_VIDEO_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)<meta\s+[^>]*(?:name|property)\s*=\s*["']og:video(?::secure_url|:url)?["'][^>]*content\s*=\s*["']([^"']+)["']"#,
    )
});

/// Same as [`OG_VIDEO_RE`] with `content` before `property`.
pub static OG_VIDEO_REVERSED_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)<meta\s+[^>]*content\s*=\s*["']([^"']+)["'][^>]*(?:name|property)\s*=\s*["']og:video(?::secure_url|:url)?["']"#,
    )
});

/// `og:title` meta tag.
pub static OG_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)<meta\s+[^>]*(?:name|property)\s*=\s*["']og:title["'][^>]*content\s*=\s*["']([^"']+)["']"#,
    )
});

/// `src` of the first `<video>` or `<source>` element.
pub static VIDEO_SOURCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)<(?:video|source)\s+[^>]*src\s*=\s*["']([^"']+)["']"#)
});

/// Returns the first capture of `regex` in `html`, trimmed and entity-decoded.
#[must_use]
pub fn extract_meta_value(html: &str, regex: &Regex) -> Option<String> {
    regex
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| decode_html_entities(m.as_str().trim()))
        .filter(|value| !value.is_empty())
}

/// Returns the `og:video` URL from a page in either attribute order.
#[must_use]
pub fn extract_og_video(html: &str) -> Option<String> {
    extract_meta_value(html, &OG_VIDEO_RE).or_else(|| extract_meta_value(html, &OG_VIDEO_REVERSED_RE))
}

/// Decodes the handful of HTML entities that show up inside attribute values.
#[must_use]
pub fn decode_html_entities(value: &str) -> String {
    value
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x2F;", "/")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

/// Unescapes the body of a JSON string literal captured by a regex.
///
/// Handles `\/`, `\u0026` and other escapes by round-tripping through `serde_json`;
/// falls back to the common slash/ampersand replacements on malformed input.
#[must_use]
pub fn unescape_json_string(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{raw}\"")).unwrap_or_else(|_| {
        raw.replace("\\/", "/")
            .replace("\\u0026", "&")
            .replace("\\u002F", "/")
    })
}

/// Resolves a possibly relative URL string against a base URL.
///
/// Returns the value as-is if it already starts with `http://` or `https://`;
/// normalizes `//...` to `https:...`; otherwise joins with `base_url`.
#[must_use]
pub fn absolutize_url(value: &str, base_url: &Url) -> Option<Url> {
    if value.starts_with("http://") || value.starts_with("https://") {
        return Url::parse(value).ok();
    }
    if value.starts_with("//") {
        return Url::parse(&format!("https:{value}")).ok();
    }
    base_url.join(value).ok()
}

/// A fetched provider page.
#[derive(Debug, Clone)]
pub struct Page {
    /// URL after redirects; short links land on the canonical post page
    pub final_url: Url,
    /// Response body
    pub html: String,
}

/// Fetches a provider page, mapping transport and status failures to [`ResolveError`].
///
/// # Errors
///
/// - `NetworkUnreachable`/`TimedOut` when the request cannot complete
/// - `UpstreamRejected` on a 4xx status
/// - `ServerUnavailable` on a 5xx status
/// - `ParseFailure` when the body cannot be read as text
pub async fn fetch_page(client: &Client, provider: Provider, url: &Url) -> Result<Page, ResolveError> {
    let response = client
        .get(url.clone())
        .header(
            ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .send()
        .await
        .map_err(|e| ResolveError::from_reqwest(provider, url.as_str(), &e))?;

    let status = response.status();
    debug!(provider = %provider, status = status.as_u16(), "provider page response");
    if !status.is_success() {
        let reason = if is_rejection_status(status.as_u16()) {
            "post not found or not public"
        } else {
            "unexpected status"
        };
        return Err(ResolveError::from_status(
            provider,
            url.as_str(),
            status.as_u16(),
            reason,
        ));
    }

    let final_url = response.url().clone();
    let html = response
        .text()
        .await
        .map_err(|e| ResolveError::parse_failure(provider, url.as_str(), &e.to_string()))?;
    Ok(Page { final_url, html })
}

/// Returns true if the HTTP status means the provider refused this link.
#[must_use]
pub fn is_rejection_status(status: u16) -> bool {
    matches!(status, 400..=499)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_og_video_property_first() {
        let html = r#"<meta property="og:video" content="https://cdn.example.com/a.mp4?x=1&amp;y=2">"#;
        assert_eq!(
            extract_og_video(html).as_deref(),
            Some("https://cdn.example.com/a.mp4?x=1&y=2")
        );
    }

    #[test]
    fn test_extract_og_video_content_first() {
        let html = r#"<meta content="https://cdn.example.com/b.mp4" property="og:video:secure_url" />"#;
        assert_eq!(
            extract_og_video(html).as_deref(),
            Some("https://cdn.example.com/b.mp4")
        );
    }

    #[test]
    fn test_extract_meta_value_empty_is_none() {
        let html = r#"<meta property="og:title" content="  ">"#;
        assert_eq!(extract_meta_value(html, &OG_TITLE_RE), None);
    }

    #[test]
    fn test_video_source_regex() {
        let html = r#"<video autoplay src="https://cdn.example.com/c.mp4"></video>"#;
        assert_eq!(
            extract_meta_value(html, &VIDEO_SOURCE_RE).as_deref(),
            Some("https://cdn.example.com/c.mp4")
        );
    }

    #[test]
    fn test_unescape_json_string() {
        assert_eq!(
            unescape_json_string(r"https:\/\/v.likee.video\/a.mp4?a=1&b=2"),
            "https://v.likee.video/a.mp4?a=1&b=2"
        );
    }

    #[test]
    fn test_absolutize_url_variants() {
        let base = Url::parse("https://www.roposo.com/story/1").unwrap();
        assert_eq!(
            absolutize_url("//cdn.roposo.com/v.mp4", &base).unwrap().as_str(),
            "https://cdn.roposo.com/v.mp4"
        );
        assert_eq!(
            absolutize_url("/media/v.mp4", &base).unwrap().as_str(),
            "https://www.roposo.com/media/v.mp4"
        );
        assert_eq!(
            absolutize_url("http://other.com/v.mp4", &base).unwrap().as_str(),
            "http://other.com/v.mp4"
        );
    }

    #[test]
    fn test_is_rejection_status() {
        assert!(is_rejection_status(404));
        assert!(is_rejection_status(403));
        assert!(!is_rejection_status(200));
        assert!(!is_rejection_status(503));
    }
}
