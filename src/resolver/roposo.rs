//! Roposo resolver for `roposo.com` story links.
//!
//! Story pages are Next.js renders; the clip URL sits somewhere inside the
//! `__NEXT_DATA__` payload, whose shape shifts between releases. We walk the
//! whole payload for the first playable URL instead of binding to a schema,
//! then fall back to `og:video` and the first `<video>`/`<source>` element.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::download::media_file_name;
use crate::parser::ValidatedUrl;
use crate::provider::Provider;

use super::http_client::build_resolver_http_client;
use super::utils::{
    OG_TITLE_RE, VIDEO_SOURCE_RE, absolutize_url, compile_static_regex, extract_meta_value,
    extract_og_video, fetch_page,
};
use super::{LinkResolver, ResolveContext, ResolveError, ResolvedMedia};

static NEXT_DATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)<script[^>]*id\s*=\s*["']__NEXT_DATA__["'][^>]*>(.*?)</script>"#,
    )
});

/// Keys that hold the clip itself, checked before any other string.
const PREFERRED_KEYS: &[&str] = &["videoUrl", "video_url", "mp4Url", "contentUrl", "url"];

const PLAYABLE_EXTENSIONS: &[&str] = &[".mp4", ".mov", ".webm", ".m4v"];

/// Resolver for Roposo story links.
pub struct RoposoResolver {
    client: Client,
}

impl RoposoResolver {
    /// Creates a Roposo resolver.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when HTTP client construction fails.
    pub fn new() -> Result<Self, ResolveError> {
        Ok(Self {
            client: build_resolver_http_client(Provider::Roposo)?,
        })
    }
}

fn looks_playable(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or_default();
    (lower.starts_with("http") || lower.starts_with("//"))
        && PLAYABLE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Depth-first search for a playable URL, preferring known keys at each level.
fn find_playable_url(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if looks_playable(s) => Some(s.clone()),
        Value::Object(map) => PREFERRED_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|v| v.as_str().filter(|s| looks_playable(s)).map(str::to_string))
            .or_else(|| map.values().find_map(find_playable_url)),
        Value::Array(items) => items.iter().find_map(find_playable_url),
        _ => None,
    }
}

fn extract_from_next_data(html: &str) -> Option<String> {
    let raw = NEXT_DATA_RE.captures(html)?.get(1)?.as_str();
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(payload) => find_playable_url(&payload),
        Err(error) => {
            debug!(error = %error, "roposo __NEXT_DATA__ is not valid JSON");
            None
        }
    }
}

fn extract_media_url(html: &str, page_url: &Url) -> Option<Url> {
    extract_from_next_data(html)
        .or_else(|| extract_og_video(html))
        .or_else(|| extract_meta_value(html, &VIDEO_SOURCE_RE))
        .and_then(|raw| absolutize_url(&raw, page_url))
}

#[async_trait]
impl LinkResolver for RoposoResolver {
    fn name(&self) -> &'static str {
        "roposo"
    }

    fn provider(&self) -> Provider {
        Provider::Roposo
    }

    #[tracing::instrument(skip(self, _ctx), fields(resolver = "roposo", url = %url))]
    async fn resolve(
        &self,
        url: &ValidatedUrl,
        _ctx: &ResolveContext,
    ) -> Result<ResolvedMedia, ResolveError> {
        let page = fetch_page(&self.client, Provider::Roposo, url.url()).await?;

        let media_url = extract_media_url(&page.html, &page.final_url).ok_or_else(|| {
            ResolveError::parse_failure(
                Provider::Roposo,
                url.as_str(),
                "no playable URL in __NEXT_DATA__, og:video or <video>",
            )
        })?;

        let title = extract_meta_value(&page.html, &OG_TITLE_RE);
        let file_name = media_file_name(Provider::Roposo, title.as_deref(), &media_url);
        Ok(ResolvedMedia::new(media_url, file_name))
    }
}
