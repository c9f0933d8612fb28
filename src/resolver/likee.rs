//! Likee resolver for `likee.video` and `l.likee.video` share links.
//!
//! Share pages embed the post as `window.data = {...};`. When that blob is
//! missing or malformed the resolver falls back to a bare `"video_url"` key
//! and finally to `og:video`.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::download::media_file_name;
use crate::parser::ValidatedUrl;
use crate::provider::Provider;

use super::http_client::build_resolver_http_client;
use super::utils::{absolutize_url, compile_static_regex, extract_og_video, fetch_page, unescape_json_string};
use super::{LinkResolver, ResolveContext, ResolveError, ResolvedMedia};

static WINDOW_DATA_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?s)window\.data\s*=\s*(\{.*?\})\s*;"));

static VIDEO_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#""video_url"\s*:\s*"((?:[^"\\]|\\.)+)""#));

/// Subset of the `window.data` post blob we use.
#[derive(Debug, Deserialize)]
struct LikeePost {
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    post_id: Option<serde_json::Value>,
    #[serde(default)]
    msg_text: Option<String>,
}

impl LikeePost {
    fn post_id(&self) -> Option<String> {
        match self.post_id.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Resolver for Likee share links.
pub struct LikeeResolver {
    client: Client,
}

impl LikeeResolver {
    /// Creates a Likee resolver.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when HTTP client construction fails.
    pub fn new() -> Result<Self, ResolveError> {
        Ok(Self {
            client: build_resolver_http_client(Provider::Likee)?,
        })
    }
}

fn parse_window_data(html: &str) -> Option<LikeePost> {
    let raw = WINDOW_DATA_RE.captures(html)?.get(1)?.as_str();
    match serde_json::from_str::<LikeePost>(raw) {
        Ok(post) => Some(post),
        Err(error) => {
            debug!(error = %error, "likee window.data is not valid JSON");
            None
        }
    }
}

fn file_name_for(post: Option<&LikeePost>, media_url: &Url) -> String {
    let caption = post
        .and_then(|p| p.msg_text.as_deref())
        .filter(|text| !text.trim().is_empty());
    if caption.is_none()
        && let Some(post_id) = post.and_then(LikeePost::post_id)
    {
        return media_file_name(
            Provider::Likee,
            Some(&format!("likee_{post_id}")),
            media_url,
        );
    }
    media_file_name(Provider::Likee, caption, media_url)
}

#[async_trait]
impl LinkResolver for LikeeResolver {
    fn name(&self) -> &'static str {
        "likee"
    }

    fn provider(&self) -> Provider {
        Provider::Likee
    }

    #[tracing::instrument(skip(self, _ctx), fields(resolver = "likee", url = %url))]
    async fn resolve(
        &self,
        url: &ValidatedUrl,
        _ctx: &ResolveContext,
    ) -> Result<ResolvedMedia, ResolveError> {
        let page = fetch_page(&self.client, Provider::Likee, url.url()).await?;
        let post = parse_window_data(&page.html);

        let raw_media = post
            .as_ref()
            .and_then(|p| p.video_url.clone())
            .filter(|v| !v.trim().is_empty())
            .or_else(|| {
                VIDEO_URL_RE
                    .captures(&page.html)
                    .and_then(|caps| caps.get(1))
                    .map(|m| unescape_json_string(m.as_str()))
            })
            .or_else(|| extract_og_video(&page.html));

        let Some(raw_media) = raw_media else {
            return Err(ResolveError::parse_failure(
                Provider::Likee,
                url.as_str(),
                "no video_url in window.data and no og:video",
            ));
        };

        let media_url = absolutize_url(raw_media.trim(), &page.final_url).ok_or_else(|| {
            ResolveError::parse_failure(
                Provider::Likee,
                url.as_str(),
                &format!("video_url '{raw_media}' is not a valid URL"),
            )
        })?;

        debug!(media_url = %media_url, "likee media resolved");
        let file_name = file_name_for(post.as_ref(), &media_url);
        Ok(ResolvedMedia::new(media_url, file_name))
    }
}
