//! Chingari resolver for `chingari.io` share links.
//!
//! Share pages expose the clip through `og:video` when the post is public.
//! Older pages only embed the media path in their hydration JSON
//! (`mediaLocation`/`transcodedPath`), relative to the media CDN.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::download::media_file_name;
use crate::parser::ValidatedUrl;
use crate::provider::Provider;

use super::http_client::build_resolver_http_client;
use super::utils::{
    OG_TITLE_RE, absolutize_url, compile_static_regex, extract_meta_value, extract_og_video,
    fetch_page, unescape_json_string,
};
use super::{LinkResolver, ResolveContext, ResolveError, ResolvedMedia};

const DEFAULT_MEDIA_BASE_URL: &str = "https://media.chingari.io/";

static MEDIA_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#""(?:transcodedPath|mediaLocation|videoUrl)"\s*:\s*"((?:[^"\\]|\\.)+)""#,
    )
});

/// Resolver for Chingari share links.
pub struct ChingariResolver {
    client: Client,
    media_base_url: Url,
}

impl ChingariResolver {
    /// Creates a resolver against the public media CDN.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when HTTP client construction fails.
    pub fn new() -> Result<Self, ResolveError> {
        let media_base_url = Url::parse(DEFAULT_MEDIA_BASE_URL).map_err(|e| {
            ResolveError::internal(Provider::Chingari, &format!("invalid media base URL: {e}"))
        })?;
        Self::with_media_base_url(media_base_url)
    }

    /// Creates a resolver whose relative media paths join onto `media_base_url` (for tests).
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when HTTP client construction fails.
    pub fn with_media_base_url(media_base_url: Url) -> Result<Self, ResolveError> {
        Ok(Self {
            client: build_resolver_http_client(Provider::Chingari)?,
            media_base_url,
        })
    }

    fn extract_media_url(&self, html: &str, page_url: &Url) -> Option<Url> {
        if let Some(og_video) = extract_og_video(html) {
            debug!("chingari media from og:video");
            return absolutize_url(&og_video, page_url);
        }

        let raw = MEDIA_PATH_RE.captures(html)?.get(1)?.as_str();
        let path = unescape_json_string(raw);
        debug!(path = %path, "chingari media from embedded media path");
        absolutize_url(path.trim_start_matches('/'), &self.media_base_url)
    }
}

#[async_trait]
impl LinkResolver for ChingariResolver {
    fn name(&self) -> &'static str {
        "chingari"
    }

    fn provider(&self) -> Provider {
        Provider::Chingari
    }

    #[tracing::instrument(skip(self, _ctx), fields(resolver = "chingari", url = %url))]
    async fn resolve(
        &self,
        url: &ValidatedUrl,
        _ctx: &ResolveContext,
    ) -> Result<ResolvedMedia, ResolveError> {
        let page = fetch_page(&self.client, Provider::Chingari, url.url()).await?;

        let media_url = self
            .extract_media_url(&page.html, &page.final_url)
            .ok_or_else(|| {
                ResolveError::parse_failure(
                    Provider::Chingari,
                    url.as_str(),
                    "page has neither og:video nor an embedded media path",
                )
            })?;

        let title = extract_meta_value(&page.html, &OG_TITLE_RE);
        let file_name = media_file_name(Provider::Chingari, title.as_deref(), &media_url);
        Ok(ResolvedMedia::new(media_url, file_name))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::parser::validate;
    use crate::resolver::ResolutionFailure;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_extract_media_url_prefers_og_video() {
        let resolver = ChingariResolver::new().unwrap();
        let page = Url::parse("https://chingari.io/share/post?id=1").unwrap();
        let html = r#"<meta property="og:video" content="https://cdn.chingari.io/a.mp4">
            <script>{"mediaLocation":"posts/b.mp4"}</script>"#;
        assert_eq!(
            resolver.extract_media_url(html, &page).unwrap().as_str(),
            "https://cdn.chingari.io/a.mp4"
        );
    }

    #[test]
    fn test_extract_media_url_from_media_path() {
        let resolver = ChingariResolver::new().unwrap();
        let page = Url::parse("https://chingari.io/share/post?id=1").unwrap();
        let html = r#"<script>window.__STATE__={"post":{"transcodedPath":"\/transcoded\/abc_720.mp4"}}</script>"#;
        assert_eq!(
            resolver.extract_media_url(html, &page).unwrap().as_str(),
            "https://media.chingari.io/transcoded/abc_720.mp4"
        );
    }

    #[test]
    fn test_extract_media_url_none() {
        let resolver = ChingariResolver::new().unwrap();
        let page = Url::parse("https://chingari.io/share/post?id=1").unwrap();
        assert!(resolver.extract_media_url("<html></html>", &page).is_none());
    }

    #[tokio::test]
    async fn test_chingari_resolve_og_video_with_title() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/chingari/share/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><head>
                <meta property="og:title" content="Holi dance">
                <meta property="og:video" content="https://cdn.chingari.io/v/abc.mp4">
                </head></html>"#,
            ))
            .mount(&server)
            .await;

        let resolver = ChingariResolver::new().unwrap();
        let url = validate(&format!("{}/chingari/share/abc", server.uri()), Provider::Chingari).unwrap();
        let media = resolver.resolve(&url, &ResolveContext::default()).await.unwrap();

        assert_eq!(media.media_url.as_str(), "https://cdn.chingari.io/v/abc.mp4");
        assert_eq!(media.file_name, "Holi_dance.mp4");
    }

    #[tokio::test]
    async fn test_chingari_resolve_relative_media_path_uses_base() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/chingari/share/rel"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<script>{"mediaLocation":"uploads/rel.mp4"}</script>"#),
            )
            .mount(&server)
            .await;

        let base = Url::parse(&format!("{}/media/", server.uri())).unwrap();
        let resolver = ChingariResolver::with_media_base_url(base).unwrap();
        let url = validate(&format!("{}/chingari/share/rel", server.uri()), Provider::Chingari).unwrap();
        let media = resolver.resolve(&url, &ResolveContext::default()).await.unwrap();

        assert_eq!(
            media.media_url.as_str(),
            format!("{}/media/uploads/rel.mp4", server.uri())
        );
        assert!(media.file_name.starts_with("chingari_"));
    }

    #[tokio::test]
    async fn test_chingari_resolve_not_found_is_rejected() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let resolver = ChingariResolver::new().unwrap();
        let url = validate(&format!("{}/chingari/share/gone", server.uri()), Provider::Chingari).unwrap();
        let err = resolver.resolve(&url, &ResolveContext::default()).await.unwrap_err();
        assert_eq!(err.kind(), ResolutionFailure::UpstreamRejected);
    }

    #[tokio::test]
    async fn test_chingari_resolve_page_without_media_is_parse_failure() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>app install</html>"))
            .mount(&server)
            .await;

        let resolver = ChingariResolver::new().unwrap();
        let url = validate(&format!("{}/chingari/share/x", server.uri()), Provider::Chingari).unwrap();
        let err = resolver.resolve(&url, &ResolveContext::default()).await.unwrap_err();
        assert_eq!(err.kind(), ResolutionFailure::ParseFailure);
    }
}
