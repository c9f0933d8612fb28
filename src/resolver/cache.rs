//! Short-lived, per-process cache of successful resolutions.
//!
//! Users routinely tap Download twice on the same link; a few seconds of
//! caching turns the second tap into a local hit. Failures are never cached.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::parser::ValidatedUrl;
use crate::provider::Provider;

use super::{LinkResolver, ResolveContext, ResolveError, ResolvedMedia};

#[derive(Debug, Clone)]
struct CacheEntry {
    stored_at: Instant,
    media: ResolvedMedia,
}

/// Concurrent map from `(provider, link)` to a recent successful resolution.
#[derive(Debug)]
pub struct ResolutionCache {
    ttl: Duration,
    entries: DashMap<(Provider, String), CacheEntry>,
}

impl ResolutionCache {
    /// Creates an empty cache whose entries expire after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Returns a live entry, evicting it first if it has expired.
    #[must_use]
    pub fn get(&self, provider: Provider, link: &str) -> Option<ResolvedMedia> {
        let key = (provider, link.to_string());
        let hit = self
            .entries
            .get(&key)
            .map(|entry| (entry.stored_at.elapsed() < self.ttl, entry.media.clone()));
        match hit {
            Some((true, media)) => Some(media),
            Some((false, _)) => {
                self.entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Stores a successful resolution.
    pub fn insert(&self, provider: Provider, link: &str, media: ResolvedMedia) {
        self.entries.insert(
            (provider, link.to_string()),
            CacheEntry {
                stored_at: Instant::now(),
                media,
            },
        );
    }

    /// Drops every expired entry.
    pub fn purge_expired(&self) {
        self.entries
            .retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
    }

    /// Number of entries currently held, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Wraps a resolver with a [`ResolutionCache`].
pub struct CachedResolver {
    inner: Arc<dyn LinkResolver>,
    cache: ResolutionCache,
}

impl CachedResolver {
    /// Wraps `inner`, caching its successes for `ttl`.
    #[must_use]
    pub fn new(inner: Arc<dyn LinkResolver>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: ResolutionCache::new(ttl),
        }
    }

    /// The backing cache.
    #[must_use]
    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }
}

#[async_trait]
impl LinkResolver for CachedResolver {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn provider(&self) -> Provider {
        self.inner.provider()
    }

    async fn resolve(
        &self,
        url: &ValidatedUrl,
        ctx: &ResolveContext,
    ) -> Result<ResolvedMedia, ResolveError> {
        let provider = self.inner.provider();
        if let Some(media) = self.cache.get(provider, url.as_str()) {
            debug!(provider = %provider, url = %url, "resolution cache hit");
            return Ok(media);
        }

        let media = self.inner.resolve(url, ctx).await?;
        self.cache.purge_expired();
        self.cache.insert(provider, url.as_str(), media.clone());
        Ok(media)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use url::Url;

    use super::*;
    use crate::parser::validate;

    struct CountingResolver {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl LinkResolver for CountingResolver {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn provider(&self) -> Provider {
            Provider::Roposo
        }

        async fn resolve(
            &self,
            url: &ValidatedUrl,
            _ctx: &ResolveContext,
        ) -> Result<ResolvedMedia, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ResolveError::parse_failure(Provider::Roposo, url.as_str(), "none"));
            }
            Ok(ResolvedMedia::new(
                Url::parse("https://cdn.roposo.com/v.mp4").unwrap(),
                "v.mp4",
            ))
        }
    }

    fn counting(fail: bool) -> Arc<CountingResolver> {
        Arc::new(CountingResolver {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    #[tokio::test]
    async fn test_cached_resolver_hits_within_ttl() {
        let inner = counting(false);
        let cached = CachedResolver::new(inner.clone(), Duration::from_secs(60));
        let url = validate("https://www.roposo.com/story/1", Provider::Roposo).unwrap();
        let ctx = ResolveContext::default();

        let first = cached.resolve(&url, &ctx).await.unwrap();
        let second = cached.resolve(&url, &ctx).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.name(), "counting");
    }

    #[tokio::test]
    async fn test_cached_resolver_does_not_cache_failures() {
        let inner = counting(true);
        let cached = CachedResolver::new(inner.clone(), Duration::from_secs(60));
        let url = validate("https://www.roposo.com/story/1", Provider::Roposo).unwrap();
        let ctx = ResolveContext::default();

        assert!(cached.resolve(&url, &ctx).await.is_err());
        assert!(cached.resolve(&url, &ctx).await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert!(cached.cache().is_empty());
    }

    #[test]
    fn test_cache_expired_entry_is_evicted() {
        let cache = ResolutionCache::new(Duration::ZERO);
        cache.insert(
            Provider::Likee,
            "https://likee.video/v/1",
            ResolvedMedia::new(Url::parse("https://x/v.mp4").unwrap(), "v.mp4"),
        );
        assert_eq!(cache.len(), 1);
        assert!(cache.get(Provider::Likee, "https://likee.video/v/1").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_keys_are_per_provider() {
        let cache = ResolutionCache::new(Duration::from_secs(60));
        cache.insert(
            Provider::Likee,
            "https://shared/link",
            ResolvedMedia::new(Url::parse("https://x/v.mp4").unwrap(), "v.mp4"),
        );
        assert!(cache.get(Provider::Likee, "https://shared/link").is_some());
        assert!(cache.get(Provider::Roposo, "https://shared/link").is_none());
    }
}
