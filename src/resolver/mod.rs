//! Link resolution: turning a provider share link into a direct media URL.
//!
//! # Architecture
//!
//! - [`LinkResolver`] - Async trait each provider implements
//! - [`ResolverRegistry`] - One resolver per [`Provider`]
//! - [`CachedResolver`] - Short-lived per-process cache wrapper absorbing repeated taps
//! - [`ChingariResolver`], [`LikeeResolver`], [`RoposoResolver`] - Provider scrapers
//!
//! Resolvers only return `Result`s. The Loading/terminal event sequence the
//! session observes is produced by [`crate::event::run_resolution`], which
//! wraps any resolver and guarantees exactly one terminal event per request.
//!
//! # Example
//!
//! ```no_run
//! use grabber_core::Provider;
//! use grabber_core::parser::validate;
//! use grabber_core::resolver::{ResolveContext, build_default_resolver_registry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = build_default_resolver_registry(std::time::Duration::ZERO);
//! let url = validate("https://l.likee.video/v/abc", Provider::Likee)?;
//! let resolver = registry.get(Provider::Likee).ok_or("no likee resolver")?;
//! let media = resolver.resolve(&url, &ResolveContext::default()).await?;
//! println!("{} -> {}", media.media_url, media.file_name);
//! # Ok(())
//! # }
//! ```

mod cache;
mod chingari;
mod error;
mod http_client;
mod likee;
mod registry;
mod roposo;
mod utils;

pub use cache::{CachedResolver, ResolutionCache};
pub use chingari::ChingariResolver;
pub use error::{ResolutionFailure, ResolveError};
pub use http_client::{build_resolver_http_client, configure_resolver_http_timeouts};
pub use likee::LikeeResolver;
pub use registry::ResolverRegistry;
pub use roposo::RoposoResolver;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;
use url::Url;

use crate::parser::ValidatedUrl;
use crate::provider::Provider;

/// Default per-request resolution timeout.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the registry with one resolver per supported provider.
///
/// A non-zero `cache_ttl` wraps every resolver in a [`CachedResolver`].
/// Providers whose resolver cannot be constructed are skipped with a warning.
#[must_use]
pub fn build_default_resolver_registry(cache_ttl: Duration) -> ResolverRegistry {
    let mut registry = ResolverRegistry::new();

    let constructed: [(Provider, Result<Arc<dyn LinkResolver>, ResolveError>); 3] = [
        (
            Provider::Chingari,
            ChingariResolver::new().map(|r| Arc::new(r) as Arc<dyn LinkResolver>),
        ),
        (
            Provider::Likee,
            LikeeResolver::new().map(|r| Arc::new(r) as Arc<dyn LinkResolver>),
        ),
        (
            Provider::Roposo,
            RoposoResolver::new().map(|r| Arc::new(r) as Arc<dyn LinkResolver>),
        ),
    ];

    for (provider, resolver) in constructed {
        match resolver {
            Ok(resolver) if cache_ttl.is_zero() => registry.register(resolver),
            Ok(resolver) => registry.register(Arc::new(CachedResolver::new(resolver, cache_ttl))),
            Err(error) => warn!(
                provider = %provider,
                error = %error,
                "resolver unavailable; links for this provider cannot be resolved"
            ),
        }
    }

    registry
}

/// A direct, fetchable media file discovered for a shared link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    /// Direct URL of the media file.
    pub media_url: Url,
    /// Human-readable filename, or a generated `{provider}_{timestamp}.mp4` fallback.
    pub file_name: String,
}

impl ResolvedMedia {
    /// Creates a resolved media entry.
    #[must_use]
    pub fn new(media_url: Url, file_name: impl Into<String>) -> Self {
        Self {
            media_url,
            file_name: file_name.into(),
        }
    }
}

/// Per-request resolution settings.
#[derive(Debug, Clone)]
pub struct ResolveContext {
    /// Upper bound for a single resolution; `None` disables the limit.
    pub timeout: Option<Duration>,
}

impl ResolveContext {
    /// Creates a context with the default 30 second timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: Some(DEFAULT_RESOLVE_TIMEOUT),
        }
    }

    /// Creates a context with a custom timeout.
    #[must_use]
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl Default for ResolveContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait that every provider resolver implements.
///
/// # Object Safety
///
/// This trait uses `async_trait` to support dynamic dispatch via `Arc<dyn LinkResolver>`.
/// Rust 2024 native async traits are not object-safe, so `async_trait` is required
/// for the registry and session.
#[async_trait]
pub trait LinkResolver: Send + Sync {
    /// Returns the resolver's name (e.g., "likee").
    fn name(&self) -> &str;

    /// Provider whose links this resolver understands.
    fn provider(&self) -> Provider;

    /// Fetches the provider page for `url` and extracts a direct media URL.
    ///
    /// Every call performs a fresh resolution; implementations hold no
    /// per-request state between calls.
    async fn resolve(
        &self,
        url: &ValidatedUrl,
        ctx: &ResolveContext,
    ) -> Result<ResolvedMedia, ResolveError>;
}
