//! Shared HTTP client construction policy for resolvers.
//!
//! Provider resolvers all build their clients here so timeout, user-agent,
//! compression, proxy fallback and cookie behavior stay identical.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::RwLock;
use std::time::Duration;

use reqwest::Client;
use reqwest::{ClientBuilder, Proxy};
use tracing::warn;

use crate::provider::Provider;
use crate::user_agent;

use super::ResolveError;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const READ_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy)]
struct ResolverHttpTimeouts {
    connect_timeout_secs: u64,
    read_timeout_secs: u64,
}

impl Default for ResolverHttpTimeouts {
    fn default() -> Self {
        Self {
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
        }
    }
}

static RESOLVER_HTTP_TIMEOUTS: RwLock<ResolverHttpTimeouts> = RwLock::new(ResolverHttpTimeouts {
    connect_timeout_secs: CONNECT_TIMEOUT_SECS,
    read_timeout_secs: READ_TIMEOUT_SECS,
});

/// Configures resolver HTTP timeouts used by resolver client builders.
///
/// Call before resolvers are constructed; existing clients keep their settings.
pub fn configure_resolver_http_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) {
    if let Ok(mut guard) = RESOLVER_HTTP_TIMEOUTS.write() {
        *guard = ResolverHttpTimeouts {
            connect_timeout_secs,
            read_timeout_secs,
        };
    }
}

fn resolver_http_timeouts() -> ResolverHttpTimeouts {
    RESOLVER_HTTP_TIMEOUTS
        .read()
        .map(|guard| *guard)
        .unwrap_or_default()
}

pub(crate) fn read_timeout_secs() -> u64 {
    resolver_http_timeouts().read_timeout_secs
}

/// Builds a resolver HTTP client using shared project policy.
///
/// Provider pages serve stripped-down markup to unknown agents, so resolvers
/// present a mobile browser user-agent and keep cookies across redirects.
///
/// # Errors
///
/// Returns [`ResolveError::Internal`] when client construction fails.
pub fn build_resolver_http_client(provider: Provider) -> Result<Client, ResolveError> {
    let user_agent = user_agent::mobile_browser_user_agent();

    match try_build_client(user_agent, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Restricted sandboxes can panic while querying system proxy settings.
            warn!(
                provider = %provider,
                "Resolver client hit system proxy panic; using env-proxy fallback builder"
            );
            match try_build_client(user_agent, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Panic) => Err(ResolveError::internal(
                    provider,
                    "HTTP client construction panicked while initializing resolver networking",
                )),
                Err(BuildClientFailure::Build(error)) => Err(ResolveError::internal(
                    provider,
                    &format!("HTTP client construction failed: {error}"),
                )),
            }
        }
        Err(BuildClientFailure::Build(error)) => Err(ResolveError::internal(
            provider,
            &format!("HTTP client construction failed: {error}"),
        )),
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    user_agent: &str,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    let user_agent = user_agent.to_string();
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(user_agent);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(user_agent: String) -> ClientBuilder {
    let timeouts = resolver_http_timeouts();
    Client::builder()
        .connect_timeout(Duration::from_secs(timeouts.connect_timeout_secs))
        .timeout(Duration::from_secs(timeouts.read_timeout_secs))
        .user_agent(user_agent)
        .cookie_store(true)
        .gzip(true)
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    match scheme {
        "https" => find_first_proxy_var(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"]),
        "http" => find_first_proxy_var(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]),
        _ => None,
    }
}

fn find_first_proxy_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client_for_every_provider() {
        for provider in Provider::all() {
            assert!(build_resolver_http_client(provider).is_ok());
        }
    }

    #[test]
    fn test_default_timeouts() {
        let timeouts = ResolverHttpTimeouts::default();
        assert_eq!(timeouts.connect_timeout_secs, 10);
        assert_eq!(timeouts.read_timeout_secs, 30);
    }
}
