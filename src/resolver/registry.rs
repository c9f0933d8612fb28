//! Provider-keyed resolver registry.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::provider::Provider;

use super::LinkResolver;

/// Holds exactly one resolver per provider.
///
/// Registering a second resolver for the same provider replaces the first.
pub struct ResolverRegistry {
    resolvers: HashMap<Provider, Arc<dyn LinkResolver>>,
}

impl ResolverRegistry {
    /// Creates an empty resolver registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolvers: HashMap::new(),
        }
    }

    /// Registers a resolver under the provider it reports.
    #[tracing::instrument(skip(self, resolver), fields(resolver_name))]
    pub fn register(&mut self, resolver: Arc<dyn LinkResolver>) {
        tracing::Span::current().record("resolver_name", resolver.name());
        debug!(
            name = resolver.name(),
            provider = %resolver.provider(),
            "Registering resolver"
        );
        self.resolvers.insert(resolver.provider(), resolver);
    }

    /// Returns the resolver for `provider`, if one is registered.
    #[must_use]
    pub fn get(&self, provider: Provider) -> Option<Arc<dyn LinkResolver>> {
        self.resolvers.get(&provider).cloned()
    }

    /// Returns the number of registered resolvers.
    #[must_use]
    pub fn resolver_count(&self) -> usize {
        self.resolvers.len()
    }

    /// Returns true if no resolvers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.resolvers.values().map(|r| r.name()).collect();
        names.sort_unstable();
        f.debug_struct("ResolverRegistry")
            .field("resolver_count", &self.resolvers.len())
            .field("resolvers", &names)
            .finish()
    }
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
