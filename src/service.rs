//! Content service: the read surface exposed to the application.
//!
//! Wires the resolver to the optional consistency cache. Every read takes an
//! explicit perspective; the service has no default.

use crate::cache::{CacheStats, ConsistencyCache, InvalidationScope};
use crate::config::VantageConfig;
use crate::document::ResolvedDocument;
use crate::error::ResolveError;
use crate::fetcher::{HttpDocumentStore, StoreFetcher, VariantFetcher};
use crate::identity::LogicalKey;
use crate::perspective::Perspective;
use crate::query::{Filter, ListQuery};
use crate::resolver::Resolver;
use std::sync::Arc;
use tracing::info;

pub struct ContentService {
    resolver: Resolver,
    cache: Option<ConsistencyCache>,
}

impl ContentService {
    pub fn new(fetcher: Arc<dyn VariantFetcher>, cache: Option<ConsistencyCache>) -> Self {
        Self {
            resolver: Resolver::new(fetcher),
            cache,
        }
    }

    /// Build the HTTP-backed service described by `config`.
    pub fn from_config(config: &VantageConfig) -> Result<Self, ResolveError> {
        config.ensure_valid()?;
        let store = HttpDocumentStore::new(&config.store)?;
        info!(
            endpoint = store.endpoint(),
            cache = config.cache.enabled,
            "Content service configured"
        );

        let fetcher = Arc::new(StoreFetcher::new(Arc::new(store)));
        let cache = config
            .cache
            .enabled
            .then(|| ConsistencyCache::from_config(&config.cache));
        Ok(Self::new(fetcher, cache))
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn cache(&self) -> Option<&ConsistencyCache> {
        self.cache.as_ref()
    }

    /// `Ok(None)` is not found; store failures are errors.
    pub async fn resolve_one(
        &self,
        key: &LogicalKey,
        perspective: Perspective,
    ) -> Result<Option<ResolvedDocument>, ResolveError> {
        let Some(cache) = &self.cache else {
            return self.resolver.resolve_one(key, perspective).await;
        };
        if let Some(cached) = cache.get_one(perspective, key) {
            return Ok(cached);
        }

        let ticket = cache.ticket();
        let resolved = self.resolver.resolve_one(key, perspective).await?;
        cache.insert_one(ticket, perspective, key, resolved.clone());
        Ok(resolved)
    }

    pub async fn resolve_many(
        &self,
        query: &ListQuery,
        perspective: Perspective,
    ) -> Result<Vec<ResolvedDocument>, ResolveError> {
        let Some(cache) = &self.cache else {
            return self.resolver.resolve_many(query, perspective).await;
        };
        if let Some(cached) = cache.get_list(perspective, query) {
            return Ok(cached);
        }

        let ticket = cache.ticket();
        let documents = self.resolver.resolve_many(query, perspective).await?;
        cache.insert_list(ticket, perspective, query, documents.clone());
        Ok(documents)
    }

    /// Keys in the filter's key space. Not cached.
    pub async fn keys(&self, filter: &Filter) -> Result<Vec<LogicalKey>, ResolveError> {
        self.resolver.keys(filter).await
    }

    /// Drop cached results in `scope`. Returns the number of entries dropped;
    /// always zero without a cache.
    pub fn invalidate(&self, scope: &InvalidationScope) -> usize {
        self.cache.as_ref().map_or(0, |cache| cache.invalidate(scope))
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(ConsistencyCache::stats)
    }
}
