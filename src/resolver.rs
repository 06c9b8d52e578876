//! Resolver
//!
//! Orchestrates the fetcher and the policy for single-document and list reads.
//!
//! Consistency: for any query `F`, perspective `P` and key `K` returned by
//! `resolve_many(F, P)`, `resolve_one(K, P)` yields the same variant id and
//! revision against the same store state. Both paths hand the complete variant
//! set of each key to [`policy::resolve`]; there is no second implementation.

use crate::document::ResolvedDocument;
use crate::error::ResolveError;
use crate::fetcher::VariantFetcher;
use crate::identity::LogicalKey;
use crate::perspective::Perspective;
use crate::policy;
use crate::query::{Filter, ListQuery};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument};

pub struct Resolver {
    fetcher: Arc<dyn VariantFetcher>,
}

impl Resolver {
    pub fn new(fetcher: Arc<dyn VariantFetcher>) -> Self {
        Self { fetcher }
    }

    /// Resolve one logical key.
    ///
    /// `Ok(None)` means nothing is visible under `perspective` (not found), which
    /// is distinct from `Err(StoreUnavailable)`.
    #[instrument(skip(self, key, perspective), fields(key = %key, perspective = %perspective))]
    pub async fn resolve_one(
        &self,
        key: &LogicalKey,
        perspective: Perspective,
    ) -> Result<Option<ResolvedDocument>, ResolveError> {
        let started = Instant::now();
        let mut batch = self.fetcher.fetch_variants(std::slice::from_ref(key)).await?;
        let variants = batch.take(key);
        let resolved = policy::resolve(perspective, key, &variants);

        debug!(
            variants = variants.len(),
            found = resolved.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Resolved key"
        );
        Ok(resolved)
    }

    /// Resolve every document visible under `perspective` that satisfies the
    /// query's filter, ordered and limited per the query.
    ///
    /// One fetch round-trip covers the whole key space. A document is kept only
    /// if the variant the policy selects satisfies the filter. Keys without
    /// variants contribute nothing.
    #[instrument(
        skip(self, query, perspective),
        fields(fingerprint = %query.fingerprint(), perspective = %perspective)
    )]
    pub async fn resolve_many(
        &self,
        query: &ListQuery,
        perspective: Perspective,
    ) -> Result<Vec<ResolvedDocument>, ResolveError> {
        query.validate()?;
        let started = Instant::now();
        let batch = self.fetcher.fetch_key_space(&query.filter).await?;
        let key_space = batch.variants.len();

        let mut documents: Vec<ResolvedDocument> = batch
            .variants
            .iter()
            .filter_map(|(key, variants)| policy::resolve(perspective, key, variants))
            .filter(|doc| query.filter.matches(&doc.variant))
            .collect();
        query.arrange(&mut documents);

        debug!(
            key_space,
            rejected = batch.rejected.len(),
            returned = documents.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Resolved list"
        );
        Ok(documents)
    }

    /// Logical keys in the filter's key space.
    ///
    /// The key space may be larger than what `resolve_many` returns for a given
    /// perspective (draft-only keys under `PublishedOnly`, for instance).
    pub async fn keys(&self, filter: &Filter) -> Result<Vec<LogicalKey>, ResolveError> {
        filter.validate()?;
        self.fetcher.fetch_all_keys(filter).await
    }
}
