//! Variant Fetcher
//!
//! Adapter between the raw document store and the resolver. The fetcher always
//! asks the store for every variant of the keys involved, drafts and published
//! alike, and never for a store-side perspective. Perspective filtering happens
//! in [`crate::policy`] only, so two differently configured store clients can
//! never disagree about which variants exist.

use crate::document::{RawRecord, Variant};
use crate::error::{IdentityError, ResolveError};
use crate::identity::LogicalKey;
use crate::query::Filter;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

pub mod http;
pub mod memory;

pub use http::HttpDocumentStore;
pub use memory::InMemoryStore;

/// Raw document store boundary.
///
/// Implementations are transport adapters: request/response, may fail, may be
/// slow. Any failure must be reported as [`ResolveError::StoreUnavailable`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every raw record of every logical key that has at least one record
    /// matching `filter`, in a single request.
    async fn query_key_space(&self, filter: &Filter) -> Result<Vec<RawRecord>, ResolveError>;

    /// Raw records with exactly the given identities. Missing identities are
    /// absent from the result, not an error.
    async fn get_documents(&self, identities: &[String]) -> Result<Vec<RawRecord>, ResolveError>;

    /// Store name for diagnostics.
    fn name(&self) -> &str;
}

/// Record excluded from resolution because its identity could not be classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRecord {
    pub identity: String,
    pub reason: String,
}

/// Unresolved variants grouped by logical key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantBatch {
    pub variants: BTreeMap<LogicalKey, Vec<Variant>>,
    pub rejected: Vec<RejectedRecord>,
}

impl VariantBatch {
    /// Classify raw records. Unrecognized identities are logged and set aside.
    pub fn from_records(records: Vec<RawRecord>) -> Self {
        let mut batch = VariantBatch::default();
        for record in records {
            match Variant::from_record(record) {
                Ok(variant) => batch
                    .variants
                    .entry(variant.logical_key.clone())
                    .or_default()
                    .push(variant),
                Err(IdentityError::UnrecognizedVariantIdentity { identity, reason }) => {
                    warn!(
                        condition = "UnrecognizedVariantIdentity",
                        identity = %identity,
                        reason = %reason,
                        "Excluding store record from resolution"
                    );
                    batch.rejected.push(RejectedRecord { identity, reason });
                }
            }
        }
        batch
    }

    /// Drop every key not in `keys`.
    pub fn retain_keys(&mut self, keys: &BTreeSet<LogicalKey>) {
        self.variants.retain(|key, _| keys.contains(key));
    }

    /// Remove and return the variants of one key.
    pub fn take(&mut self, key: &LogicalKey) -> Vec<Variant> {
        self.variants.remove(key).unwrap_or_default()
    }

    pub fn keys(&self) -> impl Iterator<Item = &LogicalKey> {
        self.variants.keys()
    }

    pub fn variant_count(&self) -> usize {
        self.variants.values().map(Vec::len).sum()
    }
}

/// Fetch interface consumed by the resolver.
///
/// Batches are all-or-nothing: an error means no variants at all.
#[async_trait]
pub trait VariantFetcher: Send + Sync {
    /// All variants of the given keys, in one round-trip.
    async fn fetch_variants(&self, keys: &[LogicalKey]) -> Result<VariantBatch, ResolveError>;

    /// All variants of every key in `filter`'s key space, in one round-trip.
    async fn fetch_key_space(&self, filter: &Filter) -> Result<VariantBatch, ResolveError>;

    /// Logical keys in `filter`'s key space, sorted and deduplicated.
    async fn fetch_all_keys(&self, filter: &Filter) -> Result<Vec<LogicalKey>, ResolveError> {
        let batch = self.fetch_key_space(filter).await?;
        Ok(batch.keys().cloned().collect())
    }
}

/// [`VariantFetcher`] over any [`DocumentStore`].
pub struct StoreFetcher {
    store: Arc<dyn DocumentStore>,
}

impl StoreFetcher {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl VariantFetcher for StoreFetcher {
    async fn fetch_variants(&self, keys: &[LogicalKey]) -> Result<VariantBatch, ResolveError> {
        let requested: BTreeSet<LogicalKey> = keys.iter().cloned().collect();
        if requested.is_empty() {
            return Ok(VariantBatch::default());
        }

        let identities: Vec<String> = requested
            .iter()
            .flat_map(|key| [key.published_identity(), key.draft_identity()])
            .collect();

        let records = self.store.get_documents(&identities).await?;
        let mut batch = VariantBatch::from_records(records);
        batch.retain_keys(&requested);

        debug!(
            store = self.store.name(),
            keys = requested.len(),
            variants = batch.variant_count(),
            rejected = batch.rejected.len(),
            "Fetched variants by key"
        );
        Ok(batch)
    }

    async fn fetch_key_space(&self, filter: &Filter) -> Result<VariantBatch, ResolveError> {
        let records = self.store.query_key_space(filter).await?;
        let mut batch = VariantBatch::from_records(records);
        if let Some(keys) = &filter.keys {
            batch.retain_keys(keys);
        }

        debug!(
            store = self.store.name(),
            keys = batch.variants.len(),
            variants = batch.variant_count(),
            rejected = batch.rejected.len(),
            "Fetched key space"
        );
        Ok(batch)
    }
}
