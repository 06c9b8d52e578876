//! In-memory document store.
//!
//! Holds raw records exactly as a real store would, including malformed
//! identities, so fetcher and resolver behavior can be exercised against
//! literal fixtures. Supports failure injection and counts round-trips.

use super::DocumentStore;
use crate::document::RawRecord;
use crate::error::ResolveError;
use crate::identity::DRAFT_PREFIX;
use crate::query::Filter;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Round-trip counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub query_calls: usize,
    pub get_calls: usize,
}

impl StoreStats {
    pub fn total(&self) -> usize {
        self.query_calls + self.get_calls
    }
}

pub struct InMemoryStore {
    records: RwLock<BTreeMap<String, RawRecord>>,
    available: AtomicBool,
    query_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            records: RwLock::new(BTreeMap::new()),
            available: AtomicBool::new(true),
            query_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_records<I: IntoIterator<Item = RawRecord>>(records: I) -> Self {
        let store = Self::new();
        for record in records {
            store.put(record);
        }
        store
    }

    /// Insert or replace a record by identity.
    pub fn put(&self, record: RawRecord) {
        self.records.write().insert(record.identity.clone(), record);
    }

    pub fn remove(&self, identity: &str) -> Option<RawRecord> {
        self.records.write().remove(identity)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            query_calls: self.query_calls.load(Ordering::SeqCst),
            get_calls: self.get_calls.load(Ordering::SeqCst),
        }
    }

    fn check_available(&self) -> Result<(), ResolveError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ResolveError::StoreUnavailable(
                "in-memory store is offline".to_string(),
            ))
        }
    }
}

/// Key a record belongs to, derived the way the store itself groups records:
/// strip the draft marker if present, validate nothing.
fn store_key(identity: &str) -> &str {
    identity.strip_prefix(DRAFT_PREFIX).unwrap_or(identity)
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn query_key_space(&self, filter: &Filter) -> Result<Vec<RawRecord>, ResolveError> {
        filter.validate()?;
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let records = self.records.read();
        let matched: BTreeSet<&str> = records
            .values()
            .filter(|r| filter.matches_raw(store_key(&r.identity), &r.document_type, &r.payload))
            .map(|r| store_key(&r.identity))
            .collect();

        Ok(records
            .values()
            .filter(|r| matched.contains(store_key(&r.identity)))
            .cloned()
            .collect())
    }

    async fn get_documents(&self, identities: &[String]) -> Result<Vec<RawRecord>, ResolveError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let records = self.records.read();
        Ok(identities
            .iter()
            .filter_map(|id| records.get(id))
            .cloned()
            .collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
