//! Consistency Cache
//!
//! Memoizes resolver results keyed by `(Perspective, Fingerprint)`. Purely
//! additive: with the cache disabled every result is identical, only slower.
//!
//! List entries are filled only by list reads and single-key entries only by
//! single-key reads; a single-key read is never answered from a slice of a list
//! entry. Writes happen after a fetch has fully completed, and a fill that
//! started before an invalidation is discarded.

use crate::config::CacheConfig;
use crate::document::{ResolvedDocument, Revision};
use crate::identity::LogicalKey;
use crate::perspective::Perspective;
use crate::query::{CacheKey, Filter, Fingerprint, ListQuery};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// What to drop on invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationScope {
    /// Entries holding this key or whose filter could admit it.
    Key(LogicalKey),
    /// One query under every perspective.
    Fingerprint(Fingerprint),
    All,
}

/// Cache generation observed before a fetch. Inserting with a stale ticket is a
/// no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillTicket(u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub stale_fills: u64,
    pub invalidated: u64,
    pub evictions: u64,
}

#[derive(Debug, Clone)]
enum EntryScope {
    List(Filter),
    Key(LogicalKey),
}

#[derive(Debug, Clone)]
enum CachedValue {
    List(Vec<ResolvedDocument>),
    One(Option<ResolvedDocument>),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedValue,
    /// Revision of every document the entry was built from.
    revisions: BTreeMap<LogicalKey, Revision>,
    scope: EntryScope,
    inserted_at: Instant,
}

impl CacheEntry {
    fn touches(&self, key: &LogicalKey) -> bool {
        if self.revisions.contains_key(key) {
            return true;
        }
        match &self.scope {
            EntryScope::List(filter) => filter.could_admit(key),
            EntryScope::Key(k) => k == key,
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() >= ttl
    }
}

struct Inner {
    entries: HashMap<CacheKey, CacheEntry>,
    generation: u64,
}

pub struct ConsistencyCache {
    inner: RwLock<Inner>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    stale_fills: AtomicU64,
    invalidated: AtomicU64,
    evictions: AtomicU64,
}

impl ConsistencyCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        ConsistencyCache {
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                generation: 0,
            }),
            ttl,
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            inserts: AtomicU64::new(0),
            stale_fills: AtomicU64::new(0),
            invalidated: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), config.max_entries)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Take a ticket before starting the fetch that will fill an entry.
    pub fn ticket(&self) -> FillTicket {
        FillTicket(self.inner.read().generation)
    }

    pub fn get_list(
        &self,
        perspective: Perspective,
        query: &ListQuery,
    ) -> Option<Vec<ResolvedDocument>> {
        let key = (perspective, query.fingerprint());
        match self.lookup(&key)? {
            CachedValue::List(documents) => Some(documents),
            CachedValue::One(_) => None,
        }
    }

    /// `Some(None)` is a cached not-found.
    pub fn get_one(
        &self,
        perspective: Perspective,
        key: &LogicalKey,
    ) -> Option<Option<ResolvedDocument>> {
        let cache_key = (perspective, Fingerprint::of_key(key));
        match self.lookup(&cache_key)? {
            CachedValue::One(document) => Some(document),
            CachedValue::List(_) => None,
        }
    }

    fn lookup(&self, key: &CacheKey) -> Option<CachedValue> {
        let inner = self.inner.read();
        match inner.entries.get(key) {
            Some(entry) if !entry.is_expired(self.ttl) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(perspective = %key.0, fingerprint = %key.1, "Cache hit");
                Some(entry.value.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a list result. Returns false when the ticket is stale.
    pub fn insert_list(
        &self,
        ticket: FillTicket,
        perspective: Perspective,
        query: &ListQuery,
        documents: Vec<ResolvedDocument>,
    ) -> bool {
        let revisions = documents
            .iter()
            .map(|d| (d.logical_key.clone(), d.variant.revision.clone()))
            .collect();
        self.insert(
            ticket,
            (perspective, query.fingerprint()),
            CacheEntry {
                value: CachedValue::List(documents),
                revisions,
                scope: EntryScope::List(query.filter.clone()),
                inserted_at: Instant::now(),
            },
        )
    }

    /// Store a single-key result, including not-found.
    pub fn insert_one(
        &self,
        ticket: FillTicket,
        perspective: Perspective,
        key: &LogicalKey,
        document: Option<ResolvedDocument>,
    ) -> bool {
        let revisions = document
            .iter()
            .map(|d| (d.logical_key.clone(), d.variant.revision.clone()))
            .collect();
        self.insert(
            ticket,
            (perspective, Fingerprint::of_key(key)),
            CacheEntry {
                value: CachedValue::One(document),
                revisions,
                scope: EntryScope::Key(key.clone()),
                inserted_at: Instant::now(),
            },
        )
    }

    fn insert(&self, ticket: FillTicket, key: CacheKey, entry: CacheEntry) -> bool {
        let mut inner = self.inner.write();
        if inner.generation != ticket.0 {
            self.stale_fills.fetch_add(1, Ordering::Relaxed);
            debug!(fingerprint = %key.1, "Discarding cache fill that predates an invalidation");
            return false;
        }

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.max_entries {
            let ttl = self.ttl;
            let before = inner.entries.len();
            inner.entries.retain(|_, e| !e.is_expired(ttl));
            let mut evicted = (before - inner.entries.len()) as u64;

            if inner.entries.len() >= self.max_entries {
                let oldest = inner
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| e.inserted_at)
                    .map(|(k, _)| *k);
                if let Some(oldest) = oldest {
                    inner.entries.remove(&oldest);
                    evicted += 1;
                }
            }
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
        }

        // Last writer wins.
        inner.entries.insert(key, entry);
        self.inserts.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Drop entries in `scope`. Every invalidation also retires outstanding
    /// fill tickets. Returns the number of entries dropped.
    pub fn invalidate(&self, scope: &InvalidationScope) -> usize {
        let mut inner = self.inner.write();
        inner.generation += 1;

        let before = inner.entries.len();
        match scope {
            InvalidationScope::All => inner.entries.clear(),
            InvalidationScope::Fingerprint(fp) => inner.entries.retain(|(_, f), _| f != fp),
            InvalidationScope::Key(key) => inner.entries.retain(|_, e| !e.touches(key)),
        }
        let dropped = before - inner.entries.len();

        self.invalidated.fetch_add(dropped as u64, Ordering::Relaxed);
        debug!(?scope, dropped, "Cache invalidated");
        dropped
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Revision tokens an entry was produced from.
    pub fn revisions(
        &self,
        perspective: Perspective,
        fingerprint: Fingerprint,
    ) -> Option<BTreeMap<LogicalKey, Revision>> {
        self.inner
            .read()
            .entries
            .get(&(perspective, fingerprint))
            .map(|e| e.revisions.clone())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            stale_fills: self.stale_fills.load(Ordering::Relaxed),
            invalidated: self.invalidated.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
