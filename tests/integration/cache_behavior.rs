//! Consistency cache behavior seen through the content service.

use super::support::{key, service, store, term};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use vantage::fetcher::StoreFetcher;
use vantage::{
    ConsistencyCache, ContentService, Filter, InvalidationScope, ListQuery, Perspective, Revision,
};

fn glossary() -> Vec<vantage::RawRecord> {
    vec![
        term("term-1", "1", "2024-02-01T10:00:00Z", "Anesthesia"),
        term("term-2", "1", "2024-02-02T10:00:00Z", "Biopsy"),
        term("drafts.term-2", "2", "2024-02-03T10:00:00Z", "Biopsy (draft)"),
        term("drafts.term-3", "1", "2024-02-04T10:00:00Z", "Catheter"),
    ]
}

fn all_terms() -> ListQuery {
    ListQuery::new(Filter::of_type("glossaryTerm"))
}

#[tokio::test]
async fn test_cache_is_transparent() {
    let store = store(glossary());
    let plain = service(&store, false);
    let cached = service(&store, true);

    for perspective in Perspective::ALL {
        for _ in 0..2 {
            assert_eq!(
                plain.resolve_many(&all_terms(), perspective).await.unwrap(),
                cached.resolve_many(&all_terms(), perspective).await.unwrap()
            );
            for k in ["term-1", "term-2", "term-3", "term-4"] {
                assert_eq!(
                    plain.resolve_one(&key(k), perspective).await.unwrap(),
                    cached.resolve_one(&key(k), perspective).await.unwrap()
                );
            }
        }
    }
}

#[tokio::test]
async fn test_hits_skip_the_store() {
    let store = store(glossary());
    let service = service(&store, true);

    service.resolve_many(&all_terms(), Perspective::DraftOverlay).await.unwrap();
    service.resolve_one(&key("term-2"), Perspective::DraftOverlay).await.unwrap();
    let after_fill = store.stats().total();

    service.resolve_many(&all_terms(), Perspective::DraftOverlay).await.unwrap();
    service.resolve_one(&key("term-2"), Perspective::DraftOverlay).await.unwrap();
    assert_eq!(store.stats().total(), after_fill);

    // Different perspective, different entry.
    service.resolve_many(&all_terms(), Perspective::PublishedOnly).await.unwrap();
    assert_eq!(store.stats().total(), after_fill + 1);

    let stats = service.cache_stats().unwrap();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.inserts, 3);
}

#[tokio::test]
async fn test_list_entry_never_answers_single_read() {
    let store = store(glossary());
    let service = service(&store, true);

    service.resolve_many(&all_terms(), Perspective::RawPreferDraft).await.unwrap();
    let before = store.stats().get_calls;
    service.resolve_one(&key("term-1"), Perspective::RawPreferDraft).await.unwrap();
    assert_eq!(store.stats().get_calls, before + 1);
}

#[tokio::test]
async fn test_key_invalidation_refreshes_list_and_single() {
    let store = store(glossary());
    let service = service(&store, true);

    let listed = service.resolve_many(&all_terms(), Perspective::RawPreferDraft).await.unwrap();
    let term_1 = service
        .resolve_one(&key("term-1"), Perspective::RawPreferDraft)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(term_1.revision(), &Revision::new("1"));
    assert_eq!(listed.len(), 3);

    store.put(term("drafts.term-1", "2", "2024-03-01T10:00:00Z", "Anesthesia (draft)"));
    let dropped = service.invalidate(&InvalidationScope::Key(key("term-1")));
    assert_eq!(dropped, 2);

    let listed = service.resolve_many(&all_terms(), Perspective::RawPreferDraft).await.unwrap();
    let term_1 = service
        .resolve_one(&key("term-1"), Perspective::RawPreferDraft)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(term_1.variant_id(), "drafts.term-1");
    let listed_term_1 = listed.iter().find(|d| d.logical_key == key("term-1")).unwrap();
    assert_eq!(listed_term_1, &term_1);
}

#[tokio::test]
async fn test_key_invalidation_drops_cached_not_found() {
    let store = store(glossary());
    let service = service(&store, true);

    assert!(service
        .resolve_one(&key("term-3"), Perspective::PublishedOnly)
        .await
        .unwrap()
        .is_none());

    store.put(term("term-3", "2", "2024-03-01T10:00:00Z", "Catheter"));
    assert!(service
        .resolve_one(&key("term-3"), Perspective::PublishedOnly)
        .await
        .unwrap()
        .is_none());

    service.invalidate(&InvalidationScope::Key(key("term-3")));
    let doc = service
        .resolve_one(&key("term-3"), Perspective::PublishedOnly)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.revision(), &Revision::new("2"));
}

#[tokio::test]
async fn test_key_invalidation_reaches_lists_that_could_admit_new_key() {
    let store = store(glossary());
    let service = service(&store, true);

    let before = service.resolve_many(&all_terms(), Perspective::PublishedOnly).await.unwrap();
    assert_eq!(before.len(), 2);

    store.put(term("term-9", "1", "2024-03-01T10:00:00Z", "Dialysis"));
    service.invalidate(&InvalidationScope::Key(key("term-9")));

    let after = service.resolve_many(&all_terms(), Perspective::PublishedOnly).await.unwrap();
    assert_eq!(after.len(), 3);
}

#[tokio::test]
async fn test_fingerprint_and_global_invalidation() {
    let store = store(glossary());
    let service = service(&store, true);
    let query = all_terms();

    for perspective in Perspective::ALL {
        service.resolve_many(&query, perspective).await.unwrap();
    }
    service.resolve_one(&key("term-1"), Perspective::PublishedOnly).await.unwrap();
    assert_eq!(service.cache().unwrap().len(), 4);

    let dropped = service.invalidate(&InvalidationScope::Fingerprint(query.fingerprint()));
    assert_eq!(dropped, 3);
    assert_eq!(service.cache().unwrap().len(), 1);

    assert_eq!(service.invalidate(&InvalidationScope::All), 1);
    assert!(service.cache().unwrap().is_empty());
}

#[tokio::test]
async fn test_fill_started_before_invalidation_is_discarded() {
    let store = store(glossary());
    let service = service(&store, true);
    let cache = service.cache().unwrap();
    let query = all_terms();

    let ticket = cache.ticket();
    let stale = service.resolver().resolve_many(&query, Perspective::RawPreferDraft).await.unwrap();

    store.put(term("drafts.term-1", "2", "2024-03-01T10:00:00Z", "Anesthesia (draft)"));
    service.invalidate(&InvalidationScope::Key(key("term-1")));

    assert!(!cache.insert_list(ticket, Perspective::RawPreferDraft, &query, stale));
    assert!(cache.get_list(Perspective::RawPreferDraft, &query).is_none());
    assert_eq!(cache.stats().stale_fills, 1);

    let fresh = service.resolve_many(&query, Perspective::RawPreferDraft).await.unwrap();
    assert!(fresh.iter().any(|d| d.variant_id() == "drafts.term-1"));
}

#[tokio::test]
async fn test_entries_expire_after_ttl() {
    let store = store(glossary());
    let fetcher = Arc::new(StoreFetcher::new(store.clone()));
    let cache = ConsistencyCache::new(Duration::from_millis(20), 16);
    let service = ContentService::new(fetcher, Some(cache));

    let first = service
        .resolve_one(&key("term-1"), Perspective::PublishedOnly)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.revision(), &Revision::new("1"));

    store.put(term("term-1", "2", "2024-03-01T10:00:00Z", "Anesthesia"));
    std::thread::sleep(Duration::from_millis(50));

    let second = service
        .resolve_one(&key("term-1"), Perspective::PublishedOnly)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.revision(), &Revision::new("2"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reads_agree() {
    let store = store(glossary());
    let service = Arc::new(service(&store, true));

    let lists = (0..16).map(|i| {
        let service = service.clone();
        tokio::spawn(async move {
            let perspective = Perspective::ALL[i % 3];
            let docs = service.resolve_many(&all_terms(), perspective).await.unwrap();
            (perspective, docs)
        })
    });
    let singles = (0..16).map(|i| {
        let service = service.clone();
        tokio::spawn(async move {
            let perspective = Perspective::ALL[i % 3];
            let doc = service.resolve_one(&key("term-2"), perspective).await.unwrap();
            (perspective, doc)
        })
    });

    let lists: Vec<_> = join_all(lists).await.into_iter().map(|r| r.unwrap()).collect();
    let singles: Vec<_> = join_all(singles).await.into_iter().map(|r| r.unwrap()).collect();

    for (perspective, doc) in singles {
        let doc = doc.unwrap();
        for (_, docs) in lists.iter().filter(|(p, _)| *p == perspective) {
            let listed = docs.iter().find(|d| d.logical_key == doc.logical_key).unwrap();
            assert_eq!(listed, &doc);
        }
    }
}
