//! Store outages and malformed data.

use super::support::{key, service, store, term};
use std::sync::Arc;
use vantage::fetcher::{HttpDocumentStore, StoreFetcher};
use vantage::config::StoreConfig;
use vantage::{ContentService, Filter, ListQuery, Perspective, ResolveError, VariantFetcher};

#[tokio::test]
async fn test_unavailable_store_fails_the_whole_call() {
    let store = store(vec![term("term-1", "1", "2024-02-01T10:00:00Z", "Anesthesia")]);
    let service = service(&store, false);
    store.set_available(false);

    for perspective in Perspective::ALL {
        let err = service.resolve_one(&key("term-1"), perspective).await.unwrap_err();
        assert!(err.is_store_unavailable());
        let err = service
            .resolve_many(&ListQuery::new(Filter::all()), perspective)
            .await
            .unwrap_err();
        assert!(err.is_store_unavailable());
    }
    assert!(service.keys(&Filter::all()).await.unwrap_err().is_store_unavailable());
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let store = store(vec![term("term-1", "1", "2024-02-01T10:00:00Z", "Anesthesia")]);
    let service = service(&store, true);

    store.set_available(false);
    assert!(service
        .resolve_one(&key("term-1"), Perspective::PublishedOnly)
        .await
        .is_err());
    assert!(service.cache().unwrap().is_empty());

    store.set_available(true);
    let doc = service
        .resolve_one(&key("term-1"), Perspective::PublishedOnly)
        .await
        .unwrap();
    assert!(doc.is_some());
}

#[tokio::test]
async fn test_outage_is_distinct_from_not_found() {
    let store = store(vec![]);
    let service = service(&store, false);

    assert!(service
        .resolve_one(&key("term-1"), Perspective::DraftOverlay)
        .await
        .unwrap()
        .is_none());

    store.set_available(false);
    assert!(matches!(
        service.resolve_one(&key("term-1"), Perspective::DraftOverlay).await,
        Err(ResolveError::StoreUnavailable(_))
    ));
}

#[tokio::test]
async fn test_rejected_identities_are_reported_not_fatal() {
    let store = store(vec![
        term("term-1", "1", "2024-02-01T10:00:00Z", "Anesthesia"),
        term("drafts.drafts.term-1", "3", "2024-02-02T10:00:00Z", "Nested"),
        term("bad id", "1", "2024-02-02T10:00:00Z", "Space"),
    ]);
    let fetcher = StoreFetcher::new(store.clone());

    let batch = fetcher.fetch_key_space(&Filter::all()).await.unwrap();
    assert_eq!(batch.variants.len(), 1);
    let mut rejected: Vec<&str> = batch.rejected.iter().map(|r| r.identity.as_str()).collect();
    rejected.sort();
    assert_eq!(rejected, vec!["bad id", "drafts.drafts.term-1"]);
}

#[tokio::test]
async fn test_invalid_query_rejected_before_fetch() {
    let store = store(vec![]);
    let service = service(&store, false);
    let query = ListQuery::new(Filter::all().with_field("bad path!", serde_json::json!(1)));

    let err = service.resolve_many(&query, Perspective::PublishedOnly).await.unwrap_err();
    assert!(matches!(err, ResolveError::InvalidQuery(_)));
    assert_eq!(store.stats().total(), 0);
}

#[tokio::test]
async fn test_unreachable_http_store_is_unavailable() {
    let config = StoreConfig {
        project_id: "abc123".to_string(),
        base_url: Some("http://127.0.0.1:9".to_string()),
        timeout_ms: 500,
        ..StoreConfig::default()
    };
    let store = HttpDocumentStore::new(&config).unwrap();
    let service = ContentService::new(Arc::new(StoreFetcher::new(Arc::new(store))), None);

    let err = service
        .resolve_one(&key("term-1"), Perspective::PublishedOnly)
        .await
        .unwrap_err();
    assert!(err.is_store_unavailable());
}
