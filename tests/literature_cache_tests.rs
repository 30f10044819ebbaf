//! Literature cache behaviour across tasks, cache instances and pipelines

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tempfile::TempDir;
use varviz::error::SourceError;
use varviz::literature::{
    EvictionPolicy, JsonFileStore, LiteratureCache, LiteratureKey, LiteratureStatus,
    LiteratureStore, MemoryStore, SearchParams,
};
use varviz::sources::mock::MockLiteratureSource;
use varviz::{AnalysisRequest, ClearScope, GenomicVariant, Pipeline, SourceSet};

fn file_cache(dir: &TempDir, source: Arc<MockLiteratureSource>) -> LiteratureCache {
    LiteratureCache::new(
        source,
        Arc::new(JsonFileStore::new(dir.path())),
        EvictionPolicy::Never,
    )
}

#[tokio::test]
async fn test_concurrent_misses_mine_once() {
    let source = Arc::new(MockLiteratureSource::with_test_data());
    source.set_delay(Duration::from_millis(50));
    let cache = Arc::new(LiteratureCache::new(
        source.clone(),
        Arc::new(MemoryStore::new()),
        EvictionPolicy::Never,
    ));
    let params = SearchParams::default();

    let lookups = join_all((0..8).map(|_| {
        let cache = Arc::clone(&cache);
        let params = params.clone();
        tokio::spawn(async move { cache.get_or_mine("TP53", Some("R273H"), &params).await })
    }))
    .await;

    assert_eq!(source.calls(), 1);
    let first = lookups[0].as_ref().unwrap();
    assert_eq!(first.status, LiteratureStatus::Ok);
    for lookup in &lookups {
        assert_eq!(lookup.as_ref().unwrap().entries, first.entries);
    }

    let stats = cache.stats().await;
    assert_eq!(stats.upstream_calls, 1);
    assert_eq!(stats.hits + stats.misses, 8);
    assert_eq!(stats.stored_keys, 1);
}

#[tokio::test]
async fn test_distinct_keys_mine_independently() {
    let source = Arc::new(MockLiteratureSource::with_test_data());
    let cache = LiteratureCache::new(
        source.clone(),
        Arc::new(MemoryStore::new()),
        EvictionPolicy::Never,
    );
    let params = SearchParams::default();
    cache.get_or_mine("TP53", Some("R273H"), &params).await;
    cache.get_or_mine("TP53", Some("R175H"), &params).await;
    cache.get_or_mine("TP53", None, &params).await;
    cache.get_or_mine("tp53", Some("R273H"), &params).await;
    assert_eq!(source.calls(), 3);
}

#[tokio::test]
async fn test_file_store_survives_restart() {
    let dir = TempDir::new().unwrap();
    let params = SearchParams::default();

    let source = Arc::new(MockLiteratureSource::with_test_data());
    let mined = file_cache(&dir, source.clone())
        .get_or_mine("TP53", Some("R273H"), &params)
        .await;
    assert_eq!(source.calls(), 1);
    assert!(!mined.entries.is_empty());

    // A fresh cache over the same directory; the upstream is down
    let offline = Arc::new(MockLiteratureSource::with_test_data());
    offline.fail_with(SourceError::Unavailable("down".to_string()));
    let restored = file_cache(&dir, offline.clone())
        .get_or_mine("TP53", Some("R273H"), &params)
        .await;

    assert_eq!(offline.calls(), 0);
    assert_eq!(restored.status, LiteratureStatus::Ok);
    let pmids = |entries: &[varviz::LiteratureEntry]| {
        entries.iter().map(|e| e.pmid.clone()).collect::<Vec<_>>()
    };
    assert_eq!(pmids(&restored.entries), pmids(&mined.entries));
}

#[tokio::test]
async fn test_failure_leaves_file_store_empty() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(MockLiteratureSource::with_test_data());
    source.fail_with(SourceError::Timeout(Duration::from_secs(30)));
    let cache = file_cache(&dir, source);

    let lookup = cache
        .get_or_mine("TP53", None, &SearchParams::default())
        .await;
    assert!(matches!(lookup.status, LiteratureStatus::Unavailable { .. }));

    let store = JsonFileStore::new(dir.path());
    assert_eq!(store.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_pipeline_clear_by_gene() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(MockLiteratureSource::with_test_data());
    let set = SourceSet {
        literature: Some(source.clone()),
        ..SourceSet::mock()
    };
    let pipeline = Pipeline::builder(set)
        .literature_store(Arc::new(JsonFileStore::new(dir.path())))
        .build();
    let request = AnalysisRequest::new("TP53", vec![GenomicVariant::new("17", 7577120, "C", "T")]);

    // Gene-only key plus R273H
    pipeline.analyze(request.clone()).await.unwrap();
    pipeline.analyze(request.clone()).await.unwrap();
    assert_eq!(source.calls(), 2);

    let stats = pipeline.cache_stats().await;
    let literature = stats.literature.unwrap();
    assert_eq!(literature.stored_keys, 2);
    assert_eq!(literature.hits, 2);

    // Another gene's scope leaves TP53 alone
    let report = pipeline
        .clear_cache(ClearScope::Gene("DEMO1".to_string()))
        .await
        .unwrap();
    assert_eq!(report.literature, 0);

    let report = pipeline
        .clear_cache(ClearScope::Gene("TP53".to_string()))
        .await
        .unwrap();
    assert_eq!(report.literature, 2);
    assert_eq!(report.genes, 1);

    pipeline.analyze(request).await.unwrap();
    assert_eq!(source.calls(), 4);
}

#[tokio::test]
async fn test_clear_single_key() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(MockLiteratureSource::with_test_data());
    let cache = LiteratureCache::new(source.clone(), store.clone(), EvictionPolicy::Never);
    let params = SearchParams::default();

    cache.get_or_mine("TP53", Some("R273H"), &params).await;
    cache.get_or_mine("TP53", Some("R175H"), &params).await;

    let removed = cache
        .clear(&ClearScope::Key(LiteratureKey::new("TP53", Some("R273H"), &params)))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(store.len().await.unwrap(), 1);

    cache.get_or_mine("TP53", Some("R175H"), &params).await;
    assert_eq!(source.calls(), 2);
}
