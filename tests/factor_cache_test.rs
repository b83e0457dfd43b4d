mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;

use common::{fundamentals, temp_cache_path, MockMarketData};
use folioscope::models::{CacheSource, FactorSnapshot, QuoteType};
use folioscope::services::factor_cache::{load_snapshot, persist_snapshot, FactorCache, FactorCacheConfig};
use folioscope::services::job_scheduler_service::JobContext;
use folioscope::jobs::factor_cache_refresh_job;

const UNIVERSE: [&str; 4] = ["7203.T", "8306.T", "9432.T", "AAPL"];

fn provider() -> MockMarketData {
    MockMarketData::new()
        .with_candidate("7203.T", "Consumer Cyclical", fundamentals(0.028, 9.5, 1.1, 0.11))
        .with_candidate("8306.T", "Financial Services", fundamentals(0.035, 11.0, 0.9, 0.08))
        .with_candidate("9432.T", "Communication Services", fundamentals(0.033, 12.0, 0.4, 0.12))
        .with_candidate("AAPL", "Technology", fundamentals(0.005, 30.0, 1.2, 1.5))
}

fn universe() -> Vec<String> {
    UNIVERSE.iter().map(|s| s.to_string()).collect()
}

fn cache_with(provider: Arc<MockMarketData>) -> (Arc<FactorCache>, std::path::PathBuf) {
    let path = temp_cache_path();
    let config = FactorCacheConfig {
        path: path.clone(),
        ..Default::default()
    };
    (Arc::new(FactorCache::new(provider, universe(), config)), path)
}

async fn wait_for_file(path: &std::path::Path) -> bool {
    for _ in 0..50 {
        if path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn concurrent_cold_callers_share_one_rebuild() {
    let provider = Arc::new(provider().with_delay(Duration::from_millis(50)));
    let (cache, _path) = cache_with(provider.clone());

    let calls = (0..10).map(|_| {
        let cache = cache.clone();
        async move { cache.get_candidate_factors().await }
    });
    let results = join_all(calls).await;

    assert_eq!(provider.history_calls(), UNIVERSE.len());
    assert_eq!(provider.fundamentals_calls(), UNIVERSE.len());

    let first = &results[0];
    assert_eq!(first.items().len(), UNIVERSE.len());
    for r in &results {
        assert!(Arc::ptr_eq(&r.snapshot, &first.snapshot));
        assert_eq!(r.meta.source, CacheSource::Rebuild);
    }
}

#[tokio::test]
async fn second_call_within_ttl_is_served_from_memory() {
    let provider = Arc::new(provider());
    let (cache, _path) = cache_with(provider.clone());

    let first = cache.get_candidate_factors().await;
    let second = cache.get_candidate_factors().await;

    assert_eq!(first.meta.source, CacheSource::Rebuild);
    assert_eq!(second.meta.source, CacheSource::Memory);
    assert!(Arc::ptr_eq(&first.snapshot, &second.snapshot));
    assert_eq!(provider.history_calls(), UNIVERSE.len());
}

#[tokio::test]
async fn fresh_disk_copy_is_adopted_without_fetching() {
    let seed_provider = Arc::new(provider());
    let (seed_cache, path) = cache_with(seed_provider);
    let seeded = seed_cache.get_candidate_factors().await;
    assert!(wait_for_file(&path).await, "rebuild should persist the snapshot");

    let provider = Arc::new(provider());
    let config = FactorCacheConfig {
        path: path.clone(),
        ..Default::default()
    };
    let cache = Arc::new(FactorCache::new(provider.clone(), universe(), config));

    let loaded = cache.get_candidate_factors().await;
    assert_eq!(loaded.meta.source, CacheSource::Disk);
    let symbols = |items: &[folioscope::models::CandidateFactors]| {
        items.iter().map(|c| c.symbol.clone()).collect::<Vec<_>>()
    };
    assert_eq!(symbols(loaded.items()), symbols(seeded.items()));
    assert_eq!(loaded.meta.fetched_at.timestamp_millis(), seeded.meta.fetched_at.timestamp_millis());
    assert_eq!(provider.history_calls(), 0);

    let again = cache.get_candidate_factors().await;
    assert_eq!(again.meta.source, CacheSource::Memory);
}

#[tokio::test]
async fn stale_disk_copy_triggers_rebuild() {
    let path = temp_cache_path();
    let stale = FactorSnapshot {
        fetched_at: Utc::now() - chrono::Duration::hours(7),
        items: vec![],
    };
    persist_snapshot(&path, &stale).await.unwrap();

    let provider = Arc::new(provider());
    let config = FactorCacheConfig {
        path: path.clone(),
        ..Default::default()
    };
    let cache = Arc::new(FactorCache::new(provider.clone(), universe(), config));

    let result = cache.get_candidate_factors().await;
    assert_eq!(result.meta.source, CacheSource::Rebuild);
    assert_eq!(provider.history_calls(), UNIVERSE.len());
}

#[tokio::test]
async fn failed_symbols_are_dropped_from_the_snapshot() {
    let provider = Arc::new(provider().failing("9432.T"));
    let (cache, _path) = cache_with(provider);

    let result = cache.get_candidate_factors().await;
    let symbols: Vec<&str> = result.items().iter().map(|c| c.symbol.as_str()).collect();
    assert_eq!(result.items().len(), UNIVERSE.len() - 1);
    assert!(!symbols.contains(&"9432.T"));
}

#[tokio::test]
async fn mutual_funds_are_not_candidates() {
    let mut fund = fundamentals(0.0, 0.0, 0.0, 0.0);
    fund.quote_type = Some(QuoteType::MutualFund);
    let provider = Arc::new(provider().with_candidate("AAPL", "Technology", fund));
    let (cache, _path) = cache_with(provider);

    let result = cache.get_candidate_factors().await;
    assert!(result.items().iter().all(|c| c.symbol != "AAPL"));
    assert_eq!(result.items().len(), UNIVERSE.len() - 1);
}

#[tokio::test]
async fn candidates_carry_returns_volatility_and_local_sector() {
    let provider = Arc::new(provider().with_trend("AAPL", 0.01));
    let (cache, _path) = cache_with(provider);

    let result = cache.get_candidate_factors().await;
    let aapl = result.items().iter().find(|c| c.symbol == "AAPL").unwrap();

    assert_eq!(aapl.sector.as_deref(), Some("情報技術"));
    let m6 = aapl.returns.m6.unwrap();
    assert!((m6 - (1.01_f64.powi(26) - 1.0)).abs() < 1e-9, "m6 = {}", m6);
    assert!(aapl.returns.y1.unwrap() > m6);
    // constant weekly growth has no dispersion
    assert!(aapl.volatility.unwrap() < 1e-9);
}

#[tokio::test]
async fn empty_rebuild_is_not_installed() {
    let mut provider = provider();
    for symbol in UNIVERSE {
        provider = provider.failing(symbol);
    }
    let provider = Arc::new(provider);
    let (cache, path) = cache_with(provider.clone());

    let first = cache.get_candidate_factors().await;
    assert!(first.items().is_empty());
    assert_eq!(cache.status().item_count, 0);
    assert!(cache.status().fetched_at.is_none());

    // Nothing installed, so the next call retries
    cache.get_candidate_factors().await;
    assert_eq!(provider.history_calls(), UNIVERSE.len() * 2);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!path.exists(), "empty snapshots are never persisted");
}

#[tokio::test]
async fn refresh_rebuilds_even_when_fresh() {
    let provider = Arc::new(provider());
    let (cache, _path) = cache_with(provider.clone());

    cache.get_candidate_factors().await;
    let refreshed = cache.refresh().await;

    assert_eq!(refreshed.meta.source, CacheSource::Rebuild);
    assert_eq!(provider.history_calls(), UNIVERSE.len() * 2);
    assert!(!cache.status().rebuilding);
}

#[tokio::test]
async fn invalidate_falls_back_to_disk() {
    let provider = Arc::new(provider());
    let (cache, path) = cache_with(provider.clone());

    cache.get_candidate_factors().await;
    assert!(wait_for_file(&path).await);

    cache.invalidate();
    assert_eq!(cache.status().item_count, 0);

    let result = cache.get_candidate_factors().await;
    assert_eq!(result.meta.source, CacheSource::Disk);
    assert_eq!(provider.history_calls(), UNIVERSE.len());
}

#[tokio::test]
async fn persisted_snapshot_is_deduplicated_on_load() {
    let provider = Arc::new(provider());
    let (cache, path) = cache_with(provider);
    let built = cache.get_candidate_factors().await;
    assert!(wait_for_file(&path).await);

    let mut doubled = (*built.snapshot).clone();
    doubled.items.extend(built.items().iter().cloned());
    persist_snapshot(&path, &doubled).await.unwrap();

    let loaded = load_snapshot(&path).await.unwrap();
    assert_eq!(loaded.items.len(), UNIVERSE.len());
}

#[tokio::test]
async fn refresh_job_reports_usable_and_failed_symbols() {
    let provider = Arc::new(provider().failing("AAPL"));
    let (cache, _path) = cache_with(provider);

    let result = factor_cache_refresh_job::refresh_factor_cache(JobContext { factor_cache: cache })
        .await
        .unwrap();
    assert_eq!(result.items_processed, UNIVERSE.len() - 1);
    assert_eq!(result.items_failed, 1);
}
