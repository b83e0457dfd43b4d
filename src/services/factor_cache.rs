//! Time-bounded snapshot of factor data for the whole candidate universe.
//!
//! Lookup order is memory, then the persisted JSON copy, then a rebuild.
//! Rebuilds are single-flight: concurrent callers that miss the cache join
//! the one in-flight computation instead of fanning out their own network
//! calls. Snapshots are immutable and swapped as a whole, so readers never
//! see a partially rebuilt generation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::external::market_data::{Interval, MarketDataProvider};
use crate::models::{CacheMeta, CacheSource, CacheStatus, CandidateFactors, FactorSnapshot};
use crate::services::factor_builder;
use crate::services::rate_limiter::RateLimiter;

#[derive(Debug, Clone)]
pub struct FactorCacheConfig {
    pub ttl: Duration,
    pub path: PathBuf,
    /// Concurrent per-symbol fetches during a rebuild.
    pub concurrency: usize,
    /// Spacing between fetch starts; zero disables pacing.
    pub min_interval: std::time::Duration,
    /// Calendar days of weekly history fetched per symbol.
    pub history_days: i64,
}

impl Default for FactorCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(6),
            path: PathBuf::from("data/factor_cache.json"),
            concurrency: 3,
            min_interval: std::time::Duration::ZERO,
            history_days: 371,
        }
    }
}

/// Factor items plus where they came from.
#[derive(Debug, Clone)]
pub struct CachedFactors {
    pub snapshot: Arc<FactorSnapshot>,
    pub meta: CacheMeta,
}

impl CachedFactors {
    pub fn items(&self) -> &[CandidateFactors] {
        &self.snapshot.items
    }
}

type Flight = Shared<BoxFuture<'static, (Arc<FactorSnapshot>, CacheSource)>>;

enum Lookup {
    Fresh(Arc<FactorSnapshot>),
    Pending(Flight),
}

pub struct FactorCache {
    provider: Arc<dyn MarketDataProvider>,
    universe: Vec<String>,
    config: FactorCacheConfig,
    snapshot: RwLock<Option<Arc<FactorSnapshot>>>,
    in_flight: Mutex<Option<Flight>>,
}

impl FactorCache {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        universe: Vec<String>,
        config: FactorCacheConfig,
    ) -> Self {
        let mut seen = HashSet::new();
        let universe = universe
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect();

        Self {
            provider,
            universe,
            config,
            snapshot: RwLock::new(None),
            in_flight: Mutex::new(None),
        }
    }

    pub fn universe(&self) -> &[String] {
        &self.universe
    }

    /// Returns the current candidate factors, rebuilding at most once
    /// across all concurrent callers when nothing fresh is available.
    pub async fn get_candidate_factors(self: &Arc<Self>) -> CachedFactors {
        if let Some(snapshot) = self.fresh_snapshot() {
            debug!("Factor cache hit (memory, {} items)", snapshot.items.len());
            return Self::cached(snapshot, CacheSource::Memory);
        }

        match self.lookup(false) {
            Lookup::Fresh(snapshot) => Self::cached(snapshot, CacheSource::Memory),
            Lookup::Pending(flight) => {
                let (snapshot, source) = flight.await;
                Self::cached(snapshot, source)
            }
        }
    }

    /// Forces a rebuild from the provider, skipping the persisted copy.
    /// Joins a rebuild that is already running instead of starting another.
    pub async fn refresh(self: &Arc<Self>) -> CachedFactors {
        match self.lookup(true) {
            Lookup::Fresh(snapshot) => Self::cached(snapshot, CacheSource::Memory),
            Lookup::Pending(flight) => {
                let (snapshot, source) = flight.await;
                Self::cached(snapshot, source)
            }
        }
    }

    /// Drops the in-memory snapshot. The persisted copy is kept.
    pub fn invalidate(&self) {
        *self.snapshot.write() = None;
        info!("Factor cache invalidated");
    }

    pub fn status(&self) -> CacheStatus {
        let snapshot = self.snapshot.read().clone();
        CacheStatus {
            fetched_at: snapshot.as_ref().map(|s| s.fetched_at),
            item_count: snapshot.as_ref().map(|s| s.items.len()).unwrap_or(0),
            universe_size: self.universe.len(),
            ttl_hours: self.config.ttl.num_hours(),
            rebuilding: self.in_flight.lock().is_some(),
        }
    }

    fn cached(snapshot: Arc<FactorSnapshot>, source: CacheSource) -> CachedFactors {
        let fetched_at = snapshot.fetched_at;
        CachedFactors {
            snapshot,
            meta: CacheMeta { source, fetched_at },
        }
    }

    fn is_fresh(&self, snapshot: &FactorSnapshot) -> bool {
        Utc::now() - snapshot.fetched_at < self.config.ttl
    }

    fn fresh_snapshot(&self) -> Option<Arc<FactorSnapshot>> {
        self.snapshot
            .read()
            .as_ref()
            .filter(|s| self.is_fresh(s))
            .cloned()
    }

    fn lookup(self: &Arc<Self>, force: bool) -> Lookup {
        let mut in_flight = self.in_flight.lock();
        if let Some(flight) = in_flight.as_ref() {
            debug!("Joining in-flight factor cache rebuild");
            return Lookup::Pending(flight.clone());
        }

        // A rebuild may have finished between the caller's first check and
        // taking this lock.
        if !force {
            if let Some(snapshot) = self.fresh_snapshot() {
                return Lookup::Fresh(snapshot);
            }
        }

        let this = Arc::clone(self);
        let flight = async move { this.load_or_rebuild(force).await }
            .boxed()
            .shared();
        *in_flight = Some(flight.clone());
        Lookup::Pending(flight)
    }

    async fn load_or_rebuild(self: Arc<Self>, force: bool) -> (Arc<FactorSnapshot>, CacheSource) {
        if !force {
            if let Some(snapshot) = load_snapshot(&self.config.path).await {
                if self.is_fresh(&snapshot) {
                    info!(
                        "Factor cache loaded from disk ({} items, fetched at {})",
                        snapshot.items.len(),
                        snapshot.fetched_at
                    );
                    let snapshot = Arc::new(snapshot);
                    self.install(&snapshot);
                    return (snapshot, CacheSource::Disk);
                }
                debug!("Persisted factor cache is stale, rebuilding");
            }
        }

        let snapshot = Arc::new(self.rebuild().await);

        if snapshot.items.is_empty() {
            // Not installed, so the next request retries
            warn!("Factor cache rebuild produced no candidates");
            *self.in_flight.lock() = None;
        } else {
            self.install(&snapshot);
            let path = self.config.path.clone();
            let to_persist = Arc::clone(&snapshot);
            tokio::spawn(async move {
                if let Err(e) = persist_snapshot(&path, &to_persist).await {
                    warn!("Failed to persist factor cache: {:#}", e);
                }
            });
        }

        (snapshot, CacheSource::Rebuild)
    }

    /// Swaps in a new generation and ends the flight, in that order, so a
    /// caller that finds no flight also finds the new snapshot.
    fn install(&self, snapshot: &Arc<FactorSnapshot>) {
        *self.snapshot.write() = Some(Arc::clone(snapshot));
        *self.in_flight.lock() = None;
    }

    async fn rebuild(&self) -> FactorSnapshot {
        info!(
            "Rebuilding factor cache for {} symbols (concurrency {})",
            self.universe.len(),
            self.config.concurrency
        );
        let started = Utc::now();
        let limiter = RateLimiter::new(self.config.concurrency, self.config.min_interval);
        let end = started.date_naive();
        let start = end - Duration::days(self.config.history_days);

        let fetches = self
            .universe
            .iter()
            .map(|symbol| limiter.run(self.fetch_candidate(symbol, start, end)));
        let results = join_all(fetches).await;

        let attempted = results.len();
        let mut seen = HashSet::new();
        let items: Vec<CandidateFactors> = results
            .into_iter()
            .flatten()
            .filter(|c| seen.insert(c.symbol.clone()))
            .collect();

        info!(
            "Factor cache rebuild complete: {} of {} symbols usable in {}ms",
            items.len(),
            attempted,
            (Utc::now() - started).num_milliseconds()
        );

        FactorSnapshot {
            fetched_at: Utc::now(),
            items,
        }
    }

    async fn fetch_candidate(
        &self,
        symbol: &str,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    ) -> Option<CandidateFactors> {
        let history = match self
            .provider
            .get_history(symbol, start, end, Interval::Weekly)
            .await
        {
            Ok(h) => h,
            Err(e) => {
                warn!("Skipping {} - history fetch failed: {}", symbol, e);
                return None;
            }
        };

        let fundamentals = match self.provider.get_fundamentals(symbol).await {
            Ok(f) => f,
            Err(e) => {
                warn!("Skipping {} - fundamentals fetch failed: {}", symbol, e);
                return None;
            }
        };

        factor_builder::build_candidate(symbol, &history, &fundamentals)
    }
}

/// Reads a persisted snapshot. A missing or corrupt file is a miss.
pub async fn load_snapshot(path: &Path) -> Option<FactorSnapshot> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) => {
            debug!("No persisted factor cache at {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_slice::<FactorSnapshot>(&bytes) {
        Ok(mut snapshot) => {
            let mut seen = HashSet::new();
            snapshot.items.retain(|c| seen.insert(c.symbol.clone()));
            Some(snapshot)
        }
        Err(e) => {
            warn!("Ignoring corrupt factor cache at {}: {}", path.display(), e);
            None
        }
    }
}

/// Writes via a temp file and rename so readers never see a torn file.
pub async fn persist_snapshot(path: &Path, snapshot: &FactorSnapshot) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let bytes = serde_json::to_vec(snapshot).context("Failed to serialize factor snapshot")?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to move snapshot into {}", path.display()))
}
