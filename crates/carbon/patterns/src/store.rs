//! Region pattern store.
//!
//! Caches one immutable [`RegionPattern`] per region. Readers clone an `Arc`
//! under a shared lock; a recompute installs a new `Arc` under the exclusive
//! lock, so a reader never observes a partially updated pattern.
//!
//! Recomputation is single-flighted per region: the first caller spawns the
//! computation and registers a watch channel in `in_flight`; every later
//! caller for the same region, whether a lazy read or the refresh scheduler,
//! waits on that channel and receives the same outcome. The computation runs
//! as its own task, so it completes and installs its result even if the
//! caller that started it gives up waiting. The computation itself is bounded
//! by `compute_timeout`, so a hung collaborator always releases the marker.
//!
//! Clearing bumps a generation counter; a computation that started before a
//! clear hands its result to its waiters but does not install it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, info, instrument, warn};

use carbon_types::RegionPattern;

use crate::calculator;
use crate::config::PatternConfig;
use crate::error::{PatternError, PatternResult};
use crate::source::HistoricalSource;

/// Events emitted by the pattern store.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternEvent {
    /// A new pattern was computed and installed.
    Computed { region: String, samples: usize },

    /// A recompute failed; any cached pattern was left in place.
    RefreshFailed { region: String, reason: String },

    /// A stale pattern was returned because its refresh failed.
    ServedStale { region: String, age_secs: i64 },

    /// Cached patterns were evicted (`None` means all regions).
    Cleared { region: Option<String> },
}

type Outcome = PatternResult<Arc<RegionPattern>>;

/// Region-keyed cache of computed patterns with lazy, single-flight refresh.
pub struct RegionPatternStore {
    /// Configuration.
    config: PatternConfig,

    /// Historical data collaborator.
    source: Arc<dyn HistoricalSource>,

    /// Installed patterns.
    patterns: RwLock<HashMap<String, Arc<RegionPattern>>>,

    /// Recomputations currently running, by region.
    in_flight: DashMap<String, watch::Receiver<Option<Outcome>>>,

    /// Bumped by `clear`; guards installs for every region.
    epoch: AtomicU64,

    /// Bumped by `clear_region`; guards installs for one region.
    generations: DashMap<String, u64>,

    /// Event broadcaster.
    event_tx: broadcast::Sender<PatternEvent>,
}

/// Clear counters observed when a computation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Generation {
    epoch: u64,
    region: u64,
}

/// Removes a region's in-flight marker when the computation task ends,
/// including by panic.
struct InFlightGuard {
    store: Arc<RegionPatternStore>,
    region: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.store.in_flight.remove(&self.region);
    }
}

impl RegionPatternStore {
    /// Create a new store backed by `source`.
    pub fn new(config: PatternConfig, source: Arc<dyn HistoricalSource>) -> Self {
        let (event_tx, _) = broadcast::channel(256);

        Self {
            config,
            source,
            patterns: RwLock::new(HashMap::new()),
            in_flight: DashMap::new(),
            epoch: AtomicU64::new(0),
            generations: DashMap::new(),
            event_tx,
        }
    }

    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    /// Subscribe to store events.
    pub fn subscribe(&self) -> broadcast::Receiver<PatternEvent> {
        self.event_tx.subscribe()
    }

    /// The cached pattern for a region, fresh or stale, without recomputing.
    pub async fn cached(&self, region: &str) -> Option<Arc<RegionPattern>> {
        self.patterns.read().await.get(region).cloned()
    }

    /// Regions that currently have a cached pattern.
    pub async fn cached_regions(&self) -> Vec<String> {
        let mut regions: Vec<String> = self.patterns.read().await.keys().cloned().collect();
        regions.sort();
        regions
    }

    /// Whether a pattern is older than the configured update interval.
    pub fn is_stale(&self, pattern: &RegionPattern) -> bool {
        pattern.is_stale(Utc::now(), self.config.max_pattern_age())
    }

    /// Whether a recomputation for `region` is running.
    pub fn is_refreshing(&self, region: &str) -> bool {
        self.in_flight.contains_key(region)
    }

    /// Install a precomputed pattern, replacing any cached one.
    pub async fn install(&self, pattern: RegionPattern) -> Arc<RegionPattern> {
        let pattern = Arc::new(pattern);
        self.patterns
            .write()
            .await
            .insert(pattern.region.clone(), Arc::clone(&pattern));
        pattern
    }

    /// Evict one region's pattern.
    ///
    /// A recompute already running for the region will not reinstall it.
    pub async fn clear_region(&self, region: &str) -> bool {
        let removed = {
            let mut patterns = self.patterns.write().await;
            *self.generations.entry(region.to_string()).or_insert(0) += 1;
            patterns.remove(region).is_some()
        };
        if removed {
            info!(region = %region, "Cleared cached pattern");
            let _ = self.event_tx.send(PatternEvent::Cleared {
                region: Some(region.to_string()),
            });
        }
        removed
    }

    /// Evict every cached pattern.
    pub async fn clear(&self) {
        {
            let mut patterns = self.patterns.write().await;
            self.epoch.fetch_add(1, Ordering::SeqCst);
            patterns.clear();
        }
        info!("Cleared all cached patterns");
        let _ = self.event_tx.send(PatternEvent::Cleared { region: None });
    }

    /// Pattern for a region, recomputing it if absent or stale.
    ///
    /// A failed recompute falls back to the cached pattern when one exists;
    /// the failure is only logged. Without a cached pattern the failure is
    /// returned as [`PatternError::NoPatternAvailable`].
    #[instrument(skip(self))]
    pub async fn get_pattern(self: &Arc<Self>, region: &str) -> PatternResult<Arc<RegionPattern>> {
        if let Some(pattern) = self.cached(region).await {
            if !self.is_stale(&pattern) {
                return Ok(pattern);
            }
            debug!(region = %region, "Cached pattern is stale");
        }

        match self.recompute(region).await {
            Ok(pattern) => Ok(pattern),
            Err(e) => self.serve_stale(region, e).await,
        }
    }

    /// Recompute a region's pattern regardless of its age.
    ///
    /// Failures are returned to the caller but never evict the cached entry.
    #[instrument(skip(self))]
    pub async fn refresh(self: &Arc<Self>, region: &str) -> PatternResult<Arc<RegionPattern>> {
        self.recompute(region).await
    }

    async fn serve_stale(&self, region: &str, error: PatternError) -> PatternResult<Arc<RegionPattern>> {
        match self.cached(region).await {
            Some(pattern) => {
                let age_secs = pattern.age(Utc::now()).num_seconds();
                warn!(
                    region = %region,
                    error = %error,
                    age_secs,
                    "Refresh failed, serving cached pattern"
                );
                let _ = self.event_tx.send(PatternEvent::ServedStale {
                    region: region.to_string(),
                    age_secs,
                });
                Ok(pattern)
            }
            None => Err(PatternError::NoPatternAvailable {
                region: region.to_string(),
                reason: Box::new(error),
            }),
        }
    }

    /// Join the running computation for `region`, or start one.
    async fn recompute(self: &Arc<Self>, region: &str) -> Outcome {
        let (rx, leader_tx) = match self.in_flight.entry(region.to_string()) {
            Entry::Occupied(entry) => {
                debug!(region = %region, "Joining in-flight recompute");
                (entry.get().clone(), None)
            }
            Entry::Vacant(entry) => {
                let (tx, rx) = watch::channel(None);
                entry.insert(rx.clone());
                (rx, Some(tx))
            }
        };

        if let Some(tx) = leader_tx {
            let guard = InFlightGuard {
                store: Arc::clone(self),
                region: region.to_string(),
            };
            tokio::spawn(async move {
                let outcome = guard.store.compute_and_install(&guard.region).await;
                tx.send_replace(Some(outcome));
                drop(guard);
            });
        }

        Self::await_outcome(rx, region).await
    }

    async fn await_outcome(mut rx: watch::Receiver<Option<Outcome>>, region: &str) -> Outcome {
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(outcome) = current {
                return outcome;
            }
            if rx.changed().await.is_err() {
                let last = rx.borrow().clone();
                return last.unwrap_or_else(|| {
                    Err(PatternError::Internal(format!(
                        "recompute for {} ended without a result",
                        region
                    )))
                });
            }
        }
    }

    fn generation(&self, region: &str) -> Generation {
        Generation {
            epoch: self.epoch.load(Ordering::SeqCst),
            region: self.generations.get(region).map(|g| *g).unwrap_or(0),
        }
    }

    async fn compute_and_install(&self, region: &str) -> Outcome {
        let started = self.generation(region);
        let budget = self.config.compute_timeout();

        let result = match tokio::time::timeout(budget, self.fetch_and_compute(region)).await {
            Ok(result) => result,
            Err(_) => Err(PatternError::RefreshTimeout {
                region: region.to_string(),
                timeout_ms: budget.as_millis() as u64,
            }),
        };

        match result {
            Ok(pattern) => {
                let pattern = Arc::new(pattern);
                {
                    let mut patterns = self.patterns.write().await;
                    if self.generation(region) != started {
                        debug!(region = %region, "Region cleared during recompute, result not cached");
                        return Ok(pattern);
                    }
                    patterns.insert(region.to_string(), Arc::clone(&pattern));
                }

                info!(
                    region = %region,
                    samples = pattern.sample_count(),
                    p20 = pattern.p20,
                    p80 = pattern.p80,
                    "Installed region pattern"
                );
                let _ = self.event_tx.send(PatternEvent::Computed {
                    region: region.to_string(),
                    samples: pattern.sample_count(),
                });
                Ok(pattern)
            }
            Err(e) => {
                warn!(region = %region, error = %e, "Pattern recompute failed");
                let _ = self.event_tx.send(PatternEvent::RefreshFailed {
                    region: region.to_string(),
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn fetch_and_compute(&self, region: &str) -> PatternResult<RegionPattern> {
        let end = Utc::now();
        let start = end - self.config.retention_window();

        let samples = self
            .source
            .fetch_historical_samples(region, start, end)
            .await
            .map_err(|e| PatternError::fetch(region, e))?;

        debug!(region = %region, samples = samples.len(), "Fetched historical samples");

        calculator::compute_pattern(region, samples, self.config.min_data_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySource;
    use carbon_types::HistoricalSample;
    use chrono::{DateTime, Duration as ChronoDuration};
    use std::time::Duration;

    fn samples_ending_now(count: usize, value: f64) -> Vec<HistoricalSample> {
        let now = Utc::now();
        (0..count)
            .map(|i| {
                let at: DateTime<Utc> = now - ChronoDuration::hours((count - i) as i64);
                HistoricalSample::new(at, value, 25.0)
            })
            .collect()
    }

    fn test_config() -> PatternConfig {
        PatternConfig {
            min_data_points: 24,
            ..PatternConfig::default()
        }
    }

    async fn store_with(source: Arc<InMemorySource>) -> Arc<RegionPatternStore> {
        Arc::new(RegionPatternStore::new(test_config(), source))
    }

    #[tokio::test]
    async fn test_first_read_computes_and_caches() {
        let source = Arc::new(InMemorySource::new());
        source.set_samples("FR", samples_ending_now(48, 60.0)).await;
        let store = store_with(source.clone()).await;

        let first = store.get_pattern("FR").await.unwrap();
        let second = store.get_pattern("FR").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.historical_fetch_count(), 1);
        assert_eq!(store.cached_regions().await, vec!["FR".to_string()]);
    }

    #[tokio::test]
    async fn test_first_failure_propagates() {
        let source = Arc::new(InMemorySource::new());
        source.set_samples("FR", samples_ending_now(10, 60.0)).await;
        let store = store_with(source).await;

        let err = store.get_pattern("FR").await.unwrap_err();
        assert!(matches!(err, PatternError::NoPatternAvailable { .. }));
        assert!(err.is_insufficient_data());
        assert!(store.cached("FR").await.is_none());
    }

    #[tokio::test]
    async fn test_stale_pattern_served_when_refresh_fails() {
        let source = Arc::new(InMemorySource::new());
        source.set_samples("FR", samples_ending_now(48, 60.0)).await;
        let store = store_with(source.clone()).await;

        let mut old = calculator::compute_pattern("FR", samples_ending_now(48, 75.0), 24).unwrap();
        old.last_updated = Utc::now() - ChronoDuration::hours(3);
        let installed = store.install(old).await;

        source.fail_region("FR").await;
        let mut events = store.subscribe();

        let served = store.get_pattern("FR").await.unwrap();
        assert!(Arc::ptr_eq(&served, &installed));
        assert_eq!(source.historical_fetch_count(), 1);

        let mut saw_stale = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, PatternEvent::ServedStale { .. }) {
                saw_stale = true;
            }
        }
        assert!(saw_stale);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_cached_entry() {
        let source = Arc::new(InMemorySource::new());
        source.set_samples("FR", samples_ending_now(48, 60.0)).await;
        let store = store_with(source.clone()).await;
        store.get_pattern("FR").await.unwrap();

        source.fail_region("FR").await;
        assert!(store.refresh("FR").await.is_err());
        assert!(store.cached("FR").await.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_reads_single_flight() {
        let source = Arc::new(InMemorySource::new().with_latency(Duration::from_millis(50)));
        source.set_samples("FR", samples_ending_now(48, 60.0)).await;
        let store = store_with(source.clone()).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.get_pattern("FR").await }));
        }
        let refresher = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.refresh("FR").await })
        };

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }
        let refreshed = refresher.await.unwrap().unwrap();

        assert_eq!(source.historical_fetch_count(), 1);
        assert!(results.iter().all(|p| Arc::ptr_eq(p, &refreshed)));
        assert!(!store.is_refreshing("FR"));
    }

    #[tokio::test]
    async fn test_single_flight_shares_failures() {
        let source = Arc::new(InMemorySource::new().with_latency(Duration::from_millis(30)));
        source.set_samples("FR", samples_ending_now(5, 60.0)).await;
        let store = store_with(source.clone()).await;

        let a = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.get_pattern("FR").await })
        };
        let b = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.get_pattern("FR").await })
        };

        assert!(a.await.unwrap().unwrap_err().is_insufficient_data());
        assert!(b.await.unwrap().unwrap_err().is_insufficient_data());
        assert_eq!(source.historical_fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_read_still_installs() {
        let source = Arc::new(InMemorySource::new().with_latency(Duration::from_millis(50)));
        source.set_samples("FR", samples_ending_now(48, 60.0)).await;
        let store = store_with(source.clone()).await;

        let timed_out =
            tokio::time::timeout(Duration::from_millis(5), store.get_pattern("FR")).await;
        assert!(timed_out.is_err());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(store.cached("FR").await.is_some());
        assert!(!store.is_refreshing("FR"));
    }

    #[tokio::test]
    async fn test_clear_evicts() {
        let source = Arc::new(InMemorySource::new());
        source.set_samples("FR", samples_ending_now(48, 60.0)).await;
        source.set_samples("ES", samples_ending_now(48, 90.0)).await;
        let store = store_with(source).await;
        store.get_pattern("FR").await.unwrap();
        store.get_pattern("ES").await.unwrap();

        assert!(store.clear_region("FR").await);
        assert!(!store.clear_region("FR").await);
        assert_eq!(store.cached_regions().await, vec!["ES".to_string()]);

        store.clear().await;
        assert!(store.cached_regions().await.is_empty());
    }

    /// Never answers its first fetch; serves `samples` afterwards.
    struct HangsOnce {
        calls: std::sync::atomic::AtomicUsize,
        samples: Vec<HistoricalSample>,
    }

    #[async_trait::async_trait]
    impl HistoricalSource for HangsOnce {
        async fn fetch_historical_samples(
            &self,
            _region: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> crate::source::SourceResult<Vec<HistoricalSample>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                std::future::pending::<()>().await;
            }
            Ok(self.samples.clone())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_fetch_releases_region_after_compute_timeout() {
        let source = Arc::new(HangsOnce {
            calls: Default::default(),
            samples: samples_ending_now(48, 60.0),
        });
        let config = PatternConfig {
            compute_timeout_secs: 2,
            ..test_config()
        };
        let store = Arc::new(RegionPatternStore::new(config, source.clone()));

        let err = store.get_pattern("AT").await.unwrap_err();
        assert!(matches!(
            err.root_cause(),
            PatternError::RefreshTimeout { timeout_ms: 2_000, .. }
        ));
        assert!(!store.is_refreshing("AT"));

        let pattern = store.get_pattern("AT").await.unwrap();
        assert_eq!(pattern.sample_count(), 48);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clear_during_refresh_is_not_undone() {
        let source = Arc::new(InMemorySource::new().with_latency(Duration::from_millis(100)));
        source.set_samples("FR", samples_ending_now(48, 60.0)).await;
        let store = store_with(source).await;

        let refresher = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.refresh("FR").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.clear().await;

        let computed = refresher.await.unwrap().unwrap();
        assert_eq!(computed.region, "FR");
        assert!(store.cached_regions().await.is_empty());
        assert!(!store.is_refreshing("FR"));
    }

    #[tokio::test]
    async fn test_clear_region_during_refresh_is_not_undone() {
        let source = Arc::new(InMemorySource::new().with_latency(Duration::from_millis(100)));
        source.set_samples("FR", samples_ending_now(48, 60.0)).await;
        source.set_samples("ES", samples_ending_now(48, 90.0)).await;
        let store = store_with(source).await;

        let fr = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.refresh("FR").await })
        };
        let es = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.refresh("ES").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.clear_region("FR").await;

        fr.await.unwrap().unwrap();
        es.await.unwrap().unwrap();
        assert_eq!(store.cached_regions().await, vec!["ES".to_string()]);

        // A recompute started after the clear caches normally.
        store.refresh("FR").await.unwrap();
        assert_eq!(store.cached_regions().await, vec!["ES".to_string(), "FR".to_string()]);
    }
}
