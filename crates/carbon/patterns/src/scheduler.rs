//! Periodic background refresh of cached patterns.
//!
//! Each sweep walks the cached regions one at a time and refreshes them
//! through the store's single-flight path, so a sweep never races a lazy
//! read for the same region. Every region gets a bounded time budget.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{PatternError, PatternResult};
use crate::store::RegionPatternStore;

/// Outcome of one refresh sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Regions whose pattern was recomputed.
    pub refreshed: Vec<String>,

    /// Regions whose recompute failed; their cached pattern was kept.
    pub failed: Vec<String>,

    /// Regions that exceeded the per-region budget.
    pub timed_out: Vec<String>,
}

/// Refreshes every cached pattern on a fixed interval.
pub struct RefreshScheduler {
    store: Arc<RegionPatternStore>,
    config: SchedulerConfig,
}

/// Handle to a running scheduler loop.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the loop to stop and wait for it to exit.
    ///
    /// A sweep in progress finishes its current region first.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            error!(error = %e, "Refresh scheduler task failed");
        }
    }

    /// Whether the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl RefreshScheduler {
    pub fn new(store: Arc<RegionPatternStore>, config: SchedulerConfig) -> Self {
        Self { store, config }
    }

    /// Refresh one region within the per-region budget.
    pub async fn refresh_region(&self, region: &str) -> PatternResult<()> {
        let budget = self.config.per_region_timeout();
        match tokio::time::timeout(budget, self.store.refresh(region)).await {
            Ok(result) => result.map(|_| ()),
            Err(_) => Err(PatternError::RefreshTimeout {
                region: region.to_string(),
                timeout_ms: budget.as_millis() as u64,
            }),
        }
    }

    /// Run one sequential sweep over every cached region.
    pub async fn run_once(&self) -> SweepReport {
        let regions = self.store.cached_regions().await;
        let mut report = SweepReport::default();

        debug!(regions = regions.len(), "Starting pattern refresh sweep");

        for region in regions {
            match self.refresh_region(&region).await {
                Ok(()) => report.refreshed.push(region),
                Err(PatternError::RefreshTimeout { timeout_ms, .. }) => {
                    warn!(region = %region, timeout_ms, "Pattern refresh timed out");
                    report.timed_out.push(region);
                }
                Err(e) => {
                    warn!(region = %region, error = %e, "Pattern refresh failed");
                    report.failed.push(region);
                }
            }
        }

        info!(
            refreshed = report.refreshed.len(),
            failed = report.failed.len(),
            timed_out = report.timed_out.len(),
            "Pattern refresh sweep complete"
        );

        report
    }

    /// Start the periodic loop. The first sweep runs one interval after start.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let period = self.config.refresh_interval().max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            info!(interval_secs = period.as_secs(), "Refresh scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Refresh scheduler stopped");
        });

        SchedulerHandle {
            shutdown_tx,
            handle,
        }
    }
}
