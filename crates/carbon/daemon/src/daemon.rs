//! Daemon lifecycle: warm-up, background refresh, periodic reports, shutdown.

use std::io::Write;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use carbon_patterns::{
    CurrentIntensitySource, HistoricalSource, PatternEvent, PatternService, RefreshScheduler,
    RegionPatternStore,
};
use carbon_types::{CarbonTrend, RelativeCarbonIntensity};

use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::source::FileSource;

/// Relative intensity and trend for one region at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct RegionSnapshot {
    pub region: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative: Option<RelativeCarbonIntensity>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<CarbonTrend>,

    /// Errors encountered while building this snapshot.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Carbon pattern daemon
pub struct Daemon {
    config: DaemonConfig,
    store: Arc<RegionPatternStore>,
    service: PatternService,
}

impl Daemon {
    /// Create a daemon reading region files from the configured data directory.
    pub fn new(config: DaemonConfig) -> Self {
        let source = Arc::new(FileSource::new(config.source.data_dir.clone()));
        Self::with_sources(config, source.clone(), source)
    }

    /// Create a daemon over arbitrary collaborators.
    pub fn with_sources(
        config: DaemonConfig,
        historical: Arc<dyn HistoricalSource>,
        current: Arc<dyn CurrentIntensitySource>,
    ) -> Self {
        let store = Arc::new(RegionPatternStore::new(config.patterns.clone(), historical));
        let service = PatternService::new(store.clone(), current);

        Self {
            config,
            store,
            service,
        }
    }

    pub fn store(&self) -> &Arc<RegionPatternStore> {
        &self.store
    }

    pub fn service(&self) -> &PatternService {
        &self.service
    }

    /// Compute patterns for every configured region concurrently.
    ///
    /// Failures are logged and tolerated. Returns the number of regions
    /// that ended up with a pattern.
    pub async fn warm_up(&self) -> usize {
        let results = join_all(
            self.config
                .regions
                .iter()
                .map(|region| async move { (region, self.store.get_pattern(region).await) }),
        )
        .await;

        let mut warmed = 0;
        for (region, result) in results {
            match result {
                Ok(pattern) => {
                    warmed += 1;
                    debug!(region = %region, samples = pattern.sample_count(), "Warmed pattern");
                }
                Err(e) => warn!(region = %region, error = %e, "Failed to warm pattern"),
            }
        }

        info!(warmed, regions = self.config.regions.len(), "Pattern warm-up complete");
        warmed
    }

    /// Relative intensity and trend for every configured region.
    pub async fn snapshot(&self) -> Vec<RegionSnapshot> {
        join_all(
            self.config
                .regions
                .iter()
                .map(|region| self.snapshot_region(region)),
        )
        .await
    }

    async fn snapshot_region(&self, region: &str) -> RegionSnapshot {
        let mut errors = Vec::new();

        let relative = match self.service.relative_intensity(region).await {
            Ok(relative) => Some(relative),
            Err(e) => {
                errors.push(e.to_string());
                None
            }
        };
        let trend = match self.service.trend_report(region).await {
            Ok(trend) => Some(trend),
            Err(e) => {
                errors.push(e.to_string());
                None
            }
        };

        RegionSnapshot {
            region: region.to_string(),
            relative,
            trend,
            errors,
        }
    }

    /// Log one summary line per configured region.
    pub async fn log_summary(&self) {
        for snapshot in self.snapshot().await {
            match &snapshot.relative {
                Some(relative) => info!(
                    region = %snapshot.region,
                    intensity = relative.current.intensity,
                    mode = ?relative.relative_mode,
                    percentile = ?relative.local_percentile,
                    trend = ?relative.trend_direction,
                    confidence = relative.confidence_score,
                    analytics = relative.analytics_available,
                    "Regional carbon summary"
                ),
                None => warn!(
                    region = %snapshot.region,
                    errors = ?snapshot.errors,
                    "No carbon summary available"
                ),
            }
        }
    }

    /// Print one JSON document of snapshots to stdout.
    pub async fn run_once(&self) -> DaemonResult<()> {
        let snapshots = self.snapshot().await;
        write_snapshots(&mut std::io::stdout().lock(), &snapshots)
    }

    /// Run until Ctrl-C or SIGTERM.
    pub async fn run(self) -> DaemonResult<()> {
        spawn_event_logger(&self.store);

        self.warm_up().await;

        let scheduler = if self.config.scheduler.enabled {
            Some(RefreshScheduler::new(self.store.clone(), self.config.scheduler.clone()).spawn())
        } else {
            info!("Refresh scheduler disabled");
            None
        };

        let mut ticker = interval(self.config.report_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.log_summary().await,
                _ = &mut shutdown => break,
            }
        }

        info!("Carbon daemon shutting down");

        if let Some(scheduler) = scheduler {
            scheduler.shutdown().await;
        }

        Ok(())
    }
}

/// Write snapshots as one pretty-printed JSON document followed by a newline.
pub fn write_snapshots<W: Write>(out: &mut W, snapshots: &[RegionSnapshot]) -> DaemonResult<()> {
    serde_json::to_writer_pretty(&mut *out, snapshots).map_err(|e| {
        if e.is_io() {
            DaemonError::Io(e.into())
        } else {
            DaemonError::Serialization(e)
        }
    })?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

fn spawn_event_logger(store: &RegionPatternStore) {
    let mut events = store.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(PatternEvent::Computed { region, samples }) => {
                    debug!(region = %region, samples, "Pattern computed");
                }
                Ok(PatternEvent::RefreshFailed { region, reason }) => {
                    debug!(region = %region, reason = %reason, "Pattern refresh failed");
                }
                Ok(PatternEvent::ServedStale { region, age_secs }) => {
                    debug!(region = %region, age_secs, "Served stale pattern");
                }
                Ok(PatternEvent::Cleared { region }) => {
                    debug!(region = ?region, "Patterns cleared");
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Pattern event logger lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
