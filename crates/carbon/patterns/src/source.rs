//! Data collaborator contracts and an in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use carbon_types::{CurrentReading, HistoricalSample};

use crate::error::SourceError;

/// Result type for collaborator calls.
pub type SourceResult<T> = Result<T, SourceError>;

/// Supplies historical samples for pattern computation.
#[async_trait]
pub trait HistoricalSource: Send + Sync {
    /// Samples for `region` between `start` and `end`, in ascending
    /// timestamp order. Callers do not re-sort.
    async fn fetch_historical_samples(
        &self,
        region: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SourceResult<Vec<HistoricalSample>>;
}

/// Supplies live readings.
#[async_trait]
pub trait CurrentIntensitySource: Send + Sync {
    async fn fetch_current_intensity(&self, region: &str) -> SourceResult<CurrentReading>;
}

/// In-memory collaborator for development and testing.
#[derive(Debug, Default)]
pub struct InMemorySource {
    samples: RwLock<HashMap<String, Vec<HistoricalSample>>>,
    current: RwLock<HashMap<String, CurrentReading>>,
    failing: RwLock<HashSet<String>>,
    latency: Option<Duration>,
    respect_window: bool,
    historical_fetches: AtomicUsize,
}

impl InMemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every historical fetch by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Only return samples inside the requested `[start, end]` window.
    pub fn with_window_filter(mut self) -> Self {
        self.respect_window = true;
        self
    }

    /// Replace the historical samples for a region.
    pub async fn set_samples(&self, region: impl Into<String>, samples: Vec<HistoricalSample>) {
        self.samples.write().await.insert(region.into(), samples);
    }

    /// Replace the current reading for a region.
    pub async fn set_current(&self, region: impl Into<String>, reading: CurrentReading) {
        self.current.write().await.insert(region.into(), reading);
    }

    /// Make every fetch for `region` fail until [`Self::restore_region`].
    pub async fn fail_region(&self, region: impl Into<String>) {
        self.failing.write().await.insert(region.into());
    }

    pub async fn restore_region(&self, region: &str) {
        self.failing.write().await.remove(region);
    }

    /// Number of historical fetches served or attempted so far.
    pub fn historical_fetch_count(&self) -> usize {
        self.historical_fetches.load(Ordering::SeqCst)
    }

    async fn check_available(&self, region: &str) -> SourceResult<()> {
        if self.failing.read().await.contains(region) {
            return Err(SourceError::Unavailable(format!(
                "simulated outage for {}",
                region
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl HistoricalSource for InMemorySource {
    async fn fetch_historical_samples(
        &self,
        region: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SourceResult<Vec<HistoricalSample>> {
        self.historical_fetches.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.check_available(region).await?;

        let samples = self.samples.read().await;
        let stored = samples
            .get(region)
            .ok_or_else(|| SourceError::RegionNotFound(region.to_string()))?;

        Ok(if self.respect_window {
            stored
                .iter()
                .filter(|s| s.timestamp >= start && s.timestamp <= end)
                .copied()
                .collect()
        } else {
            stored.clone()
        })
    }
}

#[async_trait]
impl CurrentIntensitySource for InMemorySource {
    async fn fetch_current_intensity(&self, region: &str) -> SourceResult<CurrentReading> {
        self.check_available(region).await?;

        let current = self.current.read().await;
        current
            .get(region)
            .copied()
            .ok_or_else(|| SourceError::RegionNotFound(region.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn day_of_samples() -> Vec<HistoricalSample> {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
        (0..24)
            .map(|i| HistoricalSample::new(start + ChronoDuration::hours(i), 200.0, 40.0))
            .collect()
    }

    #[tokio::test]
    async fn test_fetch_counts_and_unknown_region() {
        let source = InMemorySource::new();
        source.set_samples("SE", day_of_samples()).await;

        let now = Utc::now();
        let fetched = source
            .fetch_historical_samples("SE", now - ChronoDuration::days(7), now)
            .await
            .unwrap();
        assert_eq!(fetched.len(), 24);

        let missing = source
            .fetch_historical_samples("NO", now - ChronoDuration::days(7), now)
            .await;
        assert!(matches!(missing, Err(SourceError::RegionNotFound(_))));
        assert_eq!(source.historical_fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_window_filter() {
        let source = InMemorySource::new().with_window_filter();
        let samples = day_of_samples();
        let start = samples[6].timestamp;
        let end = samples[11].timestamp;
        source.set_samples("SE", samples).await;

        let fetched = source.fetch_historical_samples("SE", start, end).await.unwrap();
        assert_eq!(fetched.len(), 6);
    }

    #[tokio::test]
    async fn test_simulated_outage() {
        let source = InMemorySource::new();
        source.set_samples("SE", day_of_samples()).await;
        source.fail_region("SE").await;

        let now = Utc::now();
        let result = source.fetch_historical_samples("SE", now, now).await;
        assert!(matches!(result, Err(SourceError::Unavailable(_))));

        source.restore_region("SE").await;
        assert!(source.fetch_historical_samples("SE", now, now).await.is_ok());
    }
}
