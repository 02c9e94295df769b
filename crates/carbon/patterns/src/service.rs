//! Service façade over the pattern engine.
//!
//! Composes the store, relative metrics, window predictor and green-hour
//! filter into the three public operations. Analytics failures degrade the
//! response instead of failing it; only a missing current reading is fatal.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use carbon_types::{
    CarbonTrend, CurrentReading, ForecastHour, GreenHour, RegionPattern, RegionalBaseline,
    RelativeCarbonIntensity,
};

use crate::config::PatternConfig;
use crate::error::{PatternError, PatternResult};
use crate::source::CurrentIntensitySource;
use crate::store::RegionPatternStore;
use crate::{confidence, green, metrics, predictor, report};

/// Public entry point for relative intensity, green hours and trend reports.
pub struct PatternService {
    store: Arc<RegionPatternStore>,
    current: Arc<dyn CurrentIntensitySource>,
}

impl PatternService {
    pub fn new(store: Arc<RegionPatternStore>, current: Arc<dyn CurrentIntensitySource>) -> Self {
        Self { store, current }
    }

    pub fn store(&self) -> &Arc<RegionPatternStore> {
        &self.store
    }

    fn config(&self) -> &PatternConfig {
        self.store.config()
    }

    /// Current reading classified against the region's pattern, bounded by
    /// the configured read timeout.
    pub async fn relative_intensity(&self, region: &str) -> PatternResult<RelativeCarbonIntensity> {
        self.relative_intensity_within(region, self.config().read_timeout())
            .await
    }

    /// Current reading classified against the region's pattern.
    ///
    /// If the pattern cannot be obtained within `timeout`, the most recently
    /// cached pattern is used; without one the response is degraded to the
    /// absolute reading with confidence 0.5.
    #[instrument(skip(self))]
    pub async fn relative_intensity_within(
        &self,
        region: &str,
        timeout: Duration,
    ) -> PatternResult<RelativeCarbonIntensity> {
        let current = self
            .current
            .fetch_current_intensity(region)
            .await
            .map_err(|e| PatternError::fetch(region, e))?;

        let is_high_variation = self.config().is_high_variation_region(region);

        match self.pattern_within(region, timeout).await {
            Ok(pattern) => Ok(self.relative_from_pattern(&pattern, current, is_high_variation)),
            Err(e) => {
                warn!(
                    region = %region,
                    error = %e,
                    "Regional pattern unavailable, returning absolute reading"
                );
                Ok(RelativeCarbonIntensity::degraded(
                    region,
                    current,
                    is_high_variation,
                ))
            }
        }
    }

    /// Forecast hours that are green for this region.
    ///
    /// Falls back to the static threshold when no pattern is available.
    #[instrument(skip(self, forecast), fields(hours = forecast.len()))]
    pub async fn green_hours(&self, region: &str, forecast: &[ForecastHour]) -> Vec<GreenHour> {
        match self.pattern_within(region, self.config().read_timeout()).await {
            Ok(pattern) => {
                let hours = green::filter_green_hours(forecast, &pattern);
                debug!(
                    region = %region,
                    kept = hours.len(),
                    high_variation = green::has_high_variation(&pattern),
                    "Filtered green hours"
                );
                hours
            }
            Err(e) => {
                warn!(
                    region = %region,
                    error = %e,
                    threshold = self.config().fallback_green_threshold,
                    "Regional pattern unavailable, using static green threshold"
                );
                green::filter_green_hours_static(forecast, self.config().fallback_green_threshold)
            }
        }
    }

    /// Historical trend report for a region.
    #[instrument(skip(self))]
    pub async fn trend_report(&self, region: &str) -> PatternResult<CarbonTrend> {
        let pattern = self.pattern_within(region, self.config().read_timeout()).await?;

        report::build_trend_report(&pattern, self.config().period_label()).ok_or_else(|| {
            PatternError::NoPatternAvailable {
                region: region.to_string(),
                reason: Box::new(PatternError::InsufficientData {
                    actual: 0,
                    required: self.config().min_data_points.max(1),
                }),
            }
        })
    }

    async fn pattern_within(
        &self,
        region: &str,
        timeout: Duration,
    ) -> PatternResult<Arc<RegionPattern>> {
        match tokio::time::timeout(timeout, self.store.get_pattern(region)).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = timeout.as_millis() as u64;
                match self.store.cached(region).await {
                    Some(pattern) => {
                        warn!(region = %region, timeout_ms, "Pattern read timed out, using cached pattern");
                        Ok(pattern)
                    }
                    None => Err(PatternError::NoPatternAvailable {
                        region: region.to_string(),
                        reason: Box::new(PatternError::RefreshTimeout {
                            region: region.to_string(),
                            timeout_ms,
                        }),
                    }),
                }
            }
        }
    }

    fn relative_from_pattern(
        &self,
        pattern: &RegionPattern,
        current: CurrentReading,
        is_high_variation: bool,
    ) -> RelativeCarbonIntensity {
        let now = Utc::now();
        let expected = self.config().expected_sample_count();
        let classification = metrics::classify(current.intensity, pattern);

        RelativeCarbonIntensity {
            region: pattern.region.clone(),
            current,
            local_percentile: Some(classification.percentile),
            daily_rank: Some(classification.daily_rank),
            relative_mode: Some(classification.mode),
            trend_direction: Some(pattern.trend_direction),
            trend_magnitude: Some(classification.trend_magnitude),
            next_optimal_window: predictor::predict_next_window(pattern, now, expected),
            confidence_score: confidence::confidence(pattern, expected, now),
            regional_baseline: Some(RegionalBaseline {
                mean: pattern.mean,
                std_dev: pattern.std_dev,
                p20: pattern.p20,
                p80: pattern.p80,
                sample_count: pattern.sample_count(),
                last_updated: pattern.last_updated,
            }),
            is_high_variation,
            analytics_available: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySource;
    use carbon_types::{HistoricalSample, RelativeMode, TrendDirection};
    use chrono::Duration as ChronoDuration;

    fn samples(count: usize) -> Vec<HistoricalSample> {
        let now = Utc::now();
        (0..count)
            .map(|i| {
                let value = 100.0 + (i % 10) as f64 * 50.0;
                HistoricalSample::new(now - ChronoDuration::hours((count - i) as i64), value, 20.0)
            })
            .collect()
    }

    fn reading(intensity: f64) -> CurrentReading {
        CurrentReading {
            intensity,
            renewable_percent: 45.0,
            timestamp: Utc::now(),
        }
    }

    async fn service_with(source: Arc<InMemorySource>) -> PatternService {
        let store = Arc::new(RegionPatternStore::new(PatternConfig::default(), source.clone()));
        PatternService::new(store, source)
    }

    #[tokio::test]
    async fn test_relative_intensity_populates_all_fields() {
        let source = Arc::new(InMemorySource::new());
        source.set_samples("DE", samples(168)).await;
        source.set_current("DE", reading(110.0)).await;
        let service = service_with(source).await;

        let response = service.relative_intensity("DE").await.unwrap();
        assert!(response.analytics_available);
        assert_eq!(response.relative_mode, Some(RelativeMode::Clean));
        assert!(response.local_percentile.unwrap() <= 20.0);
        assert_eq!(response.trend_direction, Some(TrendDirection::Stable));
        assert!(response.next_optimal_window.is_some());
        assert!(response.regional_baseline.is_some());
        assert!(response.is_high_variation);
        assert!((0.0..=1.0).contains(&response.confidence_score));
    }

    #[tokio::test]
    async fn test_missing_current_reading_is_an_error() {
        let source = Arc::new(InMemorySource::new());
        source.set_samples("DE", samples(168)).await;
        let service = service_with(source).await;

        let err = service.relative_intensity("DE").await.unwrap_err();
        assert!(matches!(err, PatternError::CollaboratorFetch { .. }));
    }

    #[tokio::test]
    async fn test_degrades_without_history() {
        let source = Arc::new(InMemorySource::new());
        source.set_current("FR", reading(80.0)).await;
        let service = service_with(source).await;

        let response = service.relative_intensity("FR").await.unwrap();
        assert!(!response.analytics_available);
        assert_eq!(response.confidence_score, 0.5);
        assert!(!response.is_high_variation);
    }

    #[tokio::test]
    async fn test_slow_first_compute_degrades_within_timeout() {
        let source = Arc::new(InMemorySource::new().with_latency(Duration::from_millis(200)));
        source.set_samples("FR", samples(168)).await;
        source.set_current("FR", reading(80.0)).await;
        let service = service_with(source).await;

        let response = service
            .relative_intensity_within("FR", Duration::from_millis(10))
            .await
            .unwrap();
        assert!(!response.analytics_available);
    }

    #[tokio::test]
    async fn test_green_hours_fallback_to_static_threshold() {
        let source = Arc::new(InMemorySource::new());
        let service = service_with(source).await;
        let start = Utc::now();
        let forecast: Vec<ForecastHour> = [150.0, 250.0]
            .iter()
            .enumerate()
            .map(|(i, v)| ForecastHour {
                timestamp: start + ChronoDuration::hours(i as i64),
                intensity: *v,
                confidence: 0.9,
            })
            .collect();

        let hours = service.green_hours("FR", &forecast).await;
        assert_eq!(hours.len(), 1);
        assert_eq!(hours[0].confidence, 0.5);
    }

    #[tokio::test]
    async fn test_trend_report_for_unknown_region_fails() {
        let source = Arc::new(InMemorySource::new());
        let service = service_with(source).await;

        let err = service.trend_report("XX").await.unwrap_err();
        assert!(matches!(err, PatternError::NoPatternAvailable { .. }));
    }

    #[tokio::test]
    async fn test_trend_report() {
        let source = Arc::new(InMemorySource::new());
        source.set_samples("DE", samples(168)).await;
        let service = service_with(source).await;

        let report = service.trend_report("DE").await.unwrap();
        assert_eq!(report.location, "DE");
        assert_eq!(report.period, "7d");
        assert_eq!(report.min, 100.0);
        assert_eq!(report.max, 550.0);
        assert_eq!(report.cleanest_hours.len(), 3);
    }
}
