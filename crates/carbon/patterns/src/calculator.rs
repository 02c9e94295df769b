//! Pattern calculation.
//!
//! Turns a time-ordered sample set into a [`RegionPattern`]. Everything here
//! is pure; the only wall-clock input is the `computed_at` stamp.

use chrono::{DateTime, Timelike, Utc};
use tracing::debug;

use carbon_types::{HistoricalSample, RegionPattern, HOURS_PER_DAY};

use crate::error::{PatternError, PatternResult};
use crate::trend;

/// Percentile used as the "clean" threshold.
pub const CLEAN_PERCENTILE: usize = 20;

/// Percentile used as the "dirty" threshold.
pub const DIRTY_PERCENTILE: usize = 80;

/// Compute a pattern stamped with the current time.
pub fn compute_pattern(
    region: &str,
    samples: Vec<HistoricalSample>,
    min_points: usize,
) -> PatternResult<RegionPattern> {
    compute_pattern_at(region, samples, min_points, Utc::now())
}

/// Compute a pattern with an explicit `last_updated` stamp.
///
/// `samples` must already be in ascending timestamp order; they are not
/// re-sorted and are retained as-is in the result.
pub fn compute_pattern_at(
    region: &str,
    samples: Vec<HistoricalSample>,
    min_points: usize,
    computed_at: DateTime<Utc>,
) -> PatternResult<RegionPattern> {
    if samples.len() < min_points {
        return Err(PatternError::InsufficientData {
            actual: samples.len(),
            required: min_points,
        });
    }

    let intensities: Vec<f64> = samples.iter().map(|s| s.carbon_intensity).collect();
    let mean = mean(&intensities);
    let std_dev = population_std_dev(&intensities, mean);

    let mut sorted = intensities.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let p20 = nearest_rank_percentile(&sorted, CLEAN_PERCENTILE);
    let p80 = nearest_rank_percentile(&sorted, DIRTY_PERCENTILE);

    let hourly_averages = hourly_averages(&samples, mean);
    let trend_direction = trend::trend_direction(&samples);
    let trend_confidence = trend::trend_confidence(samples.len(), min_points);

    debug!(
        region = %region,
        samples = samples.len(),
        mean,
        std_dev,
        p20,
        p80,
        trend = %trend_direction,
        "Computed region pattern"
    );

    Ok(RegionPattern {
        region: region.to_string(),
        last_updated: computed_at,
        samples,
        mean,
        std_dev,
        p20,
        p80,
        hourly_averages,
        trend_direction,
        trend_confidence,
    })
}

/// Arithmetic mean; zero for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by `n`, not `n - 1`).
pub fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Nearest-rank percentile without interpolation: `sorted[floor(n * k / 100)]`.
///
/// `sorted` must be ascending. Returns zero for an empty slice.
pub fn nearest_rank_percentile(sorted: &[f64], k: usize) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = (sorted.len() * k / 100).min(sorted.len() - 1);
    sorted[index]
}

/// Average intensity per UTC hour of day.
///
/// Hours without samples take the overall mean rather than a value
/// interpolated from neighbouring hours.
pub fn hourly_averages(samples: &[HistoricalSample], overall_mean: f64) -> [f64; HOURS_PER_DAY] {
    let mut sums = [0.0_f64; HOURS_PER_DAY];
    let mut counts = [0_usize; HOURS_PER_DAY];

    for sample in samples {
        let hour = sample.timestamp.hour() as usize;
        sums[hour] += sample.carbon_intensity;
        counts[hour] += 1;
    }

    let mut averages = [overall_mean; HOURS_PER_DAY];
    for hour in 0..HOURS_PER_DAY {
        if counts[hour] > 0 {
            averages[hour] = sums[hour] / counts[hour] as f64;
        }
    }
    averages
}

#[cfg(test)]
mod tests {
    use super::*;
    use carbon_types::TrendDirection;
    use chrono::{Duration, TimeZone};

    fn hourly_samples(start: DateTime<Utc>, values: &[f64]) -> Vec<HistoricalSample> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| HistoricalSample::new(start + Duration::hours(i as i64), *v, 30.0))
            .collect()
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_insufficient_data_carries_counts() {
        let samples = hourly_samples(start(), &[100.0; 23]);
        let err = compute_pattern("DE", samples, 24).unwrap_err();
        match err {
            PatternError::InsufficientData { actual, required } => {
                assert_eq!(actual, 23);
                assert_eq!(required, 24);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_mean_and_population_std_dev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let m = mean(&values);
        assert_eq!(m, 5.0);
        // Population formula gives exactly 2 here; the sample formula would not.
        assert_eq!(population_std_dev(&values, m), 2.0);
    }

    #[test]
    fn test_nearest_rank_truncates_index() {
        // n = 9: floor(9 * 0.2) = 1, floor(9 * 0.8) = 7
        let sorted = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0];
        assert_eq!(nearest_rank_percentile(&sorted, 20), 20.0);
        assert_eq!(nearest_rank_percentile(&sorted, 80), 80.0);

        // n = 4: floor(0.8) = 0 picks the minimum, no interpolation toward 2.
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(nearest_rank_percentile(&sorted, 20), 1.0);
        assert_eq!(nearest_rank_percentile(&sorted, 80), 4.0);

        assert_eq!(nearest_rank_percentile(&[], 20), 0.0);
    }

    #[test]
    fn test_skewed_input_can_break_threshold_ordering() {
        // One huge outlier drags the mean above P80.
        let mut values = vec![100.0; 9];
        values.push(10_000.0);
        let pattern =
            compute_pattern_at("XX", hourly_samples(start(), &values), 1, start()).unwrap();
        assert_eq!(pattern.p80, 100.0);
        assert!(pattern.mean > pattern.p80);
    }

    #[test]
    fn test_thresholds_sort_a_copy() {
        let values = [300.0, 100.0, 200.0, 500.0, 400.0];
        let pattern =
            compute_pattern_at("XX", hourly_samples(start(), &values), 1, start()).unwrap();
        // floor(5 * 0.2) = 1 -> 200, floor(5 * 0.8) = 4 -> 500
        assert_eq!(pattern.p20, 200.0);
        assert_eq!(pattern.p80, 500.0);

        let retained: Vec<f64> = pattern.samples.iter().map(|s| s.carbon_intensity).collect();
        assert_eq!(retained, values);
    }

    #[test]
    fn test_missing_hours_default_to_mean() {
        // Six samples covering hours 0-5 only.
        let values = [100.0, 200.0, 300.0, 400.0, 500.0, 600.0];
        let pattern =
            compute_pattern_at("XX", hourly_samples(start(), &values), 1, start()).unwrap();

        assert_eq!(pattern.hourly_averages.len(), HOURS_PER_DAY);
        assert_eq!(pattern.hourly_averages[0], 100.0);
        assert_eq!(pattern.hourly_averages[5], 600.0);
        assert_eq!(pattern.hourly_averages[6], 350.0);
        assert_eq!(pattern.hourly_averages[23], 350.0);
    }

    #[test]
    fn test_hourly_averages_group_across_days() {
        let day2 = start() + Duration::days(1);
        let samples = vec![
            HistoricalSample::new(start(), 100.0, 0.0),
            HistoricalSample::new(day2, 300.0, 0.0),
        ];
        let averages = hourly_averages(&samples, 200.0);
        assert_eq!(averages[0], 200.0);
    }

    #[test]
    fn test_compute_is_deterministic_apart_from_stamp() {
        let values: Vec<f64> = (0..48).map(|i| 150.0 + (i % 7) as f64 * 12.5).collect();
        let samples = hourly_samples(start(), &values);

        let first = compute_pattern("FR", samples.clone(), 24).unwrap();
        let mut second = compute_pattern("FR", samples, 24).unwrap();
        second.last_updated = first.last_updated;
        assert_eq!(first, second);
    }

    #[test]
    fn test_trend_fields_populated() {
        let values: Vec<f64> = (0..48).map(|i| 500.0 - i as f64 * 5.0).collect();
        let pattern =
            compute_pattern_at("ES", hourly_samples(start(), &values), 24, start()).unwrap();
        assert_eq!(pattern.trend_direction, TrendDirection::Improving);
        // 48 / (24 * 4) = 0.5, scaled by the 0.8 ceiling
        assert!((pattern.trend_confidence - 0.4).abs() < 1e-12);
    }
}
