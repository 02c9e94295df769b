//! Trend detection over a sample window.
//!
//! The regression uses the sample index as the independent variable, not
//! elapsed time. Irregularly spaced samples therefore produce a slope in
//! "per sample" units rather than a time rate.

use carbon_types::{HistoricalSample, TrendDirection};

/// Absolute slope (g CO2/kWh per sample) below which the trend is stable.
pub const STABLE_SLOPE_THRESHOLD: f64 = 0.1;

/// Upper bound on trend confidence.
pub const TREND_CONFIDENCE_CEILING: f64 = 0.8;

/// Ordinary least-squares slope of intensity against sample index.
///
/// Returns zero for fewer than two samples.
pub fn slope_by_index(samples: &[HistoricalSample]) -> f64 {
    let n = samples.len();
    if n < 2 {
        return 0.0;
    }

    let n_f = n as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    for (i, sample) in samples.iter().enumerate() {
        let x = i as f64;
        let y = sample.carbon_intensity;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let denom = n_f * sum_xx - sum_x * sum_x;
    if denom.abs() < f64::EPSILON {
        return 0.0;
    }
    (n_f * sum_xy - sum_x * sum_y) / denom
}

/// Classify the slope of the window.
pub fn trend_direction(samples: &[HistoricalSample]) -> TrendDirection {
    let slope = slope_by_index(samples);
    if slope.abs() < STABLE_SLOPE_THRESHOLD {
        TrendDirection::Stable
    } else if slope < 0.0 {
        TrendDirection::Improving
    } else {
        TrendDirection::Worsening
    }
}

/// Sample-count proxy for trend reliability, capped at 0.8.
///
/// Regression fit quality is not considered.
pub fn trend_confidence(sample_count: usize, min_points: usize) -> f64 {
    let target = (min_points * 4) as f64;
    let coverage = if target > 0.0 {
        (sample_count as f64 / target).min(1.0)
    } else {
        1.0
    };
    coverage * TREND_CONFIDENCE_CEILING
}
