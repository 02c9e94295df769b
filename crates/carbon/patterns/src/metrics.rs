//! Relative metrics for a live reading.
//!
//! The percentile here counts retained samples strictly below the value. It
//! is a different estimator from the nearest-rank thresholds in
//! [`crate::calculator`] and the two are not expected to agree.

use serde::{Deserialize, Serialize};

use carbon_types::{RegionPattern, RelativeMode};

/// Percentile assumed when a pattern retains no samples.
pub const MEDIAN_PERCENTILE: f64 = 50.0;

/// Percentile at or below which a reading ranks among the cleanest.
const CLEANEST_RANK: f64 = 20.0;

/// Percentile at or above which a reading ranks among the dirtiest.
const DIRTIEST_RANK: f64 = 80.0;

/// A reading classified against a regional pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Percentile among retained samples, 0-100, one decimal.
    pub percentile: f64,

    /// Position relative to the P20/P80 thresholds.
    pub mode: RelativeMode,

    /// Human-readable rank.
    pub daily_rank: String,

    /// Percent deviation from the regional mean.
    pub trend_magnitude: f64,
}

/// Classify `value` against `pattern`.
pub fn classify(value: f64, pattern: &RegionPattern) -> Classification {
    let percentile = percentile_of(value, pattern);
    Classification {
        percentile,
        mode: relative_mode(value, pattern.p20, pattern.p80),
        daily_rank: daily_rank(percentile),
        trend_magnitude: trend_magnitude(value, pattern.mean),
    }
}

/// Share of retained samples strictly below `value`, as a percentage
/// rounded to one decimal. Defaults to 50 for an empty sample set.
pub fn percentile_of(value: f64, pattern: &RegionPattern) -> f64 {
    let total = pattern.samples.len();
    if total == 0 {
        return MEDIAN_PERCENTILE;
    }
    let below = pattern
        .samples
        .iter()
        .filter(|s| s.carbon_intensity < value)
        .count();
    round_one_decimal(below as f64 / total as f64 * 100.0)
}

/// `Clean` at or below P20, `Dirty` at or above P80, otherwise `Average`.
pub fn relative_mode(value: f64, p20: f64, p80: f64) -> RelativeMode {
    if value <= p20 {
        RelativeMode::Clean
    } else if value >= p80 {
        RelativeMode::Dirty
    } else {
        RelativeMode::Average
    }
}

/// Human-readable rank for a percentile.
pub fn daily_rank(percentile: f64) -> String {
    if percentile <= CLEANEST_RANK {
        format!("top {:.1}% cleanest", percentile)
    } else if percentile >= DIRTIEST_RANK {
        format!("top {:.1}% dirtiest", 100.0 - percentile)
    } else {
        "average for this region".to_string()
    }
}

/// `(value - mean) / mean * 100`, or zero when the mean is not positive.
pub fn trend_magnitude(value: f64, mean: f64) -> f64 {
    if mean > 0.0 {
        (value - mean) / mean * 100.0
    } else {
        0.0
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
