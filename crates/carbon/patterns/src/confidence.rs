//! Pattern reliability scoring.
//!
//! Confidence is the product of three independent factors, each clamped to
//! [0, 1] before multiplying, rounded to two decimals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use carbon_types::RegionPattern;

/// Newest-sample age (hours) within which recency is not penalised.
const FRESH_WINDOW_HOURS: f64 = 24.0;

/// Hours over which the recency factor decays linearly (one week).
const RECENCY_DECAY_HOURS: f64 = 168.0;

/// Lowest value the recency and variation factors can take.
const FACTOR_FLOOR: f64 = 0.5;

/// The individual factors behind a confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceFactors {
    /// Retained samples relative to a full analysis window.
    pub data_completeness: f64,

    /// Penalty for the age of the newest sample.
    pub recency: f64,

    /// Penalty for high relative spread (coefficient of variation).
    pub variation: f64,
}

impl ConfidenceFactors {
    /// Evaluate all three factors for `pattern` as of `now`.
    pub fn evaluate(pattern: &RegionPattern, expected_samples: usize, now: DateTime<Utc>) -> Self {
        Self {
            data_completeness: data_completeness(pattern.sample_count(), expected_samples),
            recency: recency_factor(pattern.newest_sample_at(), now),
            variation: variation_factor(pattern.mean, pattern.std_dev),
        }
    }

    /// Combined score rounded to two decimals.
    pub fn score(&self) -> f64 {
        let product = self.data_completeness.clamp(0.0, 1.0)
            * self.recency.clamp(0.0, 1.0)
            * self.variation.clamp(0.0, 1.0);
        (product * 100.0).round() / 100.0
    }
}

/// Confidence in `pattern`, in [0, 1].
pub fn confidence(pattern: &RegionPattern, expected_samples: usize, now: DateTime<Utc>) -> f64 {
    ConfidenceFactors::evaluate(pattern, expected_samples, now).score()
}

/// `min(sample_count / expected, 1)`.
pub fn data_completeness(sample_count: usize, expected_samples: usize) -> f64 {
    if expected_samples == 0 {
        return 1.0;
    }
    (sample_count as f64 / expected_samples as f64).min(1.0)
}

/// 1 within a day of the newest sample, then linear decay over a week, floored at 0.5.
pub fn recency_factor(newest: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(newest) = newest else {
        return FACTOR_FLOOR;
    };
    let hours_since = (now - newest).num_seconds() as f64 / 3600.0;
    if hours_since <= FRESH_WINDOW_HOURS {
        1.0
    } else {
        (1.0 - hours_since / RECENCY_DECAY_HOURS).max(FACTOR_FLOOR)
    }
}

/// `max(0.5, 1 - (std_dev / mean) / 2)` for a positive mean, else 1.
pub fn variation_factor(mean: f64, std_dev: f64) -> f64 {
    if mean > 0.0 {
        (1.0 - (std_dev / mean) / 2.0).max(FACTOR_FLOOR)
    } else {
        1.0
    }
}
