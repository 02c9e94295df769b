//! The learned statistical model for a region.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::sample::HistoricalSample;

/// Number of hour-of-day slots in an hourly profile.
pub const HOURS_PER_DAY: usize = 24;

/// Direction of the intensity trend over the analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    /// Intensity is falling.
    Improving,

    /// Intensity is rising.
    Worsening,

    /// No meaningful slope.
    Stable,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Improving => write!(f, "improving"),
            TrendDirection::Worsening => write!(f, "worsening"),
            TrendDirection::Stable => write!(f, "stable"),
        }
    }
}

/// Statistical summary of a region's recent carbon intensity.
///
/// A pattern is never mutated after construction. Callers share it behind an
/// `Arc`, and a refresh installs a new instance in place of the old one.
///
/// `p20 <= mean <= p80` usually holds but is not enforced: the thresholds are
/// read from the sorted samples independently of the mean, so heavily skewed
/// inputs can break the ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionPattern {
    /// Region identifier.
    pub region: String,

    /// When this pattern was computed.
    pub last_updated: DateTime<Utc>,

    /// Samples the pattern was computed from, in ascending time order.
    pub samples: Vec<HistoricalSample>,

    /// Mean intensity.
    pub mean: f64,

    /// Population standard deviation of intensity.
    pub std_dev: f64,

    /// 20th percentile intensity ("clean" threshold).
    pub p20: f64,

    /// 80th percentile intensity ("dirty" threshold).
    pub p80: f64,

    /// Average intensity for each UTC hour of day.
    pub hourly_averages: [f64; HOURS_PER_DAY],

    /// Direction of the intensity trend.
    pub trend_direction: TrendDirection,

    /// Confidence in the trend direction (0-0.8).
    pub trend_confidence: f64,
}

impl RegionPattern {
    /// Number of retained samples.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Whether the hourly profile is backed by any samples.
    pub fn has_hourly_data(&self) -> bool {
        !self.samples.is_empty()
    }

    /// Timestamp of the newest retained sample.
    pub fn newest_sample_at(&self) -> Option<DateTime<Utc>> {
        self.samples.last().map(|s| s.timestamp)
    }

    /// Time elapsed since this pattern was computed.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_updated
    }

    /// Whether the pattern is older than `max_age`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) > max_age
    }
}
