//! Response objects produced for the outer API layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pattern::TrendDirection;
use crate::sample::CurrentReading;

/// Where a reading sits relative to the region's own thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelativeMode {
    /// At or below the region's P20.
    Clean,

    /// Between P20 and P80.
    Average,

    /// At or above the region's P80.
    Dirty,
}

impl std::fmt::Display for RelativeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelativeMode::Clean => write!(f, "clean"),
            RelativeMode::Average => write!(f, "average"),
            RelativeMode::Dirty => write!(f, "dirty"),
        }
    }
}

/// A predicted one-hour low-carbon interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimalWindow {
    /// Window start (top of the selected hour).
    pub start: DateTime<Utc>,

    /// Window end, always one hour after `start`.
    pub end: DateTime<Utc>,

    /// Historical average intensity for the selected hour.
    pub expected_intensity: f64,

    /// Human-readable explanation; not used in comparisons.
    pub reason: String,

    /// Pattern confidence, 0-1.
    pub confidence: f64,
}

/// Summary of the regional norms a reading was compared against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalBaseline {
    pub mean: f64,
    pub std_dev: f64,
    pub p20: f64,
    pub p80: f64,
    pub sample_count: usize,
    pub last_updated: DateTime<Utc>,
}

/// A current reading classified against the region's learned pattern.
///
/// When no pattern is available the relative fields are `None`, the
/// confidence is 0.5 and `analytics_available` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativeCarbonIntensity {
    pub region: String,

    /// The live reading this response is about.
    pub current: CurrentReading,

    /// Percentile of the reading among historical samples, 0-100.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_percentile: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_rank: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_mode: Option<RelativeMode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_direction: Option<TrendDirection>,

    /// Percent deviation of the reading from the regional mean.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_magnitude: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_optimal_window: Option<OptimalWindow>,

    pub confidence_score: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub regional_baseline: Option<RegionalBaseline>,

    /// Region is on the configured high-variation allow-list.
    pub is_high_variation: bool,

    /// False when the response was degraded to the absolute reading only.
    pub analytics_available: bool,
}

impl RelativeCarbonIntensity {
    /// Confidence reported when no regional pattern could be obtained.
    pub const DEGRADED_CONFIDENCE: f64 = 0.5;

    /// Build a response carrying only the absolute reading.
    pub fn degraded(region: impl Into<String>, current: CurrentReading, is_high_variation: bool) -> Self {
        Self {
            region: region.into(),
            current,
            local_percentile: None,
            daily_rank: None,
            relative_mode: None,
            trend_direction: None,
            trend_magnitude: None,
            next_optimal_window: None,
            confidence_score: Self::DEGRADED_CONFIDENCE,
            regional_baseline: None,
            is_high_variation,
            analytics_available: false,
        }
    }
}

/// Historical trend report for a region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonTrend {
    pub location: String,

    /// Analysis window label, e.g. `"7d"`.
    pub period: String,

    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,

    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,

    /// The three UTC hours with the lowest average intensity, cleanest first.
    pub cleanest_hours: Vec<u32>,

    /// The three UTC hours with the highest average intensity, dirtiest first.
    pub dirtiest_hours: Vec<u32>,

    /// Mean intensity over Monday-Friday samples, if any.
    pub weekday_average: Option<f64>,

    /// Mean intensity over Saturday-Sunday samples, if any.
    pub weekend_average: Option<f64>,

    pub trend_direction: TrendDirection,
    pub trend_confidence: f64,
    pub sample_count: usize,
}

/// A forecast hour that passed the regional green-hour filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreenHour {
    pub timestamp: DateTime<Utc>,
    pub intensity: f64,

    /// Forecast confidence after any discount applied by the filter.
    pub confidence: f64,
}
