//! Raw carbon-intensity readings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One historical carbon-intensity observation for a region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSample {
    /// Observation time.
    pub timestamp: DateTime<Utc>,

    /// Carbon intensity in g CO2/kWh (non-negative).
    pub carbon_intensity: f64,

    /// Share of renewable generation, 0-100.
    pub renewable_percent: f64,
}

impl HistoricalSample {
    pub fn new(timestamp: DateTime<Utc>, carbon_intensity: f64, renewable_percent: f64) -> Self {
        Self {
            timestamp,
            carbon_intensity,
            renewable_percent,
        }
    }
}

/// Live grid reading for a region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentReading {
    /// Carbon intensity in g CO2/kWh.
    pub intensity: f64,

    /// Share of renewable generation, 0-100.
    pub renewable_percent: f64,

    /// Time the reading was taken.
    pub timestamp: DateTime<Utc>,
}

/// One hour of a caller-supplied carbon forecast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastHour {
    /// Start of the forecast hour.
    pub timestamp: DateTime<Utc>,

    /// Forecast carbon intensity in g CO2/kWh.
    pub intensity: f64,

    /// Forecaster confidence, 0-1.
    pub confidence: f64,
}
