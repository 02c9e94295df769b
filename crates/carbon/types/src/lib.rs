//! # Carbon Types - Shared model for regional carbon-intensity patterns
//!
//! Types shared by the pattern engine and its callers:
//!
//! - [`HistoricalSample`], [`CurrentReading`], [`ForecastHour`]: raw readings
//!   supplied by data collaborators
//! - [`RegionPattern`]: the learned statistical model for one region
//! - [`RelativeCarbonIntensity`], [`CarbonTrend`], [`GreenHour`]: response
//!   objects produced for the outer API layer
//!
//! All timestamps are UTC. Hour-of-day grouping uses the UTC hour.

pub mod pattern;
pub mod report;
pub mod sample;

pub use pattern::{RegionPattern, TrendDirection, HOURS_PER_DAY};
pub use report::{
    CarbonTrend, GreenHour, OptimalWindow, RegionalBaseline, RelativeCarbonIntensity,
    RelativeMode,
};
pub use sample::{CurrentReading, ForecastHour, HistoricalSample};
