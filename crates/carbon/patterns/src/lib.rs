//! # Carbon Patterns - Regional carbon-intensity pattern engine
//!
//! Learns per-region statistical baselines from historical carbon-intensity
//! samples and uses them to judge a live reading relative to its own region:
//!
//! - **Calculator**: mean, spread, P20/P80 thresholds and hourly averages
//! - **Trend**: slope of intensity over the retention window
//! - **Metrics**: local percentile, clean/average/dirty mode, daily rank
//! - **Predictor**: the next low-carbon hour within 24 hours
//! - **Green hours**: dynamic filtering of a caller-supplied forecast
//! - **Store**: cached patterns with lazy, single-flight refresh
//! - **Scheduler**: periodic background refresh of cached regions
//!
//! [`PatternService`] composes all of these behind three operations:
//! relative intensity, green hours and trend reports.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use carbon_patterns::{InMemorySource, PatternConfig, PatternService, RegionPatternStore};
//!
//! # async fn run() -> carbon_patterns::PatternResult<()> {
//! let source = Arc::new(InMemorySource::new());
//! let store = Arc::new(RegionPatternStore::new(PatternConfig::default(), source.clone()));
//! let service = PatternService::new(store, source);
//!
//! let relative = service.relative_intensity("DE").await?;
//! println!("{:?}", relative.relative_mode);
//! # Ok(())
//! # }
//! ```

pub mod calculator;
pub mod confidence;
pub mod config;
pub mod error;
pub mod green;
pub mod metrics;
pub mod predictor;
pub mod report;
pub mod scheduler;
pub mod service;
pub mod source;
pub mod store;
pub mod trend;

pub use calculator::{compute_pattern, compute_pattern_at};
pub use confidence::{confidence, ConfidenceFactors};
pub use config::{PatternConfig, SchedulerConfig};
pub use error::{PatternError, PatternResult, SourceError};
pub use green::{filter_green_hours, filter_green_hours_static};
pub use metrics::{classify, Classification};
pub use predictor::predict_next_window;
pub use report::build_trend_report;
pub use scheduler::{RefreshScheduler, SchedulerHandle, SweepReport};
pub use service::PatternService;
pub use source::{CurrentIntensitySource, HistoricalSource, InMemorySource, SourceResult};
pub use store::{PatternEvent, RegionPatternStore};
