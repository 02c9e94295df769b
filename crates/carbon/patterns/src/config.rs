//! Pattern engine configuration.
//!
//! Defines the analysis window, staleness policy and refresh behavior.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use carbon_types::HOURS_PER_DAY;

/// Configuration for pattern learning and serving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Days of history fetched for each computation.
    #[serde(default = "default_retention_days")]
    pub history_retention_days: u32,

    /// Minimum samples required to compute a pattern.
    #[serde(default = "default_min_data_points")]
    pub min_data_points: usize,

    /// Age after which a cached pattern is recomputed, in seconds.
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,

    /// Regions flagged as high-variation regardless of their statistics.
    #[serde(default = "default_high_variation_regions")]
    pub high_variation_regions: Vec<String>,

    /// Upper bound on a lazy recompute in the service read path, in milliseconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,

    /// Static green-hour threshold used when no pattern is available (g CO2/kWh).
    #[serde(default = "default_fallback_green_threshold")]
    pub fallback_green_threshold: f64,

    /// Upper bound on one fetch-and-compute, whoever is waiting on it, in seconds.
    #[serde(default = "default_compute_timeout")]
    pub compute_timeout_secs: u64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            history_retention_days: default_retention_days(),
            min_data_points: default_min_data_points(),
            update_interval_secs: default_update_interval(),
            high_variation_regions: default_high_variation_regions(),
            read_timeout_ms: default_read_timeout(),
            fallback_green_threshold: default_fallback_green_threshold(),
            compute_timeout_secs: default_compute_timeout(),
        }
    }
}

impl PatternConfig {
    /// Samples a complete analysis window would contain at hourly resolution.
    pub fn expected_sample_count(&self) -> usize {
        self.history_retention_days as usize * HOURS_PER_DAY
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn compute_timeout(&self) -> Duration {
        Duration::from_secs(self.compute_timeout_secs)
    }

    /// Length of the history window requested from the collaborator.
    pub fn retention_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.history_retention_days))
    }

    /// Age after which a cached pattern is stale.
    pub fn max_pattern_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.update_interval_secs).unwrap_or(i64::MAX))
    }

    /// Whether `region` is on the static high-variation allow-list.
    pub fn is_high_variation_region(&self, region: &str) -> bool {
        self.high_variation_regions
            .iter()
            .any(|r| r.eq_ignore_ascii_case(region))
    }

    /// Label for the analysis window, e.g. `"7d"`.
    pub fn period_label(&self) -> String {
        format!("{}d", self.history_retention_days)
    }
}

/// Configuration for the background refresh sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Run the background sweep at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Interval between sweeps, in seconds.
    #[serde(default = "default_update_interval")]
    pub refresh_interval_secs: u64,

    /// Time budget for refreshing one region, in seconds.
    #[serde(default = "default_per_region_timeout")]
    pub per_region_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_interval_secs: default_update_interval(),
            per_region_timeout_secs: default_per_region_timeout(),
        }
    }
}

impl SchedulerConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn per_region_timeout(&self) -> Duration {
        Duration::from_secs(self.per_region_timeout_secs)
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_retention_days() -> u32 {
    7
}

fn default_min_data_points() -> usize {
    24
}

fn default_update_interval() -> u64 {
    3600
}

fn default_high_variation_regions() -> Vec<String> {
    ["DE", "DK", "GB", "US-CAL-CISO"]
        .iter()
        .map(|r| r.to_string())
        .collect()
}

fn default_read_timeout() -> u64 {
    5_000
}

fn default_fallback_green_threshold() -> f64 {
    200.0
}

fn default_per_region_timeout() -> u64 {
    120
}

fn default_compute_timeout() -> u64 {
    120
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_defaults() {
        let config = PatternConfig::default();
        assert_eq!(config.history_retention_days, 7);
        assert_eq!(config.expected_sample_count(), 168);
        assert_eq!(config.max_pattern_age(), chrono::Duration::hours(1));
        assert_eq!(config.compute_timeout(), Duration::from_secs(120));
        assert_eq!(config.period_label(), "7d");
    }

    #[test]
    fn test_high_variation_lookup_ignores_case() {
        let config = PatternConfig::default();
        assert!(config.is_high_variation_region("de"));
        assert!(!config.is_high_variation_region("FR"));
    }

    #[test]
    fn test_scheduler_defaults() {
        let config = SchedulerConfig::default();
        assert!(config.enabled);
        assert_eq!(config.per_region_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: PatternConfig =
            serde_json::from_str(r#"{ "min_data_points": 48 }"#).unwrap();
        assert_eq!(config.min_data_points, 48);
        assert_eq!(config.history_retention_days, 7);
        assert_eq!(config.fallback_green_threshold, 200.0);
    }
}
