//! Configuration for carbond

use std::path::PathBuf;
use std::time::Duration;

use carbon_patterns::{PatternConfig, SchedulerConfig};
use serde::{Deserialize, Serialize};

/// Main daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Pattern engine configuration
    #[serde(default)]
    pub patterns: PatternConfig,

    /// Background refresh configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Data source configuration
    #[serde(default)]
    pub source: SourceConfig,

    /// Regions warmed at startup and reported on
    #[serde(default = "default_regions")]
    pub regions: Vec<String>,

    /// Interval between relative-intensity summaries, in seconds
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            patterns: PatternConfig::default(),
            scheduler: SchedulerConfig::default(),
            source: SourceConfig::default(),
            regions: default_regions(),
            report_interval_secs: default_report_interval(),
            logging: LoggingConfig::default(),
        }
    }
}

/// File-backed data source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Directory holding one `<region>.json` file per region
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_regions() -> Vec<String> {
    vec!["DE".to_string(), "FR".to_string(), "GB".to_string()]
}

fn default_report_interval() -> u64 {
    300
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `CARBON_`-prefixed environment variables (`__` between sections).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("CARBON")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("regions")
                .with_list_parse_key("patterns.high_variation_regions")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs.max(1))
    }
}
