//! File-backed data collaborator.
//!
//! Each region lives in `<data_dir>/<region>.json`:
//!
//! ```json
//! { "samples": [ { "timestamp": "...", "carbon_intensity": 120.0, "renewable_percent": 40.0 } ],
//!   "current": { "intensity": 110.0, "renewable_percent": 45.0, "timestamp": "..." } }
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use carbon_patterns::{CurrentIntensitySource, HistoricalSource, SourceError, SourceResult};
use carbon_types::{CurrentReading, HistoricalSample};

/// Contents of one region file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegionFile {
    #[serde(default)]
    pub samples: Vec<HistoricalSample>,

    #[serde(default)]
    pub current: Option<CurrentReading>,
}

/// Reads region data from JSON files on every call.
#[derive(Debug, Clone)]
pub struct FileSource {
    data_dir: PathBuf,
}

impl FileSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn region_path(&self, region: &str) -> SourceResult<PathBuf> {
        let valid = !region.is_empty()
            && region
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(SourceError::RegionNotFound(region.to_string()));
        }
        Ok(self.data_dir.join(format!("{}.json", region)))
    }

    async fn read_region(&self, region: &str) -> SourceResult<RegionFile> {
        let path = self.region_path(region)?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => SourceError::RegionNotFound(region.to_string()),
            _ => SourceError::Unavailable(format!("{}: {}", path.display(), e)),
        })?;

        serde_json::from_slice(&bytes)
            .map_err(|e| SourceError::Malformed(format!("{}: {}", path.display(), e)))
    }
}

#[async_trait]
impl HistoricalSource for FileSource {
    async fn fetch_historical_samples(
        &self,
        region: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SourceResult<Vec<HistoricalSample>> {
        let file = self.read_region(region).await?;
        let total = file.samples.len();

        let samples: Vec<HistoricalSample> = file
            .samples
            .into_iter()
            .filter(|s| s.timestamp >= start && s.timestamp <= end)
            .collect();

        debug!(region = %region, total, in_window = samples.len(), "Read region file");
        Ok(samples)
    }
}

#[async_trait]
impl CurrentIntensitySource for FileSource {
    async fn fetch_current_intensity(&self, region: &str) -> SourceResult<CurrentReading> {
        self.read_region(region)
            .await?
            .current
            .ok_or_else(|| SourceError::Unavailable(format!("no current reading for {}", region)))
    }
}
