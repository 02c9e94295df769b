//! Trend report construction.

use chrono::{Datelike, Weekday};

use carbon_types::{CarbonTrend, RegionPattern, HOURS_PER_DAY};

use crate::calculator;

/// Number of hours listed in the cleanest/dirtiest rankings.
const RANKED_HOURS: usize = 3;

/// Summarise `pattern` as a trend report.
///
/// Returns `None` when the pattern retains no samples.
pub fn build_trend_report(pattern: &RegionPattern, period: impl Into<String>) -> Option<CarbonTrend> {
    let first = pattern.samples.first()?;
    let last = pattern.samples.last()?;

    let (min, max) = pattern.samples.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY),
        |(lo, hi), s| (lo.min(s.carbon_intensity), hi.max(s.carbon_intensity)),
    );

    let mut weekday = Vec::new();
    let mut weekend = Vec::new();
    for sample in &pattern.samples {
        match sample.timestamp.weekday() {
            Weekday::Sat | Weekday::Sun => weekend.push(sample.carbon_intensity),
            _ => weekday.push(sample.carbon_intensity),
        }
    }

    let cleanest = hours_by_intensity(&pattern.hourly_averages);
    let dirtiest = hours_by_intensity_desc(&pattern.hourly_averages);

    Some(CarbonTrend {
        location: pattern.region.clone(),
        period: period.into(),
        start: first.timestamp,
        end: last.timestamp,
        average: pattern.mean,
        min,
        max,
        std_dev: pattern.std_dev,
        cleanest_hours: cleanest.into_iter().take(RANKED_HOURS).collect(),
        dirtiest_hours: dirtiest.into_iter().take(RANKED_HOURS).collect(),
        weekday_average: average_of(&weekday),
        weekend_average: average_of(&weekend),
        trend_direction: pattern.trend_direction,
        trend_confidence: pattern.trend_confidence,
        sample_count: pattern.sample_count(),
    })
}

/// Hours sorted by average intensity, ascending; equal averages keep hour order.
fn hours_by_intensity(hourly: &[f64; HOURS_PER_DAY]) -> Vec<u32> {
    let mut hours: Vec<u32> = (0..HOURS_PER_DAY as u32).collect();
    hours.sort_by(|a, b| hourly[*a as usize].total_cmp(&hourly[*b as usize]));
    hours
}

/// Hours sorted by average intensity, descending; equal averages keep hour order.
fn hours_by_intensity_desc(hourly: &[f64; HOURS_PER_DAY]) -> Vec<u32> {
    let mut hours: Vec<u32> = (0..HOURS_PER_DAY as u32).collect();
    hours.sort_by(|a, b| hourly[*b as usize].total_cmp(&hourly[*a as usize]));
    hours
}

fn average_of(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| calculator::mean(values))
}
