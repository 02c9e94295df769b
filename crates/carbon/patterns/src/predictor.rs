//! Next low-carbon window prediction from a pattern's hourly profile.

use chrono::{DateTime, Duration, DurationRound, Timelike, Utc};

use carbon_types::{OptimalWindow, RegionPattern, HOURS_PER_DAY};

use crate::confidence;

/// Predict the next one-hour window with the lowest historical intensity.
///
/// Candidates are scanned from the hour after `from` through `from`'s own
/// hour, wrapping at midnight. Ties go to the first hour scanned, i.e. the
/// nearest future hour. Returns `None` when the pattern retains no samples.
pub fn predict_next_window(
    pattern: &RegionPattern,
    from: DateTime<Utc>,
    expected_samples: usize,
) -> Option<OptimalWindow> {
    if !pattern.has_hourly_data() {
        return None;
    }

    let (hour, expected_intensity) = cleanest_upcoming_hour(&pattern.hourly_averages, from.hour())?;
    let start = next_occurrence_of_hour(from, hour)?;

    Some(OptimalWindow {
        start,
        end: start + Duration::hours(1),
        expected_intensity,
        reason: window_reason(hour).to_string(),
        confidence: confidence::confidence(pattern, expected_samples, from),
    })
}

/// Scan order starts at `(current_hour + 1) % 24`; returns the first minimum.
fn cleanest_upcoming_hour(hourly: &[f64; HOURS_PER_DAY], current_hour: u32) -> Option<(u32, f64)> {
    let mut best: Option<(u32, f64)> = None;
    for offset in 1..=HOURS_PER_DAY as u32 {
        let hour = (current_hour + offset) % HOURS_PER_DAY as u32;
        let value = hourly[hour as usize];
        match best {
            Some((_, best_value)) if value >= best_value => {}
            _ => best = Some((hour, value)),
        }
    }
    best
}

/// First top-of-hour at `hour` strictly after `from`.
fn next_occurrence_of_hour(from: DateTime<Utc>, hour: u32) -> Option<DateTime<Utc>> {
    let midnight = from.duration_trunc(Duration::days(1)).ok()?;
    let today = midnight + Duration::hours(i64::from(hour));
    if today > from {
        Some(today)
    } else {
        Some(today + Duration::days(1))
    }
}

/// Explanation attached to a predicted window.
pub fn window_reason(hour: u32) -> &'static str {
    match hour {
        22..=23 | 0..=6 => "Night wind patterns",
        10..=16 => "Solar generation peak",
        _ => "Historical low-carbon period",
    }
}
