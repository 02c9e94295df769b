//! Dynamic green-hour filtering of a caller-supplied forecast.

use carbon_types::{ForecastHour, GreenHour, RegionPattern};

/// Standard deviation (g CO2/kWh) above which a region's swings are wide
/// enough to accept below-mean hours as green.
pub const HIGH_VARIATION_STD_DEV: f64 = 50.0;

/// Confidence multiplier for hours accepted through the below-mean rule.
pub const BELOW_MEAN_DISCOUNT: f64 = 0.8;

/// Confidence ceiling for hours accepted without a regional pattern.
pub const FALLBACK_CONFIDENCE_CAP: f64 = 0.5;

/// Whether a pattern's spread exceeds the high-variation threshold.
///
/// This statistical signal is independent of the configured high-variation
/// region allow-list.
pub fn has_high_variation(pattern: &RegionPattern) -> bool {
    pattern.std_dev > HIGH_VARIATION_STD_DEV
}

/// Keep forecast hours that are green relative to `pattern`.
///
/// An hour at or below P20 is kept as-is. Otherwise, in a high-variation
/// region, an hour below the mean is kept with its confidence discounted.
pub fn filter_green_hours(forecast: &[ForecastHour], pattern: &RegionPattern) -> Vec<GreenHour> {
    let high_variation = has_high_variation(pattern);

    forecast
        .iter()
        .filter_map(|hour| {
            if hour.intensity <= pattern.p20 {
                Some(green(hour, hour.confidence))
            } else if high_variation && hour.intensity < pattern.mean {
                Some(green(hour, hour.confidence * BELOW_MEAN_DISCOUNT))
            } else {
                None
            }
        })
        .collect()
}

/// Keep forecast hours at or below a static threshold, capping confidence.
pub fn filter_green_hours_static(forecast: &[ForecastHour], threshold: f64) -> Vec<GreenHour> {
    forecast
        .iter()
        .filter(|hour| hour.intensity <= threshold)
        .map(|hour| green(hour, hour.confidence.min(FALLBACK_CONFIDENCE_CAP)))
        .collect()
}

fn green(hour: &ForecastHour, confidence: f64) -> GreenHour {
    GreenHour {
        timestamp: hour.timestamp,
        intensity: hour.intensity,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carbon_types::{HistoricalSample, TrendDirection, HOURS_PER_DAY};
    use chrono::{Duration, TimeZone, Utc};

    fn pattern(mean: f64, std_dev: f64, p20: f64) -> RegionPattern {
        let at = Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap();
        RegionPattern {
            region: "DK".into(),
            last_updated: at,
            samples: vec![HistoricalSample::new(at, mean, 50.0)],
            mean,
            std_dev,
            p20,
            p80: mean + std_dev,
            hourly_averages: [mean; HOURS_PER_DAY],
            trend_direction: TrendDirection::Stable,
            trend_confidence: 0.0,
        }
    }

    fn forecast(values: &[f64]) -> Vec<ForecastHour> {
        let start = Utc.with_ymd_and_hms(2024, 9, 2, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| ForecastHour {
                timestamp: start + Duration::hours(i as i64),
                intensity: *v,
                confidence: 0.9,
            })
            .collect()
    }

    #[test]
    fn test_low_variation_keeps_only_p20() {
        let p = pattern(300.0, 40.0, 250.0);
        let kept = filter_green_hours(&forecast(&[240.0, 250.0, 280.0, 320.0]), &p);

        let intensities: Vec<f64> = kept.iter().map(|g| g.intensity).collect();
        assert_eq!(intensities, vec![240.0, 250.0]);
        assert!(kept.iter().all(|g| g.confidence == 0.9));
    }

    #[test]
    fn test_high_variation_accepts_below_mean_with_discount() {
        let p = pattern(300.0, 120.0, 180.0);
        let kept = filter_green_hours(&forecast(&[150.0, 280.0, 300.0]), &p);

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert!((kept[1].confidence - 0.72).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_is_strict_above_fifty() {
        assert!(!has_high_variation(&pattern(300.0, 50.0, 200.0)));
        assert!(has_high_variation(&pattern(300.0, 50.1, 200.0)));
    }

    #[test]
    fn test_static_fallback_caps_confidence() {
        let kept = filter_green_hours_static(&forecast(&[150.0, 200.0, 201.0]), 200.0);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|g| g.confidence == 0.5));
    }
}
