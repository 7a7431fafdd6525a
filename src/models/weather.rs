use crate::error::{GroveOpsError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Precipitation probability above which any forecast rain counts as
/// "rain expected" even below the volume threshold.
const HIGH_RAIN_PROBABILITY: f64 = 70.0;

/// A point-in-time weather observation or single-day forecast entry.
///
/// Immutable once built; one snapshot is created per evaluation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub timestamp: DateTime<Utc>,
    pub temperature_celsius: f64,
    pub precipitation_mm_24h: f64,
    pub precipitation_probability: f64,
    pub humidity_percent: f64,
    pub wind_speed_kmh: f64,
    pub evapotranspiration_mm: f64,
}

impl WeatherSnapshot {
    pub fn new(
        timestamp: DateTime<Utc>,
        temperature_celsius: f64,
        precipitation_mm_24h: f64,
        precipitation_probability: f64,
        humidity_percent: f64,
        wind_speed_kmh: f64,
        evapotranspiration_mm: f64,
    ) -> Result<Self> {
        if !(-20.0..=50.0).contains(&temperature_celsius) {
            return Err(GroveOpsError::InvalidData(format!(
                "temperature {}°C outside -20..50",
                temperature_celsius
            )));
        }
        if precipitation_mm_24h < 0.0 {
            return Err(GroveOpsError::InvalidData(
                "precipitation must not be negative".into(),
            ));
        }
        if !(0.0..=100.0).contains(&precipitation_probability) {
            return Err(GroveOpsError::InvalidData(format!(
                "precipitation probability {}% outside 0-100",
                precipitation_probability
            )));
        }
        if !(0.0..=100.0).contains(&humidity_percent) {
            return Err(GroveOpsError::InvalidData(format!(
                "humidity {}% outside 0-100",
                humidity_percent
            )));
        }
        if wind_speed_kmh < 0.0 {
            return Err(GroveOpsError::InvalidData(
                "wind speed must not be negative".into(),
            ));
        }
        if evapotranspiration_mm < 0.0 {
            return Err(GroveOpsError::InvalidData(
                "evapotranspiration must not be negative".into(),
            ));
        }
        Ok(Self {
            timestamp,
            temperature_celsius,
            precipitation_mm_24h,
            precipitation_probability,
            humidity_percent,
            wind_speed_kmh,
            evapotranspiration_mm,
        })
    }

    /// Rain counts as expected above the volume threshold, or at any
    /// nonzero volume once the probability exceeds 70%.
    pub fn is_rain_expected(&self, threshold_mm: f64) -> bool {
        self.precipitation_mm_24h > threshold_mm
            || (self.precipitation_probability > HIGH_RAIN_PROBABILITY
                && self.precipitation_mm_24h > 0.0)
    }

    /// 1.0 at or below 20°C, +5% per degree above.
    pub fn temp_factor(&self) -> f64 {
        if self.temperature_celsius <= 20.0 {
            return 1.0;
        }
        1.0 + (self.temperature_celsius - 20.0) * 0.05
    }

    /// ET0 normalized against a 5mm reference day, capped at 2.0.
    pub fn et0_factor(&self) -> f64 {
        (self.evapotranspiration_mm / 5.0).min(2.0)
    }

    pub fn water_need_factor(&self) -> f64 {
        self.temp_factor() * self.et0_factor()
    }
}

impl std::fmt::Display for WeatherSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.1}°C, {:.1}mm rain ({:.0}%), ET0={:.1}mm, wind {:.0}km/h",
            self.temperature_celsius,
            self.precipitation_mm_24h,
            self.precipitation_probability,
            self.evapotranspiration_mm,
            self.wind_speed_kmh
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(temp: f64, precip: f64, prob: f64, et0: f64) -> WeatherSnapshot {
        WeatherSnapshot::new(Utc::now(), temp, precip, prob, 65.0, 12.5, et0).unwrap()
    }

    #[test]
    fn constructor_rejects_out_of_range_values() {
        let now = Utc::now();
        assert!(WeatherSnapshot::new(now, -30.0, 0.0, 0.0, 50.0, 0.0, 0.0).is_err());
        assert!(WeatherSnapshot::new(now, 20.0, -1.0, 0.0, 50.0, 0.0, 0.0).is_err());
        assert!(WeatherSnapshot::new(now, 20.0, 0.0, 120.0, 50.0, 0.0, 0.0).is_err());
        assert!(WeatherSnapshot::new(now, 20.0, 0.0, 0.0, 101.0, 0.0, 0.0).is_err());
        assert!(WeatherSnapshot::new(now, 20.0, 0.0, 0.0, 50.0, -5.0, 0.0).is_err());
        assert!(WeatherSnapshot::new(now, 20.0, 0.0, 0.0, 50.0, 0.0, -0.1).is_err());
    }

    #[test]
    fn rain_expected_above_threshold() {
        assert!(snapshot(20.0, 5.0, 10.0, 4.0).is_rain_expected(3.0));
    }

    #[test]
    fn rain_expected_on_high_probability_with_nonzero_volume() {
        assert!(snapshot(20.0, 1.0, 80.0, 4.0).is_rain_expected(3.0));
    }

    #[test]
    fn no_rain_expected_without_volume() {
        // High probability alone is not enough
        assert!(!snapshot(20.0, 0.0, 95.0, 4.0).is_rain_expected(3.0));
        assert!(!snapshot(20.0, 2.0, 50.0, 4.0).is_rain_expected(3.0));
    }

    #[test]
    fn temp_factor_flat_below_20() {
        assert_eq!(snapshot(15.0, 0.0, 0.0, 5.0).temp_factor(), 1.0);
        assert_eq!(snapshot(20.0, 0.0, 0.0, 5.0).temp_factor(), 1.0);
    }

    #[test]
    fn temp_factor_grows_above_20() {
        let f = snapshot(30.0, 0.0, 0.0, 5.0).temp_factor();
        assert!((f - 1.5).abs() < 1e-9);
    }

    #[test]
    fn et0_factor_capped_at_two() {
        assert!((snapshot(20.0, 0.0, 0.0, 5.0).et0_factor() - 1.0).abs() < 1e-9);
        assert!((snapshot(20.0, 0.0, 0.0, 2.5).et0_factor() - 0.5).abs() < 1e-9);
        assert!((snapshot(20.0, 0.0, 0.0, 15.0).et0_factor() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn water_need_factor_monotonic_in_et0() {
        let low = snapshot(22.0, 0.0, 0.0, 2.0).water_need_factor();
        let mid = snapshot(22.0, 0.0, 0.0, 5.0).water_need_factor();
        let high = snapshot(22.0, 0.0, 0.0, 8.0).water_need_factor();
        assert!(low < mid && mid < high);
    }
}
