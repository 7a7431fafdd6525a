use crate::error::{GroveOpsError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorStatus {
    Online,
    Offline,
    Error,
    Calibrating,
    Maintenance,
    LowBattery,
    Configuring,
    Sleeping,
}

impl SensorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorStatus::Online => "Online",
            SensorStatus::Offline => "Offline",
            SensorStatus::Error => "Error",
            SensorStatus::Calibrating => "Calibrating",
            SensorStatus::Maintenance => "Maintenance",
            SensorStatus::LowBattery => "Low Battery",
            SensorStatus::Configuring => "Configuring",
            SensorStatus::Sleeping => "Sleeping",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            SensorStatus::Online => "🟢",
            SensorStatus::Offline => "⚫",
            SensorStatus::Error => "🔴",
            SensorStatus::Calibrating => "🟡",
            SensorStatus::Maintenance => "🟠",
            SensorStatus::LowBattery => "🟡",
            SensorStatus::Configuring => "🔵",
            SensorStatus::Sleeping => "🌙",
        }
    }

    /// Whether readings carrying this status are trustworthy data.
    pub fn can_provide_data(&self) -> bool {
        matches!(self, SensorStatus::Online | SensorStatus::LowBattery)
    }

    pub fn is_error_state(&self) -> bool {
        matches!(self, SensorStatus::Error | SensorStatus::Offline)
    }

    pub fn is_maintenance_state(&self) -> bool {
        matches!(
            self,
            SensorStatus::Calibrating | SensorStatus::Maintenance | SensorStatus::Configuring
        )
    }

    /// Unknown strings map to Offline rather than failing the row.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "online" => SensorStatus::Online,
            "offline" => SensorStatus::Offline,
            "error" => SensorStatus::Error,
            "calibrating" => SensorStatus::Calibrating,
            "maintenance" => SensorStatus::Maintenance,
            "lowbattery" => SensorStatus::LowBattery,
            "configuring" => SensorStatus::Configuring,
            "sleeping" => SensorStatus::Sleeping,
            _ => SensorStatus::Offline,
        }
    }
}

impl std::fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.symbol(), self.as_str())
    }
}

/// A single soil-sensor measurement for a parcel.
///
/// Owned by the sensor history store; the decision engine only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReading {
    pub id: Option<i64>,
    pub parcel_id: i64,
    pub timestamp: DateTime<Utc>,
    pub moisture_percent: f64,
    pub temperature_celsius: Option<f64>,
    pub ec_value: Option<f64>,
    pub ph_value: Option<f64>,
    pub battery_level: Option<i32>,
    pub signal_strength: Option<i32>,
    pub status: SensorStatus,
    pub sensor_id: Option<String>,
}

impl SensorReading {
    pub fn new(parcel_id: i64, timestamp: DateTime<Utc>, moisture_percent: f64) -> Result<Self> {
        if !(0.0..=100.0).contains(&moisture_percent) {
            return Err(GroveOpsError::InvalidData(format!(
                "moisture {}% outside 0-100",
                moisture_percent
            )));
        }
        Ok(Self {
            id: None,
            parcel_id,
            timestamp,
            moisture_percent,
            temperature_celsius: None,
            ec_value: None,
            ph_value: None,
            battery_level: None,
            signal_strength: None,
            status: SensorStatus::Online,
            sensor_id: None,
        })
    }

    pub fn with_temperature(mut self, celsius: f64) -> Result<Self> {
        if !(-50.0..=80.0).contains(&celsius) {
            return Err(GroveOpsError::InvalidData(format!(
                "sensor temperature {}°C outside -50..80",
                celsius
            )));
        }
        self.temperature_celsius = Some(celsius);
        Ok(self)
    }

    pub fn with_ec(mut self, ec: f64) -> Result<Self> {
        if ec < 0.0 {
            return Err(GroveOpsError::InvalidData(
                "EC value must not be negative".into(),
            ));
        }
        self.ec_value = Some(ec);
        Ok(self)
    }

    pub fn with_ph(mut self, ph: f64) -> Result<Self> {
        if !(0.0..=14.0).contains(&ph) {
            return Err(GroveOpsError::InvalidData(format!(
                "pH {} outside 0-14",
                ph
            )));
        }
        self.ph_value = Some(ph);
        Ok(self)
    }

    pub fn with_battery(mut self, percent: i32) -> Result<Self> {
        if !(0..=100).contains(&percent) {
            return Err(GroveOpsError::InvalidData(format!(
                "battery level {}% outside 0-100",
                percent
            )));
        }
        self.battery_level = Some(percent);
        Ok(self)
    }

    pub fn with_signal(mut self, percent: i32) -> Result<Self> {
        if !(0..=100).contains(&percent) {
            return Err(GroveOpsError::InvalidData(format!(
                "signal strength {}% outside 0-100",
                percent
            )));
        }
        self.signal_strength = Some(percent);
        Ok(self)
    }

    pub fn with_status(mut self, status: SensorStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_sensor_id(mut self, sensor_id: &str) -> Self {
        self.sensor_id = Some(sensor_id.to_string());
        self
    }

    pub fn is_stale(&self, max_age_minutes: i64, now: DateTime<Utc>) -> bool {
        self.timestamp + Duration::minutes(max_age_minutes) < now
    }

    /// Plausibility check over all present values plus status.
    pub fn is_valid(&self) -> bool {
        if !(0.0..=100.0).contains(&self.moisture_percent) {
            return false;
        }
        if let Some(t) = self.temperature_celsius {
            if !(-50.0..=80.0).contains(&t) {
                return false;
            }
        }
        if let Some(ec) = self.ec_value {
            if ec < 0.0 {
                return false;
            }
        }
        if let Some(ph) = self.ph_value {
            if !(0.0..=14.0).contains(&ph) {
                return false;
            }
        }
        if let Some(b) = self.battery_level {
            if !(0..=100).contains(&b) {
                return false;
            }
        }
        self.status != SensorStatus::Error
    }

    pub fn is_battery_critical(&self) -> bool {
        matches!(self.battery_level, Some(level) if level < 10)
    }

    pub fn can_provide_data(&self, now: DateTime<Utc>) -> bool {
        self.status.can_provide_data() && !self.is_stale(30, now) && self.is_valid()
    }

    pub fn has_critical_data(&self, now: DateTime<Utc>) -> bool {
        self.status.can_provide_data() && !self.is_stale(120, now)
    }

    pub fn requires_attention(&self, now: DateTime<Utc>) -> bool {
        self.status.is_error_state()
            || self.status == SensorStatus::LowBattery
            || self.is_battery_critical()
            || self.is_stale(60, now)
            || self.data_quality_score(now) < 50
    }

    /// Derived data quality on a 0-100 scale. Deductions stack for weak
    /// battery/signal, degraded status, staleness, and missing values.
    pub fn data_quality_score(&self, now: DateTime<Utc>) -> i32 {
        if self.status == SensorStatus::Error {
            return 0;
        }

        let mut score = 100;

        match self.battery_level {
            Some(b) if b < 20 => score -= 20,
            Some(b) if b < 50 => score -= 10,
            _ => {}
        }

        match self.signal_strength {
            Some(s) if s < 50 => score -= 15,
            Some(s) if s < 80 => score -= 5,
            _ => {}
        }

        if self.status == SensorStatus::LowBattery {
            score -= 10;
        } else if self.status.is_maintenance_state() {
            score -= 30;
        }

        if self.is_stale(60, now) {
            score -= 40;
        } else if self.is_stale(30, now) {
            score -= 20;
        }

        if self.temperature_celsius.is_none() {
            score -= 10;
        }
        if self.ec_value.is_none() {
            score -= 10;
        }
        if self.ph_value.is_none() {
            score -= 10;
        }

        score.clamp(0, 100)
    }

    /// Moisture deficit amplified by heat, salinity, and unfavorable pH.
    /// 1.0 when the sensor cannot provide usable data.
    pub fn water_stress_index(&self, now: DateTime<Utc>) -> f64 {
        if !self.can_provide_data(now) {
            return 1.0;
        }

        let mut index = (100.0 - self.moisture_percent) / 100.0;

        if matches!(self.temperature_celsius, Some(t) if t > 25.0) {
            index *= 1.5;
        }
        if matches!(self.ec_value, Some(ec) if ec > 2000.0) {
            index *= 1.3;
        }
        if matches!(self.ph_value, Some(ph) if !(5.5..=7.5).contains(&ph)) {
            index *= 1.2;
        }

        index.min(1.0)
    }
}
