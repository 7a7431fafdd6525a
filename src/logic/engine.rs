use crate::error::Result;
use crate::logic::clock::{Clock, SystemClock};
use crate::logic::water_need;
use crate::models::{
    IrrigationEvent, ParcelConfig, Recommendation, RecommendationLevel, SensorReading,
    WeatherSnapshot,
};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Thresholds driving the gate sequence. All values are config-backed;
/// the defaults match the grove's operating assumptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSettings {
    /// A reading older than this is unusable for the decision.
    #[serde(default = "default_max_stale_minutes")]
    pub max_stale_minutes: i64,
    /// Forecast precipitation above this skips irrigation.
    #[serde(default = "default_rain_threshold_mm")]
    pub rain_threshold_mm: f64,
    /// Below this moisture the recommendation is critical no matter what.
    #[serde(default = "default_critical_moisture_percent")]
    pub critical_moisture_percent: f64,
    /// Converts the per-parcel daily duration cap (minutes) into a
    /// volume cap (liters). The daily limit gate compares summed liters
    /// against minutes x this rate.
    #[serde(default = "default_liters_per_minute")]
    pub liters_per_minute: f64,
    /// Weather older than this gets a warning reason but still counts.
    #[serde(default = "default_max_weather_age_hours")]
    pub max_weather_age_hours: i64,
}

fn default_max_stale_minutes() -> i64 {
    30
}
fn default_rain_threshold_mm() -> f64 {
    3.0
}
fn default_critical_moisture_percent() -> f64 {
    20.0
}
fn default_liters_per_minute() -> f64 {
    10.0
}
fn default_max_weather_age_hours() -> i64 {
    2
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            max_stale_minutes: default_max_stale_minutes(),
            rain_threshold_mm: default_rain_threshold_mm(),
            critical_moisture_percent: default_critical_moisture_percent(),
            liters_per_minute: default_liters_per_minute(),
            max_weather_age_hours: default_max_weather_age_hours(),
        }
    }
}

/// Sequential gate evaluator: each gate can short-circuit to a final
/// recommendation, and every step appends to the reason list so the
/// decision stays auditable. Stateless between calls.
pub struct RuleEvaluator {
    settings: RuleSettings,
    clock: Box<dyn Clock>,
}

impl RuleEvaluator {
    pub fn new(settings: RuleSettings, clock: Box<dyn Clock>) -> Self {
        Self { settings, clock }
    }

    pub fn with_system_clock(settings: RuleSettings) -> Self {
        Self::new(settings, Box::new(SystemClock))
    }

    pub fn settings(&self) -> &RuleSettings {
        &self.settings
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn evaluate(
        &self,
        parcel: &ParcelConfig,
        weather: &WeatherSnapshot,
        latest_reading: Option<&SensorReading>,
        today_events: &[IrrigationEvent],
    ) -> Result<Recommendation> {
        let now = self.clock.now();
        let mut reasons = Vec::new();

        // 1. Input freshness: old weather is a warning, not a stop.
        if weather.timestamp < now - Duration::hours(self.settings.max_weather_age_hours) {
            reasons.push(format!(
                "Warning: weather data is older than {} hours",
                self.settings.max_weather_age_hours
            ));
        }

        // 2. Sensor gate: without a usable reading, branch to fallback.
        let reading = match self.usable_reading(latest_reading, now, &mut reasons) {
            Some(r) => r,
            None => return self.fallback(parcel, weather, now, reasons),
        };

        // 3. Weather gate: rain, frost, or strong wind skips irrigation.
        if self.should_skip_for_weather(weather, &mut reasons) {
            return Ok(Recommendation::no_irrigation(now, reasons));
        }

        // 4. Time window gate.
        let time_of_day = self.clock.time_of_day();
        if !parcel.is_irrigation_allowed_at(time_of_day) {
            reasons.push("Current time outside allowed irrigation windows".to_string());
            return Ok(Recommendation::no_irrigation(now, reasons));
        }

        // 5. Daily limit gate: duration cap expressed as a volume cap.
        let already_watered = today_water_usage(today_events, self.clock.start_of_day());
        let daily_limit =
            parcel.max_daily_duration_minutes as f64 * self.settings.liters_per_minute;
        if already_watered >= daily_limit {
            reasons.push(format!(
                "Daily limit already reached: {:.1}L of {:.1}L",
                already_watered, daily_limit
            ));
            return Ok(Recommendation::no_irrigation(now, reasons));
        }

        // 6. Range gate.
        let current_moisture = reading.moisture_percent;
        if parcel.target_moisture_range.contains(current_moisture) {
            reasons.push(format!(
                "Moisture within optimal range: {:.1}%",
                current_moisture
            ));
            return Ok(Recommendation::no_irrigation(now, reasons));
        }

        // 7. Compute need and classify.
        let need = water_need::calculate(
            &parcel.profile,
            weather,
            current_moisture,
            &parcel.target_moisture_range,
            &mut reasons,
        );
        let level = self.classify(current_moisture, need, parcel, &mut reasons);

        Recommendation::new(now, need, level, reasons)
    }

    fn usable_reading<'r>(
        &self,
        reading: Option<&'r SensorReading>,
        now: DateTime<Utc>,
        reasons: &mut Vec<String>,
    ) -> Option<&'r SensorReading> {
        let reading = match reading {
            Some(r) => r,
            None => {
                reasons.push("No sensor data available".to_string());
                return None;
            }
        };

        if reading.is_stale(self.settings.max_stale_minutes, now) {
            reasons.push(format!(
                "Sensor data stale ({}min+)",
                self.settings.max_stale_minutes
            ));
            return None;
        }

        if !reading.is_valid() {
            reasons.push(format!("Sensor reports a fault: {}", reading.status));
            return None;
        }

        Some(reading)
    }

    /// Without reliable sensor data the decision degrades to time of day
    /// and rain forecast: half the base need during the day with no rain
    /// expected, otherwise nothing. Either way the level is Fallback.
    fn fallback(
        &self,
        parcel: &ParcelConfig,
        weather: &WeatherSnapshot,
        now: DateTime<Utc>,
        mut reasons: Vec<String>,
    ) -> Result<Recommendation> {
        let time_of_day = self.clock.time_of_day();
        let daytime = time_of_day > NaiveTime::from_hms_opt(6, 0, 0).unwrap_or(NaiveTime::MIN)
            && time_of_day < NaiveTime::from_hms_opt(20, 0, 0).unwrap_or(NaiveTime::MIN);

        if daytime && !weather.is_rain_expected(self.settings.rain_threshold_mm) {
            let amount = parcel.profile.base_water_need_liters * 0.5;
            reasons.push("Fallback: default irrigation due to missing sensor data".to_string());
            return Recommendation::new(now, amount, RecommendationLevel::Fallback, reasons);
        }

        reasons.push("Fallback: no irrigation (night or rain expected)".to_string());
        Recommendation::new(now, 0.0, RecommendationLevel::Fallback, reasons)
    }

    fn should_skip_for_weather(
        &self,
        weather: &WeatherSnapshot,
        reasons: &mut Vec<String>,
    ) -> bool {
        if weather.is_rain_expected(self.settings.rain_threshold_mm) {
            reasons.push(format!(
                "Rain forecast: {:.1}mm ({:.0}%)",
                weather.precipitation_mm_24h, weather.precipitation_probability
            ));
            return true;
        }

        if weather.temperature_celsius < 0.0 {
            reasons.push(format!(
                "Frost risk: {:.1}°C",
                weather.temperature_celsius
            ));
            return true;
        }

        if weather.wind_speed_kmh > 40.0 {
            reasons.push(format!("Strong wind: {:.1}km/h", weather.wind_speed_kmh));
            return true;
        }

        false
    }

    fn classify(
        &self,
        current_moisture: f64,
        water_need: f64,
        parcel: &ParcelConfig,
        reasons: &mut Vec<String>,
    ) -> RecommendationLevel {
        if current_moisture < self.settings.critical_moisture_percent {
            reasons.push(format!(
                "CRITICAL: moisture below {:.0}%",
                self.settings.critical_moisture_percent
            ));
            return RecommendationLevel::Critical;
        }

        if water_need > parcel.profile.base_water_need_liters * 1.5 {
            return RecommendationLevel::Elevated;
        }

        if water_need > 0.0 {
            return RecommendationLevel::Normal;
        }

        RecommendationLevel::None
    }
}

/// Liters already applied today: events starting at or after the local
/// day boundary.
fn today_water_usage(events: &[IrrigationEvent], start_of_day: DateTime<Utc>) -> f64 {
    events
        .iter()
        .filter(|e| e.start_time >= start_of_day)
        .map(|e| e.water_liters)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::clock::FixedClock;
    use crate::models::{
        IrrigationTrigger, MoistureRange, SensorStatus, SoilType, TimeWindow, TreeProfile,
    };
    use chrono::TimeZone;

    fn clock_at(hour: u32, minute: u32) -> (FixedClock, DateTime<Utc>) {
        let instant = Utc.with_ymd_and_hms(2024, 7, 15, hour, minute, 0).unwrap();
        (FixedClock::at(instant), instant)
    }

    fn evaluator(clock: FixedClock) -> RuleEvaluator {
        RuleEvaluator::new(RuleSettings::default(), Box::new(clock))
    }

    fn parcel() -> ParcelConfig {
        let profile = TreeProfile::new("Picual", SoilType::Loamy, 15, false, 20.0).unwrap();
        let range = MoistureRange::new(30.0, 60.0).unwrap();
        ParcelConfig::create("North slope", profile, range).unwrap()
    }

    fn clear_weather(at: DateTime<Utc>, temp: f64, et0: f64) -> WeatherSnapshot {
        WeatherSnapshot::new(at, temp, 0.0, 10.0, 65.0, 12.0, et0).unwrap()
    }

    fn fresh_reading(at: DateTime<Utc>, moisture: f64) -> SensorReading {
        SensorReading::new(1, at - Duration::minutes(5), moisture).unwrap()
    }

    #[test]
    fn normal_recommendation_end_to_end() {
        let (clock, now) = clock_at(10, 30);
        let engine = evaluator(clock);
        let weather = clear_weather(now, 20.0, 5.0);
        let reading = fresh_reading(now, 25.0);

        let rec = engine
            .evaluate(&parcel(), &weather, Some(&reading), &[])
            .unwrap();

        // 20 x 1.5 (deficit 5) x 1.0 (20°C, ET0 5) x 1.0 (loam) x 1.0 (15y)
        assert_eq!(rec.level(), RecommendationLevel::Normal);
        assert!((rec.water_liters() - 30.0).abs() < 1e-9);
        assert!(rec.reasons().iter().any(|r| r.starts_with("Base:")));
    }

    #[test]
    fn warm_weather_raises_amount() {
        let (clock, now) = clock_at(10, 30);
        let engine = evaluator(clock);
        let weather = clear_weather(now, 22.0, 5.0);
        let reading = fresh_reading(now, 25.0);

        let rec = engine
            .evaluate(&parcel(), &weather, Some(&reading), &[])
            .unwrap();

        // temp factor 1.1 at 22°C
        assert!((rec.water_liters() - 33.0).abs() < 1e-9);
    }

    #[test]
    fn critical_below_absolute_floor() {
        let (clock, now) = clock_at(10, 30);
        let engine = evaluator(clock);
        let weather = clear_weather(now, 22.0, 5.0);
        let reading = fresh_reading(now, 15.0);

        let rec = engine
            .evaluate(&parcel(), &weather, Some(&reading), &[])
            .unwrap();

        assert_eq!(rec.level(), RecommendationLevel::Critical);
        assert!(rec.water_liters() > 0.0);
        assert!(rec.reasons().iter().any(|r| r.contains("CRITICAL")));
    }

    #[test]
    fn elevated_when_need_exceeds_base_by_half() {
        let (clock, now) = clock_at(10, 30);
        let engine = evaluator(clock);
        // deficit 8 -> factor 1.8; ET0 6 -> 1.2; total 20*1.8*1.2 = 43.2 > 30
        let weather = clear_weather(now, 20.0, 6.0);
        let reading = fresh_reading(now, 22.0);

        let rec = engine
            .evaluate(&parcel(), &weather, Some(&reading), &[])
            .unwrap();

        assert_eq!(rec.level(), RecommendationLevel::Elevated);
    }

    #[test]
    fn in_range_moisture_skips() {
        let (clock, now) = clock_at(10, 30);
        let engine = evaluator(clock);
        let weather = clear_weather(now, 22.0, 5.0);
        let reading = fresh_reading(now, 45.0);

        let rec = engine
            .evaluate(&parcel(), &weather, Some(&reading), &[])
            .unwrap();

        assert_eq!(rec.level(), RecommendationLevel::None);
        assert_eq!(rec.water_liters(), 0.0);
        assert!(rec
            .reasons()
            .iter()
            .any(|r| r.contains("within optimal range")));
    }

    #[test]
    fn missing_reading_falls_back_to_half_base() {
        let (clock, now) = clock_at(10, 30);
        let engine = evaluator(clock);
        let weather = clear_weather(now, 22.0, 5.0);

        let rec = engine.evaluate(&parcel(), &weather, None, &[]).unwrap();

        assert_eq!(rec.level(), RecommendationLevel::Fallback);
        assert!((rec.water_liters() - 10.0).abs() < 1e-9);
        assert!(rec.reasons().iter().any(|r| r.contains("No sensor data")));
    }

    #[test]
    fn stale_reading_falls_back() {
        let (clock, now) = clock_at(10, 30);
        let engine = evaluator(clock);
        let weather = clear_weather(now, 22.0, 5.0);
        let reading = SensorReading::new(1, now - Duration::minutes(45), 25.0).unwrap();

        let rec = engine
            .evaluate(&parcel(), &weather, Some(&reading), &[])
            .unwrap();

        assert_eq!(rec.level(), RecommendationLevel::Fallback);
    }

    #[test]
    fn faulted_sensor_falls_back() {
        let (clock, now) = clock_at(10, 30);
        let engine = evaluator(clock);
        let weather = clear_weather(now, 22.0, 5.0);
        let reading = fresh_reading(now, 25.0).with_status(SensorStatus::Error);

        let rec = engine
            .evaluate(&parcel(), &weather, Some(&reading), &[])
            .unwrap();

        assert_eq!(rec.level(), RecommendationLevel::Fallback);
        assert!(rec.reasons().iter().any(|r| r.contains("fault")));
    }

    #[test]
    fn fallback_at_night_recommends_nothing() {
        let (clock, now) = clock_at(22, 0);
        let engine = evaluator(clock);
        let weather = clear_weather(now, 18.0, 3.0);

        let rec = engine.evaluate(&parcel(), &weather, None, &[]).unwrap();

        assert_eq!(rec.level(), RecommendationLevel::Fallback);
        assert_eq!(rec.water_liters(), 0.0);
    }

    #[test]
    fn fallback_with_rain_recommends_nothing() {
        let (clock, now) = clock_at(10, 30);
        let engine = evaluator(clock);
        let weather = WeatherSnapshot::new(now, 18.0, 6.0, 80.0, 70.0, 10.0, 3.0).unwrap();

        let rec = engine.evaluate(&parcel(), &weather, None, &[]).unwrap();

        assert_eq!(rec.level(), RecommendationLevel::Fallback);
        assert_eq!(rec.water_liters(), 0.0);
    }

    #[test]
    fn rain_skips_irrigation() {
        let (clock, now) = clock_at(10, 30);
        let engine = evaluator(clock);
        let weather = WeatherSnapshot::new(now, 22.0, 5.0, 40.0, 70.0, 10.0, 4.0).unwrap();
        let reading = fresh_reading(now, 25.0);

        let rec = engine
            .evaluate(&parcel(), &weather, Some(&reading), &[])
            .unwrap();

        assert_eq!(rec.level(), RecommendationLevel::None);
        assert!(rec.reasons().iter().any(|r| r.contains("Rain forecast")));
    }

    #[test]
    fn probable_light_rain_also_skips() {
        let (clock, now) = clock_at(10, 30);
        let engine = evaluator(clock);
        // 1mm below threshold, but 80% probability
        let weather = WeatherSnapshot::new(now, 22.0, 1.0, 80.0, 70.0, 10.0, 4.0).unwrap();
        let reading = fresh_reading(now, 25.0);

        let rec = engine
            .evaluate(&parcel(), &weather, Some(&reading), &[])
            .unwrap();

        assert_eq!(rec.level(), RecommendationLevel::None);
    }

    #[test]
    fn frost_skips_irrigation() {
        let (clock, now) = clock_at(10, 30);
        let engine = evaluator(clock);
        let weather = WeatherSnapshot::new(now, -2.0, 0.0, 10.0, 65.0, 5.0, 1.0).unwrap();
        let reading = fresh_reading(now, 25.0);

        let rec = engine
            .evaluate(&parcel(), &weather, Some(&reading), &[])
            .unwrap();

        assert_eq!(rec.level(), RecommendationLevel::None);
        assert!(rec.reasons().iter().any(|r| r.contains("Frost")));
    }

    #[test]
    fn strong_wind_skips_irrigation() {
        let (clock, now) = clock_at(10, 30);
        let engine = evaluator(clock);
        let weather = WeatherSnapshot::new(now, 22.0, 0.0, 10.0, 65.0, 55.0, 4.0).unwrap();
        let reading = fresh_reading(now, 25.0);

        let rec = engine
            .evaluate(&parcel(), &weather, Some(&reading), &[])
            .unwrap();

        assert_eq!(rec.level(), RecommendationLevel::None);
        assert!(rec.reasons().iter().any(|r| r.contains("Strong wind")));
    }

    #[test]
    fn outside_time_windows_skips() {
        let (clock, now) = clock_at(12, 0);
        let engine = evaluator(clock);
        let weather = clear_weather(now, 22.0, 5.0);
        let reading = fresh_reading(now, 25.0);
        let parcel = parcel().with_time_window(TimeWindow::new(
            NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        ));

        let rec = engine
            .evaluate(&parcel, &weather, Some(&reading), &[])
            .unwrap();

        assert_eq!(rec.level(), RecommendationLevel::None);
        assert!(rec
            .reasons()
            .iter()
            .any(|r| r.contains("outside allowed irrigation windows")));
    }

    #[test]
    fn daily_limit_blocks_further_irrigation() {
        let (clock, now) = clock_at(10, 30);
        let engine = evaluator(clock);
        let weather = clear_weather(now, 22.0, 5.0);
        let reading = fresh_reading(now, 25.0);
        // limit: 60 min x 10 L/min = 600L
        let events = vec![
            IrrigationEvent::new(1, now - Duration::hours(4), 400.0, IrrigationTrigger::Scheduled)
                .unwrap(),
            IrrigationEvent::new(1, now - Duration::hours(2), 200.0, IrrigationTrigger::Manual)
                .unwrap(),
        ];

        let rec = engine
            .evaluate(&parcel(), &weather, Some(&reading), &events)
            .unwrap();

        assert_eq!(rec.level(), RecommendationLevel::None);
        assert!(rec.reasons().iter().any(|r| r.contains("Daily limit")));
    }

    #[test]
    fn yesterdays_events_do_not_count() {
        let (clock, now) = clock_at(10, 30);
        let engine = evaluator(clock);
        let weather = clear_weather(now, 20.0, 5.0);
        let reading = fresh_reading(now, 25.0);
        let events = vec![IrrigationEvent::new(
            1,
            now - Duration::hours(20),
            900.0,
            IrrigationTrigger::Scheduled,
        )
        .unwrap()];

        let rec = engine
            .evaluate(&parcel(), &weather, Some(&reading), &events)
            .unwrap();

        assert_eq!(rec.level(), RecommendationLevel::Normal);
    }

    #[test]
    fn liters_per_minute_setting_changes_cutoff() {
        let (clock, now) = clock_at(10, 30);
        let settings = RuleSettings {
            liters_per_minute: 5.0,
            ..RuleSettings::default()
        };
        let engine = RuleEvaluator::new(settings, Box::new(clock));
        let weather = clear_weather(now, 22.0, 5.0);
        let reading = fresh_reading(now, 25.0);
        // 300L reaches the reduced limit of 60 min x 5 L/min
        let events = vec![IrrigationEvent::new(
            1,
            now - Duration::hours(3),
            300.0,
            IrrigationTrigger::Automatic,
        )
        .unwrap()];

        let rec = engine
            .evaluate(&parcel(), &weather, Some(&reading), &events)
            .unwrap();

        assert_eq!(rec.level(), RecommendationLevel::None);
    }

    #[test]
    fn old_weather_warns_but_continues() {
        let (clock, now) = clock_at(10, 30);
        let engine = evaluator(clock);
        let weather = clear_weather(now - Duration::hours(3), 20.0, 5.0);
        let reading = fresh_reading(now, 25.0);

        let rec = engine
            .evaluate(&parcel(), &weather, Some(&reading), &[])
            .unwrap();

        assert_eq!(rec.level(), RecommendationLevel::Normal);
        assert!(rec
            .reasons()
            .first()
            .is_some_and(|r| r.contains("older than 2 hours")));
    }

    #[test]
    fn reasons_accumulate_in_evaluation_order() {
        let (clock, now) = clock_at(10, 30);
        let engine = evaluator(clock);
        let weather = clear_weather(now - Duration::hours(3), 20.0, 5.0);
        let reading = fresh_reading(now, 25.0);

        let rec = engine
            .evaluate(&parcel(), &weather, Some(&reading), &[])
            .unwrap();

        let reasons = rec.reasons();
        assert!(reasons[0].contains("older than"));
        assert!(reasons[1].starts_with("Base:"));
        assert!(reasons[2].starts_with("Moisture factor:"));
        assert!(reasons[3].starts_with("Weather factor:"));
        assert!(reasons[4].starts_with("Soil factor:"));
        assert!(reasons[5].starts_with("Age factor:"));
    }
}
