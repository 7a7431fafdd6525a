use crate::db::{EventStore, ParcelStore, SensorStore};
use crate::error::{GroveOpsError, Result};
use crate::logic::engine::RuleEvaluator;
use crate::models::{
    ParcelConfig, Recommendation, RecommendationLevel, TimeWindow, WeatherSnapshot,
};
use chrono::{Duration, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum score for a time window to be considered good on its own.
const WINDOW_SCORE_CUTOFF: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimalWateringTime {
    pub parcel_id: i64,
    pub window: TimeWindow,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyPlan {
    pub date: NaiveDate,
    pub recommended_liters: f64,
    pub action: String,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyPlan {
    pub parcel_id: i64,
    pub generated_on: NaiveDate,
    pub days: Vec<DailyPlan>,
    pub total_liters: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalAnalysis {
    pub parcel_id: i64,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub average_moisture: f64,
    pub total_water_liters: f64,
    pub reading_count: usize,
    pub event_count: usize,
}

impl HistoricalAnalysis {
    /// Average moisture achieved per liter applied per event. Zero when
    /// nothing was watered in the period.
    pub fn water_efficiency(&self) -> f64 {
        if self.event_count == 0 {
            return 0.0;
        }
        self.average_moisture / (self.total_water_liters / self.event_count as f64)
    }
}

/// Applies the rule evaluator across parcels and time: batch
/// recommendations, watering-window scoring, the 7-day plan, and
/// historical summaries. Holds no state between calls beyond its store
/// handles.
pub struct RecommendationPlanner<'a> {
    evaluator: RuleEvaluator,
    parcels: &'a dyn ParcelStore,
    sensors: &'a dyn SensorStore,
    events: &'a dyn EventStore,
}

impl<'a> RecommendationPlanner<'a> {
    pub fn new(
        evaluator: RuleEvaluator,
        parcels: &'a dyn ParcelStore,
        sensors: &'a dyn SensorStore,
        events: &'a dyn EventStore,
    ) -> Self {
        Self {
            evaluator,
            parcels,
            sensors,
            events,
        }
    }

    /// One recommendation per parcel, keyed by parcel id. A failure on
    /// one parcel becomes a fallback entry carrying the error text and
    /// never aborts the batch.
    pub fn recommend_all(
        &self,
        weather: &WeatherSnapshot,
    ) -> Result<BTreeMap<i64, Recommendation>> {
        let mut recommendations = BTreeMap::new();

        for parcel in self.parcels.all_parcels()? {
            let Some(id) = parcel.id else {
                tracing::warn!(parcel = %parcel.name, "skipping parcel without id");
                continue;
            };
            let recommendation = match self.recommend(id, weather) {
                Ok(rec) => rec,
                Err(e) => self.error_recommendation(&e)?,
            };
            recommendations.insert(id, recommendation);
        }

        Ok(recommendations)
    }

    /// Recommendation for a single parcel. An unknown id is a caller
    /// bug and surfaces as `NotFound`; an evaluation failure degrades to
    /// a fallback recommendation.
    pub fn recommend(&self, parcel_id: i64, weather: &WeatherSnapshot) -> Result<Recommendation> {
        let parcel = self.require_parcel(parcel_id)?;

        let latest_reading = self.sensors.latest_reading(parcel_id)?;
        let today_events = self
            .events
            .events_since(parcel_id, self.evaluator.clock().start_of_day())?;

        match self.evaluator.evaluate(
            &parcel,
            weather,
            latest_reading.as_ref(),
            &today_events,
        ) {
            Ok(rec) => Ok(rec),
            Err(e) => self.error_recommendation(&e),
        }
    }

    /// Scores each allowed window (or a default morning window) against
    /// the forecast and returns the first one above the cutoff; ties and
    /// all-poor scores fall back to the first window in declaration
    /// order.
    pub fn optimal_window(
        &self,
        parcel_id: i64,
        forecast: &WeatherSnapshot,
    ) -> Result<OptimalWateringTime> {
        let parcel = self.require_parcel(parcel_id)?;

        let windows = if parcel.allowed_time_windows.is_empty() {
            vec![default_morning_window()]
        } else {
            parcel.allowed_time_windows.clone()
        };

        let best = windows
            .iter()
            .find(|w| self.window_score(w, forecast) > WINDOW_SCORE_CUTOFF)
            .copied()
            .unwrap_or(windows[0]);

        Ok(OptimalWateringTime {
            parcel_id,
            window: best,
            reasoning: "Optimal: low evaporation, no rain expected".to_string(),
        })
    }

    /// Simplified forward plan: no future moisture reading exists, so
    /// each day is base need x weather factor only. At most 7 days.
    pub fn weekly_plan(
        &self,
        parcel_id: i64,
        daily_forecasts: &[WeatherSnapshot],
    ) -> Result<WeeklyPlan> {
        let parcel = self.require_parcel(parcel_id)?;
        let start = self.evaluator.clock().now().date_naive();

        let mut days = Vec::new();
        for (i, weather) in daily_forecasts.iter().take(7).enumerate() {
            let date = start + Duration::days(i as i64);
            let recommended_liters =
                parcel.profile.base_water_need_liters * weather.water_need_factor();
            let action = if recommended_liters > 0.0 {
                "Irrigation recommended"
            } else {
                "No irrigation"
            };
            days.push(DailyPlan {
                date,
                recommended_liters,
                action: action.to_string(),
                reasoning: daily_reasoning(weather),
            });
        }

        let total_liters = days.iter().map(|d| d.recommended_liters).sum();

        Ok(WeeklyPlan {
            parcel_id,
            generated_on: start,
            days,
            total_liters,
        })
    }

    pub fn historical_analysis(
        &self,
        parcel_id: i64,
        days_back: i64,
    ) -> Result<HistoricalAnalysis> {
        self.require_parcel(parcel_id)?;

        let now = self.evaluator.clock().now();
        let since = now - Duration::days(days_back);

        let readings = self.sensors.readings_since(parcel_id, since)?;
        let events = self.events.events_since(parcel_id, since)?;
        let average_moisture = self
            .sensors
            .average_moisture_since(parcel_id, since)?
            .unwrap_or(0.0);
        let total_water_liters = events.iter().map(|e| e.water_liters).sum();

        Ok(HistoricalAnalysis {
            parcel_id,
            period_start: since.date_naive(),
            period_end: now.date_naive(),
            average_moisture,
            total_water_liters,
            reading_count: readings.len(),
            event_count: events.len(),
        })
    }

    pub fn average_moisture_24h(&self, parcel_id: i64) -> Result<Option<f64>> {
        let since = self.evaluator.clock().now() - Duration::hours(24);
        self.sensors.average_moisture_since(parcel_id, since)
    }

    /// Moisture change over the window: newest minus oldest reading.
    /// Zero when fewer than two readings exist.
    pub fn moisture_trend(&self, parcel_id: i64, hours: i64) -> Result<f64> {
        let since = self.evaluator.clock().now() - Duration::hours(hours);
        let readings = self.sensors.readings_since(parcel_id, since)?;

        if readings.len() < 2 {
            return Ok(0.0);
        }

        let newest = readings[0].moisture_percent;
        let oldest = readings[readings.len() - 1].moisture_percent;
        Ok(newest - oldest)
    }

    fn require_parcel(&self, parcel_id: i64) -> Result<ParcelConfig> {
        self.parcels
            .parcel_by_id(parcel_id)?
            .ok_or_else(|| GroveOpsError::NotFound(format!("parcel {}", parcel_id)))
    }

    fn window_score(&self, window: &TimeWindow, forecast: &WeatherSnapshot) -> f64 {
        let mut score = 0.0;

        // Early morning watering minimizes evaporation loss
        if window.start().hour() >= 6 && window.end().hour() <= 9 {
            score += 0.3;
        }

        if !forecast.is_rain_expected(self.evaluator.settings().rain_threshold_mm) {
            score += 0.4;
        }

        if (15.0..=25.0).contains(&forecast.temperature_celsius) {
            score += 0.3;
        }

        score
    }

    fn error_recommendation(&self, error: &GroveOpsError) -> Result<Recommendation> {
        Recommendation::new(
            self.evaluator.clock().now(),
            0.0,
            RecommendationLevel::Fallback,
            vec![format!("Error: {}", error)],
        )
    }
}

fn default_morning_window() -> TimeWindow {
    TimeWindow::new(
        NaiveTime::from_hms_opt(6, 0, 0).unwrap_or(NaiveTime::MIN),
        NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
    )
}

fn daily_reasoning(weather: &WeatherSnapshot) -> String {
    let mut reasons: Vec<String> = Vec::new();

    if weather.is_rain_expected(5.0) {
        reasons.push("Heavy rain expected".to_string());
    } else if weather.precipitation_mm_24h > 0.0 {
        reasons.push("Light rain expected".to_string());
    }

    if weather.temperature_celsius > 30.0 {
        reasons.push("High temperatures increase water need".to_string());
    }

    if weather.evapotranspiration_mm > 6.0 {
        reasons.push(format!(
            "High evaporation (ET0={:.1}mm)",
            weather.evapotranspiration_mm
        ));
    }

    if reasons.is_empty() {
        "Optimal conditions".to_string()
    } else {
        reasons.join(", ")
    }
}
