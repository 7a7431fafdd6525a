use crate::config::LocationConfig;
use crate::error::{GroveOpsError, Result};
use crate::models::WeatherSnapshot;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::Deserialize;

const API_BASE_URL: &str = "https://api.open-meteo.com/v1";

pub struct OpenMeteoClient {
    client: reqwest::Client,
    location: LocationConfig,
}

// Open-Meteo API response structures

#[derive(Debug, Deserialize)]
struct OmResponse {
    current: Option<OmCurrent>,
    daily: Option<OmDaily>,
}

#[derive(Debug, Deserialize)]
struct OmCurrent {
    time: String,
    temperature_2m: f64,
    relative_humidity_2m: f64,
    wind_speed_10m: f64,
}

#[derive(Debug, Deserialize)]
struct OmDaily {
    time: Vec<String>,
    temperature_2m_max: Vec<f64>,
    relative_humidity_2m_mean: Vec<f64>,
    precipitation_sum: Vec<f64>,
    precipitation_probability_max: Vec<Option<f64>>,
    wind_speed_10m_max: Vec<f64>,
    et0_fao_evapotranspiration: Vec<f64>,
}

impl OpenMeteoClient {
    pub fn new(location: LocationConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            location,
        }
    }

    /// Current conditions merged with today's daily aggregates (ET0,
    /// precipitation sum, and probability only exist per day).
    pub async fn fetch_current(&self) -> Result<WeatherSnapshot> {
        let url = format!(
            "{}/forecast?latitude={}&longitude={}\
             &current=temperature_2m,relative_humidity_2m,precipitation,wind_speed_10m\
             &daily=temperature_2m_max,relative_humidity_2m_mean,precipitation_sum,\
             precipitation_probability_max,wind_speed_10m_max,et0_fao_evapotranspiration\
             &forecast_days=1&timezone=UTC",
            API_BASE_URL, self.location.latitude, self.location.longitude
        );

        let response = self.fetch(&url).await?;

        let current = response
            .current
            .ok_or_else(|| GroveOpsError::DataSourceUnavailable("Open-Meteo: no current block".into()))?;
        let daily = response
            .daily
            .ok_or_else(|| GroveOpsError::DataSourceUnavailable("Open-Meteo: no daily block".into()))?;

        let timestamp = parse_iso_minute(&current.time)
            .unwrap_or_else(|| Utc::now().naive_utc());

        WeatherSnapshot::new(
            Utc.from_utc_datetime(&timestamp),
            current.temperature_2m,
            daily.precipitation_sum.first().copied().unwrap_or(0.0),
            daily
                .precipitation_probability_max
                .first()
                .copied()
                .flatten()
                .unwrap_or(0.0),
            current.relative_humidity_2m,
            current.wind_speed_10m,
            daily
                .et0_fao_evapotranspiration
                .first()
                .copied()
                .unwrap_or(0.0),
        )
    }

    /// One snapshot per forecast day, stamped at local noon.
    pub async fn fetch_daily(&self, days: u32) -> Result<Vec<WeatherSnapshot>> {
        let url = format!(
            "{}/forecast?latitude={}&longitude={}\
             &daily=temperature_2m_max,relative_humidity_2m_mean,precipitation_sum,\
             precipitation_probability_max,wind_speed_10m_max,et0_fao_evapotranspiration\
             &forecast_days={}&timezone=UTC",
            API_BASE_URL, self.location.latitude, self.location.longitude, days
        );

        let response = self.fetch(&url).await?;
        let daily = response
            .daily
            .ok_or_else(|| GroveOpsError::DataSourceUnavailable("Open-Meteo: no daily block".into()))?;

        let mut snapshots = Vec::new();
        for (i, date_str) in daily.time.iter().enumerate() {
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
                .unwrap_or_else(|_| Utc::now().date_naive());
            let noon = date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN));

            let snapshot = WeatherSnapshot::new(
                Utc.from_utc_datetime(&noon),
                value_at(&daily.temperature_2m_max, i),
                value_at(&daily.precipitation_sum, i),
                daily
                    .precipitation_probability_max
                    .get(i)
                    .copied()
                    .flatten()
                    .unwrap_or(0.0),
                value_at(&daily.relative_humidity_2m_mean, i),
                value_at(&daily.wind_speed_10m_max, i),
                value_at(&daily.et0_fao_evapotranspiration, i),
            )?;
            snapshots.push(snapshot);
        }

        Ok(snapshots)
    }

    pub async fn test_connection(&self) -> Result<bool> {
        let url = format!(
            "{}/forecast?latitude={}&longitude={}&current=temperature_2m&timezone=UTC",
            API_BASE_URL, self.location.latitude, self.location.longitude
        );

        let response = self.client.get(&url).send().await?;
        Ok(response.status().is_success())
    }

    async fn fetch(&self, url: &str) -> Result<OmResponse> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GroveOpsError::DataSourceUnavailable(format!("Open-Meteo: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GroveOpsError::DataSourceUnavailable(format!(
                "Open-Meteo returned {}: {}",
                status, body
            )));
        }

        response.json().await.map_err(|e| {
            GroveOpsError::DataSourceUnavailable(format!(
                "Failed to parse Open-Meteo response: {}",
                e
            ))
        })
    }
}

fn value_at(values: &[f64], i: usize) -> f64 {
    values.get(i).copied().unwrap_or(0.0)
}

/// Open-Meteo emits minute-resolution ISO times without an offset.
fn parse_iso_minute(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minute_resolution_times() {
        let parsed = parse_iso_minute("2024-07-15T10:30").unwrap();
        assert_eq!(parsed.to_string(), "2024-07-15 10:30:00");
        assert!(parse_iso_minute("2024-07-15T10:30:45").is_some());
        assert!(parse_iso_minute("not-a-time").is_none());
    }

    #[test]
    fn daily_response_maps_to_snapshots() {
        let raw = r#"{
            "daily": {
                "time": ["2024-07-15", "2024-07-16"],
                "temperature_2m_max": [31.2, 28.4],
                "relative_humidity_2m_mean": [42.0, 55.0],
                "precipitation_sum": [0.0, 4.2],
                "precipitation_probability_max": [5.0, 80.0],
                "wind_speed_10m_max": [14.0, 22.0],
                "et0_fao_evapotranspiration": [6.1, 4.3]
            }
        }"#;
        let response: OmResponse = serde_json::from_str(raw).unwrap();
        let daily = response.daily.unwrap();
        assert_eq!(daily.time.len(), 2);
        assert_eq!(daily.precipitation_probability_max[1], Some(80.0));
    }
}
