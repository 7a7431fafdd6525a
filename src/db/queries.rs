use crate::db::{Database, EventStore, ParcelStore, SensorStore};
use crate::error::{GroveOpsError, Result};
use crate::models::{
    IrrigationEvent, IrrigationTrigger, MoistureRange, ParcelConfig, ParcelStatus, SensorReading,
    SensorStatus, SoilType, TimeWindow, TreeProfile,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use tracing::warn;

// Parcel queries

impl Database {
    pub fn create_parcel(&self, parcel: &ParcelConfig) -> Result<i64> {
        let windows = serde_json::to_string(&parcel.allowed_time_windows)?;
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO parcels
                    (name, variety, soil_type, age_years, organic_certified,
                     base_water_need_liters, moisture_lower, moisture_upper,
                     time_windows, max_daily_duration_minutes, status)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    parcel.name,
                    parcel.profile.variety,
                    format!("{:?}", parcel.profile.soil_type),
                    parcel.profile.age_years,
                    parcel.profile.organic_certified,
                    parcel.profile.base_water_need_liters,
                    parcel.target_moisture_range.lower(),
                    parcel.target_moisture_range.upper(),
                    windows,
                    parcel.max_daily_duration_minutes,
                    format!("{:?}", parcel.status),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn update_parcel_status(&self, parcel_id: i64, status: ParcelStatus) -> Result<()> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE parcels SET status = ?1 WHERE id = ?2",
                params![format!("{:?}", status), parcel_id],
            )?;
            if updated == 0 {
                return Err(GroveOpsError::NotFound(format!("parcel {}", parcel_id)));
            }
            Ok(())
        })
    }
}

impl ParcelStore for Database {
    fn all_parcels(&self) -> Result<Vec<ParcelConfig>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM parcels ORDER BY id")?;
            let parcels = stmt
                .query_map([], row_to_parcel)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(parcels)
        })
    }

    fn parcel_by_id(&self, id: i64) -> Result<Option<ParcelConfig>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT * FROM parcels WHERE id = ?1", [id], row_to_parcel)
                .optional()
                .map_err(Into::into)
        })
    }
}

fn row_to_parcel(row: &Row) -> rusqlite::Result<ParcelConfig> {
    let soil_type_str: String = row.get("soil_type")?;
    let status_str: String = row.get("status")?;
    let windows_json: String = row.get("time_windows")?;

    let soil_type = SoilType::from_str(&soil_type_str).unwrap_or_else(|| {
        warn!(soil_type = %soil_type_str, "Unknown soil_type in database, defaulting to Loamy");
        SoilType::Loamy
    });

    let allowed_time_windows: Vec<TimeWindow> =
        serde_json::from_str(&windows_json).unwrap_or_else(|e| {
            warn!(error = %e, "Unreadable time_windows in database, treating as unrestricted");
            Vec::new()
        });

    let target_moisture_range =
        MoistureRange::new(row.get("moisture_lower")?, row.get("moisture_upper")?).map_err(
            |e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Real,
                    Box::new(e),
                )
            },
        )?;

    Ok(ParcelConfig {
        id: Some(row.get("id")?),
        name: row.get("name")?,
        profile: TreeProfile {
            variety: row.get("variety")?,
            soil_type,
            age_years: row.get("age_years")?,
            organic_certified: row.get("organic_certified")?,
            base_water_need_liters: row.get("base_water_need_liters")?,
        },
        target_moisture_range,
        allowed_time_windows,
        max_daily_duration_minutes: row.get("max_daily_duration_minutes")?,
        status: ParcelStatus::from_str(&status_str),
    })
}

// Sensor reading queries

impl Database {
    /// Persists a reading, recording its quality score as of `now`.
    pub fn insert_reading(&self, reading: &SensorReading, now: DateTime<Utc>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO sensor_readings
                    (parcel_id, timestamp, moisture_percent, temperature_celsius,
                     ec_value, ph_value, battery_level, signal_strength, status,
                     sensor_id, data_quality_score)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    reading.parcel_id,
                    reading.timestamp.to_rfc3339(),
                    reading.moisture_percent,
                    reading.temperature_celsius,
                    reading.ec_value,
                    reading.ph_value,
                    reading.battery_level,
                    reading.signal_strength,
                    format!("{:?}", reading.status),
                    reading.sensor_id,
                    reading.data_quality_score(now),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }
}

impl SensorStore for Database {
    fn latest_reading(&self, parcel_id: i64) -> Result<Option<SensorReading>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM sensor_readings WHERE parcel_id = ?1
                 ORDER BY timestamp DESC LIMIT 1",
                [parcel_id],
                row_to_reading,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    fn readings_since(
        &self,
        parcel_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<SensorReading>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM sensor_readings WHERE parcel_id = ?1 AND timestamp >= ?2
                 ORDER BY timestamp DESC",
            )?;
            let readings = stmt
                .query_map(params![parcel_id, since.to_rfc3339()], row_to_reading)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(readings)
        })
    }

    fn average_moisture_since(
        &self,
        parcel_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Option<f64>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT AVG(moisture_percent) FROM sensor_readings
                 WHERE parcel_id = ?1 AND timestamp >= ?2",
                params![parcel_id, since.to_rfc3339()],
                |row| row.get::<_, Option<f64>>(0),
            )
            .map_err(Into::into)
        })
    }
}

fn row_to_reading(row: &Row) -> rusqlite::Result<SensorReading> {
    let timestamp_str: String = row.get("timestamp")?;
    let status_str: String = row.get("status")?;

    Ok(SensorReading {
        id: Some(row.get("id")?),
        parcel_id: row.get("parcel_id")?,
        timestamp: parse_timestamp(&timestamp_str),
        moisture_percent: row.get("moisture_percent")?,
        temperature_celsius: row.get("temperature_celsius")?,
        ec_value: row.get("ec_value")?,
        ph_value: row.get("ph_value")?,
        battery_level: row.get("battery_level")?,
        signal_strength: row.get("signal_strength")?,
        status: SensorStatus::from_str(&status_str),
        sensor_id: row.get("sensor_id")?,
    })
}

// Irrigation event queries

impl Database {
    pub fn insert_event(&self, event: &IrrigationEvent) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO irrigation_events
                    (parcel_id, start_time, end_time, water_liters, trigger_type, note)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    event.parcel_id,
                    event.start_time.to_rfc3339(),
                    event.end_time.map(|t| t.to_rfc3339()),
                    event.water_liters,
                    format!("{:?}", event.trigger),
                    event.note,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn complete_event(
        &self,
        event_id: i64,
        end_time: DateTime<Utc>,
        note: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE irrigation_events
                 SET end_time = ?1, note = COALESCE(?2, note)
                 WHERE id = ?3",
                params![end_time.to_rfc3339(), note, event_id],
            )?;
            if updated == 0 {
                return Err(GroveOpsError::NotFound(format!("event {}", event_id)));
            }
            Ok(())
        })
    }
}

impl EventStore for Database {
    fn events_since(
        &self,
        parcel_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<IrrigationEvent>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM irrigation_events WHERE parcel_id = ?1 AND start_time >= ?2
                 ORDER BY start_time DESC",
            )?;
            let events = stmt
                .query_map(params![parcel_id, since.to_rfc3339()], row_to_event)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(events)
        })
    }
}

fn row_to_event(row: &Row) -> rusqlite::Result<IrrigationEvent> {
    let start_str: String = row.get("start_time")?;
    let end_str: Option<String> = row.get("end_time")?;
    let trigger_str: String = row.get("trigger_type")?;

    let trigger = IrrigationTrigger::from_str(&trigger_str).unwrap_or_else(|| {
        warn!(trigger = %trigger_str, "Unknown trigger_type in database, defaulting to Manual");
        IrrigationTrigger::Manual
    });

    Ok(IrrigationEvent {
        id: Some(row.get("id")?),
        parcel_id: row.get("parcel_id")?,
        start_time: parse_timestamp(&start_str),
        end_time: end_str.as_deref().map(parse_timestamp),
        water_liters: row.get("water_liters")?,
        trigger,
        note: row.get("note")?,
    })
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            warn!(timestamp = %s, "Unparseable timestamp in database, substituting now");
            Utc::now()
        })
}

trait OptionalExt<T> {
    fn optional(self) -> rusqlite::Result<Option<T>>;
}

impl<T> OptionalExt<T> for rusqlite::Result<T> {
    fn optional(self) -> rusqlite::Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveTime, TimeZone};

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn sample_parcel() -> ParcelConfig {
        let profile = TreeProfile::new("Picual", SoilType::Calcareous, 25, true, 18.0).unwrap();
        let range = MoistureRange::new(30.0, 60.0).unwrap();
        ParcelConfig::create("Terrace A", profile, range)
            .unwrap()
            .with_time_window(TimeWindow::new(
                NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            ))
            .with_max_daily_duration(90)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 15, 10, 30, 0).unwrap()
    }

    #[test]
    fn parcel_round_trip() {
        let db = db();
        let id = db.create_parcel(&sample_parcel()).unwrap();

        let loaded = db.parcel_by_id(id).unwrap().unwrap();
        assert_eq!(loaded.name, "Terrace A");
        assert_eq!(loaded.profile.variety, "Picual");
        assert_eq!(loaded.profile.soil_type, SoilType::Calcareous);
        assert_eq!(loaded.profile.age_years, 25);
        assert!(loaded.profile.organic_certified);
        assert_eq!(loaded.target_moisture_range.lower(), 30.0);
        assert_eq!(loaded.allowed_time_windows.len(), 1);
        assert_eq!(loaded.max_daily_duration_minutes, 90);
        assert_eq!(loaded.status, ParcelStatus::Idle);
    }

    #[test]
    fn missing_parcel_is_none() {
        assert!(db().parcel_by_id(42).unwrap().is_none());
    }

    #[test]
    fn all_parcels_ordered_by_id() {
        let db = db();
        let mut second = sample_parcel();
        second.name = "Terrace B".into();
        let first_id = db.create_parcel(&sample_parcel()).unwrap();
        let second_id = db.create_parcel(&second).unwrap();

        let all = db.all_parcels().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, Some(first_id));
        assert_eq!(all[1].id, Some(second_id));
    }

    #[test]
    fn status_update_persists() {
        let db = db();
        let id = db.create_parcel(&sample_parcel()).unwrap();
        db.update_parcel_status(id, ParcelStatus::Irrigating).unwrap();
        let loaded = db.parcel_by_id(id).unwrap().unwrap();
        assert_eq!(loaded.status, ParcelStatus::Irrigating);
    }

    #[test]
    fn status_update_on_unknown_parcel_fails() {
        assert!(matches!(
            db().update_parcel_status(7, ParcelStatus::Locked),
            Err(GroveOpsError::NotFound(_))
        ));
    }

    #[test]
    fn latest_reading_wins_by_timestamp() {
        let db = db();
        let parcel_id = db.create_parcel(&sample_parcel()).unwrap();

        for (minutes_ago, moisture) in [(60, 40.0), (5, 33.0), (30, 36.0)] {
            let reading = SensorReading::new(
                parcel_id,
                now() - Duration::minutes(minutes_ago),
                moisture,
            )
            .unwrap();
            db.insert_reading(&reading, now()).unwrap();
        }

        let latest = db.latest_reading(parcel_id).unwrap().unwrap();
        assert_eq!(latest.moisture_percent, 33.0);
    }

    #[test]
    fn readings_since_filters_and_sorts_descending() {
        let db = db();
        let parcel_id = db.create_parcel(&sample_parcel()).unwrap();

        for minutes_ago in [10, 300, 100] {
            let reading = SensorReading::new(
                parcel_id,
                now() - Duration::minutes(minutes_ago),
                50.0,
            )
            .unwrap();
            db.insert_reading(&reading, now()).unwrap();
        }

        let since = now() - Duration::minutes(120);
        let readings = db.readings_since(parcel_id, since).unwrap();
        assert_eq!(readings.len(), 2);
        assert!(readings[0].timestamp > readings[1].timestamp);
    }

    #[test]
    fn average_moisture_empty_is_none() {
        let db = db();
        let parcel_id = db.create_parcel(&sample_parcel()).unwrap();
        assert!(db
            .average_moisture_since(parcel_id, now())
            .unwrap()
            .is_none());
    }

    #[test]
    fn average_moisture_since_averages() {
        let db = db();
        let parcel_id = db.create_parcel(&sample_parcel()).unwrap();
        for (minutes_ago, moisture) in [(10, 30.0), (20, 50.0)] {
            let reading = SensorReading::new(
                parcel_id,
                now() - Duration::minutes(minutes_ago),
                moisture,
            )
            .unwrap();
            db.insert_reading(&reading, now()).unwrap();
        }

        let avg = db
            .average_moisture_since(parcel_id, now() - Duration::hours(1))
            .unwrap()
            .unwrap();
        assert!((avg - 40.0).abs() < 1e-9);
    }

    #[test]
    fn event_round_trip_and_completion() {
        let db = db();
        let parcel_id = db.create_parcel(&sample_parcel()).unwrap();
        let event = IrrigationEvent::new(
            parcel_id,
            now() - Duration::hours(1),
            120.0,
            IrrigationTrigger::Scheduled,
        )
        .unwrap();
        let event_id = db.insert_event(&event).unwrap();

        db.complete_event(event_id, now(), Some("finished normally"))
            .unwrap();

        let events = db
            .events_since(parcel_id, now() - Duration::hours(2))
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].trigger, IrrigationTrigger::Scheduled);
        assert_eq!(events[0].duration_minutes(), Some(60));
        assert_eq!(events[0].note.as_deref(), Some("finished normally"));
    }

    #[test]
    fn events_since_respects_start_bound() {
        let db = db();
        let parcel_id = db.create_parcel(&sample_parcel()).unwrap();
        for hours_ago in [1, 30] {
            let event = IrrigationEvent::new(
                parcel_id,
                now() - Duration::hours(hours_ago),
                50.0,
                IrrigationTrigger::Automatic,
            )
            .unwrap();
            db.insert_event(&event).unwrap();
        }

        let today = db
            .events_since(parcel_id, now() - Duration::hours(12))
            .unwrap();
        assert_eq!(today.len(), 1);
    }
}
