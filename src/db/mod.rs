pub mod connection;
pub mod migrations;
pub mod queries;

pub use connection::Database;

use crate::error::Result;
use crate::models::{IrrigationEvent, ParcelConfig, SensorReading};
use chrono::{DateTime, Utc};

/// Supplies parcel configuration snapshots by identifier.
pub trait ParcelStore {
    fn all_parcels(&self) -> Result<Vec<ParcelConfig>>;
    fn parcel_by_id(&self, id: i64) -> Result<Option<ParcelConfig>>;
}

/// Supplies sensor readings for a parcel. `readings_since` returns
/// newest-first.
pub trait SensorStore {
    fn latest_reading(&self, parcel_id: i64) -> Result<Option<SensorReading>>;
    fn readings_since(
        &self,
        parcel_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<SensorReading>>;
    fn average_moisture_since(
        &self,
        parcel_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Option<f64>>;
}

/// Supplies past irrigation events filtered by parcel and start time.
pub trait EventStore {
    fn events_since(
        &self,
        parcel_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<IrrigationEvent>>;
}
