use crate::db::Database;
use crate::error::Result;

const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    CREATE TABLE IF NOT EXISTS parcels (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        variety TEXT NOT NULL,
        soil_type TEXT NOT NULL,
        age_years INTEGER NOT NULL,
        organic_certified INTEGER NOT NULL DEFAULT 0,
        base_water_need_liters REAL NOT NULL,
        moisture_lower REAL NOT NULL,
        moisture_upper REAL NOT NULL,
        time_windows TEXT NOT NULL DEFAULT '[]',
        max_daily_duration_minutes INTEGER NOT NULL DEFAULT 60,
        status TEXT NOT NULL DEFAULT 'Idle',
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS sensor_readings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        parcel_id INTEGER NOT NULL REFERENCES parcels(id) ON DELETE CASCADE,
        timestamp TEXT NOT NULL,
        moisture_percent REAL NOT NULL,
        temperature_celsius REAL,
        ec_value REAL,
        ph_value REAL,
        battery_level INTEGER,
        signal_strength INTEGER,
        status TEXT NOT NULL,
        sensor_id TEXT,
        data_quality_score INTEGER,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS irrigation_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        parcel_id INTEGER NOT NULL REFERENCES parcels(id) ON DELETE CASCADE,
        start_time TEXT NOT NULL,
        end_time TEXT,
        water_liters REAL NOT NULL,
        trigger_type TEXT NOT NULL,
        note TEXT
    );

    CREATE TABLE IF NOT EXISTS schema_migrations (
        version INTEGER PRIMARY KEY,
        applied_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    "#,
    // Migration 2: Add indexes
    r#"
    CREATE INDEX IF NOT EXISTS idx_sensor_readings_parcel_time
        ON sensor_readings(parcel_id, timestamp);
    CREATE INDEX IF NOT EXISTS idx_irrigation_events_parcel_start
        ON irrigation_events(parcel_id, start_time);
    "#,
];

pub fn run(db: &Database) -> Result<()> {
    db.with_conn_mut(|conn| {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            let version = (i + 1) as i32;
            if version > current_version {
                tracing::info!("Applying migration {}", version);
                conn.execute_batch(migration)?;
                conn.execute(
                    "INSERT INTO schema_migrations (version) VALUES (?1)",
                    [version],
                )?;
            }
        }

        Ok(())
    })
}
