use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "groveops", version, about = "Olive grove irrigation advisor")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to config.yaml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override SQLite data directory
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Re-run interactive setup
    Init,
    /// Validate config and test the weather datasource
    Check,
    /// Register a new parcel interactively
    AddParcel,
    /// List configured parcels
    Parcels,
    /// Store a soil-sensor reading for a parcel
    RecordReading {
        parcel_id: i64,
        /// Soil moisture in percent (0-100)
        moisture: f64,
        #[arg(long)]
        temperature: Option<f64>,
        /// Electrical conductivity in µS/cm
        #[arg(long)]
        ec: Option<f64>,
        #[arg(long)]
        ph: Option<f64>,
        /// Battery level in percent
        #[arg(long)]
        battery: Option<i32>,
        /// Signal strength in percent
        #[arg(long)]
        signal: Option<i32>,
        /// Sensor status (online, offline, error, ...)
        #[arg(long, default_value = "online")]
        status: String,
        #[arg(long)]
        sensor_id: Option<String>,
    },
    /// Record an irrigation event
    LogEvent {
        parcel_id: i64,
        /// Water applied in liters
        liters: f64,
        #[arg(long, default_value = "manual")]
        trigger: String,
        /// Duration in minutes; the event is recorded as just finished
        #[arg(long)]
        minutes: Option<i64>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Compute irrigation recommendations from live weather
    Evaluate {
        /// Single parcel id; all parcels when omitted
        #[arg(long)]
        parcel: Option<i64>,
        /// Replay the decision as if made at this RFC3339 instant
        #[arg(long)]
        at: Option<String>,
    },
    /// Change a parcel's status (idle, irrigating, error, locked)
    SetStatus { parcel_id: i64, status: String },
    /// Score allowed watering windows against the forecast
    Window { parcel_id: i64 },
    /// Build a 7-day watering plan from the forecast
    Plan { parcel_id: i64 },
    /// Summarize historical water use and moisture
    History {
        parcel_id: i64,
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
}
