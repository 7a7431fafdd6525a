mod cli;
mod config;
mod datasources;
mod db;
mod error;
mod logic;
mod models;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use datasources::OpenMeteoClient;
use db::{Database, ParcelStore, SensorStore};
use dialoguer::{Confirm, Input};
use error::{GroveOpsError, Result};
use logic::{Clock, FixedClock, RecommendationPlanner, RuleEvaluator, SystemClock};
use models::{
    IrrigationEvent, IrrigationTrigger, MoistureCategory, MoistureRange, ParcelConfig,
    ParcelStatus, Recommendation, SensorReading, SensorStatus, SoilType, TimeWindow, TreeProfile,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(mut cli: Cli) -> Result<()> {
    let command = cli.command.take();
    match command {
        Some(Commands::Init) => {
            Config::setup_interactive()?;
            Ok(())
        }
        Some(Commands::Check) => check(&cli).await,
        Some(Commands::AddParcel) => add_parcel(&open_db(&cli)?),
        Some(Commands::Parcels) | None => list_parcels(&open_db(&cli)?),
        Some(Commands::RecordReading {
            parcel_id,
            moisture,
            temperature,
            ec,
            ph,
            battery,
            signal,
            status,
            sensor_id,
        }) => record_reading(
            &open_db(&cli)?,
            parcel_id,
            moisture,
            temperature,
            ec,
            ph,
            battery,
            signal,
            &status,
            sensor_id.as_deref(),
        ),
        Some(Commands::LogEvent {
            parcel_id,
            liters,
            trigger,
            minutes,
            note,
        }) => log_event(&open_db(&cli)?, parcel_id, liters, &trigger, minutes, note.as_deref()),
        Some(Commands::Evaluate { parcel, at }) => evaluate(&cli, parcel, at.as_deref()).await,
        Some(Commands::SetStatus { parcel_id, status }) => {
            set_status(&open_db(&cli)?, parcel_id, &status)
        }
        Some(Commands::Window { parcel_id }) => window(&cli, parcel_id).await,
        Some(Commands::Plan { parcel_id }) => plan(&cli, parcel_id).await,
        Some(Commands::History { parcel_id, days }) => history(&cli, parcel_id, days),
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    Config::load(cli.config.clone())
}

fn open_db(cli: &Cli) -> Result<Database> {
    let path = Config::db_path(cli.data_dir.as_ref())?;
    Database::open(&path)
}

async fn check(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    println!("Config OK ({})", config.grove.name);

    let db = open_db(cli)?;
    let parcel_count = db.all_parcels()?.len();
    println!("Database OK ({} parcels at {})", parcel_count, db.path().display());

    let client = OpenMeteoClient::new(config.location);
    match client.test_connection().await {
        Ok(true) => println!("Open-Meteo OK"),
        Ok(false) => println!("Open-Meteo UNREACHABLE"),
        Err(e) => println!("Open-Meteo FAILED: {}", e),
    }

    Ok(())
}

fn add_parcel(db: &Database) -> Result<()> {
    let prompt_err = |e| GroveOpsError::Config(format!("Input error: {}", e));

    let name: String = Input::new()
        .with_prompt("Parcel name")
        .interact_text()
        .map_err(prompt_err)?;

    let variety: String = Input::new()
        .with_prompt("Olive variety")
        .default("Picual".into())
        .interact_text()
        .map_err(prompt_err)?;

    let soil_options = SoilType::all()
        .iter()
        .map(|s| s.as_str().to_lowercase())
        .collect::<Vec<_>>()
        .join(", ");
    let soil_input: String = Input::new()
        .with_prompt(format!("Soil type ({})", soil_options))
        .default("loamy".into())
        .interact_text()
        .map_err(prompt_err)?;
    let soil_type = SoilType::from_str(&soil_input)
        .ok_or_else(|| GroveOpsError::InvalidData(format!("unknown soil type '{}'", soil_input)))?;

    let age_years: u32 = Input::new()
        .with_prompt("Tree age in years")
        .default(15)
        .interact_text()
        .map_err(prompt_err)?;

    let organic = Confirm::new()
        .with_prompt("Organic certified?")
        .default(false)
        .interact()
        .map_err(|e| GroveOpsError::Config(format!("Input error: {}", e)))?;

    let base_need: f64 = Input::new()
        .with_prompt("Base water need (L/day per tree)")
        .default(20.0)
        .interact_text()
        .map_err(prompt_err)?;

    let lower: f64 = Input::new()
        .with_prompt("Target moisture lower bound (%)")
        .default(30.0)
        .interact_text()
        .map_err(prompt_err)?;

    let upper: f64 = Input::new()
        .with_prompt("Target moisture upper bound (%)")
        .default(60.0)
        .interact_text()
        .map_err(prompt_err)?;

    let max_minutes: i64 = Input::new()
        .with_prompt("Max daily irrigation duration (minutes)")
        .default(60)
        .interact_text()
        .map_err(prompt_err)?;

    let windows_input: String = Input::new()
        .with_prompt("Allowed windows (HH:MM-HH:MM, comma separated, empty = unrestricted)")
        .default(String::new())
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;

    let profile = TreeProfile::new(&variety, soil_type, age_years, organic, base_need)?;
    let range = MoistureRange::new(lower, upper)?;
    let mut parcel = ParcelConfig::create(&name, profile, range)?.with_max_daily_duration(max_minutes);

    for raw in windows_input.split(',').filter(|s| !s.trim().is_empty()) {
        parcel = parcel.with_time_window(parse_window(raw.trim())?);
    }

    let id = db.create_parcel(&parcel)?;
    println!("Created parcel {} ({})", id, parcel.name);
    Ok(())
}

fn parse_window(raw: &str) -> Result<TimeWindow> {
    let (start, end) = raw
        .split_once('-')
        .ok_or_else(|| GroveOpsError::InvalidData(format!("window '{}' is not HH:MM-HH:MM", raw)))?;
    let parse = |s: &str| {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map_err(|_| GroveOpsError::InvalidData(format!("'{}' is not a HH:MM time", s.trim())))
    };
    Ok(TimeWindow::new(parse(start)?, parse(end)?))
}

fn list_parcels(db: &Database) -> Result<()> {
    let parcels = db.all_parcels()?;
    if parcels.is_empty() {
        println!("No parcels configured. Run `groveops add-parcel`.");
        return Ok(());
    }

    for parcel in parcels {
        let windows = if parcel.allowed_time_windows.is_empty() {
            "unrestricted".to_string()
        } else {
            parcel
                .allowed_time_windows
                .iter()
                .map(|w| {
                    if w.is_overnight() {
                        format!("{} (overnight)", w)
                    } else {
                        w.to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!(
            "[{}] {} - {} on {} soil, {}y, base {:.1}L/day, target {}, windows {}, max {}min/day ({})",
            parcel.id.unwrap_or(0),
            parcel.name,
            parcel.profile.variety,
            parcel.profile.soil_type,
            parcel.profile.age_years,
            parcel.profile.base_water_need_liters,
            parcel.target_moisture_range,
            windows,
            parcel.max_daily_duration_minutes,
            parcel.status,
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn record_reading(
    db: &Database,
    parcel_id: i64,
    moisture: f64,
    temperature: Option<f64>,
    ec: Option<f64>,
    ph: Option<f64>,
    battery: Option<i32>,
    signal: Option<i32>,
    status: &str,
    sensor_id: Option<&str>,
) -> Result<()> {
    if db.parcel_by_id(parcel_id)?.is_none() {
        return Err(GroveOpsError::NotFound(format!("parcel {}", parcel_id)));
    }

    let now = Utc::now();
    let mut reading = SensorReading::new(parcel_id, now, moisture)?
        .with_status(SensorStatus::from_str(status));
    if let Some(t) = temperature {
        reading = reading.with_temperature(t)?;
    }
    if let Some(ec) = ec {
        reading = reading.with_ec(ec)?;
    }
    if let Some(ph) = ph {
        reading = reading.with_ph(ph)?;
    }
    if let Some(b) = battery {
        reading = reading.with_battery(b)?;
    }
    if let Some(s) = signal {
        reading = reading.with_signal(s)?;
    }
    if let Some(sid) = sensor_id {
        reading = reading.with_sensor_id(sid);
    }

    let id = db.insert_reading(&reading, now)?;
    let category = MoistureCategory::from_percent(moisture);
    println!(
        "Stored reading {} for parcel {}: {:.1}% ({}), quality {}/100",
        id,
        parcel_id,
        moisture,
        category,
        reading.data_quality_score(now)
    );
    println!("  {}", category.watering_hint());
    if reading.requires_attention(now) {
        println!("⚠ Sensor requires attention ({})", reading.status);
    }
    Ok(())
}

fn log_event(
    db: &Database,
    parcel_id: i64,
    liters: f64,
    trigger: &str,
    minutes: Option<i64>,
    note: Option<&str>,
) -> Result<()> {
    if db.parcel_by_id(parcel_id)?.is_none() {
        return Err(GroveOpsError::NotFound(format!("parcel {}", parcel_id)));
    }

    let trigger = IrrigationTrigger::from_str(trigger)
        .ok_or_else(|| GroveOpsError::InvalidData(format!("unknown trigger '{}'", trigger)))?;

    let now = Utc::now();
    // With a duration, record the event as just finished
    let start = match minutes {
        Some(m) => now - Duration::minutes(m),
        None => now,
    };
    let mut event = IrrigationEvent::new(parcel_id, start, liters, trigger)?;
    match (minutes, note) {
        (Some(_), Some(n)) => event.complete_with_note(now, n),
        (Some(_), None) => event.complete(now),
        (None, Some(n)) => event = event.with_note(n),
        (None, None) => {}
    }

    let id = db.insert_event(&event)?;
    match event.duration_minutes() {
        Some(mins) => println!("Logged event {}: {} ({} min)", id, event, mins),
        None => {
            // Still running; reflect that on the parcel
            db.update_parcel_status(parcel_id, ParcelStatus::Irrigating)?;
            println!("Logged event {}: {}", id, event);
        }
    }
    Ok(())
}

fn set_status(db: &Database, parcel_id: i64, status: &str) -> Result<()> {
    let status = ParcelStatus::from_str(status);
    db.update_parcel_status(parcel_id, status)?;
    println!("Parcel {} is now {}", parcel_id, status);
    Ok(())
}

async fn evaluate(cli: &Cli, parcel: Option<i64>, at: Option<&str>) -> Result<()> {
    let config = load_config(cli)?;
    let db = open_db(cli)?;

    let client = OpenMeteoClient::new(config.location);
    let weather = client.fetch_current().await?;
    println!("Weather: {}", weather);
    println!();

    // --at pins the clock so a past decision can be replayed exactly
    let evaluator = match at {
        Some(ts) => {
            let instant = DateTime::parse_from_rfc3339(ts)
                .map_err(|e| GroveOpsError::InvalidData(format!("bad --at instant: {}", e)))?
                .with_timezone(&Utc);
            RuleEvaluator::new(config.rules.clone(), Box::new(FixedClock::at(instant)))
        }
        None => RuleEvaluator::with_system_clock(config.rules.clone()),
    };
    let planner = RecommendationPlanner::new(evaluator, &db, &db, &db);

    match parcel {
        Some(parcel_id) => {
            let recommendation = planner.recommend(parcel_id, &weather)?;
            print_recommendation(parcel_id, &recommendation);
            print_sensor_state(&db, parcel_id)?;
        }
        None => {
            let all = planner.recommend_all(&weather)?;
            if all.is_empty() {
                println!("No parcels configured. Run `groveops add-parcel`.");
            }
            for (parcel_id, recommendation) in &all {
                print_recommendation(*parcel_id, recommendation);
                println!();
            }
        }
    }

    Ok(())
}

fn print_recommendation(parcel_id: i64, recommendation: &Recommendation) {
    println!(
        "Parcel {}: {} {:.1}L (as of {})",
        parcel_id,
        recommendation.level(),
        recommendation.water_liters(),
        recommendation.created_at().format("%Y-%m-%d %H:%M")
    );
    for reason in recommendation.reasons() {
        println!("  - {}", reason);
    }
    if recommendation.level().needs_review() {
        println!("  ⚠ Review this decision");
    }
}

fn print_sensor_state(db: &Database, parcel_id: i64) -> Result<()> {
    let Some(reading) = db.latest_reading(parcel_id)? else {
        println!("  (no sensor reading on record)");
        return Ok(());
    };

    let now = SystemClock.now();
    println!(
        "  Sensor: {} at {}, quality {}/100, stress index {:.2}",
        reading.status,
        reading.timestamp.format("%Y-%m-%d %H:%M"),
        reading.data_quality_score(now),
        reading.water_stress_index(now)
    );
    if reading.requires_attention(now) {
        println!("  ⚠ Sensor requires attention");
    }
    if !reading.has_critical_data(now) {
        println!("  ⚠ Reading too old to base decisions on");
    }
    Ok(())
}

async fn window(cli: &Cli, parcel_id: i64) -> Result<()> {
    let config = load_config(cli)?;
    let db = open_db(cli)?;

    let client = OpenMeteoClient::new(config.location);
    let forecast = client.fetch_current().await?;

    let evaluator = RuleEvaluator::with_system_clock(config.rules.clone());
    let planner = RecommendationPlanner::new(evaluator, &db, &db, &db);

    let optimal = planner.optimal_window(parcel_id, &forecast)?;
    println!(
        "Best watering window for parcel {}: {}",
        optimal.parcel_id, optimal.window
    );
    println!("  {}", optimal.reasoning);
    if optimal.window.contains_now(&SystemClock) {
        println!("  Window is open right now");
    }
    Ok(())
}

async fn plan(cli: &Cli, parcel_id: i64) -> Result<()> {
    let config = load_config(cli)?;
    let db = open_db(cli)?;

    let client = OpenMeteoClient::new(config.location);
    let forecasts = client.fetch_daily(7).await?;

    let evaluator = RuleEvaluator::with_system_clock(config.rules.clone());
    let planner = RecommendationPlanner::new(evaluator, &db, &db, &db);

    let plan = planner.weekly_plan(parcel_id, &forecasts)?;
    println!(
        "Weekly plan for parcel {} (from {}):",
        plan.parcel_id, plan.generated_on
    );
    for day in &plan.days {
        println!(
            "  {}: {:>6.1}L - {} ({})",
            day.date, day.recommended_liters, day.action, day.reasoning
        );
    }
    println!("  Total: {:.1}L", plan.total_liters);
    Ok(())
}

fn history(cli: &Cli, parcel_id: i64, days: i64) -> Result<()> {
    let config = load_config(cli)?;
    let db = open_db(cli)?;

    let evaluator = RuleEvaluator::with_system_clock(config.rules.clone());
    let planner = RecommendationPlanner::new(evaluator, &db, &db, &db);

    let analysis = planner.historical_analysis(parcel_id, days)?;
    println!(
        "Parcel {} from {} to {}:",
        analysis.parcel_id, analysis.period_start, analysis.period_end
    );
    println!(
        "  {} readings, average moisture {:.1}% ({})",
        analysis.reading_count,
        analysis.average_moisture,
        MoistureCategory::from_percent(analysis.average_moisture)
    );
    println!(
        "  {} irrigation events, {:.1}L total, efficiency {:.2}",
        analysis.event_count,
        analysis.total_water_liters,
        analysis.water_efficiency()
    );

    if let Some(avg) = planner.average_moisture_24h(parcel_id)? {
        let trend = planner.moisture_trend(parcel_id, 24)?;
        println!("  Last 24h: average {:.1}%, trend {:+.1}%", avg, trend);
    }

    Ok(())
}
