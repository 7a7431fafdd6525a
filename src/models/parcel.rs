use crate::error::{GroveOpsError, Result};
use crate::models::{MoistureRange, TimeWindow};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoilType {
    Sandy,
    Loamy,
    Clay,
    Loess,
    Calcareous,
}

impl SoilType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SoilType::Sandy => "Sandy",
            SoilType::Loamy => "Loamy",
            SoilType::Clay => "Clay",
            SoilType::Loess => "Loess",
            SoilType::Calcareous => "Calcareous",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sandy" | "sand" => Some(SoilType::Sandy),
            "loamy" | "loam" => Some(SoilType::Loamy),
            "clay" => Some(SoilType::Clay),
            "loess" => Some(SoilType::Loess),
            "calcareous" | "chalky" => Some(SoilType::Calcareous),
            _ => None,
        }
    }

    pub fn all() -> &'static [SoilType] {
        &[
            SoilType::Sandy,
            SoilType::Loamy,
            SoilType::Clay,
            SoilType::Loess,
            SoilType::Calcareous,
        ]
    }
}

impl std::fmt::Display for SoilType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParcelStatus {
    Idle,
    Irrigating,
    Error,
    Locked,
}

impl ParcelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParcelStatus::Idle => "Idle",
            ParcelStatus::Irrigating => "Irrigating",
            ParcelStatus::Error => "Error",
            ParcelStatus::Locked => "Locked",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "irrigating" => ParcelStatus::Irrigating,
            "error" => ParcelStatus::Error,
            "locked" => ParcelStatus::Locked,
            _ => ParcelStatus::Idle,
        }
    }
}

impl std::fmt::Display for ParcelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Properties of the olive trees growing on a parcel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeProfile {
    pub variety: String,
    pub soil_type: SoilType,
    pub age_years: u32,
    pub organic_certified: bool,
    pub base_water_need_liters: f64,
}

impl TreeProfile {
    pub fn new(
        variety: &str,
        soil_type: SoilType,
        age_years: u32,
        organic_certified: bool,
        base_water_need_liters: f64,
    ) -> Result<Self> {
        if variety.trim().is_empty() {
            return Err(GroveOpsError::InvalidData(
                "tree variety must not be empty".into(),
            ));
        }
        if base_water_need_liters <= 0.0 {
            return Err(GroveOpsError::InvalidData(
                "base water need must be positive".into(),
            ));
        }
        Ok(Self {
            variety: variety.to_string(),
            soil_type,
            age_years,
            organic_certified,
            base_water_need_liters,
        })
    }
}

/// A spatial irrigation unit with its own sensor and schedule
/// configuration. Immutable after creation except for status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParcelConfig {
    pub id: Option<i64>,
    pub name: String,
    pub profile: TreeProfile,
    pub target_moisture_range: MoistureRange,
    pub allowed_time_windows: Vec<TimeWindow>,
    pub max_daily_duration_minutes: i64,
    pub status: ParcelStatus,
}

impl ParcelConfig {
    pub fn create(
        name: &str,
        profile: TreeProfile,
        target_moisture_range: MoistureRange,
    ) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(GroveOpsError::InvalidData(
                "parcel name must not be empty".into(),
            ));
        }
        Ok(Self {
            id: None,
            name: name.to_string(),
            profile,
            target_moisture_range,
            allowed_time_windows: Vec::new(),
            max_daily_duration_minutes: 60,
            status: ParcelStatus::Idle,
        })
    }

    pub fn with_time_window(mut self, window: TimeWindow) -> Self {
        self.allowed_time_windows.push(window);
        self
    }

    pub fn with_max_daily_duration(mut self, minutes: i64) -> Self {
        self.max_daily_duration_minutes = minutes;
        self
    }

    /// An empty window list means irrigation is unrestricted.
    pub fn is_irrigation_allowed_at(&self, time: NaiveTime) -> bool {
        self.allowed_time_windows.is_empty()
            || self.allowed_time_windows.iter().any(|w| w.contains(time))
    }
}
