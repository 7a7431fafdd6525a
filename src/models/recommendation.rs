use crate::error::{GroveOpsError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Urgency classification of an irrigation decision.
///
/// The four in-band levels are totally ordered by severity. `Fallback`
/// marks a decision made without reliable sensor data and does not
/// participate in that ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendationLevel {
    None,
    Normal,
    Elevated,
    Critical,
    Fallback,
}

impl RecommendationLevel {
    fn severity_rank(&self) -> Option<u8> {
        match self {
            RecommendationLevel::None => Some(0),
            RecommendationLevel::Normal => Some(1),
            RecommendationLevel::Elevated => Some(2),
            RecommendationLevel::Critical => Some(3),
            RecommendationLevel::Fallback => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationLevel::None => "No irrigation",
            RecommendationLevel::Normal => "Normal irrigation",
            RecommendationLevel::Elevated => "Elevated need",
            RecommendationLevel::Critical => "Critical",
            RecommendationLevel::Fallback => "Fallback mode",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            RecommendationLevel::None => "🟢",
            RecommendationLevel::Normal => "🟡",
            RecommendationLevel::Elevated => "🟠",
            RecommendationLevel::Critical => "🔴",
            RecommendationLevel::Fallback => "⚫",
        }
    }

    /// Critical and fallback decisions both warrant operator review.
    pub fn needs_review(&self) -> bool {
        matches!(
            self,
            RecommendationLevel::Critical | RecommendationLevel::Fallback
        )
    }
}

impl PartialOrd for RecommendationLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            return Some(Ordering::Equal);
        }
        match (self.severity_rank(), other.severity_rank()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecommendationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.symbol(), self.as_str())
    }
}

/// The engine's output: how much to water and why.
///
/// Reasons are append-only and preserve evaluation order; they are the
/// audit trail for the decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    created_at: DateTime<Utc>,
    water_liters: f64,
    level: RecommendationLevel,
    reasons: Vec<String>,
}

impl Recommendation {
    pub fn new(
        created_at: DateTime<Utc>,
        water_liters: f64,
        level: RecommendationLevel,
        reasons: Vec<String>,
    ) -> Result<Self> {
        if water_liters < 0.0 {
            return Err(GroveOpsError::InvalidData(
                "recommended amount must not be negative".into(),
            ));
        }
        Ok(Self {
            created_at,
            water_liters,
            level,
            reasons,
        })
    }

    pub fn no_irrigation(created_at: DateTime<Utc>, reasons: Vec<String>) -> Self {
        Self {
            created_at,
            water_liters: 0.0,
            level: RecommendationLevel::None,
            reasons,
        }
    }

    pub fn should_irrigate(&self) -> bool {
        self.water_liters > 0.0
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn water_liters(&self) -> f64 {
        self.water_liters
    }

    pub fn level(&self) -> RecommendationLevel {
        self.level
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.should_irrigate() {
            write!(
                f,
                "{:.1}L ({}) - {}",
                self.water_liters,
                self.level,
                self.reasons.join(", ")
            )
        } else {
            write!(f, "No irrigation ({}) - {}", self.level, self.reasons.join(", "))
        }
    }
}
