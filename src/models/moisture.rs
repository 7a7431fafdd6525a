use crate::error::{GroveOpsError, Result};
use serde::{Deserialize, Serialize};

/// Target soil-moisture band for a parcel, e.g. 30-60%.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoistureRange {
    lower: f64,
    upper: f64,
}

impl MoistureRange {
    pub fn new(lower: f64, upper: f64) -> Result<Self> {
        if !(0.0..=100.0).contains(&lower) {
            return Err(GroveOpsError::InvalidRange(format!(
                "lower bound {} outside 0-100%",
                lower
            )));
        }
        if !(0.0..=100.0).contains(&upper) {
            return Err(GroveOpsError::InvalidRange(format!(
                "upper bound {} outside 0-100%",
                upper
            )));
        }
        if lower >= upper {
            return Err(GroveOpsError::InvalidRange(format!(
                "lower bound {} must be below upper bound {}",
                lower, upper
            )));
        }
        Ok(Self { lower, upper })
    }

    pub fn contains(&self, moisture: f64) -> bool {
        moisture >= self.lower && moisture <= self.upper
    }

    pub fn is_below(&self, moisture: f64) -> bool {
        moisture < self.lower
    }

    pub fn is_above(&self, moisture: f64) -> bool {
        moisture > self.upper
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }
}

impl std::fmt::Display for MoistureRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.0}%-{:.0}%", self.lower, self.upper)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoistureCategory {
    VeryDry,
    Dry,
    Optimal,
    Moist,
    Saturated,
}

impl MoistureCategory {
    /// Classify an absolute moisture percentage into a category band.
    pub fn from_percent(percent: f64) -> Self {
        if percent < 20.0 {
            MoistureCategory::VeryDry
        } else if percent < 40.0 {
            MoistureCategory::Dry
        } else if percent < 60.0 {
            MoistureCategory::Optimal
        } else if percent < 80.0 {
            MoistureCategory::Moist
        } else {
            MoistureCategory::Saturated
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MoistureCategory::VeryDry => "Very dry",
            MoistureCategory::Dry => "Dry",
            MoistureCategory::Optimal => "Optimal",
            MoistureCategory::Moist => "Moist",
            MoistureCategory::Saturated => "Saturated",
        }
    }

    pub fn watering_hint(&self) -> &'static str {
        match self {
            MoistureCategory::VeryDry => "Irrigate urgently",
            MoistureCategory::Dry => "Irrigation recommended",
            MoistureCategory::Optimal => "No irrigation needed",
            MoistureCategory::Moist => "Reduce irrigation",
            MoistureCategory::Saturated => "No irrigation - soil is saturated",
        }
    }
}

impl std::fmt::Display for MoistureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_rejects_bad_bounds() {
        assert!(MoistureRange::new(-1.0, 50.0).is_err());
        assert!(MoistureRange::new(10.0, 101.0).is_err());
        assert!(MoistureRange::new(60.0, 30.0).is_err());
        assert!(MoistureRange::new(40.0, 40.0).is_err());
    }

    #[test]
    fn range_membership_is_inclusive() {
        let range = MoistureRange::new(30.0, 60.0).unwrap();
        assert!(range.contains(30.0));
        assert!(range.contains(45.0));
        assert!(range.contains(60.0));
        assert!(!range.contains(29.9));
        assert!(!range.contains(60.1));
    }

    #[test]
    fn exactly_one_predicate_holds() {
        let range = MoistureRange::new(30.0, 60.0).unwrap();
        for v in [0.0, 29.9, 30.0, 45.0, 60.0, 60.1, 100.0] {
            let hits = [range.contains(v), range.is_below(v), range.is_above(v)]
                .iter()
                .filter(|b| **b)
                .count();
            assert_eq!(hits, 1, "value {} matched {} predicates", v, hits);
        }
    }

    #[test]
    fn category_bands() {
        assert_eq!(MoistureCategory::from_percent(5.0), MoistureCategory::VeryDry);
        assert_eq!(MoistureCategory::from_percent(20.0), MoistureCategory::Dry);
        assert_eq!(MoistureCategory::from_percent(45.0), MoistureCategory::Optimal);
        assert_eq!(MoistureCategory::from_percent(60.0), MoistureCategory::Moist);
        assert_eq!(
            MoistureCategory::from_percent(95.0),
            MoistureCategory::Saturated
        );
    }
}
