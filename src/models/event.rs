use crate::error::{GroveOpsError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrrigationTrigger {
    Automatic,
    Manual,
    Scheduled,
    Fallback,
    Test,
}

impl IrrigationTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            IrrigationTrigger::Automatic => "Automatic",
            IrrigationTrigger::Manual => "Manual",
            IrrigationTrigger::Scheduled => "Scheduled",
            IrrigationTrigger::Fallback => "Fallback",
            IrrigationTrigger::Test => "Test",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "automatic" | "auto" => Some(IrrigationTrigger::Automatic),
            "manual" => Some(IrrigationTrigger::Manual),
            "scheduled" => Some(IrrigationTrigger::Scheduled),
            "fallback" => Some(IrrigationTrigger::Fallback),
            "test" => Some(IrrigationTrigger::Test),
            _ => None,
        }
    }
}

impl std::fmt::Display for IrrigationTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One watering run on a parcel. An event without an end time is still
/// running; `complete` closes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrrigationEvent {
    pub id: Option<i64>,
    pub parcel_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub water_liters: f64,
    pub trigger: IrrigationTrigger,
    pub note: Option<String>,
}

impl IrrigationEvent {
    pub fn new(
        parcel_id: i64,
        start_time: DateTime<Utc>,
        water_liters: f64,
        trigger: IrrigationTrigger,
    ) -> Result<Self> {
        if water_liters < 0.0 {
            return Err(GroveOpsError::InvalidData(
                "water amount must not be negative".into(),
            ));
        }
        Ok(Self {
            id: None,
            parcel_id,
            start_time,
            end_time: None,
            water_liters,
            trigger,
            note: None,
        })
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }

    pub fn complete(&mut self, end_time: DateTime<Utc>) {
        self.end_time = Some(end_time);
    }

    pub fn complete_with_note(&mut self, end_time: DateTime<Utc>, note: &str) {
        self.complete(end_time);
        self.note = Some(note.to_string());
    }

    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn duration_minutes(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_minutes())
    }
}

impl std::fmt::Display for IrrigationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.end_time {
            None => write!(
                f,
                "{:.1}L ({}) running since {}",
                self.water_liters,
                self.trigger,
                self.start_time.format("%H:%M")
            ),
            Some(end) => write!(
                f,
                "{:.1}L ({}) {}-{}",
                self.water_liters,
                self.trigger,
                self.start_time.format("%H:%M"),
                end.format("%H:%M")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn rejects_negative_liters() {
        assert!(IrrigationEvent::new(1, Utc::now(), -1.0, IrrigationTrigger::Manual).is_err());
    }

    #[test]
    fn open_event_is_active_without_duration() {
        let event = IrrigationEvent::new(1, Utc::now(), 20.0, IrrigationTrigger::Automatic).unwrap();
        assert!(event.is_active());
        assert_eq!(event.duration_minutes(), None);
    }

    #[test]
    fn completing_sets_duration() {
        let start = Utc::now();
        let mut event = IrrigationEvent::new(1, start, 20.0, IrrigationTrigger::Scheduled).unwrap();
        event.complete_with_note(start + Duration::minutes(45), "stopped by rain");
        assert!(!event.is_active());
        assert_eq!(event.duration_minutes(), Some(45));
        assert_eq!(event.note.as_deref(), Some("stopped by rain"));
    }

    #[test]
    fn trigger_from_str() {
        assert_eq!(
            IrrigationTrigger::from_str("automatic"),
            Some(IrrigationTrigger::Automatic)
        );
        assert_eq!(
            IrrigationTrigger::from_str("Fallback"),
            Some(IrrigationTrigger::Fallback)
        );
        assert_eq!(IrrigationTrigger::from_str("sprinkle"), None);
    }
}
