use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};

/// Injected time source. Evaluation is a pure function of its inputs plus
/// this clock, so tests pin it to a fixed instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Wall-clock time of day used for time-window and fallback checks.
    fn time_of_day(&self) -> NaiveTime;

    /// Start of the current day as an instant; "today's" irrigation
    /// events are those starting at or after this.
    fn start_of_day(&self) -> DateTime<Utc>;
}

/// Production clock: local wall time for day boundaries and windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn time_of_day(&self) -> NaiveTime {
        Local::now().time()
    }

    fn start_of_day(&self) -> DateTime<Utc> {
        let midnight = Local::now().date_naive().and_time(NaiveTime::MIN);
        match Local.from_local_datetime(&midnight) {
            chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
                dt.with_timezone(&Utc)
            }
            // Midnight skipped by a DST jump; fall back to the UTC day start
            chrono::LocalResult::None => Utc
                .from_utc_datetime(&Utc::now().date_naive().and_time(NaiveTime::MIN)),
        }
    }
}

/// Deterministic clock for tests and replay.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    instant: DateTime<Utc>,
}

impl FixedClock {
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self { instant }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.instant
    }

    fn time_of_day(&self) -> NaiveTime {
        self.instant.time()
    }

    fn start_of_day(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.instant.date_naive().and_time(NaiveTime::MIN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_is_deterministic() {
        let instant = Utc.with_ymd_and_hms(2024, 7, 15, 10, 30, 0).unwrap();
        let clock = FixedClock::at(instant);
        assert_eq!(clock.now(), instant);
        assert_eq!(clock.time_of_day(), NaiveTime::from_hms_opt(10, 30, 0).unwrap());
        assert_eq!(
            clock.start_of_day(),
            Utc.with_ymd_and_hms(2024, 7, 15, 0, 0, 0).unwrap()
        );
    }
}
