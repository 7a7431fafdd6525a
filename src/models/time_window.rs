use crate::logic::clock::Clock;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// An allowed irrigation window within the day, e.g. 06:00-09:00.
///
/// Equal start and end means the whole day is allowed. A start after the
/// end is an overnight window that wraps past midnight (22:00-06:00).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start == self.end {
            return true;
        }
        if self.start < self.end {
            time >= self.start && time < self.end
        } else {
            // Overnight window
            time >= self.start || time <= self.end
        }
    }

    /// Whether the window is open at the clock's current time of day.
    pub fn contains_now(&self, clock: &dyn Clock) -> bool {
        self.contains(clock.time_of_day())
    }

    pub fn is_overnight(&self) -> bool {
        self.start > self.end
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn same_day_window_half_open() {
        let window = TimeWindow::new(t(6, 0), t(9, 0));
        assert!(window.contains(t(6, 0)));
        assert!(window.contains(t(8, 59)));
        assert!(!window.contains(t(9, 0)));
        assert!(!window.contains(t(5, 59)));
        assert!(!window.contains(t(12, 0)));
    }

    #[test]
    fn equal_bounds_allow_whole_day() {
        let window = TimeWindow::new(t(0, 0), t(0, 0));
        assert!(window.contains(t(0, 0)));
        assert!(window.contains(t(12, 0)));
        assert!(window.contains(t(23, 59)));
    }

    #[test]
    fn overnight_window_wraps_midnight() {
        let window = TimeWindow::new(t(22, 0), t(6, 0));
        assert!(window.is_overnight());
        assert!(window.contains(t(23, 0)));
        assert!(window.contains(t(22, 0)));
        assert!(window.contains(t(5, 59)));
        assert!(window.contains(t(6, 0)));
        assert!(!window.contains(t(12, 0)));
        assert!(!window.contains(t(21, 59)));
    }

    #[test]
    fn contains_now_uses_injected_clock() {
        use crate::logic::clock::FixedClock;
        use chrono::{TimeZone, Utc};

        let window = TimeWindow::new(t(6, 0), t(9, 0));
        let morning = FixedClock::at(Utc.with_ymd_and_hms(2024, 7, 15, 7, 30, 0).unwrap());
        let evening = FixedClock::at(Utc.with_ymd_and_hms(2024, 7, 15, 19, 0, 0).unwrap());
        assert!(window.contains_now(&morning));
        assert!(!window.contains_now(&evening));
    }

    #[test]
    fn display_formats_as_range() {
        let window = TimeWindow::new(t(6, 30), t(9, 0));
        assert_eq!(window.to_string(), "06:30-09:00");
    }
}
