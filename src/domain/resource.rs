//! Resource (staff/expert) domain entity

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Half-open window of minutes-of-day, [start_minute, end_minute)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayWindow {
    pub start_minute: i32,
    pub end_minute: i32,
}

impl DayWindow {
    pub fn new(start_minute: i32, end_minute: i32) -> Self {
        Self {
            start_minute,
            end_minute,
        }
    }

    pub fn contains(&self, minute: i32) -> bool {
        minute >= self.start_minute && minute < self.end_minute
    }
}

/// A schedulable staff entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub name: String,
    /// Presentation color tag for the calendar column
    pub color: Option<String>,
    /// Service item ids this resource is able to perform
    pub capabilities: HashSet<String>,
    /// At most one working window per weekday, Monday-first; None = closed
    pub working_hours: [Option<DayWindow>; 7],
    pub lunch_break: Option<DayWindow>,
    /// Dates the resource does not work regardless of weekday
    pub holidays: HashSet<NaiveDate>,
    /// IANA timezone name, e.g. "Europe/Berlin"
    pub timezone: String,
}

impl Resource {
    pub fn new(id: impl Into<String>, name: impl Into<String>, timezone: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: None,
            capabilities: HashSet::new(),
            working_hours: [None; 7],
            lunch_break: None,
            holidays: HashSet::new(),
            timezone: timezone.into(),
        }
    }

    pub fn can_perform(&self, item_id: &str) -> bool {
        self.capabilities.contains(item_id)
    }

    /// Working window for a calendar date; None on holidays and closed weekdays
    pub fn window_for(&self, date: NaiveDate) -> Option<DayWindow> {
        if self.holidays.contains(&date) {
            return None;
        }
        self.working_hours[date.weekday().num_days_from_monday() as usize]
    }

    pub fn is_open_on(&self, date: NaiveDate) -> bool {
        self.window_for(date).is_some()
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_resource() -> Resource {
        let mut r = Resource::new("exp-1", "Anna", "Europe/Berlin");
        // Mon-Fri 09:00-18:00
        for day in 0..5 {
            r.working_hours[day] = Some(DayWindow::new(540, 1080));
        }
        r.lunch_break = Some(DayWindow::new(780, 840));
        r
    }

    #[test]
    fn window_for_working_weekday() {
        let r = sample_resource();
        // 2025-06-02 is a Monday
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        assert_eq!(r.window_for(monday), Some(DayWindow::new(540, 1080)));
        assert!(r.is_open_on(monday));
    }

    #[test]
    fn closed_on_weekend() {
        let r = sample_resource();
        let sunday = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert!(r.window_for(sunday).is_none());
        assert!(!r.is_open_on(sunday));
    }

    #[test]
    fn holiday_overrides_weekday() {
        let mut r = sample_resource();
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        r.holidays.insert(monday);
        assert!(r.window_for(monday).is_none());
    }

    #[test]
    fn day_window_contains_is_half_open() {
        let w = DayWindow::new(540, 1080);
        assert!(w.contains(540));
        assert!(w.contains(1079));
        assert!(!w.contains(1080));
        assert!(!w.contains(539));
    }

    #[test]
    fn can_perform_checks_capability_set() {
        let mut r = sample_resource();
        r.capabilities.insert("svc-cut".into());
        assert!(r.can_perform("svc-cut"));
        assert!(!r.can_perform("svc-color"));
    }
}
