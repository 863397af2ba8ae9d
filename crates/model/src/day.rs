//! UTC calendar-day normalization.
//!
//! Every date that reaches storage or a date comparison goes through this
//! module. Days are `NaiveDate`s meaning "that calendar day in UTC";
//! instants are `DateTime<Utc>`.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Truncate an instant to its UTC calendar day.
pub fn utc_day(ts: DateTime<Utc>) -> NaiveDate {
    ts.date_naive()
}

/// The instant a UTC calendar day begins (00:00:00 UTC).
pub fn day_start(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Today as a UTC calendar day.
pub fn today_utc() -> NaiveDate {
    utc_day(Utc::now())
}

/// All days in the half-open range `[start, end)`, ascending.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut d = start;
    while d < end {
        days.push(d);
        match d.succ_opt() {
            Some(next) => d = next,
            None => break,
        }
    }
    days
}

/// A half-open `[start, end)` range of UTC calendar days, the unit of work
/// handed to a provider adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    /// First day covered by the window
    pub start: NaiveDate,
    /// First day past the window
    pub end: NaiveDate,
}

impl DateWindow {
    /// Build a window; `start` must precede `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start < end, "window must be non-empty");
        Self { start, end }
    }

    /// Whether `day` falls inside the window.
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day < self.end
    }

    /// Number of nights the window spans.
    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
