//! Trading-day calendar: weekend rule plus an explicit holiday set.
//!
//! Mirrors `pyfolio::BusinessCalendar` (`core/datetime.h`): a date is a
//! business day iff it is not a Saturday/Sunday and not in the holiday set.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, Weekday};
use serde::{Deserialize, Serialize};

use crate::timeseries::Timestamp;

/// Trading-day calendar. The default instance seeds the handful of fixed-date
/// US holidays the original carries (New Year's Day, Independence Day,
/// Christmas) — callers add any exchange-specific or floating holidays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessCalendar {
    name: String,
    holidays: BTreeSet<Timestamp>,
}

impl Default for BusinessCalendar {
    fn default() -> Self {
        Self::new("NYSE")
    }
}

impl BusinessCalendar {
    pub fn new(name: impl Into<String>) -> Self {
        let mut cal = Self {
            name: name.into(),
            holidays: BTreeSet::new(),
        };
        cal.seed_default_holidays();
        cal
    }

    /// A calendar with no holidays, weekends only.
    pub fn weekends_only(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            holidays: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn seed_default_holidays(&mut self) {
        use chrono::NaiveDate;
        for year in [2024, 2025] {
            self.holidays.insert(NaiveDate::from_ymd_opt(year, 1, 1).unwrap());
            self.holidays.insert(NaiveDate::from_ymd_opt(year, 7, 4).unwrap());
            self.holidays.insert(NaiveDate::from_ymd_opt(year, 12, 25).unwrap());
        }
    }

    pub fn add_holiday(&mut self, date: Timestamp) {
        self.holidays.insert(date);
    }

    pub fn remove_holiday(&mut self, date: Timestamp) {
        self.holidays.remove(&date);
    }

    pub fn is_holiday(&self, date: Timestamp) -> bool {
        self.holidays.contains(&date)
    }

    fn is_weekend(date: Timestamp) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    pub fn is_business_day(&self, date: Timestamp) -> bool {
        !Self::is_weekend(date) && !self.is_holiday(date)
    }

    pub fn next_business_day(&self, date: Timestamp) -> Timestamp {
        let mut current = date + Duration::days(1);
        while !self.is_business_day(current) {
            current += Duration::days(1);
        }
        current
    }

    pub fn previous_business_day(&self, date: Timestamp) -> Timestamp {
        let mut current = date - Duration::days(1);
        while !self.is_business_day(current) {
            current -= Duration::days(1);
        }
        current
    }

    /// Business days strictly after `start` up to and including `end`.
    pub fn business_days_between(&self, start: Timestamp, end: Timestamp) -> i64 {
        if start >= end {
            return 0;
        }
        let mut count = 0i64;
        let mut current = start + Duration::days(1);
        while current <= end {
            if self.is_business_day(current) {
                count += 1;
            }
            current += Duration::days(1);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekend_is_never_a_business_day() {
        let cal = BusinessCalendar::weekends_only("TEST");
        assert!(!cal.is_business_day(d(2024, 6, 1))); // Saturday
        assert!(!cal.is_business_day(d(2024, 6, 2))); // Sunday
        assert!(cal.is_business_day(d(2024, 6, 3))); // Monday
    }

    #[test]
    fn seeded_holiday_is_excluded() {
        let cal = BusinessCalendar::default();
        assert!(cal.is_holiday(d(2024, 7, 4)));
        assert!(!cal.is_business_day(d(2024, 7, 4)));
    }

    #[test]
    fn next_and_previous_business_day_skip_weekend() {
        let cal = BusinessCalendar::weekends_only("TEST");
        assert_eq!(cal.next_business_day(d(2024, 6, 1)), d(2024, 6, 3));
        assert_eq!(cal.previous_business_day(d(2024, 6, 2)), d(2024, 5, 31));
    }

    #[test]
    fn business_days_between_is_exclusive_start_inclusive_end() {
        let cal = BusinessCalendar::weekends_only("TEST");
        // Mon 6/3 .. Fri 6/7: Tue,Wed,Thu,Fri = 4
        assert_eq!(cal.business_days_between(d(2024, 6, 3), d(2024, 6, 7)), 4);
        assert_eq!(cal.business_days_between(d(2024, 6, 7), d(2024, 6, 3)), 0);
    }
}
