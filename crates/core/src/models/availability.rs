//! Recurring weekly windows in which a doctor accepts bookings.

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

/// One weekly window. `day_of_week` counts from Sunday (0) to Saturday (6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorAvailability {
    pub id: i64,
    pub doctor_id: i64,
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl DoctorAvailability {
    /// True when `[start, end)` on `date` lies entirely inside this window.
    pub fn covers(&self, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> bool {
        day_of_week(date) == self.day_of_week && self.start_time <= start && end <= self.end_time
    }

    pub fn overlaps(&self, other_day: u8, start: NaiveTime, end: NaiveTime) -> bool {
        self.day_of_week == other_day && self.start_time < end && start < self.end_time
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAvailability {
    pub doctor_id: i64,
    pub day_of_week: i64,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AvailabilityUpdate {
    pub day_of_week: i64,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

pub fn day_of_week(date: NaiveDate) -> u8 {
    // num_days_from_sunday is always within 0..=6
    date.weekday().num_days_from_sunday() as u8
}

pub(crate) fn validate_day(day: i64) -> CoreResult<u8> {
    u8::try_from(day)
        .ok()
        .filter(|d| *d <= 6)
        .ok_or_else(|| {
            CoreError::Validation(format!("day_of_week must be between 0 and 6, got {day}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn sunday_is_day_zero() {
        // 2025-03-02 was a Sunday
        let sunday = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        assert_eq!(day_of_week(sunday), 0);
        assert_eq!(day_of_week(sunday.pred_opt().unwrap()), 6);
    }

    #[test]
    fn window_covers_inner_slot_only() {
        let window = DoctorAvailability {
            id: 1,
            doctor_id: 10,
            day_of_week: 6,
            start_time: time(9, 0),
            end_time: time(12, 0),
        };
        let saturday = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert!(window.covers(saturday, time(9, 0), time(9, 30)));
        assert!(window.covers(saturday, time(11, 30), time(12, 0)));
        assert!(!window.covers(saturday, time(11, 45), time(12, 15)));
        assert!(!window.covers(saturday.succ_opt().unwrap(), time(9, 0), time(9, 30)));
    }

    #[test]
    fn day_must_be_in_week() {
        assert_eq!(validate_day(0).unwrap(), 0);
        assert_eq!(validate_day(6).unwrap(), 6);
        assert!(validate_day(7).is_err());
        assert!(validate_day(-1).is_err());
    }
}
