//! Timezone-anchored calendar utilities
//!
//! Every date the engine reasons about is a plain calendar date
//! (`NaiveDate`) already normalized to the region's timezone. The one
//! place wall-clock instants enter the system is [`Calendar::local_date`],
//! which pins a UTC instant to the region's local day. Downstream
//! comparisons happen on normalized dates or integer day counts, never on
//! wall-clock milliseconds.

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::error::{EngineError, EngineResult};

/// Calendar anchored to a region's IANA timezone
#[derive(Debug, Clone, Copy)]
pub struct Calendar {
    tz: Tz,
}

impl Calendar {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Parse an IANA timezone name
    pub fn from_name(name: &str) -> EngineResult<Self> {
        let tz: Tz = name
            .parse()
            .map_err(|_| EngineError::config(format!("invalid timezone: {name}")))?;
        Ok(Self { tz })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// The calendar date of a UTC instant in this calendar's timezone
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.tz).date_naive()
    }

    /// Midnight of the given local date, as a UTC instant
    ///
    /// Ambiguous local midnights (DST transitions) resolve to the
    /// earliest valid instant of the day.
    pub fn utc_midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        let local = date.and_hms_opt(0, 0, 0).expect("midnight always exists");
        match self.tz.from_local_datetime(&local) {
            chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
            chrono::LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            chrono::LocalResult::None => {
                // Spring-forward gap; the first valid instant after it
                self.tz
                    .from_local_datetime(&(local + chrono::Duration::hours(1)))
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|| Utc.from_utc_datetime(&local))
            }
        }
    }

    /// Ordered inclusive walk from `start` to `end`, one day apart
    pub fn walk_days(&self, start: NaiveDate, end: NaiveDate) -> DayWalk {
        DayWalk {
            next: if start <= end { Some(start) } else { None },
            end,
        }
    }

    /// True iff the date falls on Saturday or Sunday
    pub fn is_weekend(&self, date: NaiveDate) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// The Sunday starting the Sun–Sat week containing `date`
    pub fn sunday_of_week(&self, date: NaiveDate) -> NaiveDate {
        let back = date.weekday().num_days_from_sunday() as u64;
        date.checked_sub_days(Days::new(back))
            .expect("date arithmetic within calendar range")
    }

    /// Day-of-week index with 0 = Sunday, 6 = Saturday
    pub fn weekday_index(&self, date: NaiveDate) -> u32 {
        date.weekday().num_days_from_sunday()
    }
}

/// Signed integer day delta between two normalized dates
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (b - a).num_days()
}

/// Lazy inclusive date range iterator
#[derive(Debug, Clone)]
pub struct DayWalk {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for DayWalk {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next?;
        self.next = if current < self.end {
            current.succ_opt()
        } else {
            None
        };
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_walk_days_inclusive() {
        let cal = Calendar::new(New_York);
        let days: Vec<_> = cal.walk_days(date(2026, 2, 1), date(2026, 2, 5)).collect();
        assert_eq!(days.len(), 5);
        assert_eq!(days[0], date(2026, 2, 1));
        assert_eq!(days[4], date(2026, 2, 5));
    }

    #[test]
    fn test_walk_days_single_day() {
        let cal = Calendar::new(New_York);
        let days: Vec<_> = cal.walk_days(date(2026, 2, 3), date(2026, 2, 3)).collect();
        assert_eq!(days, vec![date(2026, 2, 3)]);
    }

    #[test]
    fn test_walk_days_empty_when_reversed() {
        let cal = Calendar::new(New_York);
        let days: Vec<_> = cal.walk_days(date(2026, 2, 5), date(2026, 2, 1)).collect();
        assert!(days.is_empty());
    }

    #[test]
    fn test_walk_days_crosses_dst_boundary() {
        // US spring-forward on 2026-03-08; the walk must still yield one
        // entry per calendar day
        let cal = Calendar::new(New_York);
        let days: Vec<_> = cal.walk_days(date(2026, 3, 7), date(2026, 3, 9)).collect();
        assert_eq!(
            days,
            vec![date(2026, 3, 7), date(2026, 3, 8), date(2026, 3, 9)]
        );
    }

    #[test]
    fn test_is_weekend() {
        let cal = Calendar::new(New_York);
        assert!(cal.is_weekend(date(2026, 2, 1))); // Sunday
        assert!(cal.is_weekend(date(2026, 2, 7))); // Saturday
        assert!(!cal.is_weekend(date(2026, 2, 2))); // Monday
    }

    #[test]
    fn test_sunday_of_week() {
        let cal = Calendar::new(New_York);
        // 2026-02-04 is a Wednesday; its week starts 2026-02-01
        assert_eq!(cal.sunday_of_week(date(2026, 2, 4)), date(2026, 2, 1));
        // A Sunday is its own week start
        assert_eq!(cal.sunday_of_week(date(2026, 2, 1)), date(2026, 2, 1));
        // A Saturday belongs to the week that started six days earlier
        assert_eq!(cal.sunday_of_week(date(2026, 2, 7)), date(2026, 2, 1));
    }

    #[test]
    fn test_weekday_index_sunday_zero() {
        let cal = Calendar::new(New_York);
        assert_eq!(cal.weekday_index(date(2026, 2, 1)), 0); // Sunday
        assert_eq!(cal.weekday_index(date(2026, 2, 7)), 6); // Saturday
    }

    #[test]
    fn test_days_between() {
        assert_eq!(days_between(date(2026, 2, 1), date(2026, 2, 14)), 13);
        assert_eq!(days_between(date(2026, 2, 14), date(2026, 2, 1)), -13);
        assert_eq!(days_between(date(2026, 2, 1), date(2026, 2, 1)), 0);
    }

    #[test]
    fn test_local_date_normalization() {
        let cal = Calendar::new(New_York);
        // 2026-02-02T03:00Z is still 2026-02-01 22:00 in New York
        let at = Utc.with_ymd_and_hms(2026, 2, 2, 3, 0, 0).unwrap();
        assert_eq!(cal.local_date(at), date(2026, 2, 1));
    }

    #[test]
    fn test_utc_midnight_round_trip() {
        let cal = Calendar::new(New_York);
        let midnight = cal.utc_midnight(date(2026, 2, 1));
        // New York midnight is 05:00 UTC in winter
        assert_eq!(midnight, Utc.with_ymd_and_hms(2026, 2, 1, 5, 0, 0).unwrap());
        assert_eq!(cal.local_date(midnight), date(2026, 2, 1));
    }

    #[test]
    fn test_invalid_timezone_rejected() {
        assert!(Calendar::from_name("Not/AZone").is_err());
        assert!(Calendar::from_name("America/New_York").is_ok());
    }
}
