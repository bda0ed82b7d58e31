//! Pattern continuity tracking
//!
//! Remembers, per analyst, the last weekend-bearing pattern and the last
//! weekend day worked, and enforces the minimum gap before the analyst can
//! take weekend duty again. A 1-day delta (Saturday into Sunday of the
//! same weekend span) and a 6-day delta (the intended SUN_THU to TUE_SAT
//! hand-off within one Sun–Sat week) are always allowed; anything else
//! must be at least the configured minimum gap.

use chrono::NaiveDate;
use std::collections::HashMap;
use uuid::Uuid;

use crate::calendar::days_between;
use crate::models::{PatternContinuityRecord, Schedule, WorkPattern};

/// Minimum-gap enforcement over per-analyst weekend history
#[derive(Debug, Clone)]
pub struct PatternContinuity {
    records: HashMap<Uuid, PatternContinuityRecord>,
    min_gap_days: i64,
}

impl PatternContinuity {
    pub fn new(min_gap_days: i64) -> Self {
        Self {
            records: HashMap::new(),
            min_gap_days,
        }
    }

    /// Seed from historical schedules falling on weekend days
    pub fn seed_from_history(&mut self, history: &[Schedule]) {
        for s in history {
            let weekday = chrono::Datelike::weekday(&s.date);
            let pattern = match weekday {
                chrono::Weekday::Sun => WorkPattern::SunThu,
                chrono::Weekday::Sat => WorkPattern::TueSat,
                _ => continue,
            };
            self.record(s.analyst_id, s.date, pattern);
        }
    }

    /// Record a worked weekend day for an analyst
    pub fn record(&mut self, analyst_id: Uuid, date: NaiveDate, pattern: WorkPattern) {
        self.records
            .entry(analyst_id)
            .and_modify(|r| {
                if date > r.last_end_date {
                    r.last_end_date = date;
                    r.last_pattern = pattern;
                }
            })
            .or_insert(PatternContinuityRecord {
                analyst_id,
                last_pattern: pattern,
                last_end_date: date,
            });
    }

    /// Last weekend day on record for the analyst
    pub fn last_weekend_day(&self, analyst_id: Uuid) -> Option<NaiveDate> {
        self.records.get(&analyst_id).map(|r| r.last_end_date)
    }

    pub fn record_for(&self, analyst_id: Uuid) -> Option<&PatternContinuityRecord> {
        self.records.get(&analyst_id)
    }

    /// Whether the analyst may take weekend duty on `date`
    pub fn gap_ok(&self, analyst_id: Uuid, date: NaiveDate) -> bool {
        let Some(last) = self.last_weekend_day(analyst_id) else {
            return true;
        };
        let delta = days_between(last, date);
        if delta <= 0 {
            // Same day re-check is fine; an earlier date never comes up in
            // a forward walk
            return delta == 0;
        }
        delta == 1 || delta == 6 || delta >= self.min_gap_days
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScheduleKind;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_unknown_analyst_passes() {
        let continuity = PatternContinuity::new(13);
        assert!(continuity.gap_ok(Uuid::new_v4(), date(2026, 2, 1)));
    }

    #[test]
    fn test_consecutive_weekend_day_allowed() {
        let analyst = Uuid::new_v4();
        let mut continuity = PatternContinuity::new(13);
        // Saturday 2026-02-07, then Sunday 2026-02-08
        continuity.record(analyst, date(2026, 2, 7), WorkPattern::TueSat);
        assert!(continuity.gap_ok(analyst, date(2026, 2, 8)));
    }

    #[test]
    fn test_sun_to_sat_handoff_allowed() {
        let analyst = Uuid::new_v4();
        let mut continuity = PatternContinuity::new(13);
        // Sunday 2026-02-01 into Saturday 2026-02-07 of the same week
        continuity.record(analyst, date(2026, 2, 1), WorkPattern::SunThu);
        assert!(continuity.gap_ok(analyst, date(2026, 2, 7)));
    }

    #[test]
    fn test_next_weekend_blocked() {
        let analyst = Uuid::new_v4();
        let mut continuity = PatternContinuity::new(13);
        continuity.record(analyst, date(2026, 2, 1), WorkPattern::SunThu);
        // 7 days later: neither the hand-off nor past the minimum gap
        assert!(!continuity.gap_ok(analyst, date(2026, 2, 8)));
        // 13 days later: minimum gap satisfied
        assert!(continuity.gap_ok(analyst, date(2026, 2, 14)));
    }

    #[test]
    fn test_record_keeps_latest_date() {
        let analyst = Uuid::new_v4();
        let mut continuity = PatternContinuity::new(13);
        continuity.record(analyst, date(2026, 2, 7), WorkPattern::TueSat);
        continuity.record(analyst, date(2026, 2, 1), WorkPattern::SunThu);
        assert_eq!(continuity.last_weekend_day(analyst), Some(date(2026, 2, 7)));
        assert_eq!(
            continuity.record_for(analyst).unwrap().last_pattern,
            WorkPattern::TueSat
        );
    }

    #[test]
    fn test_seed_from_history_ignores_weekdays() {
        let analyst = Uuid::new_v4();
        let region = Uuid::new_v4();
        let mut continuity = PatternContinuity::new(13);
        continuity.seed_from_history(&[
            Schedule::new(analyst, region, date(2026, 1, 25), "AM", ScheduleKind::Imported), // Sunday
            Schedule::new(analyst, region, date(2026, 1, 28), "AM", ScheduleKind::Imported), // Wednesday
        ]);
        assert_eq!(
            continuity.last_weekend_day(analyst),
            Some(date(2026, 1, 25))
        );
    }

    #[test]
    fn test_custom_gap() {
        let analyst = Uuid::new_v4();
        let mut continuity = PatternContinuity::new(20);
        continuity.record(analyst, date(2026, 2, 1), WorkPattern::SunThu);
        assert!(!continuity.gap_ok(analyst, date(2026, 2, 14)));
        assert!(continuity.gap_ok(analyst, date(2026, 2, 21)));
    }
}
