//! Consecutive work-day streak tracking
//!
//! One tracker instance is shared by the weekend and weekday assigners for
//! the whole date walk. After each processed day, every analyst who
//! produced a schedule has their streak incremented and everyone else
//! resets to zero. An analyst at the cap is never assigned another day.

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::models::Schedule;

/// Shared consecutive-day streak state
#[derive(Debug, Clone)]
pub struct StreakTracker {
    streaks: HashMap<Uuid, u32>,
    cap: u32,
}

impl StreakTracker {
    pub fn new(cap: u32) -> Self {
        Self {
            streaks: HashMap::new(),
            cap,
        }
    }

    /// Seed from history: the trailing run of consecutive worked days
    /// ending the day before the range starts
    pub fn seed_from_history(&mut self, history: &[Schedule], range_start: NaiveDate) {
        let mut dates_by_analyst: HashMap<Uuid, HashSet<NaiveDate>> = HashMap::new();
        for s in history {
            if s.date < range_start {
                dates_by_analyst.entry(s.analyst_id).or_default().insert(s.date);
            }
        }

        for (analyst, dates) in dates_by_analyst {
            let mut streak = 0u32;
            let mut cursor = range_start.pred_opt();
            while let Some(day) = cursor {
                if dates.contains(&day) {
                    streak += 1;
                    cursor = day.pred_opt();
                } else {
                    break;
                }
            }
            if streak > 0 {
                self.streaks.insert(analyst, streak);
            }
        }
    }

    pub fn current(&self, analyst_id: Uuid) -> u32 {
        self.streaks.get(&analyst_id).copied().unwrap_or(0)
    }

    /// True iff the analyst has reached the maximum consecutive streak
    pub fn at_cap(&self, analyst_id: Uuid) -> bool {
        self.current(analyst_id) >= self.cap
    }

    pub fn cap(&self) -> u32 {
        self.cap
    }

    /// Close out a processed day: increment workers, reset the rest
    pub fn close_day<I>(&mut self, worked: &HashSet<Uuid>, roster: I)
    where
        I: IntoIterator<Item = Uuid>,
    {
        for analyst in roster {
            if worked.contains(&analyst) {
                *self.streaks.entry(analyst).or_insert(0) += 1;
            } else {
                self.streaks.remove(&analyst);
            }
        }
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
    fn test_fresh_tracker_reports_zero() {
        let tracker = StreakTracker::new(5);
        assert_eq!(tracker.current(Uuid::new_v4()), 0);
        assert!(!tracker.at_cap(Uuid::new_v4()));
    }

    #[test]
    fn test_close_day_increments_and_resets() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut tracker = StreakTracker::new(5);

        let worked: HashSet<Uuid> = [a].into_iter().collect();
        tracker.close_day(&worked, [a, b]);
        tracker.close_day(&worked, [a, b]);
        assert_eq!(tracker.current(a), 2);
        assert_eq!(tracker.current(b), 0);

        let rested: HashSet<Uuid> = HashSet::new();
        tracker.close_day(&rested, [a, b]);
        assert_eq!(tracker.current(a), 0);
    }

    #[test]
    fn test_cap_detection() {
        let a = Uuid::new_v4();
        let mut tracker = StreakTracker::new(3);
        let worked: HashSet<Uuid> = [a].into_iter().collect();
        for _ in 0..3 {
            tracker.close_day(&worked, [a]);
        }
        assert!(tracker.at_cap(a));
    }

    #[test]
    fn test_seed_from_trailing_history() {
        let a = Uuid::new_v4();
        let region = Uuid::new_v4();
        // Worked Jan 29-31; range starts Feb 1, so the trailing streak is 3
        let history: Vec<Schedule> = (29..=31)
            .map(|d| Schedule::new(a, region, date(2026, 1, d), "AM", ScheduleKind::Imported))
            .collect();
        let mut tracker = StreakTracker::new(5);
        tracker.seed_from_history(&history, date(2026, 2, 1));
        assert_eq!(tracker.current(a), 3);
    }

    #[test]
    fn test_seed_ignores_broken_runs() {
        let a = Uuid::new_v4();
        let region = Uuid::new_v4();
        // Gap on Jan 31 breaks the run; nothing trails into Feb 1
        let history = vec![
            Schedule::new(a, region, date(2026, 1, 29), "AM", ScheduleKind::Imported),
            Schedule::new(a, region, date(2026, 1, 30), "AM", ScheduleKind::Imported),
        ];
        let mut tracker = StreakTracker::new(5);
        tracker.seed_from_history(&history, date(2026, 2, 1));
        assert_eq!(tracker.current(a), 0);
    }
}
