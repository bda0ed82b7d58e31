//! Staggered weekend rotation
//!
//! This module owns the weekend rotation state machine and its
//! supporting pieces:
//!
//! - [`state`] - Snapshot types with versioned compare-and-set persistence
//! - [`continuity`] - Minimum-gap enforcement between weekend duties
//! - [`manager`] - The staggered two-slot pool and AM→PM rotation planning

pub mod continuity;
pub mod manager;
pub mod state;

pub use continuity::PatternContinuity;
pub use manager::{AmToPmPlan, RotationManager, SlotKind};
pub use state::{RotationSlot, RotationState, PATTERN_WEEK_DAYS, SLOT_STAGGER_DAYS};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::Schedule;

/// Per-analyst weekend burden over a reporting range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationStatistics {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Weekend days worked per analyst within the range
    pub weekend_days: HashMap<Uuid, u32>,
    pub total_weekend_days: u32,
    /// Cycle generation of the state at report time, when known
    pub cycle_generation: Option<u32>,
}

impl RotationStatistics {
    /// Compute weekend-burden statistics from a schedule set
    pub fn from_schedules(
        schedules: &[Schedule],
        start: NaiveDate,
        end: NaiveDate,
        state: Option<&RotationState>,
    ) -> Self {
        let mut weekend_days: HashMap<Uuid, u32> = HashMap::new();
        let mut total = 0u32;
        for s in schedules {
            if s.date < start || s.date > end {
                continue;
            }
            if matches!(s.date.weekday(), Weekday::Sat | Weekday::Sun) {
                *weekend_days.entry(s.analyst_id).or_insert(0) += 1;
                total += 1;
            }
        }
        Self {
            start,
            end,
            weekend_days,
            total_weekend_days: total,
            cycle_generation: state.map(|s| s.cycle_generation),
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
    fn test_statistics_count_weekend_days_only() {
        let region = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let schedules = vec![
            Schedule::new(a, region, date(2026, 2, 1), "AM", ScheduleKind::New), // Sunday
            Schedule::new(a, region, date(2026, 2, 2), "AM", ScheduleKind::New), // Monday
            Schedule::new(b, region, date(2026, 2, 7), "AM", ScheduleKind::New), // Saturday
        ];
        let stats =
            RotationStatistics::from_schedules(&schedules, date(2026, 2, 1), date(2026, 2, 14), None);
        assert_eq!(stats.weekend_days.get(&a), Some(&1));
        assert_eq!(stats.weekend_days.get(&b), Some(&1));
        assert_eq!(stats.total_weekend_days, 2);
    }

    #[test]
    fn test_statistics_respect_range_bounds() {
        let region = Uuid::new_v4();
        let a = Uuid::new_v4();
        let schedules = vec![
            Schedule::new(a, region, date(2026, 1, 25), "AM", ScheduleKind::New), // before range
            Schedule::new(a, region, date(2026, 2, 1), "AM", ScheduleKind::New),
        ];
        let stats =
            RotationStatistics::from_schedules(&schedules, date(2026, 2, 1), date(2026, 2, 7), None);
        assert_eq!(stats.total_weekend_days, 1);
    }
}
