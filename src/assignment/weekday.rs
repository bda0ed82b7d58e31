//! Per-weekday shift assignment
//!
//! Each weekday is processed shift by shift. The candidate pool is the
//! set of analysts whose affiliation resolves to the shift; absences,
//! blackouts, streak caps, and pattern off-days remove candidates, and the
//! AM→PM rotation plan redirects the remainder where it applies.

use chrono::NaiveDate;
use tracing::debug;

use crate::availability::AbsenceIndex;
use crate::catalog::ShiftCatalog;
use crate::constraints::ConstraintEngine;
use crate::models::{Analyst, Schedule, ScheduleKind, ShiftDefinition};
use crate::rotation::{AmToPmPlan, RotationManager};

use super::streak::StreakTracker;

/// Assign one (weekday, shift) pair
///
/// Candidates already rotated away by the AM→PM plan emit with the latest
/// shift's name and the rotation provenance tag; everyone else emits a
/// plain NEW row for the shift itself.
#[allow(clippy::too_many_arguments)]
pub fn assign_weekday_shift(
    date: NaiveDate,
    shift: &ShiftDefinition,
    candidates: &[&Analyst],
    manager: &RotationManager,
    am_to_pm: &AmToPmPlan,
    catalog: &ShiftCatalog,
    constraints: &ConstraintEngine,
    absences: &AbsenceIndex,
    streaks: &StreakTracker,
) -> Vec<Schedule> {
    let mut produced = Vec::new();
    let is_am_shift = shift.name == catalog.am().name;

    for analyst in candidates {
        if absences.is_absent(analyst.id, date) {
            continue;
        }
        if constraints.is_blackout(date, analyst.id) {
            continue;
        }
        if streaks.at_cap(analyst.id) {
            debug!(analyst = %analyst.id, %date, "skipping analyst at streak cap");
            continue;
        }
        if !manager.should_work(analyst.id, date) {
            continue;
        }

        let schedule = if is_am_shift && am_to_pm.is_rotated(analyst.id, date) {
            Schedule::new(
                analyst.id,
                analyst.region_id,
                date,
                catalog.pm().name.clone(),
                ScheduleKind::AmToPmRotation,
            )
        } else {
            Schedule::new(
                analyst.id,
                analyst.region_id,
                date,
                shift.name.clone(),
                ScheduleKind::New,
            )
        };
        produced.push(schedule);
    }

    produced
}
