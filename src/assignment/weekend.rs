//! Per-weekend-day assignment
//!
//! For each weekend date the rotation plan names one analyst per shift
//! type. When that analyst is unavailable, the available pool is consulted
//! in service order and the first eligible substitute inherits the
//! remaining portion of the week's pattern. An absence cascade that leaves
//! nobody eligible surfaces as an uncovered day, never as a silent skip.

use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::availability::AbsenceIndex;
use crate::catalog::ShiftCatalog;
use crate::constraints::ConstraintEngine;
use crate::models::{Analyst, Schedule, ScheduleKind, WorkPattern};
use crate::rotation::{PatternContinuity, RotationManager};

use super::streak::StreakTracker;

/// What happened for one (weekend date, shift type) pair
#[derive(Debug, Clone)]
pub enum WeekendOutcome {
    /// A schedule was produced
    Assigned {
        schedule: Schedule,
        pattern: WorkPattern,
        substituted: bool,
    },
    /// A global blackout blocks the whole date
    Blocked,
    /// No eligible analyst remained after the substitution cascade
    Uncovered,
}

/// Assign one weekend date for one shift's rotation
#[allow(clippy::too_many_arguments)]
pub fn assign_weekend_day(
    date: NaiveDate,
    manager: &mut RotationManager,
    analysts: &HashMap<Uuid, &Analyst>,
    catalog: &ShiftCatalog,
    constraints: &ConstraintEngine,
    absences: &AbsenceIndex,
    continuity: &mut PatternContinuity,
    streaks: &StreakTracker,
) -> WeekendOutcome {
    if constraints.is_global_blackout(date) {
        debug!(%date, "weekend date under global blackout");
        return WeekendOutcome::Blocked;
    }

    let Some((planned, pattern)) = manager.planned_weekend_analyst(date) else {
        return WeekendOutcome::Uncovered;
    };

    let eligible = |id: Uuid| -> bool {
        !absences.is_absent(id, date)
            && !streaks.at_cap(id)
            && !constraints.is_blackout(date, id)
    };

    let (assigned, substituted) = if eligible(planned) {
        (planned, false)
    } else {
        // Substitutes additionally need the weekend gap satisfied; the
        // planned analyst's own turn comes from the rotation itself
        let substitute = manager
            .substitution_candidates()
            .into_iter()
            .find(|&id| eligible(id) && continuity.gap_ok(id, date));
        match substitute {
            Some(id) => {
                manager.substitute_weekend(date, id);
                (id, true)
            }
            None => {
                warn!(%date, shift = manager.shift_type(), "no eligible weekend analyst");
                return WeekendOutcome::Uncovered;
            }
        }
    };

    let Some(analyst) = analysts.get(&assigned) else {
        return WeekendOutcome::Uncovered;
    };
    let shift_name = catalog
        .shift_for(analyst)
        .map(|s| s.name.clone())
        .unwrap_or_else(|| catalog.am().name.clone());

    continuity.record(assigned, date, pattern);

    let schedule = Schedule::new(assigned, analyst.region_id, date, shift_name, ScheduleKind::New);

    WeekendOutcome::Assigned {
        schedule,
        pattern,
        substituted,
    }
}
