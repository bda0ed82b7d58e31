//! Constraint evaluation engine
//!
//! Two duties, at two points in the pipeline:
//!
//! - **Pre-assignment filtering**: blackout dates (global or analyst
//!   scoped) exclude candidates before anything is assigned.
//! - **Post-generation validation**: the full constraint set is evaluated
//!   against a candidate schedule set, producing hard/soft violations with
//!   severity, affected rows, and a suggested fix, plus a weighted score.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use uuid::Uuid;

use crate::models::{ConstraintKind, Schedule, SchedulingConstraint};
use crate::utils::{format_date_range, parse_first_integer};

/// Default MAX_SCREENER_DAYS threshold when the description has no number
pub const DEFAULT_MAX_SCREENER_DAYS: i64 = 10;
/// Default MIN_SCREENER_DAYS threshold when the description has no number
pub const DEFAULT_MIN_SCREENER_DAYS: i64 = 2;

// ============================================================================
// Violation Types
// ============================================================================

/// Whether a violated constraint was hard or soft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Hardness {
    Hard,
    Soft,
}

/// Severity of a constraint violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Penalty weight used by the validation score
    pub fn weight(&self) -> f64 {
        match self {
            Self::Critical => 1.0,
            Self::High => 0.7,
            Self::Medium => 0.4,
            Self::Low => 0.1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single constraint violation against a candidate schedule set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub constraint_id: Uuid,
    pub constraint_kind: ConstraintKind,
    pub hardness: Hardness,
    pub severity: Severity,
    /// Schedule ids affected by this violation
    pub affected: Vec<Uuid>,
    pub message: String,
    pub suggested_fix: String,
}

/// Result of validating a schedule set against all constraints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintValidation {
    pub violations: Vec<ConstraintViolation>,
    /// `max(0, 1 − Σ severity_weight × |affected| / |total|)`
    pub score: f64,
    /// False iff any hard violation exists, regardless of score
    pub is_valid: bool,
}

impl ConstraintValidation {
    pub fn hard_violations(&self) -> impl Iterator<Item = &ConstraintViolation> {
        self.violations
            .iter()
            .filter(|v| v.hardness == Hardness::Hard)
    }
}

// ============================================================================
// Constraint Engine
// ============================================================================

/// Evaluates scheduling constraints before and after assignment
#[derive(Debug, Clone, Default)]
pub struct ConstraintEngine {
    constraints: Vec<SchedulingConstraint>,
}

impl ConstraintEngine {
    pub fn new(constraints: Vec<SchedulingConstraint>) -> Self {
        Self { constraints }
    }

    pub fn constraints(&self) -> &[SchedulingConstraint] {
        &self.constraints
    }

    /// True iff a global blackout covers the date
    pub fn is_global_blackout(&self, date: NaiveDate) -> bool {
        self.constraints.iter().any(|c| {
            c.kind == ConstraintKind::BlackoutDate && c.analyst_id.is_none() && c.covers(date)
        })
    }

    /// True iff any blackout (global or scoped to the analyst) covers the date
    pub fn is_blackout(&self, date: NaiveDate, analyst_id: Uuid) -> bool {
        self.constraints.iter().any(|c| {
            c.kind == ConstraintKind::BlackoutDate && c.applies_to(analyst_id) && c.covers(date)
        })
    }

    /// Validate a candidate schedule set against every active constraint
    pub fn validate(&self, schedules: &[Schedule]) -> ConstraintValidation {
        let mut violations = Vec::new();
        let total = schedules.len().max(1);

        for constraint in self.constraints.iter().filter(|c| c.active) {
            match constraint.kind {
                ConstraintKind::BlackoutDate => {
                    self.check_blackout(constraint, schedules, &mut violations);
                }
                ConstraintKind::MaxScreenerDays => {
                    self.check_screener_bound(constraint, schedules, &mut violations, true);
                }
                ConstraintKind::MinScreenerDays => {
                    self.check_screener_bound(constraint, schedules, &mut violations, false);
                }
                ConstraintKind::PreferredScreener => {
                    self.check_preferred_screener(constraint, schedules, &mut violations);
                }
                ConstraintKind::UnavailableScreener => {
                    self.check_unavailable_screener(constraint, schedules, &mut violations);
                }
            }
        }

        let penalty: f64 = violations
            .iter()
            .map(|v| v.severity.weight() * (v.affected.len() as f64 / total as f64))
            .sum();
        let score = (1.0 - penalty).max(0.0);
        let is_valid = !violations.iter().any(|v| v.hardness == Hardness::Hard);

        ConstraintValidation {
            violations,
            score,
            is_valid,
        }
    }

    fn check_blackout(
        &self,
        constraint: &SchedulingConstraint,
        schedules: &[Schedule],
        violations: &mut Vec<ConstraintViolation>,
    ) {
        let affected: Vec<Uuid> = schedules
            .iter()
            .filter(|s| constraint.covers(s.date) && constraint.applies_to(s.analyst_id))
            .map(|s| s.id)
            .collect();

        if !affected.is_empty() {
            violations.push(ConstraintViolation {
                constraint_id: constraint.id,
                constraint_kind: ConstraintKind::BlackoutDate,
                hardness: Hardness::Hard,
                severity: Severity::Critical,
                message: format!(
                    "{} schedule(s) fall inside blackout {}",
                    affected.len(),
                    format_date_range(constraint.start_date, constraint.end_date)
                ),
                suggested_fix: String::from("remove the affected assignments or end the blackout"),
                affected,
            });
        }
    }

    /// Screener-count bound per analyst over the constraint window
    fn check_screener_bound(
        &self,
        constraint: &SchedulingConstraint,
        schedules: &[Schedule],
        violations: &mut Vec<ConstraintViolation>,
        is_max: bool,
    ) {
        let threshold = parse_first_integer(&constraint.description).unwrap_or(if is_max {
            DEFAULT_MAX_SCREENER_DAYS
        } else {
            DEFAULT_MIN_SCREENER_DAYS
        });

        // Scoped constraints check one analyst; global ones check everyone
        // present in the schedule set
        let mut screener_days: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        let mut seen_analysts: BTreeSet<Uuid> = BTreeSet::new();
        for s in schedules {
            if !constraint.applies_to(s.analyst_id) || !constraint.covers(s.date) {
                continue;
            }
            seen_analysts.insert(s.analyst_id);
            if s.is_screener {
                screener_days.entry(s.analyst_id).or_default().push(s.id);
            }
        }

        for &analyst_id in seen_analysts.iter() {
            let days = screener_days.get(&analyst_id).cloned().unwrap_or_default();
            let count = days.len() as i64;
            let violated = if is_max {
                count > threshold
            } else {
                count < threshold
            };
            if !violated {
                continue;
            }

            let (severity, message, fix) = if is_max {
                (
                    Severity::High,
                    format!("analyst {analyst_id} has {count} screener days, above the maximum of {threshold}"),
                    String::from("redistribute screener duty to analysts below the cap"),
                )
            } else {
                (
                    Severity::Medium,
                    format!("analyst {analyst_id} has {count} screener days, below the minimum of {threshold}"),
                    String::from("assign additional screener days within the window"),
                )
            };

            violations.push(ConstraintViolation {
                constraint_id: constraint.id,
                constraint_kind: constraint.kind,
                hardness: Hardness::Soft,
                severity,
                affected: days,
                message,
                suggested_fix: fix,
            });
        }
    }

    fn check_preferred_screener(
        &self,
        constraint: &SchedulingConstraint,
        schedules: &[Schedule],
        violations: &mut Vec<ConstraintViolation>,
    ) {
        let Some(analyst_id) = constraint.analyst_id else {
            return;
        };
        let affected: Vec<Uuid> = schedules
            .iter()
            .filter(|s| s.analyst_id == analyst_id && constraint.covers(s.date) && !s.is_screener)
            .map(|s| s.id)
            .collect();

        if !affected.is_empty() {
            violations.push(ConstraintViolation {
                constraint_id: constraint.id,
                constraint_kind: ConstraintKind::PreferredScreener,
                hardness: Hardness::Soft,
                severity: Severity::Low,
                message: format!(
                    "preferred screener {analyst_id} has {} non-screener day(s) in window",
                    affected.len()
                ),
                suggested_fix: String::from("prefer this analyst when designating screeners"),
                affected,
            });
        }
    }

    fn check_unavailable_screener(
        &self,
        constraint: &SchedulingConstraint,
        schedules: &[Schedule],
        violations: &mut Vec<ConstraintViolation>,
    ) {
        let Some(analyst_id) = constraint.analyst_id else {
            return;
        };
        let affected: Vec<Uuid> = schedules
            .iter()
            .filter(|s| s.analyst_id == analyst_id && constraint.covers(s.date) && s.is_screener)
            .map(|s| s.id)
            .collect();

        if !affected.is_empty() {
            violations.push(ConstraintViolation {
                constraint_id: constraint.id,
                constraint_kind: ConstraintKind::UnavailableScreener,
                hardness: Hardness::Soft,
                severity: Severity::Medium,
                message: format!(
                    "unavailable screener {analyst_id} is designated screener on {} day(s)",
                    affected.len()
                ),
                suggested_fix: String::from("move screener duty to another analyst on those days"),
                affected,
            });
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

    fn schedule(analyst: Uuid, region: Uuid, d: NaiveDate, screener: bool) -> Schedule {
        let mut s = Schedule::new(analyst, region, d, "AM", ScheduleKind::New);
        s.is_screener = screener;
        s
    }

    #[test]
    fn test_global_blackout_lookup() {
        let engine = ConstraintEngine::new(vec![SchedulingConstraint::new(
            ConstraintKind::BlackoutDate,
            date(2026, 2, 10),
            date(2026, 2, 10),
            "maintenance",
        )]);
        assert!(engine.is_global_blackout(date(2026, 2, 10)));
        assert!(!engine.is_global_blackout(date(2026, 2, 11)));
        assert!(engine.is_blackout(date(2026, 2, 10), Uuid::new_v4()));
    }

    #[test]
    fn test_scoped_blackout_only_blocks_named_analyst() {
        let analyst = Uuid::new_v4();
        let other = Uuid::new_v4();
        let engine = ConstraintEngine::new(vec![SchedulingConstraint::new(
            ConstraintKind::BlackoutDate,
            date(2026, 2, 10),
            date(2026, 2, 12),
            "",
        )
        .for_analyst(analyst)]);

        assert!(engine.is_blackout(date(2026, 2, 11), analyst));
        assert!(!engine.is_blackout(date(2026, 2, 11), other));
        assert!(!engine.is_global_blackout(date(2026, 2, 11)));
    }

    #[test]
    fn test_blackout_violation_is_hard_and_invalidates() {
        let analyst = Uuid::new_v4();
        let region = Uuid::new_v4();
        let engine = ConstraintEngine::new(vec![SchedulingConstraint::new(
            ConstraintKind::BlackoutDate,
            date(2026, 2, 10),
            date(2026, 2, 10),
            "",
        )]);

        let schedules = vec![schedule(analyst, region, date(2026, 2, 10), false)];
        let result = engine.validate(&schedules);
        assert!(!result.is_valid);
        assert_eq!(result.hard_violations().count(), 1);
        assert_eq!(result.violations[0].severity, Severity::Critical);
    }

    #[test]
    fn test_max_screener_days_threshold_from_description() {
        let analyst = Uuid::new_v4();
        let region = Uuid::new_v4();
        let engine = ConstraintEngine::new(vec![SchedulingConstraint::new(
            ConstraintKind::MaxScreenerDays,
            date(2026, 2, 1),
            date(2026, 2, 28),
            "cap at 2 screener days",
        )
        .for_analyst(analyst)]);

        let schedules: Vec<Schedule> = (1..=3)
            .map(|d| schedule(analyst, region, date(2026, 2, d), true))
            .collect();

        let result = engine.validate(&schedules);
        assert!(result.is_valid); // soft violation only
        assert_eq!(result.violations.len(), 1);
        let v = &result.violations[0];
        assert_eq!(v.severity, Severity::High);
        assert_eq!(v.hardness, Hardness::Soft);
        assert_eq!(v.affected.len(), 3);
    }

    #[test]
    fn test_min_screener_days_uses_default_threshold() {
        let analyst = Uuid::new_v4();
        let region = Uuid::new_v4();
        let engine = ConstraintEngine::new(vec![SchedulingConstraint::new(
            ConstraintKind::MinScreenerDays,
            date(2026, 2, 1),
            date(2026, 2, 28),
            "keep everyone sharp",
        )
        .for_analyst(analyst)]);

        // One screener day, below the default minimum of 2
        let schedules = vec![
            schedule(analyst, region, date(2026, 2, 2), true),
            schedule(analyst, region, date(2026, 2, 3), false),
        ];
        let result = engine.validate(&schedules);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].severity, Severity::Medium);
    }

    #[test]
    fn test_preferred_screener_flags_non_screener_days() {
        let analyst = Uuid::new_v4();
        let region = Uuid::new_v4();
        let engine = ConstraintEngine::new(vec![SchedulingConstraint::new(
            ConstraintKind::PreferredScreener,
            date(2026, 2, 1),
            date(2026, 2, 28),
            "",
        )
        .for_analyst(analyst)]);

        let schedules = vec![
            schedule(analyst, region, date(2026, 2, 2), false),
            schedule(analyst, region, date(2026, 2, 3), true),
        ];
        let result = engine.validate(&schedules);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].severity, Severity::Low);
        assert_eq!(result.violations[0].affected.len(), 1);
    }

    #[test]
    fn test_unavailable_screener_flags_screener_days() {
        let analyst = Uuid::new_v4();
        let region = Uuid::new_v4();
        let engine = ConstraintEngine::new(vec![SchedulingConstraint::new(
            ConstraintKind::UnavailableScreener,
            date(2026, 2, 1),
            date(2026, 2, 28),
            "",
        )
        .for_analyst(analyst)]);

        let schedules = vec![schedule(analyst, region, date(2026, 2, 2), true)];
        let result = engine.validate(&schedules);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].severity, Severity::Medium);
    }

    #[test]
    fn test_score_decreases_with_severity_and_spread() {
        let analyst = Uuid::new_v4();
        let region = Uuid::new_v4();
        let engine = ConstraintEngine::new(vec![SchedulingConstraint::new(
            ConstraintKind::BlackoutDate,
            date(2026, 2, 1),
            date(2026, 2, 28),
            "",
        )]);

        // Every schedule inside the blackout: penalty 1.0 x 1.0 -> score 0
        let schedules: Vec<Schedule> = (1..=4)
            .map(|d| schedule(analyst, region, date(2026, 2, d), false))
            .collect();
        let result = engine.validate(&schedules);
        assert_eq!(result.score, 0.0);
        assert!(!result.is_valid);
    }

    #[test]
    fn test_clean_set_scores_one() {
        let engine = ConstraintEngine::new(vec![]);
        let result = engine.validate(&[]);
        assert_eq!(result.score, 1.0);
        assert!(result.is_valid);
        assert!(result.violations.is_empty());
    }
}
