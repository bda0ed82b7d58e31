//! Schedule generation orchestrator
//!
//! Composes the calendar, catalog, indices, rotation, assignment,
//! screener, ledger, and fairness components across a date range. The
//! [`Generator`] core is fully synchronous and deterministic: async I/O
//! happens only at the boundary, in [`service::ScheduleEngine`], which
//! loads inputs, runs the generator, and persists outputs.
//!
//! # Flow
//!
//! ```text
//! validate context
//!     │
//!     ▼
//! build indices (absence, constraints, holidays, continuity, streaks)
//!     │
//!     ▼
//! init rotation managers per shift + AM→PM plan + weekend debt seed
//!     │
//!     ▼
//! walk dates ──► weekend / weekday assignment ──► weekday screener pass
//!     │
//!     ▼
//! overwrites + conflicts + fairness + soft validation + run log
//! ```

pub mod service;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assignment::{assign_weekday_shift, assign_weekend_day, StreakTracker, WeekendOutcome};
use crate::availability::AbsenceIndex;
use crate::calendar::Calendar;
use crate::catalog::ShiftCatalog;
use crate::compoff::{CompOffLedger, CompOffTransaction};
use crate::config::{EngineConfig, OptimizationStrategy};
use crate::constraints::{ConstraintEngine, ConstraintValidation};
use crate::error::{EngineError, EngineResult};
use crate::fairness::FairnessReport;
use crate::models::{
    Analyst, GenerationLog, Holiday, Region, RunStatus, Schedule, SchedulingConstraint,
    ShiftDefinition, Vacation,
};
use crate::rotation::{PatternContinuity, RotationManager, RotationState};
use crate::screener::ScreenerTracker;

/// Name recorded on rotation state and run logs produced by this engine
pub const ALGORITHM_NAME: &str = "staggered-core";

// ============================================================================
// Generation Context
// ============================================================================

/// Everything a generation run needs, loaded up front
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub region: Region,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub performer: String,
    pub analysts: Vec<Analyst>,
    pub shift_definitions: Vec<ShiftDefinition>,
    pub existing_schedules: Vec<Schedule>,
    pub vacations: Vec<Vacation>,
    /// Ad-hoc absence intervals outside the vacation system
    pub absences: Vec<(Uuid, NaiveDate, NaiveDate)>,
    pub constraints: Vec<SchedulingConstraint>,
    pub holidays: Vec<Holiday>,
    /// Persisted rotation snapshots keyed by shift type
    pub rotation_states: HashMap<String, RotationState>,
    /// Ledger state at generation start
    pub ledger: CompOffLedger,
    pub config: EngineConfig,
}

/// Cooperative cancellation handle checked at every date boundary
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Why a (date, shift) pair has no coverage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    Blackout,
    NoCoverage,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blackout => "BLACKOUT",
            Self::NoCoverage => "NO_COVERAGE",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A day-shift pair the generation could not cover
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageConflict {
    pub date: NaiveDate,
    pub shift_type: String,
    pub kind: ConflictKind,
    pub message: String,
}

/// A proposed row that differs from an existing one for (analyst, date)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleOverwrite {
    pub existing_id: Uuid,
    pub proposed_id: Uuid,
    pub analyst_id: Uuid,
    pub date: NaiveDate,
    pub existing_shift_type: String,
    pub proposed_shift_type: String,
    pub existing_is_screener: bool,
    pub proposed_is_screener: bool,
}

/// Timing and volume counters for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub execution_time_ms: u64,
    pub dates_processed: usize,
    pub schedules_generated: usize,
    pub optimization_iterations: u32,
}

/// Complete output of a generation run
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub run_id: Uuid,
    pub proposed_schedules: Vec<Schedule>,
    pub overwrites: Vec<ScheduleOverwrite>,
    pub conflicts: Vec<CoverageConflict>,
    pub fairness: FairnessReport,
    pub validation: ConstraintValidation,
    /// Final rotation snapshots, one per shift type, versions bumped
    pub rotation_states: Vec<RotationState>,
    /// Ledger after the run's automatic credits
    pub ledger: CompOffLedger,
    /// Transactions appended by this run
    pub new_transactions: Vec<CompOffTransaction>,
    pub performance: PerformanceMetrics,
    pub log: GenerationLog,
}

// ============================================================================
// Generator
// ============================================================================

/// Deterministic schedule generator
#[derive(Debug, Clone, Default)]
pub struct Generator;

impl Generator {
    pub fn new() -> Self {
        Self
    }

    /// Generate schedules for the context's date range
    ///
    /// All-or-nothing: cancellation or a deadline overrun aborts without
    /// producing a result; nothing is persisted by this call.
    pub fn generate(
        &self,
        ctx: &GenerationContext,
        cancel: Option<&CancellationFlag>,
    ) -> EngineResult<GenerationResult> {
        let started = Instant::now();
        let run_id = Uuid::new_v4();

        self.validate_context(ctx)?;
        ctx.config
            .validate()
            .map_err(EngineError::config)?;

        let calendar = Calendar::new(ctx.region.timezone);
        let catalog = ShiftCatalog::new(ctx.region.id, ctx.shift_definitions.clone())?;

        let active: Vec<&Analyst> = ctx
            .analysts
            .iter()
            .filter(|a| a.active && a.region_id == ctx.region.id)
            .collect();
        if active.is_empty() {
            return Err(EngineError::config("analyst roster is empty"));
        }
        let analysts_by_id: HashMap<Uuid, &Analyst> =
            active.iter().map(|a| (a.id, *a)).collect();

        info!(
            region = %ctx.region.name,
            start = %ctx.start,
            end = %ctx.end,
            roster = active.len(),
            "generation started"
        );

        // Indices
        let absences = AbsenceIndex::build(&ctx.vacations, &ctx.absences);
        let constraint_engine = ConstraintEngine::new(ctx.constraints.clone());
        let holidays: HashSet<NaiveDate> = ctx
            .holidays
            .iter()
            .filter(|h| h.region_id == ctx.region.id)
            .map(|h| h.date)
            .collect();

        let mut continuity = PatternContinuity::new(ctx.config.min_weekend_gap_days);
        continuity.seed_from_history(&ctx.existing_schedules);

        let mut streaks = StreakTracker::new(ctx.config.max_consecutive_work_days);
        streaks.seed_from_history(&ctx.existing_schedules, ctx.start);

        let mut screener = ScreenerTracker::new(ctx.config.screener_assignment_strategy);
        screener.seed_from_history(&ctx.existing_schedules);

        let mut ledger = ctx.ledger.clone();
        let transactions_before = ledger.all_transactions().len();

        // Candidates grouped by resolved shift name, name-ordered for
        // deterministic iteration
        let mut candidates: BTreeMap<String, Vec<&Analyst>> = BTreeMap::new();
        for analyst in &active {
            match catalog.shift_for(analyst) {
                Some(def) => candidates
                    .entry(def.name.clone())
                    .or_default()
                    .push(*analyst),
                None => {
                    return Err(EngineError::config(format!(
                        "analyst {} has unknown shift affiliation '{}'",
                        analyst.display_name, analyst.shift_affiliation
                    )))
                }
            }
        }
        for pool in candidates.values_mut() {
            pool.sort_by(|a, b| a.display_name.cmp(&b.display_name).then(a.id.cmp(&b.id)));
        }

        // Rotation managers, one per shift with candidates
        let week_start = calendar.sunday_of_week(ctx.start);
        let mut managers: BTreeMap<String, RotationManager> = BTreeMap::new();
        for (shift_name, pool) in &candidates {
            let manager = match ctx.rotation_states.get(shift_name) {
                Some(state) => RotationManager::from_state(state.clone(), pool),
                None => RotationManager::initialize(
                    ALGORITHM_NAME,
                    shift_name.clone(),
                    pool,
                    &ctx.existing_schedules,
                    week_start,
                    ctx.config.randomization_factor,
                ),
            };
            managers.insert(shift_name.clone(), manager);
        }

        // AM→PM plan: only meaningful for multi-shift regions, and only
        // when the latest shift has no roster of its own
        let am_name = catalog.am().name.clone();
        let pm_name = catalog.pm().name.clone();
        let am_to_pm = if catalog.is_multi_shift() {
            let pm_headcount = candidates.get(&pm_name).map(|p| p.len()).unwrap_or(0);
            let target = usize::from(pm_headcount == 0);
            let source: Vec<&Analyst> = candidates.get(&am_name).cloned().unwrap_or_default();
            match managers.get(&am_name) {
                Some(manager) if target > 0 => {
                    // Plan on a clone: planning advances slot tenures
                    // through the window, which must not touch the state
                    // the walk is about to drive
                    let mut planner = manager.clone();
                    planner.plan_am_to_pm_rotation(
                        ctx.start,
                        ctx.end,
                        &source,
                        target,
                        &ctx.existing_schedules,
                        &absences,
                    )
                }
                _ => Default::default(),
            }
        } else {
            Default::default()
        };

        // Seed weekend screener debt from the rotation plan up front, so
        // weekday screener picks already account for the range's weekend
        // burden even when the weekdays come first. Planning runs on
        // clones; the walk drives the real slot state.
        for manager in managers.values() {
            let mut planner = manager.clone();
            for date in calendar.walk_days(ctx.start, ctx.end) {
                if calendar.is_weekend(date) {
                    if let Some((analyst, _)) = planner.planned_weekend_analyst(date) {
                        screener.add_weekend_debt(analyst);
                    }
                }
            }
        }

        // Date walk
        let mut proposed: Vec<Schedule> = Vec::new();
        let mut conflicts: Vec<CoverageConflict> = Vec::new();
        let mut dates_processed = 0usize;

        for date in calendar.walk_days(ctx.start, ctx.end) {
            if let Some(flag) = cancel {
                if flag.is_cancelled() {
                    return Err(EngineError::cancelled(format!(
                        "cancelled after {dates_processed} dates"
                    )));
                }
            }
            if let Some(deadline_ms) = ctx.config.soft_deadline_ms {
                if started.elapsed().as_millis() as u64 > deadline_ms {
                    return Err(EngineError::cancelled(format!(
                        "soft deadline of {deadline_ms}ms exceeded after {dates_processed} dates"
                    )));
                }
            }

            // Slot tenures must be current before pattern membership is
            // consulted, on weekdays as much as weekends
            for manager in managers.values_mut() {
                manager.advance_to(date);
            }

            let is_holiday = holidays.contains(&date);
            let mut day_rows: Vec<Schedule> = Vec::new();

            if calendar.is_weekend(date) {
                for (shift_name, manager) in managers.iter_mut() {
                    let outcome = assign_weekend_day(
                        date,
                        manager,
                        &analysts_by_id,
                        &catalog,
                        &constraint_engine,
                        &absences,
                        &mut continuity,
                        &streaks,
                    );
                    match outcome {
                        WeekendOutcome::Assigned { schedule, .. } => {
                            ledger.credit_weekend_day(schedule.analyst_id, is_holiday)?;
                            day_rows.push(schedule);
                        }
                        WeekendOutcome::Blocked => conflicts.push(CoverageConflict {
                            date,
                            shift_type: shift_name.clone(),
                            kind: ConflictKind::Blackout,
                            message: format!("{date} is under a global blackout"),
                        }),
                        WeekendOutcome::Uncovered => conflicts.push(CoverageConflict {
                            date,
                            shift_type: shift_name.clone(),
                            kind: ConflictKind::NoCoverage,
                            message: format!(
                                "no eligible analyst for {shift_name} on {date}"
                            ),
                        }),
                    }
                }
            } else if constraint_engine.is_global_blackout(date) {
                for shift in catalog.shifts() {
                    conflicts.push(CoverageConflict {
                        date,
                        shift_type: shift.name.clone(),
                        kind: ConflictKind::Blackout,
                        message: format!("{date} is under a global blackout"),
                    });
                }
            } else {
                for shift in catalog.shifts() {
                    let empty = Vec::new();
                    let pool = candidates.get(&shift.name).unwrap_or(&empty);
                    let manager = managers
                        .get(&shift.name)
                        .or_else(|| managers.values().next());
                    let Some(manager) = manager else { continue };
                    day_rows.extend(assign_weekday_shift(
                        date,
                        shift,
                        pool,
                        manager,
                        &am_to_pm,
                        &catalog,
                        &constraint_engine,
                        &absences,
                        &streaks,
                    ));
                }
                if is_holiday && ctx.config.holiday_comp_credit {
                    for row in &day_rows {
                        ledger.credit_weekend_day(row.analyst_id, true)?;
                    }
                }
            }

            // Screener designation per shift type present on the day.
            // Weekend rows are skipped: they carry their burden as debt
            // units from the plan pre-pass and stay non-screener.
            if !calendar.is_weekend(date) {
                let mut by_shift: BTreeMap<String, Vec<usize>> = BTreeMap::new();
                for (i, row) in day_rows.iter().enumerate() {
                    by_shift.entry(row.shift_type.clone()).or_default().push(i);
                }
                for (_, indices) in by_shift {
                    let mut pool: Vec<Uuid> =
                        indices.iter().map(|&i| day_rows[i].analyst_id).collect();
                    pool.sort();
                    pool.dedup();
                    if let Some(chosen) = screener.select(&pool, date) {
                        for &i in &indices {
                            if day_rows[i].analyst_id == chosen {
                                day_rows[i].is_screener = true;
                                break;
                            }
                        }
                    }
                }
            }

            // Close the day: streaks and workload
            let worked: HashSet<Uuid> = day_rows.iter().map(|r| r.analyst_id).collect();
            for id in &worked {
                screener.note_workload(*id);
            }
            streaks.close_day(&worked, analysts_by_id.keys().copied());

            proposed.extend(day_rows);
            dates_processed += 1;
        }

        // Missing-coverage sweep for pairs nothing claimed during the walk
        let covered: HashSet<(NaiveDate, &str)> = proposed
            .iter()
            .map(|s| (s.date, s.shift_type.as_str()))
            .collect();
        let conflicted: HashSet<(NaiveDate, String)> = conflicts
            .iter()
            .map(|c| (c.date, c.shift_type.clone()))
            .collect();
        for date in calendar.walk_days(ctx.start, ctx.end) {
            for shift in catalog.shifts() {
                let key = (date, shift.name.as_str());
                if !covered.contains(&key)
                    && !conflicted.contains(&(date, shift.name.clone()))
                {
                    conflicts.push(CoverageConflict {
                        date,
                        shift_type: shift.name.clone(),
                        kind: ConflictKind::NoCoverage,
                        message: format!("no schedule produced for {} on {date}", shift.name),
                    });
                }
            }
        }

        // Optional local optimization of screener seating
        let mut iterations_used = 0u32;
        if ctx.config.optimization_strategy == OptimizationStrategy::HillClimbing {
            iterations_used =
                rebalance_screeners(&mut proposed, ctx.config.effective_max_iterations());
        }

        // Post-processing
        let overwrites = compute_overwrites(&ctx.existing_schedules, &proposed);
        let roster_ids: Vec<Uuid> = active.iter().map(|a| a.id).collect();
        let fairness = FairnessReport::compute(&proposed, &roster_ids, &catalog, &calendar);
        let validation = constraint_engine.validate(&proposed);

        let rotation_states: Vec<RotationState> =
            managers.into_values().map(|m| m.into_state()).collect();
        let new_transactions: Vec<CompOffTransaction> =
            ledger.all_transactions()[transactions_before..].to_vec();
        ledger.verify_integrity()?;

        let execution_time_ms = started.elapsed().as_millis() as u64;
        let performance = PerformanceMetrics {
            execution_time_ms,
            dates_processed,
            schedules_generated: proposed.len(),
            optimization_iterations: iterations_used,
        };

        if !conflicts.is_empty() {
            warn!(count = conflicts.len(), "generation finished with conflicts");
        }
        info!(
            schedules = proposed.len(),
            conflicts = conflicts.len(),
            fairness = fairness.overall_score,
            elapsed_ms = execution_time_ms,
            "generation finished"
        );

        let log = GenerationLog {
            run_id,
            performer: ctx.performer.clone(),
            algorithm: ALGORITHM_NAME.to_string(),
            start: ctx.start,
            end: ctx.end,
            schedules_generated: proposed.len(),
            conflicts_detected: conflicts.len(),
            fairness_score: fairness.overall_score,
            execution_time_ms,
            status: RunStatus::Success,
            error_message: None,
            metadata: Some(serde_json::json!({
                "region": ctx.region.name,
                "roster_size": roster_ids.len(),
                "strategy": ctx.config.optimization_strategy.as_str(),
            })),
            created_at: chrono::Utc::now(),
        };

        Ok(GenerationResult {
            run_id,
            proposed_schedules: proposed,
            overwrites,
            conflicts,
            fairness,
            validation,
            rotation_states,
            ledger,
            new_transactions,
            performance,
            log,
        })
    }

    fn validate_context(&self, ctx: &GenerationContext) -> EngineResult<()> {
        if !ctx.region.active {
            return Err(EngineError::config(format!(
                "region {} is deactivated",
                ctx.region.name
            )));
        }
        if ctx.start > ctx.end {
            return Err(EngineError::config(format!(
                "start {} is after end {}",
                ctx.start, ctx.end
            )));
        }
        if ctx.shift_definitions.is_empty() {
            return Err(EngineError::config("shift catalog is empty"));
        }
        if ctx.analysts.is_empty() {
            return Err(EngineError::config("analyst roster is empty"));
        }
        Ok(())
    }
}

/// Pair proposed rows against existing ones for the same (analyst, date)
///
/// Identical rows are idempotent reinserts and not reported; only rows
/// differing in shift type or screener flag become overwrites.
fn compute_overwrites(
    existing: &[Schedule],
    proposed: &[Schedule],
) -> Vec<ScheduleOverwrite> {
    let mut by_key: HashMap<(Uuid, NaiveDate), &Schedule> = HashMap::new();
    for s in existing {
        by_key.insert((s.analyst_id, s.date), s);
    }

    let mut overwrites = Vec::new();
    for p in proposed {
        if let Some(e) = by_key.get(&(p.analyst_id, p.date)) {
            if e.shift_type != p.shift_type || e.is_screener != p.is_screener {
                overwrites.push(ScheduleOverwrite {
                    existing_id: e.id,
                    proposed_id: p.id,
                    analyst_id: p.analyst_id,
                    date: p.date,
                    existing_shift_type: e.shift_type.clone(),
                    proposed_shift_type: p.shift_type.clone(),
                    existing_is_screener: e.is_screener,
                    proposed_is_screener: p.is_screener,
                });
            }
        }
    }
    overwrites
}

/// Bounded hill-climbing pass over screener seating
///
/// Moves the screener flag from the most-burdened analyst to the
/// least-burdened alternative in the same (date, shift) group until the
/// spread closes to one or the iteration budget runs out.
fn rebalance_screeners(proposed: &mut [Schedule], max_iterations: u32) -> u32 {
    let mut used = 0u32;

    while used < max_iterations {
        let mut counts: HashMap<Uuid, u32> = HashMap::new();
        for s in proposed.iter().filter(|s| s.is_screener) {
            *counts.entry(s.analyst_id).or_insert(0) += 1;
        }

        // Group indices by (date, shift)
        let mut groups: BTreeMap<(NaiveDate, String), Vec<usize>> = BTreeMap::new();
        for (i, s) in proposed.iter().enumerate() {
            groups.entry((s.date, s.shift_type.clone())).or_default().push(i);
        }

        let mut best_move: Option<(usize, usize, i64)> = None;
        for indices in groups.values() {
            let Some(&from) = indices.iter().find(|&&i| proposed[i].is_screener) else {
                continue;
            };
            let from_count = counts
                .get(&proposed[from].analyst_id)
                .copied()
                .unwrap_or(0) as i64;
            for &to in indices {
                if to == from || proposed[to].analyst_id == proposed[from].analyst_id {
                    continue;
                }
                let to_count =
                    counts.get(&proposed[to].analyst_id).copied().unwrap_or(0) as i64;
                let gain = from_count - to_count;
                if gain >= 2 && best_move.map(|(_, _, g)| gain > g).unwrap_or(true) {
                    best_move = Some((from, to, gain));
                }
            }
        }

        match best_move {
            Some((from, to, gain)) => {
                proposed[from].is_screener = false;
                proposed[to].is_screener = true;
                used += 1;
                debug!(gain, "screener rebalanced");
            }
            None => break,
        }
    }

    used
}
