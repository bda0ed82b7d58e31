//! Staggered two-analyst weekend rotation
//!
//! Each (algorithm, shift type) pair runs two weekly slots: `week1` on the
//! SUN_THU pattern and `week2` on TUE_SAT, staggered so every weekend has
//! exactly one Sunday worker and one Saturday worker. The week2 tenure is
//! anchored on its Monday comp-off day; its first worked day is two days
//! after week1's Sunday. Analysts cycle available pool → slot → completed
//! pool; the completed pool reseeds the available pool once it drains, so
//! every analyst takes a weekend before anyone takes a second.
//!
//! `advance_to` must be called with non-decreasing dates; the generation
//! walk guarantees that ordering.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

use super::state::{RotationSlot, RotationState, SLOT_STAGGER_DAYS};
use crate::availability::AbsenceIndex;
use crate::models::{Analyst, Schedule, ScheduleKind, WorkPattern};

/// Which of the two weekly slots is being addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Week1,
    Week2,
}

impl SlotKind {
    pub fn pattern(&self) -> WorkPattern {
        match self {
            Self::Week1 => WorkPattern::SunThu,
            Self::Week2 => WorkPattern::TueSat,
        }
    }
}

// ============================================================================
// Rotation Manager
// ============================================================================

/// Drives the staggered weekend rotation for one shift type
#[derive(Debug, Clone)]
pub struct RotationManager {
    state: RotationState,
    /// Stable name order used for deterministic tie-breaking
    name_order: HashMap<Uuid, String>,
}

impl RotationManager {
    /// Initialize fresh state for a roster
    ///
    /// Pool order is the fairness ordering: fewest historical weekend days
    /// first, then longest time since the last weekend day, then stable
    /// name order. `week_start` must be the Sunday opening the first week
    /// of the generation range.
    pub fn initialize(
        algorithm: impl Into<String>,
        shift_type: impl Into<String>,
        analysts: &[&Analyst],
        history: &[Schedule],
        week_start: NaiveDate,
        randomization_factor: f64,
    ) -> Self {
        debug_assert_eq!(week_start.weekday(), Weekday::Sun);

        let mut weekend_counts: HashMap<Uuid, u32> = HashMap::new();
        let mut last_weekend: HashMap<Uuid, NaiveDate> = HashMap::new();
        for s in history {
            if matches!(s.date.weekday(), Weekday::Sat | Weekday::Sun) {
                *weekend_counts.entry(s.analyst_id).or_insert(0) += 1;
                let entry = last_weekend.entry(s.analyst_id).or_insert(s.date);
                if s.date > *entry {
                    *entry = s.date;
                }
            }
        }

        let mut ordered: Vec<&Analyst> = analysts.to_vec();
        ordered.sort_by(|a, b| a.display_name.cmp(&b.display_name).then(a.id.cmp(&b.id)));

        // Deterministic jitter: seeded by the week start so the same range
        // always yields the same ordering
        let mut rng = ChaCha8Rng::seed_from_u64(week_start.num_days_from_ce() as u64);
        let jitter: HashMap<Uuid, f64> = ordered
            .iter()
            .map(|a| (a.id, rng.gen::<f64>() * randomization_factor))
            .collect();

        ordered.sort_by(|a, b| {
            let score = |x: &Analyst| {
                weekend_counts.get(&x.id).copied().unwrap_or(0) as f64
                    + jitter.get(&x.id).copied().unwrap_or(0.0)
            };
            score(a)
                .partial_cmp(&score(b))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    // None (never worked a weekend) sorts earliest
                    let la = last_weekend.get(&a.id);
                    let lb = last_weekend.get(&b.id);
                    la.cmp(&lb)
                })
                .then_with(|| a.display_name.cmp(&b.display_name))
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut state = RotationState::new(algorithm, shift_type);
        state.available_pool = ordered.iter().map(|a| a.id).collect();

        if let Some(first) = state.available_pool.pop_front() {
            state.week1 = Some(RotationSlot::new(first, week_start));
        }
        if let Some(second) = state.available_pool.pop_front() {
            let staggered = week_start + chrono::Days::new(SLOT_STAGGER_DAYS);
            state.week2 = Some(RotationSlot::new(second, staggered));
        }

        let name_order = analysts
            .iter()
            .map(|a| (a.id, a.display_name.clone()))
            .collect();

        Self { state, name_order }
    }

    /// Resume from a persisted snapshot, reconciling roster changes
    ///
    /// Members no longer on the roster are dropped (slots refill from the
    /// pool); new roster members join the tail of the available pool.
    pub fn from_state(mut state: RotationState, analysts: &[&Analyst]) -> Self {
        let roster: HashSet<Uuid> = analysts.iter().map(|a| a.id).collect();

        state.available_pool.retain(|id| roster.contains(id));
        state.completed_pool.retain(|id| roster.contains(id));
        for kind in [SlotKind::Week1, SlotKind::Week2] {
            let current = match kind {
                SlotKind::Week1 => state.week1,
                SlotKind::Week2 => state.week2,
            };
            if let Some(s) = current {
                if !roster.contains(&s.analyst_id) {
                    let successor = state
                        .available_pool
                        .pop_front()
                        .map(|id| RotationSlot::new(id, s.start_date));
                    match kind {
                        SlotKind::Week1 => state.week1 = successor,
                        SlotKind::Week2 => state.week2 = successor,
                    }
                }
            }
        }

        let known = state.members();
        let mut joiners: Vec<&&Analyst> = analysts.iter().filter(|a| !known.contains(&a.id)).collect();
        joiners.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        for a in joiners {
            state.available_pool.push_back(a.id);
        }

        let name_order = analysts
            .iter()
            .map(|a| (a.id, a.display_name.clone()))
            .collect();

        Self { state, name_order }
    }

    pub fn state(&self) -> &RotationState {
        &self.state
    }

    pub fn into_state(mut self) -> RotationState {
        self.state.touch();
        self.state
    }

    pub fn shift_type(&self) -> &str {
        &self.state.shift_type
    }

    /// Advance slot tenures up to the given date
    pub fn advance_to(&mut self, date: NaiveDate) {
        loop {
            let mut progressed = false;
            for kind in [SlotKind::Week1, SlotKind::Week2] {
                if self
                    .slot(kind)
                    .map(|s| s.completed_by(date))
                    .unwrap_or(false)
                {
                    self.complete_slot(kind);
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
    }

    fn slot(&self, kind: SlotKind) -> Option<&RotationSlot> {
        match kind {
            SlotKind::Week1 => self.state.week1.as_ref(),
            SlotKind::Week2 => self.state.week2.as_ref(),
        }
    }

    fn complete_slot(&mut self, kind: SlotKind) {
        let slot = match kind {
            SlotKind::Week1 => self.state.week1.take(),
            SlotKind::Week2 => self.state.week2.take(),
        };
        let Some(finished) = slot else { return };

        self.state.completed_pool.push(finished.analyst_id);
        let successor = self
            .pop_available()
            .map(|id| RotationSlot::new(id, finished.next_start()));
        debug!(
            shift = %self.state.shift_type,
            analyst = %finished.analyst_id,
            next = ?successor.as_ref().map(|s| s.analyst_id),
            "rotation slot completed"
        );
        match kind {
            SlotKind::Week1 => self.state.week1 = successor,
            SlotKind::Week2 => self.state.week2 = successor,
        }
    }

    /// Pop the next analyst, reseeding from the completed pool when the
    /// available pool has drained
    fn pop_available(&mut self) -> Option<Uuid> {
        if self.state.available_pool.is_empty() && !self.state.completed_pool.is_empty() {
            self.state.available_pool = self.state.completed_pool.drain(..).collect();
            self.state.cycle_generation += 1;
            debug!(
                shift = %self.state.shift_type,
                generation = self.state.cycle_generation,
                "rotation pool reseeded"
            );
        }
        self.state.available_pool.pop_front()
    }

    /// The analyst the rotation plan puts on a weekend date
    ///
    /// Sundays belong to the week1 (SUN_THU) slot, Saturdays to the week2
    /// (TUE_SAT) slot. Returns None off-weekend or when the roster cannot
    /// fill the slot.
    pub fn planned_weekend_analyst(&mut self, date: NaiveDate) -> Option<(Uuid, WorkPattern)> {
        self.advance_to(date);
        let kind = match date.weekday() {
            Weekday::Sun => SlotKind::Week1,
            Weekday::Sat => SlotKind::Week2,
            _ => return None,
        };
        let slot = self.slot(kind)?;
        if slot.covers(date) {
            Some((slot.analyst_id, kind.pattern()))
        } else {
            None
        }
    }

    /// The pattern the analyst follows at the given date
    pub fn pattern_for(&self, analyst_id: Uuid, date: NaiveDate) -> WorkPattern {
        for kind in [SlotKind::Week1, SlotKind::Week2] {
            if let Some(slot) = self.slot(kind) {
                if slot.analyst_id == analyst_id && slot.covers(date) {
                    return kind.pattern();
                }
            }
        }
        WorkPattern::Regular
    }

    /// Whether the analyst's pattern has them working on the date
    pub fn should_work(&self, analyst_id: Uuid, date: NaiveDate) -> bool {
        self.pattern_for(analyst_id, date).works_on(date.weekday())
    }

    /// Candidates for substitution, in pool service order
    pub fn substitution_candidates(&self) -> Vec<Uuid> {
        self.state.available_pool.iter().copied().collect()
    }

    /// Replace the slot analyst covering `date` with a substitute
    ///
    /// The substitute leaves the available pool and inherits the remaining
    /// portion of the week's pattern; the displaced analyst moves to the
    /// front of the pool so the missed turn is the next one served.
    pub fn substitute_weekend(&mut self, date: NaiveDate, replacement: Uuid) {
        let kind = match date.weekday() {
            Weekday::Sun => SlotKind::Week1,
            Weekday::Sat => SlotKind::Week2,
            _ => return,
        };
        let slot = match kind {
            SlotKind::Week1 => &mut self.state.week1,
            SlotKind::Week2 => &mut self.state.week2,
        };
        let Some(s) = slot else { return };

        let displaced = s.analyst_id;
        s.analyst_id = replacement;
        self.state.available_pool.retain(|&id| id != replacement);
        self.state.available_pool.push_front(displaced);
        debug!(
            shift = %self.state.shift_type,
            %displaced,
            substitute = %replacement,
            %date,
            "weekend slot substituted"
        );
    }

    /// Plan AM→PM rotations over a window
    ///
    /// Picks `target_capacity` source analysts per weekday to work the
    /// latest shift instead of their own, balancing rotation counts across
    /// the window. Absent analysts and analysts inside a weekend pattern
    /// that day are never rotated.
    pub fn plan_am_to_pm_rotation(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
        source_analysts: &[&Analyst],
        target_capacity: usize,
        history: &[Schedule],
        absences: &AbsenceIndex,
    ) -> AmToPmPlan {
        let mut counts: HashMap<Uuid, u32> = HashMap::new();
        for s in history {
            if s.kind == ScheduleKind::AmToPmRotation {
                *counts.entry(s.analyst_id).or_insert(0) += 1;
            }
        }

        let mut rotated: BTreeMap<NaiveDate, BTreeSet<Uuid>> = BTreeMap::new();
        if target_capacity == 0 {
            return AmToPmPlan { rotated };
        }

        let mut date = start;
        while date <= end {
            if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                self.advance_to(date);
                let mut eligible: Vec<&&Analyst> = source_analysts
                    .iter()
                    .filter(|a| {
                        !absences.is_absent(a.id, date)
                            && self.pattern_for(a.id, date) == WorkPattern::Regular
                    })
                    .collect();
                eligible.sort_by(|a, b| {
                    counts
                        .get(&a.id)
                        .copied()
                        .unwrap_or(0)
                        .cmp(&counts.get(&b.id).copied().unwrap_or(0))
                        .then_with(|| a.display_name.cmp(&b.display_name))
                });

                let picked: BTreeSet<Uuid> = eligible
                    .into_iter()
                    .take(target_capacity)
                    .map(|a| a.id)
                    .collect();
                for id in &picked {
                    *counts.entry(*id).or_insert(0) += 1;
                }
                if !picked.is_empty() {
                    rotated.insert(date, picked);
                }
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }

        AmToPmPlan { rotated }
    }

    /// Stable display name used in reports
    pub fn display_name(&self, analyst_id: Uuid) -> Option<&str> {
        self.name_order.get(&analyst_id).map(|s| s.as_str())
    }
}

// ============================================================================
// AM→PM Plan
// ============================================================================

/// Dates on which source-shift analysts are rotated to the latest shift
#[derive(Debug, Clone, Default)]
pub struct AmToPmPlan {
    rotated: BTreeMap<NaiveDate, BTreeSet<Uuid>>,
}

impl AmToPmPlan {
    pub fn is_rotated(&self, analyst_id: Uuid, date: NaiveDate) -> bool {
        self.rotated
            .get(&date)
            .map(|set| set.contains(&analyst_id))
            .unwrap_or(false)
    }

    pub fn rotated_on(&self, date: NaiveDate) -> impl Iterator<Item = Uuid> + '_ {
        self.rotated.get(&date).into_iter().flatten().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.rotated.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rotated.values().map(|s| s.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn roster(region: Uuid, names: &[&str]) -> Vec<Analyst> {
        names
            .iter()
            .map(|n| Analyst::new(region, *n, format!("{}@example.com", n.to_lowercase()), "AM"))
            .collect()
    }

    fn manager_for(analysts: &[Analyst], week_start: NaiveDate) -> RotationManager {
        let refs: Vec<&Analyst> = analysts.iter().collect();
        RotationManager::initialize("core", "AM", &refs, &[], week_start, 0.0)
    }

    #[test]
    fn test_initialize_fills_staggered_slots() {
        let region = Uuid::new_v4();
        let analysts = roster(region, &["Ada", "Bea", "Cid", "Dee", "Eli"]);
        let manager = manager_for(&analysts, date(2026, 2, 1));

        let state = manager.state();
        let w1 = state.week1.unwrap();
        let w2 = state.week2.unwrap();
        assert_eq!(w1.start_date, date(2026, 2, 1)); // Sunday
        assert_eq!(w2.start_date, date(2026, 2, 2)); // Monday comp-off anchor
        assert_eq!(state.available_pool.len(), 3);
        assert!(state.completed_pool.is_empty());
        // Fairness ordering with no history falls back to name order
        assert_eq!(w1.analyst_id, analysts[0].id);
        assert_eq!(w2.analyst_id, analysts[1].id);
    }

    #[test]
    fn test_history_orders_pool_by_weekend_burden() {
        let region = Uuid::new_v4();
        let analysts = roster(region, &["Ada", "Bea", "Cid"]);
        // Ada already worked two weekend days, Bea one, Cid none
        let history = vec![
            Schedule::new(analysts[0].id, region, date(2026, 1, 4), "AM", ScheduleKind::Imported),
            Schedule::new(analysts[0].id, region, date(2026, 1, 10), "AM", ScheduleKind::Imported),
            Schedule::new(analysts[1].id, region, date(2026, 1, 11), "AM", ScheduleKind::Imported),
        ];
        let refs: Vec<&Analyst> = analysts.iter().collect();
        let manager =
            RotationManager::initialize("core", "AM", &refs, &history, date(2026, 2, 1), 0.0);

        // Cid has the least burden, so Cid opens week1; Bea takes week2
        assert_eq!(manager.state().week1.unwrap().analyst_id, analysts[2].id);
        assert_eq!(manager.state().week2.unwrap().analyst_id, analysts[1].id);
    }

    #[test]
    fn test_planned_weekend_analysts_differ_across_first_weekend() {
        let region = Uuid::new_v4();
        let analysts = roster(region, &["Ada", "Bea", "Cid", "Dee", "Eli"]);
        let mut manager = manager_for(&analysts, date(2026, 2, 1));

        let (sun, p1) = manager.planned_weekend_analyst(date(2026, 2, 1)).unwrap();
        let (sat, p2) = manager.planned_weekend_analyst(date(2026, 2, 7)).unwrap();
        assert_ne!(sun, sat);
        assert_eq!(p1, WorkPattern::SunThu);
        assert_eq!(p2, WorkPattern::TueSat);
    }

    #[test]
    fn test_slots_rotate_after_tenure() {
        let region = Uuid::new_v4();
        let analysts = roster(region, &["Ada", "Bea", "Cid", "Dee", "Eli"]);
        let mut manager = manager_for(&analysts, date(2026, 2, 1));

        let (first_sun, _) = manager.planned_weekend_analyst(date(2026, 2, 1)).unwrap();
        let (second_sun, _) = manager.planned_weekend_analyst(date(2026, 2, 8)).unwrap();
        assert_ne!(first_sun, second_sun);
        assert!(manager.state().completed_pool.contains(&first_sun));
    }

    #[test]
    fn test_two_analyst_roster_cycles_perpetually() {
        let region = Uuid::new_v4();
        let analysts = roster(region, &["Ada", "Bea"]);
        let mut manager = manager_for(&analysts, date(2026, 2, 1));

        // Walk five weekends; every one must have a Sunday and Saturday
        // worker even though the pool is empty from the start
        for week in 0..5u64 {
            let sunday = date(2026, 2, 1) + chrono::Days::new(week * 7);
            let saturday = sunday + chrono::Days::new(6);
            assert!(manager.planned_weekend_analyst(sunday).is_some(), "week {week} sunday");
            assert!(manager.planned_weekend_analyst(saturday).is_some(), "week {week} saturday");
        }
        assert!(manager.state().cycle_generation > 0);
    }

    #[test]
    fn test_every_analyst_serves_before_seconds() {
        let region = Uuid::new_v4();
        let analysts = roster(region, &["Ada", "Bea", "Cid", "Dee"]);
        let mut manager = manager_for(&analysts, date(2026, 2, 1));

        // Walk every weekend date in order, as the generation does
        let mut served: Vec<Uuid> = Vec::new();
        let mut day = date(2026, 2, 1);
        while served.len() < 4 {
            if matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                if let Some((id, _)) = manager.planned_weekend_analyst(day) {
                    served.push(id);
                }
            }
            day = day.succ_opt().unwrap();
        }

        // The first four weekend turns cover the whole roster before any
        // analyst repeats
        let unique: HashSet<Uuid> = served.iter().copied().collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn test_pattern_for_and_should_work() {
        let region = Uuid::new_v4();
        let analysts = roster(region, &["Ada", "Bea", "Cid"]);
        let mut manager = manager_for(&analysts, date(2026, 2, 1));
        manager.advance_to(date(2026, 2, 1));

        let w1 = manager.state().week1.unwrap().analyst_id;
        let w2 = manager.state().week2.unwrap().analyst_id;
        let regular = analysts
            .iter()
            .map(|a| a.id)
            .find(|id| *id != w1 && *id != w2)
            .unwrap();

        assert_eq!(manager.pattern_for(w1, date(2026, 2, 2)), WorkPattern::SunThu);
        assert_eq!(manager.pattern_for(w2, date(2026, 2, 4)), WorkPattern::TueSat);
        assert_eq!(manager.pattern_for(regular, date(2026, 2, 2)), WorkPattern::Regular);

        // SUN_THU works Sunday but not Friday
        assert!(manager.should_work(w1, date(2026, 2, 1)));
        assert!(!manager.should_work(w1, date(2026, 2, 6)));
        // TUE_SAT works Saturday but not Monday
        assert!(manager.should_work(w2, date(2026, 2, 7)));
        assert!(!manager.should_work(w2, date(2026, 2, 2)));
        // Regular analysts work weekdays only
        assert!(manager.should_work(regular, date(2026, 2, 2)));
        assert!(!manager.should_work(regular, date(2026, 2, 1)));
    }

    #[test]
    fn test_substitution_inherits_slot_and_requeues_displaced() {
        let region = Uuid::new_v4();
        let analysts = roster(region, &["Ada", "Bea", "Cid", "Dee"]);
        let mut manager = manager_for(&analysts, date(2026, 2, 1));

        let (planned, _) = manager.planned_weekend_analyst(date(2026, 2, 1)).unwrap();
        let substitute = manager.substitution_candidates()[0];
        manager.substitute_weekend(date(2026, 2, 1), substitute);

        let (now_planned, _) = manager.planned_weekend_analyst(date(2026, 2, 1)).unwrap();
        assert_eq!(now_planned, substitute);
        assert_eq!(manager.substitution_candidates()[0], planned);
    }

    #[test]
    fn test_saturday_only_range_has_coverage() {
        // A range starting on Saturday: the staggered week2 slot covers it
        // because the slots are seeded from the Sunday of that week
        let region = Uuid::new_v4();
        let analysts = roster(region, &["Ada", "Bea", "Cid"]);
        let mut manager = manager_for(&analysts, date(2026, 2, 1));
        assert!(manager.planned_weekend_analyst(date(2026, 2, 7)).is_some());
    }

    #[test]
    fn test_from_state_reconciles_roster() {
        let region = Uuid::new_v4();
        let analysts = roster(region, &["Ada", "Bea", "Cid"]);
        let manager = manager_for(&analysts, date(2026, 2, 1));
        let state = manager.into_state();

        // Ada leaves, Fay joins
        let mut next_roster = analysts[1..].to_vec();
        next_roster.push(Analyst::new(region, "Fay", "fay@example.com", "AM"));
        let refs: Vec<&Analyst> = next_roster.iter().collect();
        let resumed = RotationManager::from_state(state, &refs);

        let members = resumed.state().members();
        assert!(!members.contains(&analysts[0].id));
        assert!(members.contains(&next_roster.last().unwrap().id));
    }

    #[test]
    fn test_am_to_pm_plan_balances_and_skips_weekend_patterns() {
        let region = Uuid::new_v4();
        let analysts = roster(region, &["Ada", "Bea", "Cid", "Dee"]);
        let refs: Vec<&Analyst> = analysts.iter().collect();
        let mut manager =
            RotationManager::initialize("core", "AM", &refs, &[], date(2026, 2, 1), 0.0);
        let absences = AbsenceIndex::build(&[], &[]);

        let plan = manager.plan_am_to_pm_rotation(
            date(2026, 2, 2),
            date(2026, 2, 6),
            &refs,
            1,
            &[],
            &absences,
        );

        // One rotation per weekday, never an analyst inside a weekend slot
        assert_eq!(plan.len(), 5);
        for d in 2..=6 {
            let day = date(2026, 2, d);
            for id in plan.rotated_on(day) {
                assert_eq!(manager.pattern_for(id, day), WorkPattern::Regular);
            }
        }
    }

    #[test]
    fn test_am_to_pm_zero_capacity_is_empty() {
        let region = Uuid::new_v4();
        let analysts = roster(region, &["Ada", "Bea"]);
        let refs: Vec<&Analyst> = analysts.iter().collect();
        let mut manager =
            RotationManager::initialize("core", "AM", &refs, &[], date(2026, 2, 1), 0.0);
        let absences = AbsenceIndex::build(&[], &[]);
        let plan = manager.plan_am_to_pm_rotation(
            date(2026, 2, 2),
            date(2026, 2, 6),
            &refs,
            0,
            &[],
            &absences,
        );
        assert!(plan.is_empty());
    }
}
