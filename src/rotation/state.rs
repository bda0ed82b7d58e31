//! Rotation state snapshots
//!
//! The staggered weekend rotation for one (algorithm, shift type) pair is
//! captured in a [`RotationState`] snapshot: the two weekly slots, the
//! ordered pools, and a monotonic version used for compare-and-set
//! persistence. Readers pin one snapshot for the duration of a generation;
//! writers bump the version and a stale write is rejected by the store.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use uuid::Uuid;

use crate::error::EngineResult;

/// Length of one pattern week in calendar days
pub const PATTERN_WEEK_DAYS: u64 = 7;
/// Stagger between the week1 and week2 slot start dates
///
/// The week2 slot is anchored on its Monday comp-off day, one day after
/// week1's Sunday; its first worked day is the Tuesday after that. This
/// keeps the whole rest-then-work week inside one tenure so a hand-off
/// never butts a regular Monday against the Tue–Sat run.
pub const SLOT_STAGGER_DAYS: u64 = 1;

// ============================================================================
// Rotation Slot
// ============================================================================

/// One analyst occupying a weekly pattern slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationSlot {
    pub analyst_id: Uuid,
    /// First day of the analyst's pattern week
    pub start_date: NaiveDate,
}

impl RotationSlot {
    pub fn new(analyst_id: Uuid, start_date: NaiveDate) -> Self {
        Self {
            analyst_id,
            start_date,
        }
    }

    /// Last calendar day of the pattern week
    pub fn end_date(&self) -> NaiveDate {
        self.start_date
            .checked_add_days(Days::new(PATTERN_WEEK_DAYS - 1))
            .expect("date arithmetic within calendar range")
    }

    /// Whether the pattern week contains the date
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date()
    }

    /// Whether the slot's seven-day tenure has elapsed by the date
    pub fn completed_by(&self, date: NaiveDate) -> bool {
        date > self.end_date()
    }

    /// Start date of the slot's next tenure
    pub fn next_start(&self) -> NaiveDate {
        self.start_date
            .checked_add_days(Days::new(PATTERN_WEEK_DAYS))
            .expect("date arithmetic within calendar range")
    }
}

// ============================================================================
// Rotation State
// ============================================================================

/// Staggered two-slot weekend rotation state for one (algorithm, shift)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationState {
    pub algorithm: String,
    pub shift_type: String,

    /// SUN_THU slot; its start date is always a Sunday
    pub week1: Option<RotationSlot>,

    /// TUE_SAT slot; anchored on the Monday after week1's Sunday
    pub week2: Option<RotationSlot>,

    /// Analysts waiting for their next weekend week, in service order
    pub available_pool: VecDeque<Uuid>,

    /// Analysts who finished a week in the current cycle
    pub completed_pool: Vec<Uuid>,

    /// Incremented each time the completed pool reseeds the available pool
    pub cycle_generation: u32,

    /// Monotonic version for compare-and-set persistence
    pub version: u64,

    pub updated_at: DateTime<Utc>,
}

impl RotationState {
    pub fn new(algorithm: impl Into<String>, shift_type: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            shift_type: shift_type.into(),
            week1: None,
            week2: None,
            available_pool: VecDeque::new(),
            completed_pool: Vec::new(),
            cycle_generation: 0,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    /// Every analyst currently tracked by this state
    pub fn members(&self) -> HashSet<Uuid> {
        let mut members: HashSet<Uuid> = self.available_pool.iter().copied().collect();
        members.extend(self.completed_pool.iter().copied());
        if let Some(slot) = &self.week1 {
            members.insert(slot.analyst_id);
        }
        if let Some(slot) = &self.week2 {
            members.insert(slot.analyst_id);
        }
        members
    }

    /// Check the partition invariant: pools and slots are disjoint and
    /// together cover exactly the given roster
    pub fn partitions(&self, roster: &HashSet<Uuid>) -> bool {
        let mut seen = HashSet::new();
        let mut count = 0usize;
        for id in self.available_pool.iter().chain(self.completed_pool.iter()) {
            seen.insert(*id);
            count += 1;
        }
        for slot in [&self.week1, &self.week2].into_iter().flatten() {
            seen.insert(slot.analyst_id);
            count += 1;
        }
        seen.len() == count && seen == *roster
    }

    /// Bump version and timestamp after a mutation
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }

    /// Serialize to JSON for snapshot persistence
    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    /// Deserialize from a snapshot
    pub fn from_json(json: &str) -> EngineResult<Self> {
        serde_json::from_str(json).map_err(Into::into)
    }
}
