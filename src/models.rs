// Core data structures for the rotaplan scheduling engine

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Region
// ============================================================================

/// An operational region with its own shift catalog and holidays
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub id: Uuid,
    pub name: String,
    /// IANA timezone the region's calendar is anchored to
    pub timezone: Tz,
    pub active: bool,
}

impl Region {
    pub fn new(name: impl Into<String>, timezone: Tz) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            timezone,
            active: true,
        }
    }
}

// ============================================================================
// Shift Definition
// ============================================================================

/// Per-region shift template, unique by (region, name)
///
/// Ordering within a region follows `start_time` ascending; the earliest
/// definition is the AM-equivalent and the latest the PM-equivalent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftDefinition {
    pub id: Uuid,
    pub region_id: Uuid,
    pub name: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// End time falls on the following calendar day
    pub overnight: bool,
}

impl ShiftDefinition {
    pub fn new(
        region_id: Uuid,
        name: impl Into<String>,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Self {
        let overnight = end_time < start_time;
        Self {
            id: Uuid::new_v4(),
            region_id,
            name: name.into(),
            start_time,
            end_time,
            overnight,
        }
    }
}

/// Legacy shift affiliation aliases kept for historical analyst rows
pub const LEGACY_MORNING: &str = "MORNING";
pub const LEGACY_EVENING: &str = "EVENING";

// ============================================================================
// Analyst
// ============================================================================

/// A worker who can be assigned to a shift on a date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analyst {
    pub id: Uuid,
    pub display_name: String,
    /// Unique across the roster
    pub email: String,
    pub region_id: Uuid,
    /// Name of a ShiftDefinition, or a legacy alias ("MORNING"/"EVENING")
    pub shift_affiliation: String,
    pub employee_type: String,
    pub experience_level: String,
    /// Soft-delete flag; analysts referenced by schedules are never removed
    pub active: bool,
}

impl Analyst {
    pub fn new(
        region_id: Uuid,
        display_name: impl Into<String>,
        email: impl Into<String>,
        shift_affiliation: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            email: email.into(),
            region_id,
            shift_affiliation: shift_affiliation.into(),
            employee_type: String::from("FULL_TIME"),
            experience_level: String::from("STANDARD"),
            active: true,
        }
    }
}

// ============================================================================
// Schedule
// ============================================================================

/// Provenance tag recording why a schedule row exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleKind {
    /// Fresh assignment from the constructive pass
    New,
    /// Analyst rotated from the earliest to the latest shift for the day
    AmToPmRotation,
    /// Row adjusted while consuming a comp-off day
    CompOffAdjustment,
    /// Row created by the screener designation pass
    ScreenerSchedule,
    /// Row imported from a pre-existing system
    Imported,
}

impl ScheduleKind {
    pub fn all() -> Vec<Self> {
        vec![
            Self::New,
            Self::AmToPmRotation,
            Self::CompOffAdjustment,
            Self::ScreenerSchedule,
            Self::Imported,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::AmToPmRotation => "AM_TO_PM_ROTATION",
            Self::CompOffAdjustment => "COMP_OFF_ADJUSTMENT",
            Self::ScreenerSchedule => "SCREENER_SCHEDULE",
            Self::Imported => "IMPORTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "NEW" => Some(Self::New),
            "AM_TO_PM_ROTATION" => Some(Self::AmToPmRotation),
            "COMP_OFF_ADJUSTMENT" => Some(Self::CompOffAdjustment),
            "SCREENER_SCHEDULE" => Some(Self::ScreenerSchedule),
            "IMPORTED" => Some(Self::Imported),
            _ => None,
        }
    }
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single per-analyst per-date assignment
///
/// At most one schedule exists per (analyst, date, shift_type) in the
/// output of a generation; on a given (date, shift_type) exactly one row
/// may carry `is_screener = true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub analyst_id: Uuid,
    /// Calendar date in the region's timezone, stored normalized
    pub date: NaiveDate,
    /// Name of a ShiftDefinition of the region
    pub shift_type: String,
    pub is_screener: bool,
    pub region_id: Uuid,
    pub kind: ScheduleKind,
}

impl Schedule {
    pub fn new(
        analyst_id: Uuid,
        region_id: Uuid,
        date: NaiveDate,
        shift_type: impl Into<String>,
        kind: ScheduleKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            analyst_id,
            date,
            shift_type: shift_type.into(),
            is_screener: false,
            region_id,
            kind,
        }
    }

    /// Uniqueness key within a generation output
    pub fn key(&self) -> (Uuid, NaiveDate, String) {
        (self.analyst_id, self.date, self.shift_type.clone())
    }
}

// ============================================================================
// Vacation
// ============================================================================

/// An approved vacation makes the analyst unavailable on every date of
/// the inclusive [start_date, end_date] range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vacation {
    pub id: Uuid,
    pub analyst_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub approved: bool,
    pub reason: Option<String>,
}

impl Vacation {
    pub fn new(analyst_id: Uuid, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            analyst_id,
            start_date,
            end_date,
            approved: true,
            reason: None,
        }
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.approved && self.start_date <= date && date <= self.end_date
    }
}

// ============================================================================
// Scheduling Constraint
// ============================================================================

/// Constraint category; blackout dates are hard, everything else soft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
    BlackoutDate,
    UnavailableScreener,
    PreferredScreener,
    MinScreenerDays,
    MaxScreenerDays,
}

impl ConstraintKind {
    pub fn all() -> Vec<Self> {
        vec![
            Self::BlackoutDate,
            Self::UnavailableScreener,
            Self::PreferredScreener,
            Self::MinScreenerDays,
            Self::MaxScreenerDays,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BlackoutDate => "BLACKOUT_DATE",
            Self::UnavailableScreener => "UNAVAILABLE_SCREENER",
            Self::PreferredScreener => "PREFERRED_SCREENER",
            Self::MinScreenerDays => "MIN_SCREENER_DAYS",
            Self::MaxScreenerDays => "MAX_SCREENER_DAYS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "BLACKOUT_DATE" => Some(Self::BlackoutDate),
            "UNAVAILABLE_SCREENER" => Some(Self::UnavailableScreener),
            "PREFERRED_SCREENER" => Some(Self::PreferredScreener),
            "MIN_SCREENER_DAYS" => Some(Self::MinScreenerDays),
            "MAX_SCREENER_DAYS" => Some(Self::MaxScreenerDays),
            _ => None,
        }
    }

    /// Hard constraints exclude candidates before assignment
    pub fn is_hard(&self) -> bool {
        matches!(self, Self::BlackoutDate)
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A scheduling constraint; global when `analyst_id` is absent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConstraint {
    pub id: Uuid,
    pub analyst_id: Option<Uuid>,
    pub kind: ConstraintKind,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub active: bool,
    /// Free text; a numeric threshold is read as the first integer found
    pub description: String,
}

impl SchedulingConstraint {
    pub fn new(
        kind: ConstraintKind,
        start_date: NaiveDate,
        end_date: NaiveDate,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            analyst_id: None,
            kind,
            start_date,
            end_date,
            active: true,
            description: description.into(),
        }
    }

    pub fn for_analyst(mut self, analyst_id: Uuid) -> Self {
        self.analyst_id = Some(analyst_id);
        self
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.active && self.start_date <= date && date <= self.end_date
    }

    /// Whether this constraint applies to the given analyst
    pub fn applies_to(&self, analyst_id: Uuid) -> bool {
        self.analyst_id.map_or(true, |id| id == analyst_id)
    }
}

// ============================================================================
// Holiday
// ============================================================================

/// A regional holiday; a soft signal that may credit comp-off but does
/// not block assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holiday {
    pub id: Uuid,
    pub region_id: Uuid,
    pub date: NaiveDate,
    pub name: String,
}

impl Holiday {
    pub fn new(region_id: Uuid, date: NaiveDate, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            region_id,
            date,
            name: name.into(),
        }
    }
}

// ============================================================================
// Work Pattern
// ============================================================================

/// The weekly work shape an analyst follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkPattern {
    /// Works Sunday through Thursday; Friday is the comp-off day
    SunThu,
    /// Works Tuesday through Saturday; Monday is the comp-off day
    TueSat,
    /// Standard Monday through Friday week
    Regular,
}

impl WorkPattern {
    pub fn all() -> Vec<Self> {
        vec![Self::SunThu, Self::TueSat, Self::Regular]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SunThu => "SUN_THU",
            Self::TueSat => "TUE_SAT",
            Self::Regular => "REGULAR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SUN_THU" => Some(Self::SunThu),
            "TUE_SAT" => Some(Self::TueSat),
            "REGULAR" => Some(Self::Regular),
            _ => None,
        }
    }

    /// Whether the pattern includes work on the given weekday
    pub fn works_on(&self, weekday: Weekday) -> bool {
        match self {
            Self::SunThu => matches!(
                weekday,
                Weekday::Sun | Weekday::Mon | Weekday::Tue | Weekday::Wed | Weekday::Thu
            ),
            Self::TueSat => matches!(
                weekday,
                Weekday::Tue | Weekday::Wed | Weekday::Thu | Weekday::Fri | Weekday::Sat
            ),
            Self::Regular => !matches!(weekday, Weekday::Sat | Weekday::Sun),
        }
    }

    /// The automatic comp-off weekday granted by a weekend-bearing pattern
    pub fn comp_off_day(&self) -> Option<Weekday> {
        match self {
            Self::SunThu => Some(Weekday::Fri),
            Self::TueSat => Some(Weekday::Mon),
            Self::Regular => None,
        }
    }

    /// The weekend day the pattern covers
    pub fn weekend_day(&self) -> Option<Weekday> {
        match self {
            Self::SunThu => Some(Weekday::Sun),
            Self::TueSat => Some(Weekday::Sat),
            Self::Regular => None,
        }
    }
}

impl fmt::Display for WorkPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Last known weekend pattern per analyst, used to enforce the minimum
/// gap between weekend duties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternContinuityRecord {
    pub analyst_id: Uuid,
    pub last_pattern: WorkPattern,
    /// Last date on which the pattern ended
    pub last_end_date: NaiveDate,
}

// ============================================================================
// Generation Log
// ============================================================================

/// Outcome of a generation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Success,
    Failed,
    Partial,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Partial => "PARTIAL",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted record of one schedule generation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationLog {
    pub run_id: Uuid,
    pub performer: String,
    pub algorithm: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub schedules_generated: usize,
    pub conflicts_detected: usize,
    pub fairness_score: f64,
    pub execution_time_ms: u64,
    pub status: RunStatus,
    pub error_message: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
