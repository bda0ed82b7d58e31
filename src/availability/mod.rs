//! Absence and vacation availability index
//!
//! Built once at generation start from every approved vacation and leave
//! record in scope, then queried for each (analyst, date) candidate during
//! the date walk. Per-analyst intervals are merged and sorted so a lookup
//! is a single binary search.

use chrono::NaiveDate;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::Vacation;

/// A closed date interval [start, end]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DateInterval {
    start: NaiveDate,
    end: NaiveDate,
}

/// Fast per-analyst per-date availability lookup
#[derive(Debug, Clone, Default)]
pub struct AbsenceIndex {
    intervals: HashMap<Uuid, Vec<DateInterval>>,
}

impl AbsenceIndex {
    /// Build the index from vacation records and ad-hoc absence intervals
    ///
    /// Unapproved vacations are ignored. Overlapping and adjacent
    /// intervals per analyst are merged.
    pub fn build(
        vacations: &[Vacation],
        absences: &[(Uuid, NaiveDate, NaiveDate)],
    ) -> Self {
        let mut raw: HashMap<Uuid, Vec<DateInterval>> = HashMap::new();

        for v in vacations.iter().filter(|v| v.approved) {
            raw.entry(v.analyst_id).or_default().push(DateInterval {
                start: v.start_date,
                end: v.end_date,
            });
        }
        for &(analyst_id, start, end) in absences {
            raw.entry(analyst_id)
                .or_default()
                .push(DateInterval { start, end });
        }

        let intervals = raw
            .into_iter()
            .map(|(analyst, mut list)| {
                list.sort_by_key(|i| i.start);
                let mut merged: Vec<DateInterval> = Vec::with_capacity(list.len());
                for interval in list {
                    match merged.last_mut() {
                        Some(last) if interval.start <= last.end.succ_opt().unwrap_or(last.end) => {
                            last.end = last.end.max(interval.end);
                        }
                        _ => merged.push(interval),
                    }
                }
                (analyst, merged)
            })
            .collect();

        Self { intervals }
    }

    /// True iff the analyst is unavailable on the date
    pub fn is_absent(&self, analyst_id: Uuid, date: NaiveDate) -> bool {
        let Some(list) = self.intervals.get(&analyst_id) else {
            return false;
        };
        let idx = list.partition_point(|i| i.start <= date);
        idx > 0 && list[idx - 1].end >= date
    }

    /// Number of analysts with at least one absence interval
    pub fn analyst_count(&self) -> usize {
        self.intervals.len()
    }
}
