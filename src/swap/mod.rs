//! Shift-swap validation
//!
//! Swaps are validated by simulation: the analyst's existing assignment
//! dates inside a context window (the swap window padded by seven days on
//! each side) are adjusted by the proposed adds and removals, and the
//! resulting consecutive-day spans are checked against block integrity.
//!
//! Block integrity: a streak span of length L violates iff
//! `L > 5 && L % 5 != 0`. Spans of exactly 10 or 15 are whole blocks and
//! pass; 6–9 and 11–14 fail.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::calendar::days_between;
use crate::models::Schedule;
use crate::utils::format_date_range;

/// Days added on each side of a swap window to form the context
pub const CONTEXT_PADDING_DAYS: u64 = 7;
/// Base streak limit for block integrity
pub const BASE_STREAK_LIMIT: i64 = 5;

/// A block-integrity violation found by simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapViolation {
    pub analyst_id: Uuid,
    pub span_start: NaiveDate,
    pub span_end: NaiveDate,
    pub streak_length: i64,
    pub message: String,
}

/// Validates pairwise and range swaps against existing schedules
#[derive(Debug, Clone)]
pub struct SwapValidator<'a> {
    schedules: &'a [Schedule],
}

impl<'a> SwapValidator<'a> {
    pub fn new(schedules: &'a [Schedule]) -> Self {
        Self { schedules }
    }

    /// Simulate an analyst's timeline with dates added and removed
    pub fn simulate(
        &self,
        analyst_id: Uuid,
        context_start: NaiveDate,
        context_end: NaiveDate,
        add_dates: &[NaiveDate],
        remove_dates: &[NaiveDate],
    ) -> Vec<SwapViolation> {
        let mut timeline: BTreeSet<NaiveDate> = self
            .schedules
            .iter()
            .filter(|s| {
                s.analyst_id == analyst_id
                    && s.date >= context_start
                    && s.date <= context_end
            })
            .map(|s| s.date)
            .collect();
        for d in remove_dates {
            timeline.remove(d);
        }
        for d in add_dates {
            if *d >= context_start && *d <= context_end {
                timeline.insert(*d);
            }
        }

        streak_spans(&timeline)
            .into_iter()
            .filter(|(start, end)| {
                let len = days_between(*start, *end) + 1;
                len > BASE_STREAK_LIMIT && len % BASE_STREAK_LIMIT != 0
            })
            .map(|(start, end)| {
                let len = days_between(start, end) + 1;
                SwapViolation {
                    analyst_id,
                    span_start: start,
                    span_end: end,
                    streak_length: len,
                    message: format!(
                        "swap creates a {len}-day streak over {} for analyst {analyst_id}",
                        format_date_range(start, end)
                    ),
                }
            })
            .collect()
    }

    /// Validate a pairwise swap: source's date goes to target and back
    pub fn validate_swap(
        &self,
        source_analyst: Uuid,
        source_date: NaiveDate,
        target_analyst: Uuid,
        target_date: NaiveDate,
    ) -> Vec<SwapViolation> {
        let window_start = source_date.min(target_date);
        let window_end = source_date.max(target_date);
        let (context_start, context_end) = pad_context(window_start, window_end);

        let mut violations = self.simulate(
            source_analyst,
            context_start,
            context_end,
            &[target_date],
            &[source_date],
        );
        violations.extend(self.simulate(
            target_analyst,
            context_start,
            context_end,
            &[source_date],
            &[target_date],
        ));
        violations
    }

    /// Validate a range swap: both analysts exchange every assignment in
    /// the inclusive window
    pub fn validate_range_swap(
        &self,
        source_analyst: Uuid,
        target_analyst: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<SwapViolation> {
        let (context_start, context_end) = pad_context(start, end);

        let dates_in_window = |analyst: Uuid| -> Vec<NaiveDate> {
            self.schedules
                .iter()
                .filter(|s| s.analyst_id == analyst && s.date >= start && s.date <= end)
                .map(|s| s.date)
                .collect()
        };
        let source_gives = dates_in_window(source_analyst);
        let target_gives = dates_in_window(target_analyst);

        let mut violations = self.simulate(
            source_analyst,
            context_start,
            context_end,
            &target_gives,
            &source_gives,
        );
        violations.extend(self.simulate(
            target_analyst,
            context_start,
            context_end,
            &source_gives,
            &target_gives,
        ));
        violations
    }
}

fn pad_context(start: NaiveDate, end: NaiveDate) -> (NaiveDate, NaiveDate) {
    let context_start = start
        .checked_sub_days(Days::new(CONTEXT_PADDING_DAYS))
        .unwrap_or(start);
    let context_end = end
        .checked_add_days(Days::new(CONTEXT_PADDING_DAYS))
        .unwrap_or(end);
    (context_start, context_end)
}

/// Collapse a sorted date set into maximal consecutive spans
fn streak_spans(timeline: &BTreeSet<NaiveDate>) -> Vec<(NaiveDate, NaiveDate)> {
    let mut spans = Vec::new();
    let mut iter = timeline.iter().copied();
    let Some(first) = iter.next() else {
        return spans;
    };
    let mut span_start = first;
    let mut span_end = first;
    for date in iter {
        if days_between(span_end, date) == 1 {
            span_end = date;
        } else {
            spans.push((span_start, span_end));
            span_start = date;
            span_end = date;
        }
    }
    spans.push((span_start, span_end));
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScheduleKind;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rows(analyst: Uuid, region: Uuid, days: &[NaiveDate]) -> Vec<Schedule> {
        days.iter()
            .map(|d| Schedule::new(analyst, region, *d, "AM", ScheduleKind::New))
            .collect()
    }

    fn span(from: NaiveDate, len: u64) -> Vec<NaiveDate> {
        (0..len).map(|i| from + Days::new(i)).collect()
    }

    #[test]
    fn test_streak_spans_split_on_gaps() {
        let timeline: BTreeSet<NaiveDate> = [
            date(2026, 2, 2),
            date(2026, 2, 3),
            date(2026, 2, 5),
        ]
        .into_iter()
        .collect();
        let spans = streak_spans(&timeline);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0], (date(2026, 2, 2), date(2026, 2, 3)));
        assert_eq!(spans[1], (date(2026, 2, 5), date(2026, 2, 5)));
    }

    #[test]
    fn test_five_day_span_passes() {
        let analyst = Uuid::new_v4();
        let region = Uuid::new_v4();
        let schedules = rows(analyst, region, &span(date(2026, 2, 2), 5));
        let validator = SwapValidator::new(&schedules);
        let violations =
            validator.simulate(analyst, date(2026, 1, 26), date(2026, 2, 21), &[], &[]);
        assert!(violations.is_empty());
    }

    #[test]
    fn test_eight_day_span_violates() {
        let analyst = Uuid::new_v4();
        let region = Uuid::new_v4();
        let schedules = rows(analyst, region, &span(date(2026, 2, 2), 8));
        let validator = SwapValidator::new(&schedules);
        let violations =
            validator.simulate(analyst, date(2026, 1, 26), date(2026, 2, 21), &[], &[]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].streak_length, 8);
        assert!(violations[0].message.contains("8-day streak"));
    }

    #[test]
    fn test_ten_day_block_passes() {
        let analyst = Uuid::new_v4();
        let region = Uuid::new_v4();
        let schedules = rows(analyst, region, &span(date(2026, 2, 2), 10));
        let validator = SwapValidator::new(&schedules);
        let violations =
            validator.simulate(analyst, date(2026, 1, 26), date(2026, 2, 21), &[], &[]);
        assert!(violations.is_empty(), "10-day span is a whole block");
    }

    #[test]
    fn test_fifteen_day_block_passes_and_fourteen_fails() {
        let analyst = Uuid::new_v4();
        let region = Uuid::new_v4();

        let schedules = rows(analyst, region, &span(date(2026, 2, 1), 15));
        let validator = SwapValidator::new(&schedules);
        assert!(validator
            .simulate(analyst, date(2026, 1, 20), date(2026, 3, 1), &[], &[])
            .is_empty());

        let schedules = rows(analyst, region, &span(date(2026, 2, 1), 14));
        let validator = SwapValidator::new(&schedules);
        assert_eq!(
            validator
                .simulate(analyst, date(2026, 1, 20), date(2026, 3, 1), &[], &[])
                .len(),
            1
        );
    }

    #[test]
    fn test_pairwise_swap_safe_blocks() {
        let region = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        // A works Mon 2026-02-02, B works Mon 2026-02-09; both isolated
        let mut schedules = rows(a, region, &[date(2026, 2, 2)]);
        schedules.extend(rows(b, region, &[date(2026, 2, 9)]));

        let validator = SwapValidator::new(&schedules);
        let violations = validator.validate_swap(a, date(2026, 2, 2), b, date(2026, 2, 9));
        assert!(violations.is_empty());
    }

    #[test]
    fn test_pairwise_swap_creating_long_streak() {
        let region = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        // A already works Feb 2-6 (5 days) and Feb 8-9; taking Feb 7 from B
        // bridges them into a 9-day streak
        let mut a_days = span(date(2026, 2, 2), 5);
        a_days.extend([date(2026, 2, 8), date(2026, 2, 9)]);
        let mut schedules = rows(a, region, &a_days);
        schedules.extend(rows(b, region, &[date(2026, 2, 7)]));

        let validator = SwapValidator::new(&schedules);
        let violations = validator.validate_swap(b, date(2026, 2, 7), a, date(2026, 2, 9));

        // A receives Feb 7 and gives Feb 9: Feb 2-8 is a 7-day streak
        assert!(violations.iter().any(|v| v.analyst_id == a));
    }

    #[test]
    fn test_range_swap_exchanges_windows() {
        let region = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        // A works the first week, B works eight straight days; after the
        // swap A inherits the 8-day shape
        let schedules_a = rows(a, region, &span(date(2026, 2, 2), 5));
        let schedules_b = rows(b, region, &span(date(2026, 2, 2), 8));
        let mut schedules = schedules_a;
        schedules.extend(schedules_b);

        let validator = SwapValidator::new(&schedules);
        let violations =
            validator.validate_range_swap(a, b, date(2026, 2, 1), date(2026, 2, 14));

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].analyst_id, a);
        assert_eq!(violations[0].streak_length, 8);
    }

    #[test]
    fn test_swap_and_inverse_restore_clean_state() {
        let region = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let schedules: Vec<Schedule> = [
            rows(a, region, &[date(2026, 2, 2)]),
            rows(b, region, &[date(2026, 2, 9)]),
        ]
        .concat();

        let validator = SwapValidator::new(&schedules);
        // Forward and inverse simulations both come back clean
        assert!(validator
            .validate_swap(a, date(2026, 2, 2), b, date(2026, 2, 9))
            .is_empty());
        assert!(validator
            .validate_swap(b, date(2026, 2, 2), a, date(2026, 2, 9))
            .is_empty());
    }

    #[test]
    fn test_context_ignores_far_away_schedules() {
        let region = Uuid::new_v4();
        let a = Uuid::new_v4();
        // A long streak far outside the context window is not this swap's
        // problem
        let mut days = span(date(2026, 3, 10), 8);
        days.push(date(2026, 2, 2));
        let schedules = rows(a, region, &days);

        let validator = SwapValidator::new(&schedules);
        let violations = validator.validate_swap(
            a,
            date(2026, 2, 2),
            Uuid::new_v4(),
            date(2026, 2, 3),
        );
        assert!(violations.is_empty());
    }
}
