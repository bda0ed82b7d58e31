//! Screener fairness tracking
//!
//! One tracker instance serves every shift of a generation so an analyst
//! cannot accumulate separate AM and PM screener debts. Selection is
//! exhaustive LRU: nobody screens twice until every eligible analyst has
//! screened once, with ties broken by least-recent screener date (never
//! screened sorts first) and then by stable analyst id.

use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::config::ScreenerStrategy;
use crate::models::Schedule;

/// Running screener counts and last-screened dates
#[derive(Debug, Clone)]
pub struct ScreenerTracker {
    counts: HashMap<Uuid, u32>,
    last: HashMap<Uuid, NaiveDate>,
    /// Total assigned days per analyst, consulted by WORKLOAD_BALANCE
    workload: HashMap<Uuid, u32>,
    strategy: ScreenerStrategy,
}

impl ScreenerTracker {
    pub fn new(strategy: ScreenerStrategy) -> Self {
        Self {
            counts: HashMap::new(),
            last: HashMap::new(),
            workload: HashMap::new(),
            strategy,
        }
    }

    /// Seed from historical screener rows in the relevant window
    pub fn seed_from_history(&mut self, history: &[Schedule]) {
        for s in history.iter().filter(|s| s.is_screener) {
            *self.counts.entry(s.analyst_id).or_insert(0) += 1;
            let entry = self.last.entry(s.analyst_id).or_insert(s.date);
            if s.date > *entry {
                *entry = s.date;
            }
        }
    }

    /// Record one unit of screener debt for a weekend workday
    ///
    /// Weekend duty offsets screener burden even when the weekend day has
    /// no formal screener, so the debt counts without moving the
    /// last-screened date.
    pub fn add_weekend_debt(&mut self, analyst_id: Uuid) {
        *self.counts.entry(analyst_id).or_insert(0) += 1;
    }

    /// Record an assigned day for workload-aware selection
    pub fn note_workload(&mut self, analyst_id: Uuid) {
        *self.workload.entry(analyst_id).or_insert(0) += 1;
    }

    pub fn count(&self, analyst_id: Uuid) -> u32 {
        self.counts.get(&analyst_id).copied().unwrap_or(0)
    }

    pub fn last_screened(&self, analyst_id: Uuid) -> Option<NaiveDate> {
        self.last.get(&analyst_id).copied()
    }

    /// Select the screener for a (date, shift) pool and record the pick
    pub fn select(&mut self, pool: &[Uuid], date: NaiveDate) -> Option<Uuid> {
        if pool.is_empty() {
            return None;
        }

        let mut ranked: Vec<Uuid> = pool.to_vec();
        ranked.sort_by(|&a, &b| {
            let primary = match self.strategy {
                ScreenerStrategy::RoundRobin => self.count(a).cmp(&self.count(b)),
                ScreenerStrategy::WorkloadBalance => (self.count(a)
                    + self.workload.get(&a).copied().unwrap_or(0))
                .cmp(&(self.count(b) + self.workload.get(&b).copied().unwrap_or(0))),
            };
            primary
                .then_with(|| self.last.get(&a).cmp(&self.last.get(&b)))
                .then_with(|| a.cmp(&b))
        });

        let chosen = ranked[0];
        *self.counts.entry(chosen).or_insert(0) += 1;
        self.last.insert(chosen, date);
        debug!(analyst = %chosen, %date, "screener selected");
        Some(chosen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScheduleKind;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tracker() -> ScreenerTracker {
        ScreenerTracker::new(ScreenerStrategy::RoundRobin)
    }

    #[test]
    fn test_empty_pool_selects_nobody() {
        let mut t = tracker();
        assert_eq!(t.select(&[], date(2026, 2, 2)), None);
    }

    #[test]
    fn test_exhaustive_before_repeat() {
        let mut t = tracker();
        let mut pool = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        pool.sort();

        let mut picks = Vec::new();
        for d in 2..=6 {
            picks.push(t.select(&pool, date(2026, 2, d)).unwrap());
        }

        // First three picks cover the whole pool before anyone repeats
        let first_round: std::collections::HashSet<Uuid> =
            picks[..3].iter().copied().collect();
        assert_eq!(first_round.len(), 3);
        // Every analyst screened at least once over the week
        for id in &pool {
            assert!(t.count(*id) >= 1);
        }
        // Nobody is two ahead of anyone else
        let counts: Vec<u32> = pool.iter().map(|id| t.count(*id)).collect();
        assert!(counts.iter().max().unwrap() - counts.iter().min().unwrap() <= 1);
    }

    #[test]
    fn test_tie_broken_by_least_recent_then_id() {
        let mut t = tracker();
        let mut ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        ids.sort();
        let (a, b) = (ids[0], ids[1]);

        // Equal counts, but b screened longer ago
        t.counts.insert(a, 1);
        t.counts.insert(b, 1);
        t.last.insert(a, date(2026, 1, 20));
        t.last.insert(b, date(2026, 1, 10));
        assert_eq!(t.select(&[a, b], date(2026, 2, 2)), Some(b));

        // Never-screened sorts before any dated entry
        let c = Uuid::new_v4();
        t.counts.insert(c, 1);
        assert_eq!(t.select(&[a, c], date(2026, 2, 3)), Some(c));
    }

    #[test]
    fn test_history_seeding_defers_prior_screeners() {
        let region = Uuid::new_v4();
        let veteran = Uuid::new_v4();
        let fresh = Uuid::new_v4();

        let mut history_row =
            Schedule::new(veteran, region, date(2026, 1, 26), "AM", ScheduleKind::Imported);
        history_row.is_screener = true;

        let mut t = tracker();
        t.seed_from_history(&[history_row]);
        assert_eq!(t.select(&[veteran, fresh], date(2026, 2, 2)), Some(fresh));
    }

    #[test]
    fn test_weekend_debt_offsets_screener_duty() {
        let mut t = tracker();
        let weekender = Uuid::new_v4();
        let other = Uuid::new_v4();

        t.add_weekend_debt(weekender);
        assert_eq!(t.select(&[weekender, other], date(2026, 2, 2)), Some(other));
    }

    #[test]
    fn test_workload_balance_prefers_lighter_load() {
        let mut t = ScreenerTracker::new(ScreenerStrategy::WorkloadBalance);
        let busy = Uuid::new_v4();
        let light = Uuid::new_v4();
        for _ in 0..4 {
            t.note_workload(busy);
        }
        t.note_workload(light);
        assert_eq!(t.select(&[busy, light], date(2026, 2, 2)), Some(light));
    }
}
