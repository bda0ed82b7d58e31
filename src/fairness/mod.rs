//! Fairness metrics over generated schedules
//!
//! Reported alongside the schedule set; the metrics never gate acceptance
//! but feed the violation report and the optional optimization pass.
//! Analysts with zero assignments still count toward the mean, so an
//! uneven roster shows up as a low score instead of hiding.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::HashMap;
use uuid::Uuid;

use crate::calendar::Calendar;
use crate::catalog::ShiftCatalog;
use crate::models::Schedule;

/// Per-analyst assignment totals
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AnalystTotals {
    pub total_days: u32,
    pub weekend_days: u32,
    pub screener_days: u32,
    pub after_hours_days: u32,
}

/// Distribution metrics over the final schedule set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FairnessReport {
    pub per_analyst: HashMap<Uuid, AnalystTotals>,
    pub mean_total_days: f64,
    pub variance: f64,
    pub std_dev: f64,
    /// `max(0, 1 − σ/mean)`, 1.0 for an empty or perfectly even set
    pub overall_score: f64,
    /// `clamp(1 − |total_i − mean|/mean, 0, 1)` per analyst
    pub individual_scores: HashMap<Uuid, f64>,
}

impl FairnessReport {
    /// Compute metrics for a schedule set over the full roster
    pub fn compute(
        schedules: &[Schedule],
        roster: &[Uuid],
        catalog: &ShiftCatalog,
        calendar: &Calendar,
    ) -> Self {
        let mut per_analyst: HashMap<Uuid, AnalystTotals> =
            roster.iter().map(|id| (*id, AnalystTotals::default())).collect();

        for s in schedules {
            let totals = per_analyst.entry(s.analyst_id).or_default();
            totals.total_days += 1;
            if calendar.is_weekend(s.date) {
                totals.weekend_days += 1;
            }
            if s.is_screener {
                totals.screener_days += 1;
            }
            let after_hours = catalog
                .resolve(&s.shift_type)
                .map(|def| def.overnight || (catalog.is_multi_shift() && def.name == catalog.pm().name))
                .unwrap_or(false);
            if after_hours {
                totals.after_hours_days += 1;
            }
        }

        let totals: Vec<f64> = per_analyst.values().map(|t| t.total_days as f64).collect();
        if totals.is_empty() {
            return Self {
                per_analyst,
                mean_total_days: 0.0,
                variance: 0.0,
                std_dev: 0.0,
                overall_score: 1.0,
                individual_scores: HashMap::new(),
            };
        }

        let mean = totals.iter().copied().mean();
        let variance = totals.iter().copied().population_variance();
        let std_dev = totals.iter().copied().population_std_dev();

        let overall_score = if mean > 0.0 {
            (1.0 - std_dev / mean).max(0.0)
        } else {
            1.0
        };

        let individual_scores = per_analyst
            .iter()
            .map(|(id, t)| {
                let score = if mean > 0.0 {
                    (1.0 - (t.total_days as f64 - mean).abs() / mean).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                (*id, score)
            })
            .collect();

        Self {
            per_analyst,
            mean_total_days: mean,
            variance,
            std_dev,
            overall_score,
            individual_scores,
        }
    }
}
