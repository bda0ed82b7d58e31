//! Property tests for the streak and block-integrity rules

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use uuid::Uuid;

use rotaplan::models::{Schedule, ScheduleKind};
use rotaplan::swap::SwapValidator;

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()
}

/// Build schedules from a bit mask of worked days over a 40-day window
fn schedules_from_mask(analyst: Uuid, region: Uuid, mask: u64) -> Vec<Schedule> {
    (0..40u64)
        .filter(|i| mask & (1 << i) != 0)
        .map(|i| {
            Schedule::new(
                analyst,
                region,
                base_date() + Days::new(i),
                "AM",
                ScheduleKind::Imported,
            )
        })
        .collect()
}

proptest! {
    /// The simulator's verdict matches a direct re-derivation of the
    /// block-integrity rule from the raw timeline
    #[test]
    fn simulate_matches_block_rule(mask in 0u64..(1 << 40)) {
        let analyst = Uuid::new_v4();
        let region = Uuid::new_v4();
        let schedules = schedules_from_mask(analyst, region, mask);
        let validator = SwapValidator::new(&schedules);

        let violations = validator.simulate(
            analyst,
            base_date(),
            base_date() + Days::new(39),
            &[],
            &[],
        );

        // Re-derive spans directly from the mask
        let mut expected = 0usize;
        let mut run = 0i64;
        for i in 0..=40u64 {
            let worked = i < 40 && mask & (1 << i) != 0;
            if worked {
                run += 1;
            } else {
                if run > 5 && run % 5 != 0 {
                    expected += 1;
                }
                run = 0;
            }
        }
        prop_assert_eq!(violations.len(), expected);

        // Every reported violation really has an illegal length
        for v in &violations {
            prop_assert!(v.streak_length > 5);
            prop_assert!(v.streak_length % 5 != 0);
        }
    }

    /// Removing a date can never create a violation that adding it back
    /// would not also surface: a timeline and its re-added inverse agree
    #[test]
    fn add_remove_round_trip(mask in 0u64..(1 << 20), day in 0u64..20) {
        let analyst = Uuid::new_v4();
        let region = Uuid::new_v4();
        let schedules = schedules_from_mask(analyst, region, mask);
        let validator = SwapValidator::new(&schedules);
        let start = base_date();
        let end = base_date() + Days::new(19);
        let pivot = base_date() + Days::new(day);

        let baseline = validator.simulate(analyst, start, end, &[], &[]);
        let round_trip = validator.simulate(analyst, start, end, &[pivot], &[pivot]);
        // Adding back a removed date restores the original verdict; the
        // add list wins over the remove list by construction order
        prop_assert_eq!(baseline.len(), round_trip.len());
    }
}
