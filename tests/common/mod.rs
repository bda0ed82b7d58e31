//! Shared fixtures for integration tests
#![allow(dead_code)]

use chrono::{NaiveDate, NaiveTime};
use chrono_tz::America::New_York;
use rotaplan::config::EngineConfig;
use rotaplan::engine::service::GenerationRequest;
use rotaplan::models::{Analyst, Region, ShiftDefinition};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn region() -> Region {
    Region::new("US-East", New_York)
}

/// Single-shift catalog: AM 09:00–17:00
pub fn am_only_shifts(region: &Region) -> Vec<ShiftDefinition> {
    vec![ShiftDefinition::new(
        region.id,
        "AM",
        time(9, 0),
        time(17, 0),
    )]
}

/// Two-shift catalog: AM 09:00–17:00 and PM 14:00–23:00
pub fn am_pm_shifts(region: &Region) -> Vec<ShiftDefinition> {
    vec![
        ShiftDefinition::new(region.id, "AM", time(9, 0), time(17, 0)),
        ShiftDefinition::new(region.id, "PM", time(14, 0), time(23, 0)),
    ]
}

/// Build a roster of AM-affiliated analysts with the given names
pub fn roster(region: &Region, names: &[&str]) -> Vec<Analyst> {
    names
        .iter()
        .map(|n| {
            Analyst::new(
                region.id,
                *n,
                format!("{}@example.com", n.to_lowercase()),
                "AM",
            )
        })
        .collect()
}

/// A request over the standard two-week window with no extras
pub fn request(
    region: &Region,
    analysts: Vec<Analyst>,
    shifts: Vec<ShiftDefinition>,
    start: NaiveDate,
    end: NaiveDate,
) -> GenerationRequest {
    GenerationRequest {
        region: region.clone(),
        start,
        end,
        performer: "tests".into(),
        analysts,
        shift_definitions: shifts,
        vacations: Vec::new(),
        absences: Vec::new(),
        constraints: Vec::new(),
        holidays: Vec::new(),
        overwrite: false,
    }
}

pub fn default_config() -> EngineConfig {
    EngineConfig::default()
}
