//! Region shift catalog
//!
//! Holds the ordered shift definitions of one region and resolves analyst
//! shift affiliations, including the legacy "MORNING"/"EVENING" aliases
//! that pre-date catalog-driven shift names. A region without a single
//! shift definition cannot be scheduled; that is a fatal configuration
//! error raised when the catalog is built.

use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{Analyst, ShiftDefinition, LEGACY_EVENING, LEGACY_MORNING};

/// Ordered shift definitions for one region
///
/// Order is start time ascending; the earliest definition is the
/// AM-equivalent and the latest the PM-equivalent.
#[derive(Debug, Clone)]
pub struct ShiftCatalog {
    region_id: Uuid,
    shifts: Vec<ShiftDefinition>,
    by_name: HashMap<String, usize>,
}

impl ShiftCatalog {
    /// Build the catalog for a region from its shift definitions
    pub fn new(region_id: Uuid, mut shifts: Vec<ShiftDefinition>) -> EngineResult<Self> {
        shifts.retain(|s| s.region_id == region_id);
        if shifts.is_empty() {
            return Err(EngineError::config(format!(
                "region {region_id} has no shift definitions"
            )));
        }
        shifts.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.name.cmp(&b.name)));

        let by_name = shifts
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();

        Ok(Self {
            region_id,
            shifts,
            by_name,
        })
    }

    pub fn region_id(&self) -> Uuid {
        self.region_id
    }

    /// All definitions, earliest start first
    pub fn shifts(&self) -> &[ShiftDefinition] {
        &self.shifts
    }

    pub fn len(&self) -> usize {
        self.shifts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shifts.is_empty()
    }

    /// The earliest-starting shift (AM-equivalent)
    pub fn am(&self) -> &ShiftDefinition {
        &self.shifts[0]
    }

    /// The latest-starting shift (PM-equivalent)
    pub fn pm(&self) -> &ShiftDefinition {
        &self.shifts[self.shifts.len() - 1]
    }

    /// Whether the region runs more than one shift
    pub fn is_multi_shift(&self) -> bool {
        self.shifts.len() > 1
    }

    /// Resolve a shift name or legacy alias to its definition
    pub fn resolve(&self, name: &str) -> Option<&ShiftDefinition> {
        match name.to_uppercase().as_str() {
            LEGACY_MORNING => Some(self.am()),
            LEGACY_EVENING => Some(self.pm()),
            _ => self.by_name.get(name).map(|&i| &self.shifts[i]),
        }
    }

    /// Resolve an analyst's affiliation to a concrete shift
    pub fn shift_for(&self, analyst: &Analyst) -> Option<&ShiftDefinition> {
        self.resolve(&analyst.shift_affiliation)
    }

    /// Whether an analyst's affiliation resolves to the named shift
    pub fn affiliated_with(&self, analyst: &Analyst, shift_name: &str) -> bool {
        match (self.shift_for(analyst), self.by_name.get(shift_name)) {
            (Some(resolved), Some(&i)) => resolved.name == self.shifts[i].name,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn catalog() -> (Uuid, ShiftCatalog) {
        let region = Uuid::new_v4();
        let shifts = vec![
            ShiftDefinition::new(region, "PM", time(14, 0), time(23, 0)),
            ShiftDefinition::new(region, "AM", time(9, 0), time(17, 0)),
        ];
        (region, ShiftCatalog::new(region, shifts).unwrap())
    }

    #[test]
    fn test_empty_catalog_is_config_error() {
        let region = Uuid::new_v4();
        let err = ShiftCatalog::new(region, vec![]).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_foreign_region_shifts_filtered() {
        let region = Uuid::new_v4();
        let other = Uuid::new_v4();
        let shifts = vec![ShiftDefinition::new(other, "AM", time(9, 0), time(17, 0))];
        assert!(ShiftCatalog::new(region, shifts).is_err());
    }

    #[test]
    fn test_ordering_by_start_time() {
        let (_, catalog) = catalog();
        assert_eq!(catalog.am().name, "AM");
        assert_eq!(catalog.pm().name, "PM");
        assert!(catalog.is_multi_shift());
    }

    #[test]
    fn test_legacy_alias_resolution() {
        let (_, catalog) = catalog();
        assert_eq!(catalog.resolve("MORNING").unwrap().name, "AM");
        assert_eq!(catalog.resolve("EVENING").unwrap().name, "PM");
        assert_eq!(catalog.resolve("morning").unwrap().name, "AM");
    }

    #[test]
    fn test_exact_name_resolution() {
        let (_, catalog) = catalog();
        assert_eq!(catalog.resolve("AM").unwrap().name, "AM");
        assert_eq!(catalog.resolve("PM").unwrap().name, "PM");
        assert!(catalog.resolve("NIGHT").is_none());
    }

    #[test]
    fn test_affiliation_matching() {
        let (region, catalog) = catalog();
        let legacy = Analyst::new(region, "Ada", "ada@example.com", "MORNING");
        let direct = Analyst::new(region, "Bea", "bea@example.com", "PM");

        assert!(catalog.affiliated_with(&legacy, "AM"));
        assert!(!catalog.affiliated_with(&legacy, "PM"));
        assert!(catalog.affiliated_with(&direct, "PM"));
    }

    #[test]
    fn test_single_shift_region() {
        let region = Uuid::new_v4();
        let shifts = vec![ShiftDefinition::new(region, "AM", time(9, 0), time(17, 0))];
        let catalog = ShiftCatalog::new(region, shifts).unwrap();
        assert!(!catalog.is_multi_shift());
        // With one definition the AM and PM equivalents coincide
        assert_eq!(catalog.am().name, catalog.pm().name);
        assert_eq!(catalog.resolve("EVENING").unwrap().name, "AM");
    }
}
