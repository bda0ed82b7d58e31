//! Configuration management for the scheduling engine
//!
//! This module handles loading and validating engine options from
//! environment variables and TOML files. Every option is optional and
//! carries a documented default, so an empty configuration is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ============================================================================
// Strategy Enums
// ============================================================================

/// How the orchestrator searches for a schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptimizationStrategy {
    /// Single deterministic constructive pass
    #[default]
    Greedy,
    /// Constructive pass followed by bounded local improvement
    HillClimbing,
}

impl OptimizationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greedy => "GREEDY",
            Self::HillClimbing => "HILL_CLIMBING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GREEDY" => Some(Self::Greedy),
            "HILL_CLIMBING" => Some(Self::HillClimbing),
            _ => None,
        }
    }

    /// Default iteration budget when `max_iterations` is unset
    pub fn default_iterations(&self) -> u32 {
        match self {
            Self::Greedy => 1,
            Self::HillClimbing => 1000,
        }
    }
}

impl fmt::Display for OptimizationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the screener for each (date, shift) is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScreenerStrategy {
    /// Exhaustive least-recently-used rotation
    #[default]
    RoundRobin,
    /// Weight selection by accumulated workload
    WorkloadBalance,
}

impl ScreenerStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "ROUND_ROBIN",
            Self::WorkloadBalance => "WORKLOAD_BALANCE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ROUND_ROBIN" => Some(Self::RoundRobin),
            "WORKLOAD_BALANCE" => Some(Self::WorkloadBalance),
            _ => None,
        }
    }
}

/// How the weekend rotation pool is ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeekendRotationStrategy {
    /// Fewest historical weekend days first
    #[default]
    FairnessOptimized,
}

impl WeekendRotationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FairnessOptimized => "FAIRNESS_OPTIMIZED",
        }
    }
}

// ============================================================================
// Engine Configuration
// ============================================================================

/// Recognized engine options, all optional with documented defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Search strategy for the orchestrator
    pub optimization_strategy: OptimizationStrategy,

    /// Iteration budget; defaults to 1 (GREEDY) or 1000 (HILL_CLIMBING)
    pub max_iterations: Option<u32>,

    /// Objective weights; must sum to 1.0
    pub fairness_weight: f64,
    pub efficiency_weight: f64,
    pub constraint_weight: f64,

    /// Screener designation strategy
    pub screener_assignment_strategy: ScreenerStrategy,

    /// Weekend pool ordering strategy
    pub weekend_rotation_strategy: WeekendRotationStrategy,

    /// Minimum days between two weekend duties of the same analyst
    pub min_weekend_gap_days: i64,

    /// Maximum consecutive work-day streak
    pub max_consecutive_work_days: u32,

    /// Deterministic jitter applied to pool ordering, 0.0 disables
    pub randomization_factor: f64,

    /// Soft deadline for a generation run; None means unbounded
    pub soft_deadline_ms: Option<u64>,

    /// Credit comp-off for analysts working a weekday holiday
    pub holiday_comp_credit: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            optimization_strategy: OptimizationStrategy::Greedy,
            max_iterations: None,
            fairness_weight: 1.0,
            efficiency_weight: 0.0,
            constraint_weight: 0.0,
            screener_assignment_strategy: ScreenerStrategy::RoundRobin,
            weekend_rotation_strategy: WeekendRotationStrategy::FairnessOptimized,
            min_weekend_gap_days: 13,
            max_consecutive_work_days: 5,
            randomization_factor: 0.0,
            soft_deadline_ms: None,
            holiday_comp_credit: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `ROTAPLAN_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("ROTAPLAN_OPTIMIZATION_STRATEGY") {
            config.optimization_strategy = OptimizationStrategy::parse(&v)
                .with_context(|| format!("unknown optimization strategy: {v}"))?;
        }
        if let Ok(v) = std::env::var("ROTAPLAN_MAX_ITERATIONS") {
            config.max_iterations = Some(v.parse().context("ROTAPLAN_MAX_ITERATIONS")?);
        }
        if let Ok(v) = std::env::var("ROTAPLAN_SCREENER_STRATEGY") {
            config.screener_assignment_strategy = ScreenerStrategy::parse(&v)
                .with_context(|| format!("unknown screener strategy: {v}"))?;
        }
        if let Ok(v) = std::env::var("ROTAPLAN_MIN_WEEKEND_GAP_DAYS") {
            config.min_weekend_gap_days = v.parse().context("ROTAPLAN_MIN_WEEKEND_GAP_DAYS")?;
        }
        if let Ok(v) = std::env::var("ROTAPLAN_MAX_CONSECUTIVE_WORK_DAYS") {
            config.max_consecutive_work_days =
                v.parse().context("ROTAPLAN_MAX_CONSECUTIVE_WORK_DAYS")?;
        }
        if let Ok(v) = std::env::var("ROTAPLAN_RANDOMIZATION_FACTOR") {
            config.randomization_factor = v.parse().context("ROTAPLAN_RANDOMIZATION_FACTOR")?;
        }
        if let Ok(v) = std::env::var("ROTAPLAN_SOFT_DEADLINE_MS") {
            config.soft_deadline_ms = Some(v.parse().context("ROTAPLAN_SOFT_DEADLINE_MS")?);
        }
        if let Ok(v) = std::env::var("ROTAPLAN_HOLIDAY_COMP_CREDIT") {
            config.holiday_comp_credit = v.parse().context("ROTAPLAN_HOLIDAY_COMP_CREDIT")?;
        }

        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    /// Effective iteration budget for the configured strategy
    pub fn effective_max_iterations(&self) -> u32 {
        self.max_iterations
            .unwrap_or_else(|| self.optimization_strategy.default_iterations())
    }

    /// Validate option values and cross-option invariants
    pub fn validate(&self) -> std::result::Result<(), String> {
        let weight_sum = self.fairness_weight + self.efficiency_weight + self.constraint_weight;
        if (weight_sum - 1.0).abs() > 1e-9 {
            return Err(format!("objective weights must sum to 1.0, got {weight_sum}"));
        }
        if self.fairness_weight < 0.0 || self.efficiency_weight < 0.0 || self.constraint_weight < 0.0
        {
            return Err(String::from("objective weights must be non-negative"));
        }
        if self.min_weekend_gap_days < 6 {
            return Err(format!(
                "min_weekend_gap_days must be at least 6, got {}",
                self.min_weekend_gap_days
            ));
        }
        if self.max_consecutive_work_days == 0 {
            return Err(String::from("max_consecutive_work_days must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.randomization_factor) {
            return Err(format!(
                "randomization_factor must be in [0, 1], got {}",
                self.randomization_factor
            ));
        }
        Ok(())
    }
}
