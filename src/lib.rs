//! rotaplan - Analyst shift scheduling engine
//!
//! Generates fair, constraint-compliant work schedules for a pool of
//! analysts across operational regions: staggered weekend rotation,
//! streak-capped weekday assignment, exhaustive-LRU screener selection,
//! an auditable comp-off ledger, and swap validation, all over a
//! timezone-correct date walk.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`calendar`] - Timezone-anchored date walk and week predicates
//! - [`catalog`] - Per-region shift definitions and legacy aliases
//! - [`availability`] - Absence/vacation availability index
//! - [`constraints`] - Hard and soft constraint evaluation
//! - [`rotation`] - Staggered weekend rotation state machine
//! - [`assignment`] - Weekend and weekday assignment passes
//! - [`screener`] - Exhaustive-LRU screener fairness tracking
//! - [`compoff`] - Append-only compensatory time-off ledger
//! - [`fairness`] - Distribution metrics over generated output
//! - [`swap`] - Block-integrity swap simulation
//! - [`engine`] - Orchestrator and boundary service
//! - [`storage`] - Repository traits, SQLite and in-memory stores
//! - [`config`] - Engine options with env/TOML loading
//! - [`utils`] - Shared helpers
//!
//! # Example
//!
//! ```no_run
//! use rotaplan::config::EngineConfig;
//! use rotaplan::engine::service::{GenerationRequest, ScheduleEngine};
//! use rotaplan::storage::SqliteStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(SqliteStore::new("schedules.db")?);
//!     let engine = ScheduleEngine::new(store, EngineConfig::default());
//!     // let result = engine.generate(request, None).await?;
//!     Ok(())
//! }
//! ```

pub mod assignment;
pub mod availability;
pub mod calendar;
pub mod catalog;
pub mod compoff;
pub mod config;
pub mod constraints;
pub mod engine;
pub mod error;
pub mod fairness;
pub mod models;
pub mod rotation;
pub mod screener;
pub mod storage;
pub mod swap;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::calendar::Calendar;
    pub use crate::catalog::ShiftCatalog;
    pub use crate::compoff::{BalanceView, CompOffLedger, CompOffService};
    pub use crate::config::EngineConfig;
    pub use crate::engine::service::{GenerationRequest, ScheduleEngine};
    pub use crate::engine::{
        CancellationFlag, GenerationContext, GenerationResult, Generator,
    };
    pub use crate::error::{EngineError, EngineResult};
    pub use crate::models::{
        Analyst, Holiday, Region, Schedule, ScheduleKind, SchedulingConstraint,
        ShiftDefinition, Vacation, WorkPattern,
    };
    pub use crate::storage::{MemoryStore, SqliteStore};
    pub use crate::swap::{SwapValidator, SwapViolation};
}
