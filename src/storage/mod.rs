//! Persistence layer
//!
//! Trait-based repository abstractions decouple the engine from storage:
//! the engine only writes schedules, rotation snapshots, comp-off records,
//! and run logs, and reads everything through the same traits. A SQLite
//! implementation ships next to an in-memory one for hermetic tests.

pub mod repository;

pub use repository::{
    CompOffRepository, GenerationLogRepository, MemoryStore, RotationStateRepository,
    ScheduleRepository, SqliteStore, UpsertSummary,
};
