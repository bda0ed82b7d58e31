//! Repository traits and implementations
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Scheduling Engine                        │
//! │            (generator, swap validator, ledger)              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Repository Traits                         │
//! │  ScheduleRepository, RotationStateRepository,               │
//! │  CompOffRepository, GenerationLogRepository                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                  ┌───────────┴───────────┐
//!                  ▼                       ▼
//!         ┌─────────────────┐     ┌─────────────────┐
//!         │     SQLite      │     │     Memory      │
//!         │ Implementation  │     │ Implementation  │
//!         └─────────────────┘     └─────────────────┘
//! ```
//!
//! Dates are stored as normalized `YYYY-MM-DD` strings. Schedule rows are
//! unique on (analyst, date, shift_type); the writer chooses between
//! idempotent skip and audited overwrite. Rotation snapshots persist with
//! a monotonic version and writes are compare-and-set: a stale version is
//! rejected with a recoverable integrity error.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::compoff::{CompOffBalance, CompOffLedger, CompOffTransaction};
use crate::error::{EngineError, EngineResult};
use crate::models::{GenerationLog, RunStatus, Schedule, ScheduleKind};
use crate::rotation::RotationState;

// ============================================================================
// Core Types
// ============================================================================

/// Outcome counters for a bulk schedule upsert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub skipped: usize,
    pub overwritten: usize,
}

// ============================================================================
// Repository Traits
// ============================================================================

/// Schedule reads and the engine's only schedule write path
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// All schedules for a region intersecting the inclusive range
    async fn schedules_in_range(
        &self,
        region_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<Schedule>>;

    /// All schedules for one analyst intersecting the inclusive range
    async fn schedules_for_analyst(
        &self,
        analyst_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<Schedule>>;

    /// Upsert under the (analyst, date, shift_type) uniqueness key
    ///
    /// On conflict: skip when `overwrite` is false, replace when true.
    async fn upsert_schedules(
        &self,
        schedules: &[Schedule],
        overwrite: bool,
    ) -> EngineResult<UpsertSummary>;
}

/// Versioned rotation snapshot store
#[async_trait]
pub trait RotationStateRepository: Send + Sync {
    async fn load_state(
        &self,
        algorithm: &str,
        shift_type: &str,
    ) -> EngineResult<Option<RotationState>>;

    /// Compare-and-set write: rejected with a recoverable stale-snapshot
    /// error unless `state.version` is strictly newer than the stored one
    async fn store_state(&self, state: &RotationState) -> EngineResult<()>;

    /// Drop persisted state so the next generation reseeds from scratch
    async fn reset_state(&self, algorithm: &str, shift_type: &str) -> EngineResult<()>;
}

/// Comp-off ledger persistence
#[async_trait]
pub trait CompOffRepository: Send + Sync {
    async fn load_ledger(&self) -> EngineResult<CompOffLedger>;
    async fn save_ledger(&self, ledger: &CompOffLedger) -> EngineResult<()>;
}

/// Generation run log persistence
#[async_trait]
pub trait GenerationLogRepository: Send + Sync {
    async fn append_log(&self, log: &GenerationLog) -> EngineResult<()>;
    async fn recent_logs(&self, limit: usize) -> EngineResult<Vec<GenerationLog>>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite-backed store implementing every repository trait
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database at the given path
    pub fn new(path: impl AsRef<Path>) -> EngineResult<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("open sqlite db at {}", path.as_ref().display()))
            .map_err(EngineError::storage)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory database, primarily for tests
    pub fn in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()
            .context("open in-memory sqlite db")
            .map_err(EngineError::storage)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> EngineResult<()> {
        let conn = self.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schedules (
                id TEXT PRIMARY KEY,
                analyst_id TEXT NOT NULL,
                date TEXT NOT NULL,
                shift_type TEXT NOT NULL,
                is_screener INTEGER NOT NULL DEFAULT 0,
                region_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                UNIQUE (analyst_id, date, shift_type)
            );
            CREATE INDEX IF NOT EXISTS idx_schedules_region_date
                ON schedules (region_id, date);
            CREATE INDEX IF NOT EXISTS idx_schedules_analyst_date
                ON schedules (analyst_id, date);

            CREATE TABLE IF NOT EXISTS rotation_states (
                algorithm TEXT NOT NULL,
                shift_type TEXT NOT NULL,
                version INTEGER NOT NULL,
                snapshot TEXT NOT NULL,
                PRIMARY KEY (algorithm, shift_type)
            );

            CREATE TABLE IF NOT EXISTS comp_off_ledger (
                singleton INTEGER PRIMARY KEY CHECK (singleton = 0),
                payload TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS generation_logs (
                run_id TEXT PRIMARY KEY,
                performer TEXT NOT NULL,
                algorithm TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                schedules_generated INTEGER NOT NULL,
                conflicts_detected INTEGER NOT NULL,
                fairness_score REAL NOT NULL,
                execution_time_ms INTEGER NOT NULL,
                status TEXT NOT NULL,
                error_message TEXT,
                metadata TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .context("initialize schema")
        .map_err(EngineError::storage)?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn row_to_schedule(row: &rusqlite::Row<'_>) -> rusqlite::Result<Schedule> {
        let id: String = row.get(0)?;
        let analyst_id: String = row.get(1)?;
        let date: String = row.get(2)?;
        let shift_type: String = row.get(3)?;
        let is_screener: bool = row.get(4)?;
        let region_id: String = row.get(5)?;
        let kind: String = row.get(6)?;
        Ok(Schedule {
            id: id.parse().unwrap_or_else(|_| Uuid::nil()),
            analyst_id: analyst_id.parse().unwrap_or_else(|_| Uuid::nil()),
            date: date.parse().unwrap_or_default(),
            shift_type,
            is_screener,
            region_id: region_id.parse().unwrap_or_else(|_| Uuid::nil()),
            kind: ScheduleKind::parse(&kind).unwrap_or(ScheduleKind::Imported),
        })
    }
}

#[async_trait]
impl ScheduleRepository for SqliteStore {
    async fn schedules_in_range(
        &self,
        region_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<Schedule>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, analyst_id, date, shift_type, is_screener, region_id, kind
                 FROM schedules
                 WHERE region_id = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date, shift_type, analyst_id",
            )
            .context("prepare range query")
            .map_err(EngineError::storage)?;
        let rows = stmt
            .query_map(
                params![region_id.to_string(), start.to_string(), end.to_string()],
                Self::row_to_schedule,
            )
            .context("query schedules in range")
            .map_err(EngineError::storage)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("read schedule rows")
            .map_err(EngineError::storage)
    }

    async fn schedules_for_analyst(
        &self,
        analyst_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<Schedule>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, analyst_id, date, shift_type, is_screener, region_id, kind
                 FROM schedules
                 WHERE analyst_id = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date, shift_type",
            )
            .context("prepare analyst query")
            .map_err(EngineError::storage)?;
        let rows = stmt
            .query_map(
                params![analyst_id.to_string(), start.to_string(), end.to_string()],
                Self::row_to_schedule,
            )
            .context("query analyst schedules")
            .map_err(EngineError::storage)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("read schedule rows")
            .map_err(EngineError::storage)
    }

    async fn upsert_schedules(
        &self,
        schedules: &[Schedule],
        overwrite: bool,
    ) -> EngineResult<UpsertSummary> {
        let mut conn = self.lock();
        let tx = conn
            .transaction()
            .context("begin upsert transaction")
            .map_err(EngineError::storage)?;

        let mut summary = UpsertSummary::default();
        for s in schedules {
            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM schedules
                     WHERE analyst_id = ?1 AND date = ?2 AND shift_type = ?3",
                    params![s.analyst_id.to_string(), s.date.to_string(), s.shift_type],
                    |row| row.get(0),
                )
                .optional()
                .context("probe uniqueness key")
                .map_err(EngineError::storage)?;

            match existing {
                Some(_) if !overwrite => {
                    summary.skipped += 1;
                }
                Some(existing_id) => {
                    tx.execute(
                        "UPDATE schedules
                         SET id = ?1, is_screener = ?2, region_id = ?3, kind = ?4
                         WHERE id = ?5",
                        params![
                            s.id.to_string(),
                            s.is_screener,
                            s.region_id.to_string(),
                            s.kind.as_str(),
                            existing_id
                        ],
                    )
                    .context("overwrite schedule")
                    .map_err(EngineError::storage)?;
                    summary.overwritten += 1;
                }
                None => {
                    tx.execute(
                        "INSERT INTO schedules
                         (id, analyst_id, date, shift_type, is_screener, region_id, kind)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![
                            s.id.to_string(),
                            s.analyst_id.to_string(),
                            s.date.to_string(),
                            s.shift_type,
                            s.is_screener,
                            s.region_id.to_string(),
                            s.kind.as_str()
                        ],
                    )
                    .context("insert schedule")
                    .map_err(EngineError::storage)?;
                    summary.inserted += 1;
                }
            }
        }

        tx.commit()
            .context("commit upsert transaction")
            .map_err(EngineError::storage)?;
        Ok(summary)
    }
}

#[async_trait]
impl RotationStateRepository for SqliteStore {
    async fn load_state(
        &self,
        algorithm: &str,
        shift_type: &str,
    ) -> EngineResult<Option<RotationState>> {
        let conn = self.lock();
        let snapshot: Option<String> = conn
            .query_row(
                "SELECT snapshot FROM rotation_states
                 WHERE algorithm = ?1 AND shift_type = ?2",
                params![algorithm, shift_type],
                |row| row.get(0),
            )
            .optional()
            .context("load rotation snapshot")
            .map_err(EngineError::storage)?;
        snapshot.map(|json| RotationState::from_json(&json)).transpose()
    }

    async fn store_state(&self, state: &RotationState) -> EngineResult<()> {
        let conn = self.lock();
        let stored_version: Option<u64> = conn
            .query_row(
                "SELECT version FROM rotation_states
                 WHERE algorithm = ?1 AND shift_type = ?2",
                params![state.algorithm, state.shift_type],
                |row| row.get(0),
            )
            .optional()
            .context("probe rotation version")
            .map_err(EngineError::storage)?;

        if let Some(version) = stored_version {
            if version >= state.version {
                return Err(EngineError::stale_snapshot(format!(
                    "rotation ({}, {}): stored version {} >= write version {}",
                    state.algorithm, state.shift_type, version, state.version
                )));
            }
        }

        conn.execute(
            "INSERT INTO rotation_states (algorithm, shift_type, version, snapshot)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (algorithm, shift_type)
             DO UPDATE SET version = ?3, snapshot = ?4",
            params![
                state.algorithm,
                state.shift_type,
                state.version,
                state.to_json()?
            ],
        )
        .context("store rotation snapshot")
        .map_err(EngineError::storage)?;
        Ok(())
    }

    async fn reset_state(&self, algorithm: &str, shift_type: &str) -> EngineResult<()> {
        let conn = self.lock();
        conn.execute(
            "DELETE FROM rotation_states WHERE algorithm = ?1 AND shift_type = ?2",
            params![algorithm, shift_type],
        )
        .context("reset rotation state")
        .map_err(EngineError::storage)?;
        Ok(())
    }
}

#[async_trait]
impl CompOffRepository for SqliteStore {
    async fn load_ledger(&self) -> EngineResult<CompOffLedger> {
        let conn = self.lock();
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM comp_off_ledger WHERE singleton = 0",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("load ledger")
            .map_err(EngineError::storage)?;
        match payload {
            Some(json) => {
                let (balances, transactions): (Vec<CompOffBalance>, Vec<CompOffTransaction>) =
                    serde_json::from_str(&json)?;
                CompOffLedger::from_records(balances, transactions)
            }
            None => Ok(CompOffLedger::new()),
        }
    }

    async fn save_ledger(&self, ledger: &CompOffLedger) -> EngineResult<()> {
        ledger.verify_integrity()?;
        let balances: Vec<_> = ledger.balances().cloned().collect();
        let payload = serde_json::to_string(&(balances, ledger.all_transactions()))?;
        let conn = self.lock();
        conn.execute(
            "INSERT INTO comp_off_ledger (singleton, payload) VALUES (0, ?1)
             ON CONFLICT (singleton) DO UPDATE SET payload = ?1",
            params![payload],
        )
        .context("save ledger")
        .map_err(EngineError::storage)?;
        Ok(())
    }
}

#[async_trait]
impl GenerationLogRepository for SqliteStore {
    async fn append_log(&self, log: &GenerationLog) -> EngineResult<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO generation_logs
             (run_id, performer, algorithm, start_date, end_date,
              schedules_generated, conflicts_detected, fairness_score,
              execution_time_ms, status, error_message, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                log.run_id.to_string(),
                log.performer,
                log.algorithm,
                log.start.to_string(),
                log.end.to_string(),
                log.schedules_generated,
                log.conflicts_detected,
                log.fairness_score,
                log.execution_time_ms,
                log.status.as_str(),
                log.error_message,
                log.metadata.as_ref().map(|m| m.to_string()),
                log.created_at.to_rfc3339(),
            ],
        )
        .context("append generation log")
        .map_err(EngineError::storage)?;
        Ok(())
    }

    async fn recent_logs(&self, limit: usize) -> EngineResult<Vec<GenerationLog>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT run_id, performer, algorithm, start_date, end_date,
                        schedules_generated, conflicts_detected, fairness_score,
                        execution_time_ms, status, error_message, metadata, created_at
                 FROM generation_logs
                 ORDER BY created_at DESC
                 LIMIT ?1",
            )
            .context("prepare log query")
            .map_err(EngineError::storage)?;
        let rows = stmt
            .query_map(params![limit], |row| {
                let run_id: String = row.get(0)?;
                let start: String = row.get(3)?;
                let end: String = row.get(4)?;
                let status: String = row.get(9)?;
                let metadata: Option<String> = row.get(11)?;
                let created_at: String = row.get(12)?;
                Ok(GenerationLog {
                    run_id: run_id.parse().unwrap_or_else(|_| Uuid::nil()),
                    performer: row.get(1)?,
                    algorithm: row.get(2)?,
                    start: start.parse().unwrap_or_default(),
                    end: end.parse().unwrap_or_default(),
                    schedules_generated: row.get(5)?,
                    conflicts_detected: row.get(6)?,
                    fairness_score: row.get(7)?,
                    execution_time_ms: row.get(8)?,
                    status: match status.as_str() {
                        "SUCCESS" => RunStatus::Success,
                        "PARTIAL" => RunStatus::Partial,
                        _ => RunStatus::Failed,
                    },
                    error_message: row.get(10)?,
                    metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
                    created_at: created_at
                        .parse()
                        .unwrap_or_else(|_| chrono::Utc::now()),
                })
            })
            .context("query logs")
            .map_err(EngineError::storage)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("read log rows")
            .map_err(EngineError::storage)
    }
}

// ============================================================================
// In-Memory Implementation
// ============================================================================

#[derive(Debug, Default)]
struct MemoryInner {
    schedules: Vec<Schedule>,
    rotation_states: HashMap<(String, String), RotationState>,
    ledger: CompOffLedger,
    logs: Vec<GenerationLog>,
}

/// In-memory store for tests and hermetic embedding
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-load schedules, bypassing uniqueness handling
    pub fn seed_schedules(&self, schedules: Vec<Schedule>) {
        self.write().schedules.extend(schedules);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MemoryInner> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MemoryInner> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl ScheduleRepository for MemoryStore {
    async fn schedules_in_range(
        &self,
        region_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<Schedule>> {
        Ok(self
            .read()
            .schedules
            .iter()
            .filter(|s| s.region_id == region_id && s.date >= start && s.date <= end)
            .cloned()
            .collect())
    }

    async fn schedules_for_analyst(
        &self,
        analyst_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<Schedule>> {
        Ok(self
            .read()
            .schedules
            .iter()
            .filter(|s| s.analyst_id == analyst_id && s.date >= start && s.date <= end)
            .cloned()
            .collect())
    }

    async fn upsert_schedules(
        &self,
        schedules: &[Schedule],
        overwrite: bool,
    ) -> EngineResult<UpsertSummary> {
        let mut inner = self.write();
        let mut summary = UpsertSummary::default();
        for s in schedules {
            let existing = inner
                .schedules
                .iter()
                .position(|e| e.key() == s.key());
            match existing {
                Some(_) if !overwrite => summary.skipped += 1,
                Some(i) => {
                    inner.schedules[i] = s.clone();
                    summary.overwritten += 1;
                }
                None => {
                    inner.schedules.push(s.clone());
                    summary.inserted += 1;
                }
            }
        }
        Ok(summary)
    }
}

#[async_trait]
impl RotationStateRepository for MemoryStore {
    async fn load_state(
        &self,
        algorithm: &str,
        shift_type: &str,
    ) -> EngineResult<Option<RotationState>> {
        Ok(self
            .read()
            .rotation_states
            .get(&(algorithm.to_string(), shift_type.to_string()))
            .cloned())
    }

    async fn store_state(&self, state: &RotationState) -> EngineResult<()> {
        let mut inner = self.write();
        let key = (state.algorithm.clone(), state.shift_type.clone());
        if let Some(existing) = inner.rotation_states.get(&key) {
            if existing.version >= state.version {
                return Err(EngineError::stale_snapshot(format!(
                    "rotation ({}, {}): stored version {} >= write version {}",
                    state.algorithm, state.shift_type, existing.version, state.version
                )));
            }
        }
        inner.rotation_states.insert(key, state.clone());
        Ok(())
    }

    async fn reset_state(&self, algorithm: &str, shift_type: &str) -> EngineResult<()> {
        self.write()
            .rotation_states
            .remove(&(algorithm.to_string(), shift_type.to_string()));
        Ok(())
    }
}

#[async_trait]
impl CompOffRepository for MemoryStore {
    async fn load_ledger(&self) -> EngineResult<CompOffLedger> {
        Ok(self.read().ledger.clone())
    }

    async fn save_ledger(&self, ledger: &CompOffLedger) -> EngineResult<()> {
        ledger.verify_integrity()?;
        self.write().ledger = ledger.clone();
        Ok(())
    }
}

#[async_trait]
impl GenerationLogRepository for MemoryStore {
    async fn append_log(&self, log: &GenerationLog) -> EngineResult<()> {
        self.write().logs.push(log.clone());
        Ok(())
    }

    async fn recent_logs(&self, limit: usize) -> EngineResult<Vec<GenerationLog>> {
        let inner = self.read();
        Ok(inner.logs.iter().rev().take(limit).cloned().collect())
    }
}
