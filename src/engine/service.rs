//! Boundary service around the synchronous generator
//!
//! [`ScheduleEngine`] owns the repository handles and performs all
//! suspension-point I/O: loading history, the ledger, and rotation
//! snapshots before a run, and persisting schedules, snapshots, ledger
//! writes, and the run log afterwards. The date walk itself stays inside
//! the synchronous [`Generator`](super::Generator).

use chrono::{Days, NaiveDate};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

use crate::catalog::ShiftCatalog;
use crate::compoff::{BalanceView, CompOffTransaction, TransactionKind};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Analyst, GenerationLog, Holiday, Region, RunStatus, Schedule, SchedulingConstraint,
    ShiftDefinition, Vacation,
};
use crate::rotation::{RotationState, RotationStatistics};
use crate::storage::{
    CompOffRepository, GenerationLogRepository, RotationStateRepository, ScheduleRepository,
};
use crate::swap::{SwapValidator, SwapViolation, CONTEXT_PADDING_DAYS};
use crate::utils::retry::retry_once_recoverable;

use super::{
    CancellationFlag, GenerationContext, GenerationResult, Generator, ALGORITHM_NAME,
};

/// Days of history loaded before the range start for seeding streaks,
/// continuity, and screener counts
pub const HISTORY_LOOKBACK_DAYS: u64 = 35;

/// Inputs the caller supplies for one generation run
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub region: Region,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub performer: String,
    pub analysts: Vec<Analyst>,
    pub shift_definitions: Vec<ShiftDefinition>,
    pub vacations: Vec<Vacation>,
    pub absences: Vec<(Uuid, NaiveDate, NaiveDate)>,
    pub constraints: Vec<SchedulingConstraint>,
    pub holidays: Vec<Holiday>,
    /// Replace conflicting stored rows instead of skipping them
    pub overwrite: bool,
}

/// Repository-backed engine exposing the programmatic API
pub struct ScheduleEngine<S>
where
    S: ScheduleRepository
        + RotationStateRepository
        + CompOffRepository
        + GenerationLogRepository,
{
    store: Arc<S>,
    generator: Generator,
    config: EngineConfig,
    /// Serializes ledger load-mutate-save sequences
    ledger_guard: Mutex<()>,
}

impl<S> ScheduleEngine<S>
where
    S: ScheduleRepository
        + RotationStateRepository
        + CompOffRepository
        + GenerationLogRepository,
{
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self {
            store,
            generator: Generator::new(),
            config,
            ledger_guard: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Generation
    // ------------------------------------------------------------------

    /// Run a generation and persist its outputs
    ///
    /// All-or-nothing: on any generator error nothing is written except a
    /// best-effort failure log entry.
    pub async fn generate(
        &self,
        request: GenerationRequest,
        cancel: Option<&CancellationFlag>,
    ) -> EngineResult<GenerationResult> {
        let history_start = request
            .start
            .checked_sub_days(Days::new(HISTORY_LOOKBACK_DAYS))
            .unwrap_or(request.start);
        let (existing, ledger) = futures::try_join!(
            self.store
                .schedules_in_range(request.region.id, history_start, request.end),
            self.store.load_ledger(),
        )?;

        // Load persisted rotation snapshots per shift name
        let catalog = ShiftCatalog::new(request.region.id, request.shift_definitions.clone())?;
        let mut rotation_states = HashMap::new();
        for shift in catalog.shifts() {
            if let Some(state) = self.store.load_state(ALGORITHM_NAME, &shift.name).await? {
                rotation_states.insert(shift.name.clone(), state);
            }
        }

        let ctx = GenerationContext {
            region: request.region.clone(),
            start: request.start,
            end: request.end,
            performer: request.performer.clone(),
            analysts: request.analysts.clone(),
            shift_definitions: request.shift_definitions.clone(),
            existing_schedules: existing,
            vacations: request.vacations.clone(),
            absences: request.absences.clone(),
            constraints: request.constraints.clone(),
            holidays: request.holidays.clone(),
            rotation_states,
            ledger,
            config: self.config.clone(),
        };

        let result = match self.generator.generate(&ctx, cancel) {
            Ok(result) => result,
            Err(err) => {
                self.log_failure(&request, &err).await;
                return Err(err);
            }
        };

        // Persist: schedules, rotation snapshots (CAS with one retry),
        // ledger, then the run log
        self.store
            .upsert_schedules(&result.proposed_schedules, request.overwrite)
            .await?;

        for state in &result.rotation_states {
            let store = Arc::clone(&self.store);
            let state = state.clone();
            retry_once_recoverable("store_rotation_state", move || {
                let store = Arc::clone(&store);
                let mut state = state.clone();
                async move {
                    if let Some(existing) = store
                        .load_state(&state.algorithm, &state.shift_type)
                        .await?
                    {
                        if existing.version >= state.version {
                            state.version = existing.version + 1;
                        }
                    }
                    store.store_state(&state).await
                }
            })
            .await?;
        }

        {
            let _guard = self.ledger_guard.lock().await;
            self.store.save_ledger(&result.ledger).await?;
        }
        self.store.append_log(&result.log).await?;

        info!(run = %result.run_id, "generation persisted");
        Ok(result)
    }

    async fn log_failure(&self, request: &GenerationRequest, err: &EngineError) {
        let status = match err {
            EngineError::Cancelled { .. } => RunStatus::Partial,
            _ => RunStatus::Failed,
        };
        let log = GenerationLog {
            run_id: Uuid::new_v4(),
            performer: request.performer.clone(),
            algorithm: ALGORITHM_NAME.to_string(),
            start: request.start,
            end: request.end,
            schedules_generated: 0,
            conflicts_detected: 0,
            fairness_score: 0.0,
            execution_time_ms: 0,
            status,
            error_message: Some(err.to_string()),
            metadata: None,
            created_at: chrono::Utc::now(),
        };
        if let Err(log_err) = self.store.append_log(&log).await {
            error!(error = %log_err, "failed to record failure log");
        }
    }

    // ------------------------------------------------------------------
    // Swap validation
    // ------------------------------------------------------------------

    /// Validate a pairwise shift swap between two analysts
    pub async fn validate_manager_swap(
        &self,
        source_analyst: Uuid,
        source_date: NaiveDate,
        target_analyst: Uuid,
        target_date: NaiveDate,
    ) -> EngineResult<Vec<SwapViolation>> {
        let window_start = source_date.min(target_date);
        let window_end = source_date.max(target_date);
        let schedules = self
            .load_swap_context(&[source_analyst, target_analyst], window_start, window_end)
            .await?;
        let validator = SwapValidator::new(&schedules);
        Ok(validator.validate_swap(source_analyst, source_date, target_analyst, target_date))
    }

    /// Validate a range swap exchanging every assignment in the window
    pub async fn validate_manager_range_swap(
        &self,
        source_analyst: Uuid,
        target_analyst: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<SwapViolation>> {
        let schedules = self
            .load_swap_context(&[source_analyst, target_analyst], start, end)
            .await?;
        let validator = SwapValidator::new(&schedules);
        Ok(validator.validate_range_swap(source_analyst, target_analyst, start, end))
    }

    async fn load_swap_context(
        &self,
        analysts: &[Uuid],
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> EngineResult<Vec<Schedule>> {
        let context_start = window_start
            .checked_sub_days(Days::new(CONTEXT_PADDING_DAYS))
            .unwrap_or(window_start);
        let context_end = window_end
            .checked_add_days(Days::new(CONTEXT_PADDING_DAYS))
            .unwrap_or(window_end);
        let mut schedules = Vec::new();
        for analyst in analysts {
            schedules.extend(
                self.store
                    .schedules_for_analyst(*analyst, context_start, context_end)
                    .await?,
            );
        }
        Ok(schedules)
    }

    // ------------------------------------------------------------------
    // Comp-off ledger API
    // ------------------------------------------------------------------

    pub async fn comp_off_balance(&self, analyst_id: Uuid) -> EngineResult<BalanceView> {
        let ledger = self.store.load_ledger().await?;
        Ok(ledger.balance(analyst_id))
    }

    pub async fn comp_off_credit(
        &self,
        analyst_id: Uuid,
        kind: TransactionKind,
        units: i64,
        reason: impl Into<String> + Send,
        constraint_id: Option<Uuid>,
    ) -> EngineResult<Uuid> {
        let _guard = self.ledger_guard.lock().await;
        let mut ledger = self.store.load_ledger().await?;
        let txn = ledger.credit(analyst_id, kind, units, reason, constraint_id)?;
        self.store.save_ledger(&ledger).await?;
        Ok(txn)
    }

    pub async fn comp_off_debit(
        &self,
        analyst_id: Uuid,
        absence_id: Uuid,
        units: i64,
    ) -> EngineResult<Uuid> {
        let _guard = self.ledger_guard.lock().await;
        let mut ledger = self.store.load_ledger().await?;
        let txn = ledger.debit_for_absence(analyst_id, absence_id, units)?;
        self.store.save_ledger(&ledger).await?;
        Ok(txn)
    }

    pub async fn comp_off_update_balance(
        &self,
        analyst_id: Uuid,
        performer: &str,
        target_earned: Option<i64>,
        target_used: Option<i64>,
        reason: Option<String>,
    ) -> EngineResult<Option<Uuid>> {
        let _guard = self.ledger_guard.lock().await;
        let mut ledger = self.store.load_ledger().await?;
        let txn =
            ledger.update_balance(analyst_id, performer, target_earned, target_used, reason)?;
        self.store.save_ledger(&ledger).await?;
        Ok(txn)
    }

    pub async fn comp_off_delete_transaction(
        &self,
        txn_id: Uuid,
        performer: &str,
    ) -> EngineResult<Uuid> {
        let _guard = self.ledger_guard.lock().await;
        let mut ledger = self.store.load_ledger().await?;
        let reversal = ledger.delete_transaction(txn_id, performer)?;
        self.store.save_ledger(&ledger).await?;
        Ok(reversal)
    }

    pub async fn comp_off_transactions(
        &self,
        analyst_id: Uuid,
    ) -> EngineResult<Vec<CompOffTransaction>> {
        let ledger = self.store.load_ledger().await?;
        Ok(ledger
            .transactions_for(analyst_id)
            .into_iter()
            .cloned()
            .collect())
    }

    // ------------------------------------------------------------------
    // Rotation state API
    // ------------------------------------------------------------------

    pub async fn rotation_state(&self, shift_type: &str) -> EngineResult<Option<RotationState>> {
        self.store.load_state(ALGORITHM_NAME, shift_type).await
    }

    pub async fn reset_rotation(&self, shift_type: &str) -> EngineResult<()> {
        self.store.reset_state(ALGORITHM_NAME, shift_type).await
    }

    pub async fn rotation_statistics(
        &self,
        region_id: Uuid,
        shift_type: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<RotationStatistics> {
        let schedules = self.store.schedules_in_range(region_id, start, end).await?;
        let state = self.store.load_state(ALGORITHM_NAME, shift_type).await?;
        Ok(RotationStatistics::from_schedules(
            &schedules,
            start,
            end,
            state.as_ref(),
        ))
    }

    // ------------------------------------------------------------------
    // Run logs
    // ------------------------------------------------------------------

    pub async fn recent_runs(&self, limit: usize) -> EngineResult<Vec<GenerationLog>> {
        self.store.recent_logs(limit).await
    }
}
