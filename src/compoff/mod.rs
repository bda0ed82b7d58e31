//! Compensatory time-off ledger
//!
//! Balances are materialized from an append-only transaction log; the two
//! must never drift: for every balance, the sum of transaction amounts
//! equals earned − used. Edits and deletions never remove rows; they
//! append reconciling reversal entries so the ledger stays auditable.
//!
//! The synchronous [`CompOffLedger`] is the engine-internal core; the
//! [`CompOffService`] wraps it behind an async lock for the programmatic
//! API so concurrent credits and debits cannot interleave.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// Reason recorded on the automatic weekend credit
pub const REASON_WEEKEND: &str = "WEEKEND";
/// Reason recorded when the worked weekend day is also a holiday
pub const REASON_HOLIDAY: &str = "HOLIDAY";
/// Reason recorded on admin balance reconciliation
pub const REASON_MANUAL_ADJUSTMENT: &str = "MANUAL_BALANCE_ADJUSTMENT";

// ============================================================================
// Ledger Records
// ============================================================================

/// Materialized per-analyst balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompOffBalance {
    pub id: Uuid,
    pub analyst_id: Uuid,
    pub earned_units: i64,
    pub used_units: i64,
}

impl CompOffBalance {
    pub fn new(analyst_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            analyst_id,
            earned_units: 0,
            used_units: 0,
        }
    }

    pub fn available(&self) -> i64 {
        self.earned_units - self.used_units
    }
}

/// Category of a ledger transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    WeekendCredit,
    HolidayCredit,
    ConstraintCredit,
    AbsenceDebit,
    AdminOverride,
    Reversal,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WeekendCredit => "WEEKEND_CREDIT",
            Self::HolidayCredit => "HOLIDAY_CREDIT",
            Self::ConstraintCredit => "CONSTRAINT_CREDIT",
            Self::AbsenceDebit => "ABSENCE_DEBIT",
            Self::AdminOverride => "ADMIN_OVERRIDE",
            Self::Reversal => "REVERSAL",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One append-only ledger entry; positive amounts credit, negative debit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompOffTransaction {
    pub id: Uuid,
    pub balance_id: Uuid,
    pub amount: i64,
    pub kind: TransactionKind,
    pub reason: String,
    pub constraint_id: Option<Uuid>,
    pub absence_id: Option<Uuid>,
    /// The transaction this entry reconciles, for reversals
    pub reverses: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Balance summary returned by the programmatic API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceView {
    pub earned: i64,
    pub used: i64,
    pub available: i64,
}

// ============================================================================
// Ledger Core
// ============================================================================

/// Synchronous ledger state for one roster
#[derive(Debug, Clone, Default)]
pub struct CompOffLedger {
    balances: HashMap<Uuid, CompOffBalance>,
    transactions: Vec<CompOffTransaction>,
}

impl CompOffLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted balances and transactions
    pub fn from_records(
        balances: Vec<CompOffBalance>,
        transactions: Vec<CompOffTransaction>,
    ) -> EngineResult<Self> {
        let ledger = Self {
            balances: balances.into_iter().map(|b| (b.analyst_id, b)).collect(),
            transactions,
        };
        for balance in ledger.balances.values() {
            ledger.check_integrity(balance)?;
        }
        Ok(ledger)
    }

    fn balance_mut(&mut self, analyst_id: Uuid) -> &mut CompOffBalance {
        self.balances
            .entry(analyst_id)
            .or_insert_with(|| CompOffBalance::new(analyst_id))
    }

    pub fn balance(&self, analyst_id: Uuid) -> BalanceView {
        match self.balances.get(&analyst_id) {
            Some(b) => BalanceView {
                earned: b.earned_units,
                used: b.used_units,
                available: b.available(),
            },
            None => BalanceView {
                earned: 0,
                used: 0,
                available: 0,
            },
        }
    }

    pub fn transactions_for(&self, analyst_id: Uuid) -> Vec<&CompOffTransaction> {
        let Some(balance) = self.balances.get(&analyst_id) else {
            return Vec::new();
        };
        self.transactions
            .iter()
            .filter(|t| t.balance_id == balance.id)
            .collect()
    }

    pub fn balances(&self) -> impl Iterator<Item = &CompOffBalance> {
        self.balances.values()
    }

    pub fn all_transactions(&self) -> &[CompOffTransaction] {
        &self.transactions
    }

    fn check_integrity(&self, balance: &CompOffBalance) -> EngineResult<()> {
        let sum: i64 = self
            .transactions
            .iter()
            .filter(|t| t.balance_id == balance.id)
            .map(|t| t.amount)
            .sum();
        if sum != balance.available() {
            return Err(EngineError::ledger_mismatch(format!(
                "analyst {}: transaction sum {} != earned-used {}",
                balance.analyst_id,
                sum,
                balance.available()
            )));
        }
        Ok(())
    }

    /// Verify the sum invariant for every balance
    pub fn verify_integrity(&self) -> EngineResult<()> {
        for balance in self.balances.values() {
            self.check_integrity(balance)?;
        }
        Ok(())
    }

    /// Credit units from a constraint or calendar event
    pub fn credit(
        &mut self,
        analyst_id: Uuid,
        kind: TransactionKind,
        units: i64,
        reason: impl Into<String>,
        constraint_id: Option<Uuid>,
    ) -> EngineResult<Uuid> {
        if units <= 0 {
            return Err(EngineError::config(format!(
                "credit units must be positive, got {units}"
            )));
        }
        let balance = self.balance_mut(analyst_id);
        balance.earned_units += units;
        let balance_id = balance.id;

        let txn = CompOffTransaction {
            id: Uuid::new_v4(),
            balance_id,
            amount: units,
            kind,
            reason: reason.into(),
            constraint_id,
            absence_id: None,
            reverses: None,
            created_at: Utc::now(),
        };
        let id = txn.id;
        debug!(analyst = %analyst_id, units, kind = %kind, "comp-off credit");
        self.transactions.push(txn);
        Ok(id)
    }

    /// Credit one unit for a worked weekend day
    ///
    /// A weekend day that is also a holiday posts a single credit with the
    /// holiday reason, never two.
    pub fn credit_weekend_day(&mut self, analyst_id: Uuid, is_holiday: bool) -> EngineResult<Uuid> {
        if is_holiday {
            self.credit(
                analyst_id,
                TransactionKind::HolidayCredit,
                1,
                REASON_HOLIDAY,
                None,
            )
        } else {
            self.credit(
                analyst_id,
                TransactionKind::WeekendCredit,
                1,
                REASON_WEEKEND,
                None,
            )
        }
    }

    /// Debit units consumed by an absence
    pub fn debit_for_absence(
        &mut self,
        analyst_id: Uuid,
        absence_id: Uuid,
        units: i64,
    ) -> EngineResult<Uuid> {
        if units <= 0 {
            return Err(EngineError::config(format!(
                "debit units must be positive, got {units}"
            )));
        }
        let available = self.balance(analyst_id).available;
        if available < units {
            return Err(EngineError::InsufficientBalance {
                analyst_id,
                available,
                requested: units,
            });
        }

        let balance = self.balance_mut(analyst_id);
        balance.used_units += units;
        let balance_id = balance.id;

        let txn = CompOffTransaction {
            id: Uuid::new_v4(),
            balance_id,
            amount: -units,
            kind: TransactionKind::AbsenceDebit,
            reason: format!("absence {absence_id}"),
            constraint_id: None,
            absence_id: Some(absence_id),
            reverses: None,
            created_at: Utc::now(),
        };
        let id = txn.id;
        debug!(analyst = %analyst_id, units, "comp-off debit");
        self.transactions.push(txn);
        Ok(id)
    }

    /// Reconcile a balance to explicit targets
    ///
    /// Appends a single ADMIN_OVERRIDE transaction whose amount is the net
    /// change of (earned − used), then sets the balance to the target, so
    /// the sum invariant holds afterwards.
    pub fn update_balance(
        &mut self,
        analyst_id: Uuid,
        performer: &str,
        target_earned: Option<i64>,
        target_used: Option<i64>,
        reason: Option<String>,
    ) -> EngineResult<Option<Uuid>> {
        let current = self.balance(analyst_id);
        let earned = target_earned.unwrap_or(current.earned);
        let used = target_used.unwrap_or(current.used);
        if earned < 0 || used < 0 {
            return Err(EngineError::config("balance targets must be non-negative"));
        }

        let net_change = (earned - used) - current.available;

        let balance = self.balance_mut(analyst_id);
        balance.earned_units = earned;
        balance.used_units = used;
        let balance_id = balance.id;

        if net_change == 0 {
            return Ok(None);
        }

        let txn = CompOffTransaction {
            id: Uuid::new_v4(),
            balance_id,
            amount: net_change,
            kind: TransactionKind::AdminOverride,
            reason: reason.unwrap_or_else(|| REASON_MANUAL_ADJUSTMENT.to_string()),
            constraint_id: None,
            absence_id: None,
            reverses: None,
            created_at: Utc::now(),
        };
        let id = txn.id;
        info!(analyst = %analyst_id, performer, net_change, "balance reconciled");
        self.transactions.push(txn);
        Ok(Some(id))
    }

    /// Reverse a prior transaction with a reconciling entry
    ///
    /// The original row stays in the log; its effect on earned/used is
    /// undone and a REVERSAL entry of the opposite amount keeps the sum
    /// invariant intact.
    pub fn delete_transaction(&mut self, txn_id: Uuid, performer: &str) -> EngineResult<Uuid> {
        let original = self
            .transactions
            .iter()
            .find(|t| t.id == txn_id && t.kind != TransactionKind::Reversal)
            .cloned()
            .ok_or_else(|| EngineError::config(format!("unknown transaction {txn_id}")))?;
        if self
            .transactions
            .iter()
            .any(|t| t.reverses == Some(txn_id))
        {
            return Err(EngineError::config(format!(
                "transaction {txn_id} already reversed"
            )));
        }

        self.apply_reversal(&original)?;

        let reversal = CompOffTransaction {
            id: Uuid::new_v4(),
            balance_id: original.balance_id,
            amount: -original.amount,
            kind: TransactionKind::Reversal,
            reason: format!("reversed by {performer}"),
            constraint_id: original.constraint_id,
            absence_id: original.absence_id,
            reverses: Some(original.id),
            created_at: Utc::now(),
        };
        let id = reversal.id;
        info!(transaction = %txn_id, performer, "transaction reversed");
        self.transactions.push(reversal);
        Ok(id)
    }

    /// Replace a transaction's amount via reverse-then-apply
    pub fn update_transaction(
        &mut self,
        txn_id: Uuid,
        new_amount: i64,
        performer: &str,
    ) -> EngineResult<Uuid> {
        let original = self
            .transactions
            .iter()
            .find(|t| t.id == txn_id && t.kind != TransactionKind::Reversal)
            .cloned()
            .ok_or_else(|| EngineError::config(format!("unknown transaction {txn_id}")))?;
        if new_amount == 0 {
            return Err(EngineError::config("replacement amount must be non-zero"));
        }

        self.delete_transaction(txn_id, performer)?;

        let analyst_id = self
            .balances
            .values()
            .find(|b| b.id == original.balance_id)
            .map(|b| b.analyst_id)
            .ok_or_else(|| EngineError::config("balance missing for transaction"))?;

        if new_amount > 0 {
            self.credit(
                analyst_id,
                original.kind,
                new_amount,
                original.reason.clone(),
                original.constraint_id,
            )
        } else {
            let absence = original.absence_id.unwrap_or_else(Uuid::new_v4);
            self.debit_for_absence(analyst_id, absence, -new_amount)
        }
    }

    fn apply_reversal(&mut self, original: &CompOffTransaction) -> EngineResult<()> {
        let balance = self
            .balances
            .values_mut()
            .find(|b| b.id == original.balance_id)
            .ok_or_else(|| EngineError::config("balance missing for transaction"))?;
        if original.amount > 0 {
            balance.earned_units -= original.amount;
        } else {
            balance.used_units += original.amount;
        }
        if balance.earned_units < 0 || balance.used_units < 0 {
            return Err(EngineError::ledger_mismatch(format!(
                "reversal of {} drives balance negative",
                original.id
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Async Service Facade
// ============================================================================

/// Shared ledger behind an async guard
///
/// Every operation takes the write lock for its full atomic sequence so
/// concurrent credits and debits for any analyst cannot interleave.
#[derive(Debug, Clone, Default)]
pub struct CompOffService {
    ledger: Arc<RwLock<CompOffLedger>>,
}

impl CompOffService {
    pub fn new(ledger: CompOffLedger) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
        }
    }

    pub async fn get_balance(&self, analyst_id: Uuid) -> BalanceView {
        self.ledger.read().await.balance(analyst_id)
    }

    pub async fn credit(
        &self,
        analyst_id: Uuid,
        kind: TransactionKind,
        units: i64,
        reason: impl Into<String>,
        constraint_id: Option<Uuid>,
    ) -> EngineResult<Uuid> {
        self.ledger
            .write()
            .await
            .credit(analyst_id, kind, units, reason, constraint_id)
    }

    pub async fn debit(
        &self,
        analyst_id: Uuid,
        absence_id: Uuid,
        units: i64,
    ) -> EngineResult<Uuid> {
        self.ledger
            .write()
            .await
            .debit_for_absence(analyst_id, absence_id, units)
    }

    pub async fn update_balance(
        &self,
        analyst_id: Uuid,
        performer: &str,
        target_earned: Option<i64>,
        target_used: Option<i64>,
        reason: Option<String>,
    ) -> EngineResult<Option<Uuid>> {
        self.ledger.write().await.update_balance(
            analyst_id,
            performer,
            target_earned,
            target_used,
            reason,
        )
    }

    pub async fn delete_transaction(&self, txn_id: Uuid, performer: &str) -> EngineResult<Uuid> {
        self.ledger.write().await.delete_transaction(txn_id, performer)
    }

    pub async fn transactions(&self, analyst_id: Uuid) -> Vec<CompOffTransaction> {
        self.ledger
            .read()
            .await
            .transactions_for(analyst_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Take a consistent snapshot for persistence
    pub async fn snapshot(&self) -> CompOffLedger {
        self.ledger.read().await.clone()
    }
}
