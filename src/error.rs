//! Unified error handling for the scheduling engine
//!
//! Engine operations return `Result<T, EngineError>`. Constraint and swap
//! violations are ordinary report values, not errors: they flow back to the
//! caller inside `GenerationResult` and the swap validator's return value.
//!
//! # Error Hierarchy
//!
//! ```text
//! EngineError
//! ├── Config          (fatal before any state change)
//! ├── DataIntegrity   (uniqueness, ledger sum, stale snapshot)
//! ├── InsufficientBalance
//! ├── Cancelled       (deadline or explicit cancellation)
//! ├── Serialization
//! └── Storage         (anyhow-wrapped driver errors)
//! ```

use thiserror::Error;
use uuid::Uuid;

/// Unified result type for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Sub-kind of a data integrity failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegrityKind {
    /// Schedule uniqueness constraint hit on write
    UniquenessViolation,
    /// Ledger transaction sum no longer equals earned − used
    LedgerMismatch,
    /// Rotation snapshot version behind the stored one
    StaleSnapshot,
}

impl IntegrityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UniquenessViolation => "uniqueness_violation",
            Self::LedgerMismatch => "ledger_mismatch",
            Self::StaleSnapshot => "stale_snapshot",
        }
    }
}

/// Error category for logging and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Config,
    Integrity,
    Ledger,
    Cancellation,
    Storage,
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Config => "config",
            ErrorCategory::Integrity => "integrity",
            ErrorCategory::Ledger => "ledger",
            ErrorCategory::Cancellation => "cancellation",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Other => "other",
        }
    }
}

/// Unified error type for all engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// Invalid configuration or generation context; nothing was changed
    #[error("Config error: {0}")]
    Config(String),

    /// A write violated an integrity invariant
    #[error("Data integrity error ({}): {message}", kind.as_str())]
    DataIntegrity {
        kind: IntegrityKind,
        message: String,
    },

    /// Comp-off debit exceeds the available balance
    #[error("Insufficient comp-off balance for analyst {analyst_id}: available {available}, requested {requested}")]
    InsufficientBalance {
        analyst_id: Uuid,
        available: i64,
        requested: i64,
    },

    /// Generation was cancelled or ran past its soft deadline
    #[error("Generation cancelled: {reason}")]
    Cancelled { reason: String },

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage/driver errors
    #[error("Storage error: {0}")]
    Storage(#[source] anyhow::Error),

    /// Generic errors with context
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        EngineError::Config(msg.into())
    }

    /// Create a stale-snapshot integrity error
    pub fn stale_snapshot(msg: impl Into<String>) -> Self {
        EngineError::DataIntegrity {
            kind: IntegrityKind::StaleSnapshot,
            message: msg.into(),
        }
    }

    /// Create a ledger-mismatch integrity error
    pub fn ledger_mismatch(msg: impl Into<String>) -> Self {
        EngineError::DataIntegrity {
            kind: IntegrityKind::LedgerMismatch,
            message: msg.into(),
        }
    }

    /// Create a uniqueness-violation integrity error
    pub fn uniqueness(msg: impl Into<String>) -> Self {
        EngineError::DataIntegrity {
            kind: IntegrityKind::UniquenessViolation,
            message: msg.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(reason: impl Into<String>) -> Self {
        EngineError::Cancelled {
            reason: reason.into(),
        }
    }

    /// Create a storage error
    pub fn storage(err: impl Into<anyhow::Error>) -> Self {
        EngineError::Storage(err.into())
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::Config(_) => ErrorCategory::Config,
            EngineError::DataIntegrity { .. } => ErrorCategory::Integrity,
            EngineError::InsufficientBalance { .. } => ErrorCategory::Ledger,
            EngineError::Cancelled { .. } => ErrorCategory::Cancellation,
            EngineError::Serialization(_) => ErrorCategory::Other,
            EngineError::Storage(_) => ErrorCategory::Storage,
            EngineError::Other(_) => ErrorCategory::Other,
        }
    }

    /// Check if the error is recoverable with a local retry
    ///
    /// Only a stale rotation snapshot and an idempotent schedule reinsert
    /// qualify; everything else surfaces to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::DataIntegrity {
                kind: IntegrityKind::StaleSnapshot | IntegrityKind::UniquenessViolation,
                ..
            }
        )
    }
}
