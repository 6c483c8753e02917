//! Ledgerline core
//!
//! Domain types shared by the offline client and the reconciliation server:
//! transaction records, queued mutations, conflict directives and per-record
//! sync results, plus the storage error type.

pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use types::{
    ConflictResolution, ConflictStrategy, FailureKind, MutationKind, QueueItem, QueueItemId,
    Record, RecordId, RecordSyncResult, SyncFailure, SyncOutcome, Timestamp, Validator,
};

/// Decimal type used for monetary amounts
pub use rust_decimal::Decimal;
/// Calendar date type used for `Record::occurred_on`
pub use chrono::NaiveDate;
