//! Storage errors shared by the database layer and its callers
//!
//! Everything below the sync engine reports failures as [`AppError`]. The
//! sync engine and the network cache translate it into their own error
//! types at the crate boundary.

use std::fmt;
use std::io;
use thiserror::Error;

/// Error raised by local storage
#[derive(Error, Debug)]
pub enum AppError {
    /// A query or connection failed
    #[error("Database error: {message}")]
    DatabaseError {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// `PRAGMA integrity_check` reported damage
    #[error("Database corrupted: {details}")]
    DatabaseCorrupted { details: String },

    /// A schema migration could not be applied
    #[error("Migration failed: {version} - {reason}")]
    MigrationFailed { version: String, reason: String },

    #[error("Record not found: {entity} with {identifier}")]
    RecordNotFound { entity: String, identifier: String },

    /// Stored row could not be decoded into a domain value
    #[error("Corrupt row in {entity}: {reason}")]
    CorruptRow { entity: String, reason: String },

    #[error("Cache write failed: {reason}")]
    CacheWriteFailed { reason: String },

    /// Creating the database directory failed
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

impl AppError {
    /// Wraps a driver error with what was being attempted
    pub fn database<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::DatabaseError {
            message: message.into(),
            source: Box::new(source),
        }
    }

    pub fn corrupt_row(entity: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::CorruptRow {
            entity: entity.into(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;
