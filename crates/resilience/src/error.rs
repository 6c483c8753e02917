// crates/resilience/src/error.rs
//! Error types for resilience operations

use thiserror::Error;

/// Result type for resilience operations
pub type ResilienceResult<T> = Result<T, ResilienceError>;

/// Errors that can occur in resilience operations
#[derive(Debug, Error)]
pub enum ResilienceError {
    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Operation was cancelled before completing
    #[error("Operation was cancelled")]
    Cancelled,
}

impl ResilienceError {
    /// Returns true if this is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, ResilienceError::Timeout(_))
    }
}
