// crates/sync-engine/src/error.rs
//! Error types for sync operations

use ledgerline_core::AppError;
use ledgerline_network::NetworkError;
use ledgerline_resilience::ResilienceError;
use std::time::Duration;
use thiserror::Error;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during synchronization
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid sync data
    #[error("Invalid sync data: {0}")]
    InvalidData(String),

    /// Network error during sync
    #[error("Network error: {0}")]
    Network(String),

    /// The server did not answer in time
    #[error("Sync request timed out after {0:?}")]
    Timeout(Duration),

    /// Server-side failure (5xx)
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Request refused as a whole (4xx)
    #[error("Request rejected with {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Record does not exist on the server
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Record belongs to another account
    #[error("Record {0} is owned by another account")]
    Ownership(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Custom error
    #[error("{0}")]
    Custom(String),
}

impl SyncError {
    /// Transient errors leave queued items in place for the next drain
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::Network(_)
                | SyncError::Timeout(_)
                | SyncError::Server { .. }
                | SyncError::Storage(_)
        )
    }
}

impl From<AppError> for SyncError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::RecordNotFound { identifier, .. } => SyncError::NotFound(identifier),
            other => SyncError::Storage(other.to_string()),
        }
    }
}

impl From<NetworkError> for SyncError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::Status { status, url } if status >= 500 => SyncError::Server {
                status,
                message: url,
            },
            NetworkError::Status { status, url } => SyncError::Rejected {
                status,
                message: url,
            },
            other => SyncError::Network(other.to_string()),
        }
    }
}

impl From<ResilienceError> for SyncError {
    fn from(err: ResilienceError) -> Self {
        match err {
            ResilienceError::Timeout(duration) => SyncError::Timeout(duration),
            ResilienceError::Cancelled => SyncError::Custom("Sync was cancelled".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::Server {
            status: 503,
            message: "maintenance".to_string(),
        };
        assert_eq!(err.to_string(), "Server error 503: maintenance");
    }

    #[test]
    fn test_transient_classification() {
        assert!(SyncError::Network("refused".to_string()).is_transient());
        assert!(SyncError::Timeout(Duration::from_secs(15)).is_transient());
        assert!(!SyncError::InvalidData("bad".to_string()).is_transient());
        assert!(!SyncError::Ownership("tx-1".to_string()).is_transient());
        assert!(!SyncError::Rejected {
            status: 400,
            message: "bad request".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_app_error_conversion() {
        let err: SyncError = AppError::RecordNotFound {
            entity: "Record".to_string(),
            identifier: "tx-1".to_string(),
        }
        .into();
        assert!(matches!(err, SyncError::NotFound(id) if id == "tx-1"));

        let err: SyncError = AppError::corrupt_row("records", "bad amount").into();
        assert!(matches!(err, SyncError::Storage(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_status_conversion() {
        let err: SyncError = NetworkError::Status {
            status: 502,
            url: "/api/sync".to_string(),
        }
        .into();
        assert!(matches!(err, SyncError::Server { status: 502, .. }));

        let err: SyncError = NetworkError::Status {
            status: 404,
            url: "/api/sync".to_string(),
        }
        .into();
        assert!(matches!(err, SyncError::Rejected { status: 404, .. }));
    }

    #[test]
    fn test_timeout_conversion() {
        let err: SyncError = ResilienceError::Timeout(Duration::from_secs(3)).into();
        assert!(matches!(err, SyncError::Timeout(d) if d == Duration::from_secs(3)));
    }
}
