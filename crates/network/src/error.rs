// crates/network/src/error.rs
//! Error types for network operations

use ledgerline_core::AppError;
use thiserror::Error;

/// Result type for network operations
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Errors that can occur during network operations
#[derive(Debug, Error)]
pub enum NetworkError {
    /// HTTP request error not covered by a more specific variant
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Connection refused, DNS failure or similar
    #[error("Network is unavailable: {0}")]
    NetworkUnavailable(String),

    /// Timeout
    #[error("Operation timed out")]
    Timeout,

    /// Cache storage failed
    #[error("Cache storage error: {0}")]
    Storage(#[from] AppError),
}

impl NetworkError {
    /// Returns true if the error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::Timeout | NetworkError::NetworkUnavailable(_) => true,
            NetworkError::Status { status, .. } => *status >= 500,
            NetworkError::Http(e) => e.is_request() || e.is_body(),
            _ => false,
        }
    }

    /// Returns true if no response was received at all
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            NetworkError::Timeout | NetworkError::NetworkUnavailable(_) | NetworkError::Http(_)
        )
    }

    /// Returns true if the error is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        matches!(self, NetworkError::Status { status, .. } if (400..500).contains(status))
    }

    /// Returns true if the error is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        matches!(self, NetworkError::Status { status, .. } if *status >= 500)
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout
        } else if err.is_connect() {
            NetworkError::NetworkUnavailable(err.to_string())
        } else if err.is_builder() {
            NetworkError::InvalidUrl(err.to_string())
        } else {
            NetworkError::Http(err)
        }
    }
}
