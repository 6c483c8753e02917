// crates/resilience/src/lib.rs
//! Resilience patterns for fault-tolerant sync operations
//!
//! This module provides:
//! - Retry with exponential backoff (HTTP GET retries, dispatcher backoff)
//! - Bounded timeouts for async calls
//!
//! # Example
//!
//! ```rust
//! use ledgerline_resilience::{RetryPolicy, Timeout};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(3)
//!     .with_initial_delay(Duration::from_millis(100));
//! assert_eq!(policy.max_attempts(), 3);
//!
//! let timeout = Timeout::new(Duration::from_secs(15));
//! assert_eq!(timeout.duration(), Duration::from_secs(15));
//! ```

mod error;
mod retry;
mod timeout;

pub use error::{ResilienceError, ResilienceResult};
pub use retry::{with_retry, RetryPolicy};
pub use timeout::{with_timeout, Timeout};
