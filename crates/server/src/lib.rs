// crates/server/src/lib.rs
//! HTTP front of the reconciliation engine
//!
//! - `POST /api/sync` applies a batch and answers one result per record
//! - `POST /api/sync/resolve` applies an explicit conflict strategy
//! - `GET /healthz` reports liveness

mod error;
mod routes;

pub use error::ApiError;
pub use routes::{app_router, AppState};
