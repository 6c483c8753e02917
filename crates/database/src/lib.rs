//! Ledgerline Database Layer
//!
//! SQLite persistence shared by the offline client and the reconciliation
//! server, using sqlx. The same schema serves both sides: the server keeps
//! authoritative records, the client keeps local record copies, the durable
//! sync queue and its resource caches.

pub mod connection;
pub mod migrations;
pub mod queries;

pub use connection::{connect, connect_in_memory, DatabaseConfig, DbPool, SyncMode};
pub use migrations::{current_version, optimize, run_migrations, verify_integrity};
