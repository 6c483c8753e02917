//! Domain types for Ledgerline
//!
//! - `record`: the syncable transaction record and its id
//! - `queue`: pending mutations held in the client's durable queue
//! - `sync`: conflict directives and per-record sync results
//! - `common`: timestamps and the `Validator` trait

mod common;
mod queue;
mod record;
mod sync;

pub use common::{Timestamp, Validator};
pub use queue::{MutationKind, QueueItem, QueueItemId};
pub use record::{Record, RecordId};
pub use sync::{
    ConflictResolution, ConflictStrategy, FailureKind, RecordSyncResult, SyncFailure, SyncOutcome,
};
