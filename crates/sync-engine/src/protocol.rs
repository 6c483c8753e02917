// crates/sync-engine/src/protocol.rs
//! Wire messages exchanged between the dispatcher and the server

use ledgerline_core::{ConflictResolution, Record, RecordSyncResult, SyncOutcome};
use serde::{Deserialize, Serialize};

/// Path of the batch submission endpoint
pub const SYNC_PATH: &str = "/api/sync";
/// Path of the explicit resolution endpoint
pub const RESOLVE_PATH: &str = "/api/sync/resolve";

/// Batch of records pushed to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    /// Account the records belong to
    pub user_id: String,
    pub records: Vec<Record>,
}

/// One result per submitted record, in submission order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    pub results: Vec<RecordSyncResult>,
}

/// Explicit conflict resolution for one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    pub user_id: String,
    #[serde(flatten)]
    pub resolution: ConflictResolution,
}

/// The record as it stands after resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub record: Record,
    pub outcome: SyncOutcome,
}

impl SyncRequest {
    pub fn new(user_id: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            user_id: user_id.into(),
            records,
        }
    }
}

impl SyncResponse {
    pub fn new(results: Vec<RecordSyncResult>) -> Self {
        Self { results }
    }
}

impl ResolveRequest {
    pub fn new(user_id: impl Into<String>, resolution: ConflictResolution) -> Self {
        Self {
            user_id: user_id.into(),
            resolution,
        }
    }
}
