//! Pending mutations held in the client's durable queue

use crate::types::{Record, RecordId, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for a queued mutation
///
/// Backed by a UUIDv7, so ids sort roughly by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueItemId(Uuid);

impl QueueItemId {
    /// Creates a new time-ordered QueueItemId
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a QueueItemId from a UUID string
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Returns the QueueItemId as a string
    pub fn as_string(&self) -> String {
        self.0.to_string()
    }
}

impl Default for QueueItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for QueueItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of mutation carried by a queue item
///
/// Only upserts are synchronized; deletes never leave the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MutationKind {
    CreateOrUpdate,
}

impl MutationKind {
    /// Stable name used in storage
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::CreateOrUpdate => "create-or-update",
        }
    }

    /// Parses the stored name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create-or-update" => Some(MutationKind::CreateOrUpdate),
            _ => None,
        }
    }
}

/// A mutation waiting to be acknowledged by the server
///
/// Items are immutable once enqueued. A record edited several times while
/// offline has one item per edit, all sent in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: QueueItemId,
    pub kind: MutationKind,
    pub payload: Record,
    pub enqueued_at: Timestamp,
}

impl QueueItem {
    /// Wraps a record in a new upsert mutation
    pub fn create_or_update(payload: Record) -> Self {
        Self {
            id: QueueItemId::new(),
            kind: MutationKind::CreateOrUpdate,
            payload,
            enqueued_at: Timestamp::now(),
        }
    }

    /// Id of the record this mutation targets
    pub fn record_id(&self) -> &RecordId {
        &self.payload.id
    }
}
