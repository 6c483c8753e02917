//! Conflict directives and per-record sync results

use crate::types::{Record, RecordId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Policy applied when client and server hold divergent versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
    /// Keep the server copy, discard the submitted version
    ServerWins,
    /// Overwrite the server copy with the submitted version
    ClientWins,
    /// Field-wise combination of both versions
    Merge,
}

impl ConflictStrategy {
    /// Whether the strategy needs the client's version of the record
    pub fn requires_client_version(&self) -> bool {
        !matches!(self, ConflictStrategy::ServerWins)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStrategy::ServerWins => "server-wins",
            ConflictStrategy::ClientWins => "client-wins",
            ConflictStrategy::Merge => "merge",
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "server-wins" | "server" => Ok(ConflictStrategy::ServerWins),
            "client-wins" | "client" => Ok(ConflictStrategy::ClientWins),
            "merge" => Ok(ConflictStrategy::Merge),
            other => Err(format!(
                "unknown strategy '{}' (expected server-wins, client-wins or merge)",
                other
            )),
        }
    }
}

/// Directive supplied when the client resolves a divergent record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictResolution {
    pub record_id: RecordId,
    pub strategy: ConflictStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_version: Option<Record>,
}

impl ConflictResolution {
    pub fn new(record_id: RecordId, strategy: ConflictStrategy) -> Self {
        Self {
            record_id,
            strategy,
            client_version: None,
        }
    }

    pub fn with_client_version(mut self, record: Record) -> Self {
        self.client_version = Some(record);
        self
    }
}

/// Result of processing one submitted record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncOutcome {
    Applied,
    ConflictResolved,
    Failed,
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::Applied => write!(f, "applied"),
            SyncOutcome::ConflictResolved => write!(f, "conflict-resolved"),
            SyncOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// Why a record failed to synchronize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Malformed record; never retried
    Validation,
    /// Record belongs to another account; never retried
    Ownership,
    /// Authoritative store failed; retried on the next drain
    Storage,
    /// Response did not line up with the request; retried
    Protocol,
}

impl FailureKind {
    /// Permanent failures leave the retry path
    pub fn is_permanent(&self) -> bool {
        matches!(self, FailureKind::Validation | FailureKind::Ownership)
    }
}

/// Failure detail attached to a `failed` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome for one record, reported in submission order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSyncResult {
    pub record_id: RecordId,
    pub outcome: SyncOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SyncFailure>,
}

impl RecordSyncResult {
    pub fn applied(record_id: RecordId) -> Self {
        Self {
            record_id,
            outcome: SyncOutcome::Applied,
            error: None,
        }
    }

    pub fn conflict_resolved(record_id: RecordId) -> Self {
        Self {
            record_id,
            outcome: SyncOutcome::ConflictResolved,
            error: None,
        }
    }

    pub fn failed(record_id: RecordId, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            record_id,
            outcome: SyncOutcome::Failed,
            error: Some(SyncFailure {
                kind,
                message: message.into(),
            }),
        }
    }

    /// The server confirmed the record; the queue item can be removed
    pub fn is_acknowledged(&self) -> bool {
        matches!(
            self.outcome,
            SyncOutcome::Applied | SyncOutcome::ConflictResolved
        )
    }

    /// Failed in a way that retrying cannot fix
    pub fn is_permanent_failure(&self) -> bool {
        self.outcome == SyncOutcome::Failed
            && self.error.as_ref().is_some_and(|e| e.kind.is_permanent())
    }
}
