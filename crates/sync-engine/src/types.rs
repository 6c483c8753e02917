// crates/sync-engine/src/types.rs
//! Sync status and drain reporting types

use ledgerline_core::{QueueItem, RecordSyncResult, Timestamp};
use serde::{Deserialize, Serialize};

/// Sync state for tracking progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// When a drain last emptied everything it could send
    pub last_sync: Option<Timestamp>,
    /// Number of items waiting in the queue
    pub pending_changes: usize,
    /// Drain cycles that stopped early in a row
    pub consecutive_failures: usize,
    /// Whether a drain is currently running
    pub in_progress: bool,
    /// Whether the last drain found the network unavailable
    pub offline: bool,
}

impl SyncState {
    /// Creates a new sync state
    pub fn new() -> Self {
        Self {
            last_sync: None,
            pending_changes: 0,
            consecutive_failures: 0,
            in_progress: false,
            offline: false,
        }
    }

    /// Returns true if there are pending changes
    pub fn has_pending_changes(&self) -> bool {
        self.pending_changes > 0
    }

    /// Returns true if the last drain stopped early
    pub fn is_backing_off(&self) -> bool {
        self.consecutive_failures > 0
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

/// How a drain ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DrainOutcome {
    /// Offline; nothing was sent
    Skipped,
    /// Another drain was running and will pick this request up
    Coalesced,
    /// Every sendable item was processed
    Completed,
    /// The cycle stopped at a transient failure; items remain queued
    Stopped,
}

/// What one call to `SyncDispatcher::drain` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub outcome: DrainOutcome,
    /// Results returned by the server, in submission order
    pub results: Vec<RecordSyncResult>,
    /// Items dropped from the queue as permanently failed
    pub rejected: Vec<(QueueItem, RecordSyncResult)>,
    /// Queue length once the drain finished
    pub remaining: usize,
    /// Why the cycle stopped, when it did
    pub error: Option<String>,
}

impl DrainReport {
    pub fn new(outcome: DrainOutcome) -> Self {
        Self {
            outcome,
            results: Vec::new(),
            rejected: Vec::new(),
            remaining: 0,
            error: None,
        }
    }

    pub fn skipped(remaining: usize) -> Self {
        Self {
            remaining,
            ..Self::new(DrainOutcome::Skipped)
        }
    }

    pub fn coalesced() -> Self {
        Self::new(DrainOutcome::Coalesced)
    }

    /// Number of queue items the server acknowledged
    pub fn acknowledged(&self) -> usize {
        self.results.iter().filter(|r| r.is_acknowledged()).count()
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == DrainOutcome::Stopped
    }

    /// Folds a follow-up cycle into this report
    pub(crate) fn absorb(&mut self, next: DrainReport) {
        self.outcome = next.outcome;
        self.results.extend(next.results);
        self.rejected.extend(next.rejected);
        self.remaining = next.remaining;
        self.error = next.error;
    }
}
