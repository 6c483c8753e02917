// crates/sync-engine/src/engine.rs
//! Server-side reconciliation engine
//!
//! Every decision for a record is made under that record's lock from a
//! single read of the authoritative copy, and the one write (if any) is
//! the last step.

use crate::conflict::{decide, Decision};
use crate::error::{SyncError, SyncResult};
use crate::locks::RecordLocks;
use crate::protocol::ResolveResponse;
use crate::store::RecordStore;
use ledgerline_core::{
    ConflictResolution, ConflictStrategy, FailureKind, Record, RecordSyncResult, SyncOutcome,
    Validator,
};
use std::sync::Arc;

/// Merges submitted records into the authoritative store
#[derive(Clone)]
pub struct ReconciliationEngine {
    store: Arc<dyn RecordStore>,
    locks: RecordLocks,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            locks: RecordLocks::new(),
        }
    }

    /// Applies one submitted record on behalf of `user_id`
    ///
    /// Never fails as a whole: problems are reported in the result.
    pub async fn apply(&self, user_id: &str, record: Record) -> RecordSyncResult {
        let record = Record {
            user_id: user_id.to_string(),
            ..record
        };
        let id = record.id.clone();

        if let Err(reasons) = record.validate() {
            log::info!("Rejected record {}: {}", id, reasons.join("; "));
            return RecordSyncResult::failed(id, FailureKind::Validation, reasons.join("; "));
        }

        let _guard = self.locks.lock(&id).await;

        match self.upsert(record).await {
            Ok(result) => result,
            Err(e) => {
                log::error!("Storage failure while applying {}: {}", id, e);
                RecordSyncResult::failed(id, FailureKind::Storage, e.to_string())
            }
        }
    }

    /// Read-decide-write for a plain upsert; caller holds the record lock
    async fn upsert(&self, record: Record) -> SyncResult<RecordSyncResult> {
        let id = record.id.clone();

        let Some(existing) = self.store.get(&id).await? else {
            self.store.insert(&record).await?;
            log::debug!("Created record {}", id);
            return Ok(RecordSyncResult::applied(id));
        };

        if existing.user_id != record.user_id {
            log::warn!("Record {} submitted by a non-owner", id);
            return Ok(RecordSyncResult::failed(
                id,
                FailureKind::Ownership,
                "Record is owned by another account",
            ));
        }

        if existing.same_content(&record) {
            log::debug!("Record {} already up to date", id);
            return Ok(RecordSyncResult::applied(id));
        }

        self.store.update(&record).await?;
        log::debug!("Updated record {}", id);
        Ok(RecordSyncResult::applied(id))
    }

    /// Applies a batch in submission order, one result per record
    pub async fn apply_batch(&self, user_id: &str, records: Vec<Record>) -> Vec<RecordSyncResult> {
        let mut results = Vec::with_capacity(records.len());
        for record in records {
            results.push(self.apply(user_id, record).await);
        }

        let failed = results
            .iter()
            .filter(|r| r.outcome == SyncOutcome::Failed)
            .count();
        log::info!(
            "Applied batch of {} for {} ({} failed)",
            results.len(),
            user_id,
            failed
        );
        results
    }

    /// Resolves a divergent record with an explicit strategy
    ///
    /// With no server copy, `client-wins` and `merge` create the record from
    /// the client version and `server-wins` fails with `NotFound`.
    pub async fn resolve(
        &self,
        user_id: &str,
        resolution: ConflictResolution,
    ) -> SyncResult<ResolveResponse> {
        let id = resolution.record_id.clone();

        let client = match resolution.client_version {
            Some(client) => {
                if client.id != id {
                    return Err(SyncError::InvalidData(format!(
                        "Client version is for {}, not {}",
                        client.id, id
                    )));
                }
                let client = Record {
                    user_id: user_id.to_string(),
                    ..client
                };
                client
                    .validate()
                    .map_err(|reasons| SyncError::InvalidData(reasons.join("; ")))?;
                Some(client)
            }
            None => None,
        };

        let _guard = self.locks.lock(&id).await;

        let Some(server) = self.store.get(&id).await? else {
            return match (resolution.strategy, client) {
                (ConflictStrategy::ServerWins, _) => Err(SyncError::NotFound(id.to_string())),
                (strategy, Some(client)) => {
                    self.store.insert(&client).await?;
                    log::info!("Resolved {} by creating it ({})", id, strategy);
                    Ok(ResolveResponse {
                        record: client,
                        outcome: SyncOutcome::Applied,
                    })
                }
                (strategy, None) => Err(SyncError::InvalidData(format!(
                    "{} requires a client version",
                    strategy
                ))),
            };
        };

        if server.user_id != user_id {
            return Err(SyncError::Ownership(id.to_string()));
        }

        let decision = decide(resolution.strategy, &server, client.as_ref())?;
        if let Decision::Write(record) = &decision {
            self.store.update(record).await?;
        }

        log::info!("Resolved {} with {}", id, resolution.strategy);
        Ok(ResolveResponse {
            record: decision.into_record(),
            outcome: SyncOutcome::ConflictResolved,
        })
    }
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("active_locks", &self.locks.active())
            .finish()
    }
}
