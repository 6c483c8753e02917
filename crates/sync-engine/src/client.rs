// crates/sync-engine/src/client.rs
//! Client-side entry point tying the queue, dispatcher and transport together

use crate::dispatcher::{DispatcherConfig, SyncDispatcher};
use crate::error::{SyncError, SyncResult};
use crate::protocol::{ResolveRequest, ResolveResponse};
use crate::queue::{OperationQueue, SqliteOperationQueue};
use crate::transport::SyncTransport;
use crate::types::DrainReport;
use ledgerline_core::{ConflictResolution, QueueItem, Record, RecordId, Validator};
use ledgerline_network::ConnectivityMonitor;
use ledgerline_resilience::Timeout;
use std::sync::Arc;

/// What saving a local mutation did
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub item: QueueItem,
    /// Present when the save was followed by a drain
    pub drain: Option<DrainReport>,
}

/// Offline-first client
#[derive(Clone)]
pub struct SyncClient {
    queue: Arc<SqliteOperationQueue>,
    transport: Arc<dyn SyncTransport>,
    dispatcher: Arc<SyncDispatcher>,
}

impl SyncClient {
    pub fn new(
        queue: Arc<SqliteOperationQueue>,
        transport: Arc<dyn SyncTransport>,
        monitor: ConnectivityMonitor,
        config: DispatcherConfig,
    ) -> Self {
        let dispatcher = Arc::new(SyncDispatcher::new(
            queue.clone(),
            transport.clone(),
            monitor,
            config,
        ));
        Self {
            queue,
            transport,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Arc<SyncDispatcher> {
        &self.dispatcher
    }

    pub fn user_id(&self) -> &str {
        &self.dispatcher.config().user_id
    }

    /// Records a create or edit locally and queues it for the server
    ///
    /// The local copy and the queue item are committed together. When the
    /// network is up a drain follows immediately; a failing drain leaves the
    /// mutation queued and does not fail the save.
    pub async fn save(&self, record: Record) -> SyncResult<SaveOutcome> {
        let record = Record {
            user_id: self.user_id().to_string(),
            ..record
        };
        record
            .validate()
            .map_err(|reasons| SyncError::InvalidData(reasons.join("; ")))?;

        let item = QueueItem::create_or_update(record);
        self.queue.record_mutation(&item).await?;

        let drain = if self.dispatcher.monitor().is_online() {
            match self.dispatcher.drain().await {
                Ok(report) => Some(report),
                Err(e) => {
                    log::warn!("Drain after save failed: {}", e);
                    None
                }
            }
        } else {
            log::info!("Offline; {} queued for later", item.record_id());
            None
        };

        Ok(SaveOutcome { item, drain })
    }

    /// Asks the server to resolve a divergent record
    ///
    /// The mutations of that record queued before the request are dropped,
    /// since the resolution supersedes them, and the resolved record becomes
    /// the local copy. Edits saved while the request is in flight stay queued
    /// and keep the local copy until they sync.
    pub async fn resolve_conflict(
        &self,
        resolution: ConflictResolution,
    ) -> SyncResult<ResolveResponse> {
        let record_id = resolution.record_id.clone();
        let superseded: Vec<_> = self
            .queue
            .list_for_record(&record_id)
            .await?
            .into_iter()
            .map(|item| item.id)
            .collect();
        let request = ResolveRequest::new(self.user_id(), resolution);

        let response = Timeout::new(self.dispatcher.config().request_timeout)
            .run(self.transport.resolve(&request))
            .await??;

        let dropped = self
            .queue
            .settle_resolution(&superseded, &response.record)
            .await?;
        log::info!(
            "Resolved {} ({}); dropped {} queued edits",
            record_id,
            response.outcome,
            dropped
        );

        Ok(response)
    }

    /// Runs one drain
    pub async fn sync_now(&self) -> SyncResult<DrainReport> {
        self.dispatcher.drain().await
    }

    pub async fn pending(&self) -> SyncResult<Vec<QueueItem>> {
        self.queue.list_all().await
    }

    pub async fn record(&self, id: &RecordId) -> SyncResult<Option<Record>> {
        self.queue.local_record(id).await
    }

    pub async fn records(&self) -> SyncResult<Vec<Record>> {
        self.queue.local_records(self.user_id()).await
    }
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("queue", &self.queue)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
