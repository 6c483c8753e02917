// crates/sync-engine/src/queue.rs
//! Durable local operation queue
//!
//! Mutations are committed to SQLite before `enqueue` returns and are only
//! removed once the server acknowledges them, so nothing queued is lost to a
//! crash or a restart.

use crate::error::SyncResult;
use async_trait::async_trait;
use ledgerline_core::{QueueItem, QueueItemId, Record, RecordId};
use ledgerline_database::queries::{queue, records};
use ledgerline_database::{connect, run_migrations, DatabaseConfig, DbPool};
use std::path::Path;

/// FIFO store of pending mutations
#[async_trait]
pub trait OperationQueue: Send + Sync {
    /// Appends an item; returns false if its id was already queued
    async fn enqueue(&self, item: &QueueItem) -> SyncResult<bool>;

    /// Every queued item, oldest first
    async fn list_all(&self) -> SyncResult<Vec<QueueItem>>;

    /// Removes an item; returns false if it was not queued
    async fn remove(&self, id: &QueueItemId) -> SyncResult<bool>;

    async fn len(&self) -> SyncResult<usize>;

    async fn is_empty(&self) -> SyncResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Queued items targeting one record, oldest first
    async fn list_for_record(&self, record_id: &RecordId) -> SyncResult<Vec<QueueItem>>;
}

/// Queue persisted in the client's SQLite database
///
/// The same database holds the local copy of each record, so a mutation
/// and its queue item are written in one transaction.
#[derive(Debug, Clone)]
pub struct SqliteOperationQueue {
    pool: DbPool,
}

impl SqliteOperationQueue {
    /// Wraps a pool whose schema is already migrated
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the queue database at `path`
    ///
    /// Uses full synchronous mode so a committed enqueue survives power loss.
    pub async fn open(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref().to_string_lossy().into_owned();
        let pool = connect(DatabaseConfig::durable(path)).await?;
        run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Saves the local record copy and queues the mutation atomically
    pub async fn record_mutation(&self, item: &QueueItem) -> SyncResult<bool> {
        let inserted = queue::enqueue_with_record(&self.pool, item).await?;
        log::debug!("Queued {} for record {}", item.id, item.record_id());
        Ok(inserted)
    }

    /// Applies a conflict resolution in one transaction
    ///
    /// Removes only `superseded`, the items that were queued when the
    /// resolution was requested, and takes the server's version as the local
    /// copy unless newer edits are still queued.
    pub async fn settle_resolution(
        &self,
        superseded: &[QueueItemId],
        resolved: &Record,
    ) -> SyncResult<usize> {
        let removed = queue::settle_resolution(&self.pool, superseded, resolved).await?;
        Ok(usize::try_from(removed).unwrap_or(usize::MAX))
    }

    pub async fn local_record(&self, id: &RecordId) -> SyncResult<Option<Record>> {
        Ok(records::find_record(&self.pool, id).await?)
    }

    pub async fn local_records(&self, user_id: &str) -> SyncResult<Vec<Record>> {
        Ok(records::list_records_for_user(&self.pool, user_id).await?)
    }
}

#[async_trait]
impl OperationQueue for SqliteOperationQueue {
    async fn enqueue(&self, item: &QueueItem) -> SyncResult<bool> {
        Ok(queue::enqueue(&self.pool, item).await?)
    }

    async fn list_all(&self) -> SyncResult<Vec<QueueItem>> {
        Ok(queue::list_queue(&self.pool).await?)
    }

    async fn remove(&self, id: &QueueItemId) -> SyncResult<bool> {
        Ok(queue::remove_queue_item(&self.pool, id).await?)
    }

    async fn len(&self) -> SyncResult<usize> {
        let count = queue::count_queue(&self.pool).await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn list_for_record(&self, record_id: &RecordId) -> SyncResult<Vec<QueueItem>> {
        Ok(queue::list_queue_for_record(&self.pool, record_id).await?)
    }
}
