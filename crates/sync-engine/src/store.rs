// crates/sync-engine/src/store.rs
//! Authoritative record storage used by the reconciliation engine

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use ledgerline_core::{Record, RecordId};
use ledgerline_database::queries::records;
use ledgerline_database::DbPool;

/// Create/read/update access to authoritative records
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, id: &RecordId) -> SyncResult<Option<Record>>;

    async fn insert(&self, record: &Record) -> SyncResult<()>;

    /// Overwrites an existing record; fails with `NotFound` if it is missing
    async fn update(&self, record: &Record) -> SyncResult<()>;
}

/// Record store on the server's SQLite database
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    pool: DbPool,
}

impl SqliteRecordStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn get(&self, id: &RecordId) -> SyncResult<Option<Record>> {
        Ok(records::find_record(&self.pool, id).await?)
    }

    async fn insert(&self, record: &Record) -> SyncResult<()> {
        Ok(records::create_record(&self.pool, record).await?)
    }

    async fn update(&self, record: &Record) -> SyncResult<()> {
        if records::update_record(&self.pool, record).await? {
            Ok(())
        } else {
            Err(SyncError::NotFound(record.id.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerline_core::{Decimal, NaiveDate};
    use ledgerline_database::{connect_in_memory, run_migrations};

    async fn store() -> SqliteRecordStore {
        let pool = connect_in_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteRecordStore::new(pool)
    }

    fn record() -> Record {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        Record::new("user-1", Decimal::new(-4200, 2), "Rent share", "housing", date)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = store().await;
        let rec = record();

        assert!(store.get(&rec.id).await.unwrap().is_none());
        store.insert(&rec).await.unwrap();
        assert_eq!(store.get(&rec.id).await.unwrap(), Some(rec));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = store().await;
        let err = store.update(&record()).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_duplicate_insert_fails() {
        let store = store().await;
        let rec = record();
        store.insert(&rec).await.unwrap();
        assert!(store.insert(&rec).await.is_err());
    }
}
