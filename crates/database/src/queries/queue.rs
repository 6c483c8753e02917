//! Durable sync queue operations
//!
//! Items are stored with an autoincrement sequence number; listing orders by
//! it so the queue is strictly FIFO. Items are only ever inserted or
//! deleted, never updated.

use crate::queries::records::upsert_record;
use crate::DbPool;
use ledgerline_core::{AppError, MutationKind, QueueItem, QueueItemId, Record, RecordId, Timestamp};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

const SELECT_ITEM: &str = "SELECT seq, id, kind, payload, enqueued_at FROM sync_queue";

/// Appends an item to the queue
///
/// Returns false if an item with the same id is already queued; the
/// existing item is left untouched.
pub async fn enqueue<'e, E>(executor: E, item: &QueueItem) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let payload = serde_json::to_string(&item.payload)
        .map_err(|e| AppError::database("Failed to encode queue payload", e))?;

    let result = sqlx::query(
        r#"
        INSERT INTO sync_queue (id, kind, record_id, payload, enqueued_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO NOTHING
        "#,
    )
    .bind(item.id.as_string())
    .bind(item.kind.as_str())
    .bind(item.record_id().as_str())
    .bind(payload)
    .bind(item.enqueued_at.as_millis())
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to enqueue mutation", e))?;

    Ok(result.rows_affected() > 0)
}

/// Saves the local record copy and queues the mutation in one transaction
pub async fn enqueue_with_record(pool: &DbPool, item: &QueueItem) -> Result<bool, AppError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::database("Failed to start transaction", e))?;

    upsert_record(&mut *tx, &item.payload).await?;
    let inserted = enqueue(&mut *tx, item).await?;

    tx.commit()
        .await
        .map_err(|e| AppError::database("Failed to commit local mutation", e))?;

    Ok(inserted)
}

/// Lists every queued item in enqueue order
pub async fn list_queue(pool: &DbPool) -> Result<Vec<QueueItem>, AppError> {
    let rows = sqlx::query(&format!("{} ORDER BY seq", SELECT_ITEM))
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::database("Failed to list queue", e))?;

    decode_rows(pool, rows).await
}

/// Lists queued items targeting one record, in enqueue order
pub async fn list_queue_for_record(
    pool: &DbPool,
    record_id: &RecordId,
) -> Result<Vec<QueueItem>, AppError> {
    let rows = sqlx::query(&format!("{} WHERE record_id = ? ORDER BY seq", SELECT_ITEM))
        .bind(record_id.as_str())
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::database("Failed to list queue for record", e))?;

    decode_rows(pool, rows).await
}

/// Removes an item; removing a missing id is a no-op returning false
pub async fn remove_queue_item(pool: &DbPool, id: &QueueItemId) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM sync_queue WHERE id = ?")
        .bind(id.as_string())
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to remove queue item", e))?;

    Ok(result.rows_affected() > 0)
}

/// Drops the items a conflict resolution superseded and stores its result
///
/// Only the listed ids are removed, so edits queued after the resolution
/// was requested stay queued. The local copy is replaced only when no
/// mutation of the record remains; otherwise the newest queued edit stays
/// the local truth until it syncs. Both writes commit together.
pub async fn settle_resolution(
    pool: &DbPool,
    superseded: &[QueueItemId],
    resolved: &Record,
) -> Result<u64, AppError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::database("Failed to start transaction", e))?;

    let mut removed = 0;
    for id in superseded {
        let result = sqlx::query("DELETE FROM sync_queue WHERE id = ?")
            .bind(id.as_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database("Failed to remove superseded item", e))?;
        removed += result.rows_affected();
    }

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue WHERE record_id = ?")
        .bind(resolved.id.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::database("Failed to count queued edits", e))?;

    if remaining == 0 {
        upsert_record(&mut *tx, resolved).await?;
    } else {
        log::info!(
            "Keeping local copy of {}; {} newer edits still queued",
            resolved.id,
            remaining
        );
    }

    tx.commit()
        .await
        .map_err(|e| AppError::database("Failed to commit resolution", e))?;

    Ok(removed)
}

/// Number of queued items
pub async fn count_queue(pool: &DbPool) -> Result<i64, AppError> {
    sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to count queue", e))
}

/// Decodes listed rows, moving undecodable ones to `sync_queue_rejects`
///
/// A row that can never be decoded would otherwise block every later drain.
async fn decode_rows(pool: &DbPool, rows: Vec<SqliteRow>) -> Result<Vec<QueueItem>, AppError> {
    let mut items = Vec::with_capacity(rows.len());

    for row in rows {
        match row_to_item(&row) {
            Ok(item) => items.push(item),
            Err(AppError::CorruptRow { reason, .. }) => {
                let seq: i64 = row
                    .try_get("seq")
                    .map_err(|e| AppError::database("Missing queue sequence", e))?;
                quarantine_row(pool, seq, &reason).await?;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(items)
}

async fn quarantine_row(pool: &DbPool, seq: i64, reason: &str) -> Result<(), AppError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::database("Failed to start transaction", e))?;

    sqlx::query(
        r#"
        INSERT INTO sync_queue_rejects (seq, id, kind, record_id, payload, enqueued_at, reason, rejected_at)
        SELECT seq, id, kind, record_id, payload, enqueued_at, ?, ?
        FROM sync_queue WHERE seq = ?
        "#,
    )
    .bind(reason)
    .bind(Timestamp::now().as_millis())
    .bind(seq)
    .execute(&mut *tx)
    .await
    .map_err(|e| AppError::database("Failed to set aside corrupt queue row", e))?;

    sqlx::query("DELETE FROM sync_queue WHERE seq = ?")
        .bind(seq)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database("Failed to remove corrupt queue row", e))?;

    tx.commit()
        .await
        .map_err(|e| AppError::database("Failed to commit corrupt row removal", e))?;

    log::warn!("Moved corrupt queue row {} to sync_queue_rejects: {}", seq, reason);
    Ok(())
}

/// Number of rows set aside as undecodable
pub async fn count_rejected(pool: &DbPool) -> Result<i64, AppError> {
    sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue_rejects")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to count rejected rows", e))
}

fn row_to_item(row: &SqliteRow) -> Result<QueueItem, AppError> {
    let id_str: String = row
        .try_get("id")
        .map_err(|e| AppError::corrupt_row("sync_queue", e))?;
    let id = QueueItemId::from_string(&id_str).map_err(|e| AppError::corrupt_row("sync_queue", e))?;

    let kind_str: String = row
        .try_get("kind")
        .map_err(|e| AppError::corrupt_row("sync_queue", e))?;
    let kind = MutationKind::parse(&kind_str).ok_or_else(|| {
        AppError::corrupt_row("sync_queue", format!("unknown mutation kind '{}'", kind_str))
    })?;

    let payload_str: String = row
        .try_get("payload")
        .map_err(|e| AppError::corrupt_row("sync_queue", e))?;
    let payload: Record =
        serde_json::from_str(&payload_str).map_err(|e| AppError::corrupt_row("sync_queue", e))?;

    let enqueued_at: i64 = row
        .try_get("enqueued_at")
        .map_err(|e| AppError::corrupt_row("sync_queue", e))?;

    Ok(QueueItem {
        id,
        kind,
        payload,
        enqueued_at: Timestamp::from_millis(enqueued_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect_in_memory;
    use crate::migrations::run_migrations;
    use crate::queries::records::find_record;
    use ledgerline_core::{Decimal, NaiveDate};

    async fn setup() -> DbPool {
        let pool = connect_in_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    fn item(description: &str) -> QueueItem {
        QueueItem::create_or_update(Record::new(
            "user-1",
            Decimal::new(500, 2),
            description,
            "misc",
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_enqueue_and_list_in_order() {
        let pool = setup().await;
        let items: Vec<_> = ["a", "b", "c"].iter().map(|d| item(d)).collect();

        for it in &items {
            assert!(enqueue(&pool, it).await.unwrap());
        }

        let listed = list_queue(&pool).await.unwrap();
        assert_eq!(listed, items);
    }

    #[tokio::test]
    async fn test_duplicate_id_is_ignored() {
        let pool = setup().await;
        let original = item("first");
        enqueue(&pool, &original).await.unwrap();

        let mut duplicate = original.clone();
        duplicate.payload.description = "second".to_string();
        assert!(!enqueue(&pool, &duplicate).await.unwrap());

        let listed = list_queue(&pool).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].payload.description, "first");
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let pool = setup().await;
        let it = item("x");
        enqueue(&pool, &it).await.unwrap();

        assert!(remove_queue_item(&pool, &it.id).await.unwrap());
        assert!(!remove_queue_item(&pool, &it.id).await.unwrap());
        assert_eq!(count_queue(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_items_for_record() {
        let pool = setup().await;
        let first = item("v1");
        let mut record = first.payload.clone();
        record.description = "v2".to_string();
        let second = QueueItem::create_or_update(record);
        let other = item("other");

        for it in [&first, &other, &second] {
            enqueue(&pool, it).await.unwrap();
        }

        let for_record = list_queue_for_record(&pool, first.record_id()).await.unwrap();
        assert_eq!(for_record, vec![first, second]);
        assert!(!for_record.contains(&other));
    }

    #[tokio::test]
    async fn test_settle_resolution_removes_only_superseded() {
        let pool = setup().await;
        let first = item("v1");
        enqueue_with_record(&pool, &first).await.unwrap();

        let mut resolved = first.payload.clone();
        resolved.description = "resolved".to_string();

        // Saved after the resolution was requested
        let mut newer = first.payload.clone();
        newer.description = "v2".to_string();
        let later = QueueItem::create_or_update(newer);
        enqueue_with_record(&pool, &later).await.unwrap();

        let removed = settle_resolution(&pool, &[first.id.clone()], &resolved)
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert_eq!(list_queue(&pool).await.unwrap(), vec![later]);
        let local = find_record(&pool, first.record_id()).await.unwrap().unwrap();
        assert_eq!(local.description, "v2");
    }

    #[tokio::test]
    async fn test_settle_resolution_replaces_local_copy_when_drained() {
        let pool = setup().await;
        let first = item("v1");
        enqueue_with_record(&pool, &first).await.unwrap();

        let mut resolved = first.payload.clone();
        resolved.description = "resolved".to_string();

        settle_resolution(&pool, &[first.id.clone()], &resolved)
            .await
            .unwrap();

        assert_eq!(count_queue(&pool).await.unwrap(), 0);
        let local = find_record(&pool, first.record_id()).await.unwrap();
        assert_eq!(local, Some(resolved));
    }

    #[tokio::test]
    async fn test_corrupt_row_is_set_aside() {
        let pool = setup().await;
        let good = item("good");
        enqueue(&pool, &good).await.unwrap();

        sqlx::query(
            "INSERT INTO sync_queue (id, kind, record_id, payload, enqueued_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(QueueItemId::new().as_string())
        .bind("create-or-update")
        .bind("tx-broken")
        .bind("{not json")
        .bind(1_i64)
        .execute(&pool)
        .await
        .unwrap();

        let later = item("later");
        enqueue(&pool, &later).await.unwrap();

        assert_eq!(list_queue(&pool).await.unwrap(), vec![good, later]);
        assert_eq!(count_queue(&pool).await.unwrap(), 2);
        assert_eq!(count_rejected(&pool).await.unwrap(), 1);

        // Set aside once, not on every listing
        list_queue(&pool).await.unwrap();
        assert_eq!(count_rejected(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_with_record_writes_both() {
        let pool = setup().await;
        let it = item("coffee");

        enqueue_with_record(&pool, &it).await.unwrap();

        assert_eq!(count_queue(&pool).await.unwrap(), 1);
        let local = find_record(&pool, it.record_id()).await.unwrap();
        assert_eq!(local, Some(it.payload));
    }
}
