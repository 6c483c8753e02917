//! Resource cache storage
//!
//! Entries live in named caches; a cache exists while it holds at least
//! one entry.

use crate::DbPool;
use ledgerline_core::{AppError, Timestamp};

/// A stored response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub stored_at: Timestamp,
}

/// Stores or replaces an entry
pub async fn put_cache_entry(
    pool: &DbPool,
    cache_name: &str,
    resource_key: &str,
    entry: &CacheEntry,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO cache_entries (cache_name, resource_key, status, content_type, body, stored_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(cache_name, resource_key) DO UPDATE SET
            status = excluded.status,
            content_type = excluded.content_type,
            body = excluded.body,
            stored_at = excluded.stored_at
        "#,
    )
    .bind(cache_name)
    .bind(resource_key)
    .bind(i64::from(entry.status))
    .bind(&entry.content_type)
    .bind(&entry.body)
    .bind(entry.stored_at.as_millis())
    .execute(pool)
    .await
    .map_err(|e| AppError::CacheWriteFailed {
        reason: e.to_string(),
    })?;

    Ok(())
}

/// Looks up an entry
pub async fn get_cache_entry(
    pool: &DbPool,
    cache_name: &str,
    resource_key: &str,
) -> Result<Option<CacheEntry>, AppError> {
    let row = sqlx::query(
        "SELECT status, content_type, body, stored_at FROM cache_entries WHERE cache_name = ? AND resource_key = ?",
    )
    .bind(cache_name)
    .bind(resource_key)
    .fetch_optional(pool)
    .await
    .map_err(|e| AppError::database("Failed to read cache entry", e))?;

    row.map(row_to_entry).transpose()
}

/// Deletes a whole cache, returning the number of entries removed
pub async fn delete_cache(pool: &DbPool, cache_name: &str) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM cache_entries WHERE cache_name = ?")
        .bind(cache_name)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to delete cache", e))?;

    Ok(result.rows_affected())
}

/// Names of every non-empty cache
pub async fn list_cache_names(pool: &DbPool) -> Result<Vec<String>, AppError> {
    sqlx::query_scalar("SELECT DISTINCT cache_name FROM cache_entries ORDER BY cache_name")
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::database("Failed to list caches", e))
}

fn row_to_entry(row: sqlx::sqlite::SqliteRow) -> Result<CacheEntry, AppError> {
    use sqlx::Row;

    let status: i64 = row
        .try_get("status")
        .map_err(|e| AppError::database("Missing status", e))?;
    let status = u16::try_from(status).map_err(|e| AppError::corrupt_row("cache_entries", e))?;
    let stored_at: i64 = row
        .try_get("stored_at")
        .map_err(|e| AppError::database("Missing stored_at", e))?;

    Ok(CacheEntry {
        status,
        content_type: row.try_get("content_type").ok().flatten(),
        body: row
            .try_get("body")
            .map_err(|e| AppError::database("Missing body", e))?,
        stored_at: Timestamp::from_millis(stored_at),
    })
}
