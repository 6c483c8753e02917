//! Transaction record operations

use crate::DbPool;
use ledgerline_core::{AppError, Decimal, NaiveDate, Record, RecordId, Timestamp};
use sqlx::{Executor, Sqlite};
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y-%m-%d";

const SELECT_RECORD: &str = "SELECT id, user_id, amount, description, category, occurred_on, updated_at FROM records";

/// Inserts a new record; fails if the id already exists
pub async fn create_record(pool: &DbPool, record: &Record) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO records (id, user_id, amount, description, category, occurred_on, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id.as_str())
    .bind(&record.user_id)
    .bind(record.amount.to_string())
    .bind(&record.description)
    .bind(&record.category)
    .bind(record.occurred_on.format(DATE_FORMAT).to_string())
    .bind(record.updated_at.as_millis())
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to create record", e))?;

    Ok(())
}

/// Overwrites the fields of an existing record
///
/// Ownership is never changed. Returns false when no row matched.
pub async fn update_record(pool: &DbPool, record: &Record) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE records
        SET amount = ?, description = ?, category = ?, occurred_on = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(record.amount.to_string())
    .bind(&record.description)
    .bind(&record.category)
    .bind(record.occurred_on.format(DATE_FORMAT).to_string())
    .bind(record.updated_at.as_millis())
    .bind(record.id.as_str())
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to update record", e))?;

    Ok(result.rows_affected() > 0)
}

/// Inserts or replaces the local copy of a record
pub async fn upsert_record<'e, E>(executor: E, record: &Record) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO records (id, user_id, amount, description, category, occurred_on, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            user_id = excluded.user_id,
            amount = excluded.amount,
            description = excluded.description,
            category = excluded.category,
            occurred_on = excluded.occurred_on,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(record.id.as_str())
    .bind(&record.user_id)
    .bind(record.amount.to_string())
    .bind(&record.description)
    .bind(&record.category)
    .bind(record.occurred_on.format(DATE_FORMAT).to_string())
    .bind(record.updated_at.as_millis())
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to save record", e))?;

    Ok(())
}

/// Looks up a record by id
pub async fn find_record(pool: &DbPool, id: &RecordId) -> Result<Option<Record>, AppError> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_RECORD))
        .bind(id.as_str())
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::database("Failed to fetch record", e))?;

    row.map(row_to_record).transpose()
}

/// Gets a record by id, failing if it does not exist
pub async fn get_record(pool: &DbPool, id: &RecordId) -> Result<Record, AppError> {
    find_record(pool, id)
        .await?
        .ok_or_else(|| AppError::RecordNotFound {
            entity: "Record".to_string(),
            identifier: id.to_string(),
        })
}

/// Lists a user's records, most recent first
pub async fn list_records_for_user(pool: &DbPool, user_id: &str) -> Result<Vec<Record>, AppError> {
    let rows = sqlx::query(&format!(
        "{} WHERE user_id = ? ORDER BY occurred_on DESC, updated_at DESC",
        SELECT_RECORD
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to list records", e))?;

    rows.into_iter().map(row_to_record).collect()
}

pub(crate) fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<Record, AppError> {
    use sqlx::Row;

    let id: String = row
        .try_get("id")
        .map_err(|e| AppError::database("Missing record ID", e))?;

    let amount_str: String = row
        .try_get("amount")
        .map_err(|e| AppError::database("Missing amount", e))?;
    let amount = Decimal::from_str(&amount_str).map_err(|e| AppError::corrupt_row("records", e))?;

    let date_str: String = row
        .try_get("occurred_on")
        .map_err(|e| AppError::database("Missing occurred_on", e))?;
    let occurred_on = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
        .map_err(|e| AppError::corrupt_row("records", e))?;

    let updated_at_ms: i64 = row
        .try_get("updated_at")
        .map_err(|e| AppError::database("Missing updated_at", e))?;

    Ok(Record {
        id: RecordId::from_string(id),
        user_id: row
            .try_get("user_id")
            .map_err(|e| AppError::database("Missing user_id", e))?,
        amount,
        description: row.try_get("description").unwrap_or_default(),
        category: row.try_get("category").unwrap_or_default(),
        occurred_on,
        updated_at: Timestamp::from_millis(updated_at_ms),
    })
}
