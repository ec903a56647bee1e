//! Database operations for the generic rows table.

use pensebete_engine::protocol::RowResponse;
use pensebete_engine::Table;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::from_db_time;

/// A stored row from the database.
#[derive(Debug)]
pub struct StoredRow {
    pub id: String,
    pub data: serde_json::Value,
    pub created_at: i64,
    pub updated_at: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredRow {
            id: row.try_get("id")?,
            data: row.try_get("data")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredRow {
    /// Convert into the wire form.
    pub fn into_response(self, table: Table) -> RowResponse {
        RowResponse {
            id: self.id,
            table,
            data: self.data,
            created_at: from_db_time(self.created_at),
            updated_at: from_db_time(self.updated_at),
        }
    }
}

/// Insert a row unless the owner already used `idempotency_key`.
///
/// Returns the row id and whether it was created by this call. A replayed
/// key resolves to the first row even if that row was deleted since.
pub async fn insert_row(
    pool: &PgPool,
    owner: &str,
    table: Table,
    idempotency_key: &str,
    data: &serde_json::Value,
    now: i64,
) -> Result<(String, bool), sqlx::Error> {
    let id = Uuid::new_v4().to_string();

    let inserted: Option<(String,)> = sqlx::query_as(
        r#"
        INSERT INTO rows (id, owner_id, table_name, idempotency_key, data, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        ON CONFLICT (owner_id, idempotency_key) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(&id)
    .bind(owner)
    .bind(table.as_str())
    .bind(idempotency_key)
    .bind(data)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    if let Some((id,)) = inserted {
        return Ok((id, true));
    }

    let (existing,): (String,) =
        sqlx::query_as("SELECT id FROM rows WHERE owner_id = $1 AND idempotency_key = $2")
            .bind(owner)
            .bind(idempotency_key)
            .fetch_one(pool)
            .await?;

    Ok((existing, false))
}

/// Merge `patch` into the stored data. Returns false if the row is missing.
pub async fn update_row(
    pool: &PgPool,
    owner: &str,
    table: Table,
    id: &str,
    patch: &serde_json::Value,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE rows SET data = data || $1, updated_at = $2
        WHERE owner_id = $3 AND table_name = $4 AND id = $5 AND NOT deleted
        "#,
    )
    .bind(patch)
    .bind(now)
    .bind(owner)
    .bind(table.as_str())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Tombstone a row. Returns false if it was already gone.
pub async fn delete_row(
    pool: &PgPool,
    owner: &str,
    table: Table,
    id: &str,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE rows SET deleted = TRUE, updated_at = $1
        WHERE owner_id = $2 AND table_name = $3 AND id = $4 AND NOT deleted
        "#,
    )
    .bind(now)
    .bind(owner)
    .bind(table.as_str())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Live rows of one table, oldest first.
pub async fn list_rows(
    pool: &PgPool,
    owner: &str,
    table: Table,
) -> Result<Vec<StoredRow>, sqlx::Error> {
    sqlx::query_as::<_, StoredRow>(
        r#"
        SELECT id, data, created_at, updated_at
        FROM rows
        WHERE owner_id = $1 AND table_name = $2 AND NOT deleted
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(owner)
    .bind(table.as_str())
    .fetch_all(pool)
    .await
}
