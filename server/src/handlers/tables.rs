//! Row handlers shared by every synced table.

use pensebete_engine::protocol::{
    CreateRowRequest, CreateRowResponse, MutationResponse, RowResponse, UpdateRowRequest,
};
use pensebete_engine::Table;

use crate::auth::Owner;
use crate::db::{self, Pool};
use crate::error::{AppError, Result};

/// Resolve a table name taken from the path.
pub fn parse_table(name: &str) -> Result<Table> {
    Ok(name.parse::<Table>()?)
}

/// Row data must be a JSON object so updates can merge into it.
pub fn require_object(data: &serde_json::Value) -> Result<()> {
    if data.is_object() {
        Ok(())
    } else {
        Err(AppError::BadRequest("row data must be a JSON object".to_string()))
    }
}

/// Handle a create, replaying the first answer for a reused key.
pub async fn handle_create_row(
    pool: &Pool,
    owner: &Owner,
    table: Table,
    request: CreateRowRequest,
) -> Result<CreateRowResponse> {
    require_object(&request.data)?;
    if request.idempotency_key.trim().is_empty() {
        return Err(AppError::BadRequest(
            "idempotencyKey must not be empty".to_string(),
        ));
    }

    let (id, created) = db::insert_row(
        pool,
        owner.as_str(),
        table,
        &request.idempotency_key,
        &request.data,
        db::now_millis(),
    )
    .await?;

    if created {
        tracing::debug!("Created {} row {} for {}", table, id, owner.as_str());
    } else {
        tracing::info!(
            "Replayed create of {} row {} (key {})",
            table,
            id,
            request.idempotency_key
        );
    }

    Ok(CreateRowResponse { id, created })
}

/// Handle a partial update.
pub async fn handle_update_row(
    pool: &Pool,
    owner: &Owner,
    table: Table,
    id: &str,
    request: UpdateRowRequest,
) -> Result<MutationResponse> {
    require_object(&request.data)?;

    let applied = db::update_row(
        pool,
        owner.as_str(),
        table,
        id,
        &request.data,
        db::now_millis(),
    )
    .await?;

    if !applied {
        tracing::debug!("Update of missing {} row {}", table, id);
    }

    Ok(MutationResponse { applied })
}

/// Handle a delete.
pub async fn handle_delete_row(
    pool: &Pool,
    owner: &Owner,
    table: Table,
    id: &str,
) -> Result<MutationResponse> {
    let applied = db::delete_row(pool, owner.as_str(), table, id, db::now_millis()).await?;

    if !applied {
        tracing::debug!("Delete of missing {} row {}", table, id);
    }

    Ok(MutationResponse { applied })
}

/// List the owner's live rows of a table.
pub async fn handle_list_rows(pool: &Pool, owner: &Owner, table: Table) -> Result<Vec<RowResponse>> {
    let rows = db::list_rows(pool, owner.as_str(), table).await?;

    Ok(rows
        .into_iter()
        .map(|row| row.into_response(table))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_tables_parse() {
        assert_eq!(parse_table("list_items").unwrap(), Table::ListItems);
        assert_eq!(parse_table("shared_lists").unwrap(), Table::SharedLists);
    }

    #[test]
    fn unknown_table_is_rejected() {
        assert!(matches!(parse_table("todos"), Err(AppError::Engine(_))));
    }

    #[test]
    fn only_objects_are_row_data() {
        assert!(require_object(&json!({"name": "Groceries"})).is_ok());
        assert!(require_object(&json!(["a"])).is_err());
        assert!(require_object(&json!("text")).is_err());
        assert!(require_object(&json!(null)).is_err());
    }
}
