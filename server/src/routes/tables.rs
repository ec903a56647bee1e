//! Row endpoints, one set per synced table.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use pensebete_engine::protocol::{
    CreateRowRequest, CreateRowResponse, MutationResponse, RowResponse, UpdateRowRequest,
};

use crate::auth::Owner;
use crate::error::Result;
use crate::handlers::{
    handle_create_row, handle_delete_row, handle_list_rows, handle_update_row, parse_table,
};
use crate::AppState;

/// Create table routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tables/{table}/rows", get(list_handler).post(create_handler))
        .route(
            "/tables/{table}/rows/{id}",
            patch(update_handler).delete(delete_handler),
        )
}

/// POST /tables/{table}/rows - Create a row.
async fn create_handler(
    State(state): State<AppState>,
    owner: Owner,
    Path(table): Path<String>,
    Json(request): Json<CreateRowRequest>,
) -> Result<(StatusCode, Json<CreateRowResponse>)> {
    let table = parse_table(&table)?;
    let response = handle_create_row(&state.pool, &owner, table, request).await?;
    let status = if response.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(response)))
}

/// GET /tables/{table}/rows - List the caller's rows.
async fn list_handler(
    State(state): State<AppState>,
    owner: Owner,
    Path(table): Path<String>,
) -> Result<Json<Vec<RowResponse>>> {
    let table = parse_table(&table)?;
    let rows = handle_list_rows(&state.pool, &owner, table).await?;
    Ok(Json(rows))
}

/// PATCH /tables/{table}/rows/{id} - Merge fields into a row.
async fn update_handler(
    State(state): State<AppState>,
    owner: Owner,
    Path((table, id)): Path<(String, String)>,
    Json(request): Json<UpdateRowRequest>,
) -> Result<Json<MutationResponse>> {
    let table = parse_table(&table)?;
    let response = handle_update_row(&state.pool, &owner, table, &id, request).await?;
    Ok(Json(response))
}

/// DELETE /tables/{table}/rows/{id} - Delete a row.
async fn delete_handler(
    State(state): State<AppState>,
    owner: Owner,
    Path((table, id)): Path<(String, String)>,
) -> Result<Json<MutationResponse>> {
    let table = parse_table(&table)?;
    let response = handle_delete_row(&state.pool, &owner, table, &id).await?;
    Ok(Json(response))
}
