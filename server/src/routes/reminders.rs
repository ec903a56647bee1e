//! Reminder endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use pensebete_engine::protocol::{CreateReminderRequest, MutationResponse, ReminderQuery};
use pensebete_engine::Reminder;

use crate::auth::Owner;
use crate::error::Result;
use crate::handlers::{handle_create_reminder, handle_mark_sent, handle_query_reminders};
use crate::AppState;

/// Create reminder routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reminders", get(query_handler).post(create_handler))
        .route("/reminders/{id}/sent", post(mark_sent_handler))
}

/// GET /reminders - Query the caller's reminders.
async fn query_handler(
    State(state): State<AppState>,
    owner: Owner,
    Query(query): Query<ReminderQuery>,
) -> Result<Json<Vec<Reminder>>> {
    let reminders = handle_query_reminders(&state.pool, &owner, query).await?;
    Ok(Json(reminders))
}

/// POST /reminders - Attach a reminder to a list item.
async fn create_handler(
    State(state): State<AppState>,
    owner: Owner,
    Json(request): Json<CreateReminderRequest>,
) -> Result<(StatusCode, Json<Reminder>)> {
    let reminder = handle_create_reminder(&state.pool, &owner, request).await?;
    Ok((StatusCode::CREATED, Json(reminder)))
}

/// POST /reminders/{id}/sent - Flag a reminder as announced.
async fn mark_sent_handler(
    State(state): State<AppState>,
    owner: Owner,
    Path(id): Path<String>,
) -> Result<Json<MutationResponse>> {
    let response = handle_mark_sent(&state.pool, &owner, &id).await?;
    Ok(Json(response))
}
