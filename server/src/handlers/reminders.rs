//! Reminder handlers.

use pensebete_engine::protocol::{CreateReminderRequest, MutationResponse, ReminderQuery};
use pensebete_engine::Reminder;

use crate::auth::Owner;
use crate::db::{self, Pool, ReminderFilter};
use crate::error::{AppError, Result};

/// Convert the wire query into column-typed filters.
pub fn reminder_filter(query: &ReminderQuery) -> Result<ReminderFilter> {
    Ok(ReminderFilter {
        is_sent: query.is_sent,
        due_from: query.due_from.map(db::to_db_time).transpose()?,
        due_to: query.due_to.map(db::to_db_time).transpose()?,
        due_before: query.due_before.map(db::to_db_time).transpose()?,
    })
}

/// Create an unsent reminder for a list item.
pub async fn handle_create_reminder(
    pool: &Pool,
    owner: &Owner,
    request: CreateReminderRequest,
) -> Result<Reminder> {
    let due_time = db::to_db_time(request.due_time)?;
    let id = db::insert_reminder(
        pool,
        owner.as_str(),
        &request.item_id,
        &request.list_id,
        due_time,
        db::now_millis(),
    )
    .await?;

    tracing::debug!("Created reminder {} for item {}", id, request.item_id);

    db::get_reminder(pool, owner.as_str(), &id)
        .await?
        .map(Reminder::from)
        .ok_or_else(|| AppError::NotFound(format!("reminder {}", id)))
}

/// Reminders of the owner matching the query.
pub async fn handle_query_reminders(
    pool: &Pool,
    owner: &Owner,
    query: ReminderQuery,
) -> Result<Vec<Reminder>> {
    let filter = reminder_filter(&query)?;
    let reminders = db::query_reminders(pool, owner.as_str(), filter).await?;

    Ok(reminders.into_iter().map(Reminder::from).collect())
}

/// Flag a reminder as sent.
pub async fn handle_mark_sent(pool: &Pool, owner: &Owner, id: &str) -> Result<MutationResponse> {
    let applied = db::mark_reminder_sent(pool, owner.as_str(), id).await?;

    if applied {
        tracing::debug!("Reminder {} marked sent", id);
    }

    Ok(MutationResponse { applied })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_keeps_bounds() {
        let filter = reminder_filter(&ReminderQuery::due_within(1000, 500)).unwrap();

        assert!(!filter.is_sent);
        assert_eq!(filter.due_from, Some(1000));
        assert_eq!(filter.due_to, Some(1500));
        assert_eq!(filter.due_before, None);
    }

    #[test]
    fn filter_rejects_unrepresentable_time() {
        let query = ReminderQuery::overdue(u64::MAX);
        assert!(matches!(
            reminder_filter(&query),
            Err(AppError::BadRequest(_))
        ));
    }
}
