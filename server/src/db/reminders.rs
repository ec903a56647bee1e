//! Database operations for reminders.

use pensebete_engine::Reminder;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::from_db_time;

/// Reminder columns joined with the names of the item and its list.
const SELECT_REMINDER: &str = r#"
    SELECT r.id, r.item_id, r.list_id, r.due_time, r.is_sent,
           COALESCE(i.data->>'content', i.data->>'name') AS item_name,
           l.data->>'name' AS list_name
    FROM reminders r
    LEFT JOIN rows i ON i.owner_id = r.owner_id AND i.id = r.item_id AND NOT i.deleted
    LEFT JOIN rows l ON l.owner_id = r.owner_id AND l.id = r.list_id AND NOT l.deleted
"#;

/// A stored reminder with its joined names.
#[derive(Debug)]
pub struct StoredReminder {
    pub id: String,
    pub item_id: String,
    pub list_id: String,
    pub due_time: i64,
    pub is_sent: bool,
    pub item_name: Option<String>,
    pub list_name: Option<String>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredReminder {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredReminder {
            id: row.try_get("id")?,
            item_id: row.try_get("item_id")?,
            list_id: row.try_get("list_id")?,
            due_time: row.try_get("due_time")?,
            is_sent: row.try_get("is_sent")?,
            item_name: row.try_get("item_name")?,
            list_name: row.try_get("list_name")?,
        })
    }
}

impl From<StoredReminder> for Reminder {
    fn from(stored: StoredReminder) -> Self {
        Reminder {
            id: stored.id,
            item_id: stored.item_id,
            list_id: stored.list_id,
            due_time: from_db_time(stored.due_time),
            is_sent: stored.is_sent,
            item_name: stored.item_name,
            list_name: stored.list_name,
        }
    }
}

/// Filters of a reminder query, already converted to column types.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReminderFilter {
    pub is_sent: bool,
    pub due_from: Option<i64>,
    pub due_to: Option<i64>,
    pub due_before: Option<i64>,
}

/// Insert an unsent reminder and return its id.
pub async fn insert_reminder(
    pool: &PgPool,
    owner: &str,
    item_id: &str,
    list_id: &str,
    due_time: i64,
    now: i64,
) -> Result<String, sqlx::Error> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO reminders (id, owner_id, item_id, list_id, due_time, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(&id)
    .bind(owner)
    .bind(item_id)
    .bind(list_id)
    .bind(due_time)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(id)
}

/// Fetch a single reminder of the owner.
pub async fn get_reminder(
    pool: &PgPool,
    owner: &str,
    id: &str,
) -> Result<Option<StoredReminder>, sqlx::Error> {
    let sql = format!("{} WHERE r.owner_id = $1 AND r.id = $2", SELECT_REMINDER);

    sqlx::query_as::<_, StoredReminder>(&sql)
        .bind(owner)
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Reminders of the owner matching `filter`, earliest due first.
pub async fn query_reminders(
    pool: &PgPool,
    owner: &str,
    filter: ReminderFilter,
) -> Result<Vec<StoredReminder>, sqlx::Error> {
    let sql = format!(
        r#"{}
        WHERE r.owner_id = $1 AND r.is_sent = $2
          AND ($3::BIGINT IS NULL OR r.due_time >= $3)
          AND ($4::BIGINT IS NULL OR r.due_time <= $4)
          AND ($5::BIGINT IS NULL OR r.due_time < $5)
        ORDER BY r.due_time ASC, r.id ASC
        "#,
        SELECT_REMINDER
    );

    sqlx::query_as::<_, StoredReminder>(&sql)
        .bind(owner)
        .bind(filter.is_sent)
        .bind(filter.due_from)
        .bind(filter.due_to)
        .bind(filter.due_before)
        .fetch_all(pool)
        .await
}

/// Flag a reminder as sent. Returns false if the owner has no such reminder.
///
/// The flag is never cleared, so repeating the call is harmless.
pub async fn mark_reminder_sent(pool: &PgPool, owner: &str, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE reminders SET is_sent = TRUE WHERE owner_id = $1 AND id = $2")
        .bind(owner)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
