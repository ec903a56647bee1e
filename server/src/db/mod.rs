//! Database module for PostgreSQL persistence.

mod pool;
mod reminders;
mod rows;

pub use pool::*;
pub use reminders::*;
pub use rows::*;

use crate::error::AppError;
use pensebete_engine::Timestamp;

/// Current wall-clock time in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Convert a wire timestamp into the signed column type.
pub fn to_db_time(value: Timestamp) -> Result<i64, AppError> {
    i64::try_from(value).map_err(|_| AppError::BadRequest(format!("timestamp out of range: {}", value)))
}

/// Convert a stored timestamp back into its wire form.
pub fn from_db_time(value: i64) -> Timestamp {
    value.max(0) as Timestamp
}
