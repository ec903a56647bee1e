//! Reminder store and scheduler.

mod scheduler;
mod store;

pub use scheduler::{ReminderScheduler, SchedulerConfig, TickReport};
pub use store::{NotifiedCache, ReminderStore, NOTIFIED_KEY};
