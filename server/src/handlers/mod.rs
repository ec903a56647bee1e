//! Request handlers for rows and reminders.

mod reminders;
mod tables;

pub use reminders::*;
pub use tables::*;
