//! Recurring mission scheduling.

mod recurring;

pub use recurring::{CycleReport, RecurringScheduler, is_due};
