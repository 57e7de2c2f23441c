//! Job lifecycle notifications.
//!
//! - `JobEvent`: created, started, completed, failed, retry, batch finished
//! - `Notifier`: append-only event log plus an optional hook command

mod events;
mod notifier;

pub use events::{EventType, JobEvent};
pub use notifier::Notifier;
