//! Timer-driven reminder machinery.
//!
//! Two cooperating pieces:
//! - [`ReminderScheduler`] arms one absolute timer per active treatment
//!   and dispatches an alert when it fires.
//! - [`DueCheckLoop`] polls the in-memory store on a short interval and
//!   raises an alert when a dose enters its trigger band, catching the
//!   cases where a timer was lost (restart, suspend, clock jump).

pub mod due_check;
pub mod error;
pub mod reminder_scheduler;

pub use due_check::{DueCheckConfig, DueCheckLoop};
pub use error::{SchedulerError, SchedulerResult};
pub use reminder_scheduler::ReminderScheduler;
