//! Scheduling infrastructure for the daily generation pass
//!
//! The scheduler follows the workspace runtime rules:
//! - Explicit lifecycle management (start/shutdown)
//! - Join handles for spawned tasks
//! - Cancellation token support
//! - Timeout wrapping on all async operations

pub mod error;
pub mod recurrence_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use recurrence_scheduler::{RecurrenceScheduler, RecurrenceSchedulerConfig};
