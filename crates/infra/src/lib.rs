//! # Cadence Infrastructure
//!
//! Infrastructure implementations of the generation ports.
//!
//! This crate contains:
//! - SQLite persistence (r2d2 pool, schema, repositories)
//! - Configuration loading from the environment or a file
//! - The cron trigger for daily generation passes
//! - Scheduler metrics
//!
//! ## Architecture
//! - Implements traits defined in `cadence-core`
//! - Contains all "impure" code (I/O, timers)

pub mod config;
pub mod database;
pub mod errors;
pub mod observability;
pub mod scheduling;

// Re-export commonly used items
pub use database::*;
pub use errors::InfraError;
pub use scheduling::{RecurrenceScheduler, RecurrenceSchedulerConfig, SchedulerError};
