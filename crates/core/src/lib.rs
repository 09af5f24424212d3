//! # Cadence Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - The occurrence calculator and instance materializer
//! - Port/adapter interfaces (traits)
//! - The generation service
//!
//! ## Architecture Principles
//! - Only depends on `cadence-domain`
//! - No database or scheduler code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod recurrence;

pub use recurrence::calculator::{next_occurrence, nth_weekday_of_month};
pub use recurrence::materializer::materialize;
pub use recurrence::ports::{
    Clock, EventRepository, FixedClock, LoadedRule, RecurrenceRuleRepository, SystemClock,
};
pub use recurrence::{GenerationReport, GenerationService, RuleOutcome, RuleReport};
