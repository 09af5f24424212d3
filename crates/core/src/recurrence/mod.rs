//! Recurring event generation
//!
//! The calculator and materializer are pure; only [`GenerationService`]
//! touches storage, through the traits in [`ports`].

pub mod calculator;
pub mod materializer;
pub mod ports;
pub mod service;

pub use service::{GenerationReport, GenerationService, RuleOutcome, RuleReport};
