//! Shared test helpers for `cadence-core` integration tests.
//!
//! These helpers provide reusable fixtures and lightweight mocks so that
//! generation tests can focus on behaviour instead of boilerplate.

#![allow(dead_code)]

pub mod repositories;

use std::sync::Arc;

use cadence_core::{FixedClock, GenerationService};
use cadence_domain::{
    EventDetails, GenerationConfig, NewEvent, NewRecurrenceRule, RecurrencePattern, RuleBounds,
};
use chrono::NaiveDate;

pub use repositories::InMemoryStore;

/// Shorthand for a calendar date.
pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A recurring parent event on `date`.
pub fn parent_event(name: &str, date: NaiveDate) -> NewEvent {
    NewEvent::standalone(date, EventDetails::named(name)).recurring()
}

/// A rule for `event_id` with the given bounds.
pub fn rule(event_id: i64, pattern: RecurrencePattern, bounds: RuleBounds) -> NewRecurrenceRule {
    NewRecurrenceRule::new(event_id, pattern).with_bounds(bounds)
}

/// Service wired to `store` and `clock` with a 30 day horizon.
pub fn service(store: &InMemoryStore, clock: &FixedClock) -> GenerationService {
    service_with(store, clock, GenerationConfig::default())
}

pub fn service_with(
    store: &InMemoryStore,
    clock: &FixedClock,
    config: GenerationConfig,
) -> GenerationService {
    GenerationService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(clock.clone()),
        &config,
    )
}
