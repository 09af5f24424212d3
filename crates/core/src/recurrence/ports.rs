//! Port interfaces for recurring-event generation
//!
//! These traits define the boundaries between the generation service and the
//! storage and time implementations it runs against.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use cadence_domain::{Event, GenerationBatch, InvalidRule, NewEvent, RecurrenceRule, Result};
use chrono::{Days, NaiveDate};

/// A stored active rule; decoding its pattern columns may have failed.
pub type LoadedRule = std::result::Result<RecurrenceRule, InvalidRule>;

/// Trait for reading and inserting events
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Fetch an event by id
    async fn find_event(&self, id: i64) -> Result<Option<Event>>;

    /// Whether an instance of `parent_id` already exists on `date`
    async fn instance_exists(&self, parent_id: i64, date: NaiveDate) -> Result<bool>;

    /// Insert a single event and return it with its id
    async fn insert_event(&self, event: NewEvent) -> Result<Event>;
}

/// Trait for recurrence rule storage
#[async_trait]
pub trait RecurrenceRuleRepository: Send + Sync {
    /// All rules with `is_active` set
    async fn list_active(&self) -> Result<Vec<LoadedRule>>;

    /// Insert the batch's instances and overwrite the rule's progress in one
    /// transaction. On error nothing from the batch is persisted.
    async fn commit_generation(&self, batch: GenerationBatch) -> Result<Vec<Event>>;
}

/// Source of "today" for the generation horizon
pub trait Clock: Send + Sync {
    /// Current calendar date
    fn today(&self) -> NaiveDate;
}

/// Local wall-clock date
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// Manually controlled date for tests
#[derive(Debug, Clone)]
pub struct FixedClock {
    today: Arc<Mutex<NaiveDate>>,
}

impl FixedClock {
    /// Create a clock frozen on `today`
    pub fn new(today: NaiveDate) -> Self {
        Self { today: Arc::new(Mutex::new(today)) }
    }

    /// Move the clock to `today`
    pub fn set(&self, today: NaiveDate) {
        *self.today.lock().unwrap_or_else(PoisonError::into_inner) = today;
    }

    /// Move the clock forward by `days`
    pub fn advance_days(&self, days: u64) {
        let mut guard = self.today.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = guard.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX);
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.today.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_is_shared_between_clones() {
        let clock = FixedClock::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let handle = clock.clone();

        handle.advance_days(31);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());

        clock.set(NaiveDate::from_ymd_opt(2030, 6, 1).unwrap());
        assert_eq!(handle.today(), NaiveDate::from_ymd_opt(2030, 6, 1).unwrap());
    }
}
