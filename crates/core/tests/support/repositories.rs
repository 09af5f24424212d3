//! Mock repository implementations for testing
//!
//! A single in-memory store implements both storage ports so that committed
//! batches are visible to the event lookups of later passes.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cadence_core::{EventRepository, LoadedRule, RecurrenceRuleRepository};
use cadence_domain::{
    CadenceError, Event, GenerationBatch, InvalidRule, NewEvent, NewRecurrenceRule,
    RecurrenceRule, Result as DomainResult, RuleProgress,
};
use chrono::NaiveDate;

#[derive(Default)]
struct State {
    events: Vec<Event>,
    rules: Vec<LoadedRule>,
    failing_rules: HashSet<i64>,
    commit_delay: Option<Duration>,
    fail_listing: bool,
    commits: usize,
    next_event_id: i64,
}

impl State {
    fn store_event(&mut self, event: NewEvent) -> Event {
        self.next_event_id += 1;
        let event = event.with_id(self.next_event_id);
        self.events.push(event.clone());
        event
    }
}

/// In-memory mock for `EventRepository` and `RecurrenceRuleRepository`.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event directly, bypassing the port.
    pub fn add_event(&self, event: NewEvent) -> Event {
        self.state.lock().unwrap().store_event(event)
    }

    pub fn remove_event(&self, id: i64) {
        self.state.lock().unwrap().events.retain(|event| event.id != id);
    }

    pub fn add_rule(&self, rule: NewRecurrenceRule) -> RecurrenceRule {
        let mut state = self.state.lock().unwrap();
        let rule = RecurrenceRule {
            id: state.rules.len() as i64 + 1,
            event_id: rule.event_id,
            pattern: rule.pattern,
            bounds: rule.bounds,
            progress: RuleProgress::default(),
            is_active: rule.is_active,
        };
        state.rules.push(Ok(rule.clone()));
        rule
    }

    /// Register a rule whose stored columns failed to decode.
    pub fn add_invalid_rule(&self, event_id: i64, message: &str) -> i64 {
        let mut state = self.state.lock().unwrap();
        let rule_id = state.rules.len() as i64 + 1;
        state.rules.push(Err(InvalidRule {
            rule_id,
            event_id,
            error: CadenceError::InvalidInput(message.to_string()),
        }));
        rule_id
    }

    pub fn fail_commits_for(&self, rule_id: i64) {
        self.state.lock().unwrap().failing_rules.insert(rule_id);
    }

    pub fn delay_commits(&self, delay: Duration) {
        self.state.lock().unwrap().commit_delay = Some(delay);
    }

    pub fn fail_listing(&self) {
        self.state.lock().unwrap().fail_listing = true;
    }

    pub fn rule(&self, rule_id: i64) -> RecurrenceRule {
        self.state
            .lock()
            .unwrap()
            .rules
            .iter()
            .flatten()
            .find(|rule| rule.id == rule_id)
            .cloned()
            .unwrap()
    }

    pub fn set_active(&self, rule_id: i64, active: bool) {
        let mut state = self.state.lock().unwrap();
        if let Some(rule) = state.rules.iter_mut().flatten().find(|rule| rule.id == rule_id) {
            rule.is_active = active;
        }
    }

    /// Dates of all instances of `parent_id`, ascending.
    pub fn instance_dates(&self, parent_id: i64) -> Vec<NaiveDate> {
        let mut dates: Vec<_> = self
            .state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|event| event.parent_event_id == Some(parent_id))
            .map(|event| event.date)
            .collect();
        dates.sort();
        dates
    }

    pub fn instances(&self, parent_id: i64) -> Vec<Event> {
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|event| event.parent_event_id == Some(parent_id))
            .cloned()
            .collect()
    }

    pub fn commit_count(&self) -> usize {
        self.state.lock().unwrap().commits
    }
}

#[async_trait]
impl EventRepository for InMemoryStore {
    async fn find_event(&self, id: i64) -> DomainResult<Option<Event>> {
        Ok(self.state.lock().unwrap().events.iter().find(|event| event.id == id).cloned())
    }

    async fn instance_exists(&self, parent_id: i64, date: NaiveDate) -> DomainResult<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .events
            .iter()
            .any(|event| event.parent_event_id == Some(parent_id) && event.date == date))
    }

    async fn insert_event(&self, event: NewEvent) -> DomainResult<Event> {
        Ok(self.add_event(event))
    }
}

#[async_trait]
impl RecurrenceRuleRepository for InMemoryStore {
    async fn list_active(&self) -> DomainResult<Vec<LoadedRule>> {
        let state = self.state.lock().unwrap();
        if state.fail_listing {
            return Err(CadenceError::Database("database is locked".into()));
        }
        Ok(state
            .rules
            .iter()
            .filter(|entry| entry.as_ref().map_or(true, |rule| rule.is_active))
            .cloned()
            .collect())
    }

    async fn commit_generation(&self, batch: GenerationBatch) -> DomainResult<Vec<Event>> {
        let delay = self.state.lock().unwrap().commit_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if state.failing_rules.contains(&batch.rule_id) {
            return Err(CadenceError::Database(format!("injected failure for {}", batch.rule_id)));
        }

        // Mirror the unique (parent_event_id, date) index: all or nothing.
        for instance in &batch.instances {
            let clash = state.events.iter().any(|event| {
                event.parent_event_id == instance.parent_event_id && event.date == instance.date
            });
            if clash {
                return Err(CadenceError::Database("UNIQUE constraint failed".into()));
            }
        }

        let position = state
            .rules
            .iter()
            .position(|entry| entry.as_ref().is_ok_and(|rule| rule.id == batch.rule_id))
            .ok_or_else(|| CadenceError::NotFound(format!("rule {}", batch.rule_id)))?;

        let created: Vec<Event> =
            batch.instances.into_iter().map(|instance| state.store_event(instance)).collect();
        if let Ok(rule) = &mut state.rules[position] {
            rule.progress = batch.progress;
        }
        state.commits += 1;

        Ok(created)
    }
}
