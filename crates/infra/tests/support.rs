//! Shared fixtures for `cadence-infra` integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use cadence_core::{EventRepository, FixedClock, GenerationService};
use cadence_domain::{DatabaseConfig, Event, EventDetails, GenerationConfig, NewEvent};
use cadence_infra::database::{DbManager, SqliteEventRepository, SqliteRecurrenceRuleRepository};
use chrono::NaiveDate;
use tempfile::TempDir;

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    pub events: Arc<SqliteEventRepository>,
    pub rules: Arc<SqliteRecurrenceRuleRepository>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a migrated database in a fresh temporary directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("cadence-test.db");

        let manager = Arc::new(
            DbManager::open(&db_path, &DatabaseConfig::default())
                .expect("db manager should be created"),
        );
        manager.run_migrations().expect("schema migrations should apply");

        Self {
            events: Arc::new(SqliteEventRepository::new(Arc::clone(&manager))),
            rules: Arc::new(SqliteRecurrenceRuleRepository::new(Arc::clone(&manager))),
            manager,
            _temp_dir: temp_dir,
        }
    }

    /// Execute a batch of SQL statements against the database.
    pub fn execute_batch(&self, sql: &str) {
        let conn = self
            .manager
            .get_connection()
            .expect("connection should be available for execute_batch");
        conn.execute_batch(sql).expect("SQL batch execution should succeed");
    }

    /// Insert a recurring parent event.
    pub async fn insert_parent(&self, name: &str, date: NaiveDate) -> Event {
        self.events
            .insert_event(NewEvent::standalone(date, EventDetails::named(name)).recurring())
            .await
            .expect("parent event should be inserted")
    }

    /// Generation service over this database with a frozen clock.
    pub fn service(&self, clock: &FixedClock) -> Arc<GenerationService> {
        Arc::new(GenerationService::new(
            self.events.clone(),
            self.rules.clone(),
            Arc::new(clock.clone()),
            &GenerationConfig::default(),
        ))
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Shorthand for a calendar date.
pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}

/// Dates of `events`, in order.
pub fn dates(events: &[Event]) -> Vec<NaiveDate> {
    events.iter().map(|event| event.date).collect()
}
