//! Database implementations

pub mod event_repository;
pub mod manager;
pub mod recurrence_rule_repository;
pub mod sqlite_pool;

pub use event_repository::SqliteEventRepository;
pub use manager::DbManager;
pub use recurrence_rule_repository::SqliteRecurrenceRuleRepository;
pub use sqlite_pool::{create_sqlite_pool, SqliteConnection, SqlitePool};
