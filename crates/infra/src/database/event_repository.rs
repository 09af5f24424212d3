//! SQLite-backed implementation of the `EventRepository` port.

use std::sync::Arc;

use async_trait::async_trait;
use cadence_core::EventRepository;
use cadence_domain::{CadenceError, Event, EventDetails, NewEvent, Result as DomainResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;
use tracing::{debug, instrument};

use super::manager::{map_sql_error, DbManager};
use crate::errors::InfraError;

const EVENT_COLUMNS: &str = "id, date, status, is_recurring, parent_event_id, name, chinese_name,
     time, location, chinese_location, description, chinese_description, image, signup_link,
     event_type, heylo_embed";

/// SQLite implementation of `EventRepository`
pub struct SqliteEventRepository {
    db: Arc<DbManager>,
}

impl SqliteEventRepository {
    /// Construct a repository backed by the shared database manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// All instances generated from `parent_id`, ordered by date.
    #[instrument(skip(self))]
    pub async fn list_instances(&self, parent_id: i64) -> DomainResult<Vec<Event>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<Vec<Event>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {EVENT_COLUMNS} FROM events WHERE parent_event_id = ?1 ORDER BY date ASC"
                ))
                .map_err(map_sql_error)?;
            let rows = stmt.query_map(params![parent_id], map_event_row).map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    /// Delete an event. Its rule is removed by cascade and its instances are
    /// unlinked.
    #[instrument(skip(self))]
    pub async fn delete_event(&self, id: i64) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let deleted =
                conn.execute("DELETE FROM events WHERE id = ?1", params![id]).map_err(map_sql_error)?;
            if deleted == 0 {
                return Err(CadenceError::NotFound(format!("event {id}")));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl EventRepository for SqliteEventRepository {
    #[instrument(skip(self))]
    async fn find_event(&self, id: i64) -> DomainResult<Option<Event>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<Option<Event>> {
            let conn = db.get_connection()?;
            conn.query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
                params![id],
                map_event_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self))]
    async fn instance_exists(&self, parent_id: i64, date: NaiveDate) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<bool> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM events WHERE parent_event_id = ?1 AND date = ?2)",
                params![parent_id, date],
                |row| row.get(0),
            )
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self, event), fields(date = %event.date))]
    async fn insert_event(&self, event: NewEvent) -> DomainResult<Event> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<Event> {
            let conn = db.get_connection()?;
            let id = insert_event_row(&conn, &event).map_err(map_sql_error)?;
            debug!(event_id = id, "inserted event");
            Ok(event.with_id(id))
        })
        .await
        .map_err(map_join_error)?
    }
}

/// Insert `event` on `conn` (which may be a transaction) and return its id.
pub(crate) fn insert_event_row(conn: &Connection, event: &NewEvent) -> rusqlite::Result<i64> {
    let details = &event.details;
    conn.execute(
        "INSERT INTO events (
            date, status, is_recurring, parent_event_id, name, chinese_name, time, location,
            chinese_location, description, chinese_description, image, signup_link, event_type,
            heylo_embed
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            event.date,
            event.status.as_str(),
            event.is_recurring,
            event.parent_event_id,
            details.name,
            details.chinese_name,
            details.time,
            details.location,
            details.chinese_location,
            details.description,
            details.chinese_description,
            details.image,
            details.signup_link,
            details.event_type,
            details.heylo_embed,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn map_event_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        date: row.get(1)?,
        status: row.get::<_, String>(2)?.into(),
        is_recurring: row.get(3)?,
        parent_event_id: row.get(4)?,
        details: EventDetails {
            name: row.get(5)?,
            chinese_name: row.get(6)?,
            time: row.get(7)?,
            location: row.get(8)?,
            chinese_location: row.get(9)?,
            description: row.get(10)?,
            chinese_description: row.get(11)?,
            image: row.get(12)?,
            signup_link: row.get(13)?,
            event_type: row.get(14)?,
            heylo_embed: row.get(15)?,
        },
    })
}

pub(crate) fn map_join_error(err: task::JoinError) -> CadenceError {
    CadenceError::from(InfraError::from(err))
}
