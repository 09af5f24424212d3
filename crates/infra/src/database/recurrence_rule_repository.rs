//! SQLite-backed recurrence rule storage.
//!
//! Rules are stored as flat rows; decoding into a typed pattern happens on
//! read. A row that fails to decode is surfaced as an [`InvalidRule`] rather
//! than failing the whole listing.

use std::sync::Arc;

use async_trait::async_trait;
use cadence_core::{LoadedRule, RecurrenceRuleRepository};
use cadence_domain::{
    CadenceError, Event, GenerationBatch, InvalidRule, NewRecurrenceRule, RecurrenceColumns,
    RecurrencePattern, RecurrenceRule, Result as DomainResult, RuleBounds, RuleProgress,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;
use tracing::{debug, info, instrument, warn};

use super::event_repository::{insert_event_row, map_join_error};
use super::manager::{map_sql_error, DbManager};

const RULE_COLUMNS: &str = "id, event_id, recurrence_type, days_of_week, day_of_month,
     week_of_month, month_of_year, custom_rule, end_date, max_occurrences, occurrences_created,
     last_generated_date, is_active";

/// A rule row as read from SQLite, before any column is validated.
///
/// Only the keys are read strictly. Everything else is kept raw so a bad
/// value fails its own rule instead of the whole listing.
struct RuleRow {
    id: i64,
    event_id: i64,
    fields: rusqlite::Result<RawRuleFields>,
}

struct RawRuleFields {
    columns: RecurrenceColumns,
    end_date: Option<String>,
    max_occurrences: Option<i64>,
    occurrences_created: i64,
    last_generated_date: Option<String>,
    is_active: i64,
}

impl RuleRow {
    fn decode(self) -> LoadedRule {
        let (id, event_id) = (self.id, self.event_id);
        decode_fields(self.fields)
            .map(|(pattern, bounds, progress, is_active)| RecurrenceRule {
                id,
                event_id,
                pattern,
                bounds,
                progress,
                is_active,
            })
            .map_err(|error| InvalidRule { rule_id: id, event_id, error })
    }
}

type DecodedFields = (RecurrencePattern, RuleBounds, RuleProgress, bool);

fn decode_fields(fields: rusqlite::Result<RawRuleFields>) -> DomainResult<DecodedFields> {
    let raw =
        fields.map_err(|err| CadenceError::InvalidInput(format!("unreadable rule row: {err}")))?;
    let pattern = RecurrencePattern::from_columns(&raw.columns)?;
    let bounds = RuleBounds {
        end_date: raw.end_date.as_deref().map(|value| parse_date("end_date", value)).transpose()?,
        max_occurrences: raw
            .max_occurrences
            .map(|value| to_count("max_occurrences", value))
            .transpose()?,
    };
    let progress = RuleProgress {
        occurrences_created: to_count("occurrences_created", raw.occurrences_created)?,
        last_generated_date: raw
            .last_generated_date
            .as_deref()
            .map(|value| parse_date("last_generated_date", value))
            .transpose()?,
    };
    Ok((pattern, bounds, progress, raw.is_active != 0))
}

fn parse_date(column: &str, value: &str) -> DomainResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|err| CadenceError::InvalidInput(format!("{column} {value:?}: {err}")))
}

fn to_count(column: &str, value: i64) -> DomainResult<u32> {
    u32::try_from(value)
        .map_err(|_| CadenceError::InvalidInput(format!("{column} out of range: {value}")))
}

/// SQLite implementation of `RecurrenceRuleRepository`, plus the
/// administrative operations used to author rules.
pub struct SqliteRecurrenceRuleRepository {
    db: Arc<DbManager>,
}

impl SqliteRecurrenceRuleRepository {
    /// Construct a repository backed by the shared database manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Attach a new rule to an existing event.
    #[instrument(skip(self, rule), fields(event_id = rule.event_id))]
    pub async fn create(&self, rule: NewRecurrenceRule) -> DomainResult<RecurrenceRule> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<RecurrenceRule> {
            let conn = db.get_connection()?;
            let columns = rule.pattern.to_columns();
            conn.execute(
                "INSERT INTO event_recurrence_rules (
                    event_id, recurrence_type, days_of_week, day_of_month, week_of_month,
                    month_of_year, custom_rule, end_date, max_occurrences, is_active
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    rule.event_id,
                    columns.recurrence_type,
                    columns.days_of_week,
                    columns.day_of_month,
                    columns.week_of_month,
                    columns.month_of_year,
                    columns.custom_rule,
                    rule.bounds.end_date,
                    rule.bounds.max_occurrences,
                    rule.is_active,
                ],
            )
            .map_err(map_sql_error)?;
            let id = conn.last_insert_rowid();
            info!(rule_id = id, recurrence_type = %rule.pattern.recurrence_type(), "created recurrence rule");

            Ok(RecurrenceRule {
                id,
                event_id: rule.event_id,
                pattern: rule.pattern,
                bounds: rule.bounds,
                progress: RuleProgress::default(),
                is_active: rule.is_active,
            })
        })
        .await
        .map_err(map_join_error)?
    }

    /// Rule owned by `event_id`, if any.
    #[instrument(skip(self))]
    pub async fn find_by_event(&self, event_id: i64) -> DomainResult<Option<RecurrenceRule>> {
        self.find_one("event_id", event_id).await
    }

    /// Rule with primary key `rule_id`, if any.
    #[instrument(skip(self))]
    pub async fn find_by_id(&self, rule_id: i64) -> DomainResult<Option<RecurrenceRule>> {
        self.find_one("id", rule_id).await
    }

    /// Replace a rule's pattern and bounds. Progress is left as is.
    #[instrument(skip(self, pattern, bounds))]
    pub async fn update_settings(
        &self,
        rule_id: i64,
        pattern: RecurrencePattern,
        bounds: RuleBounds,
    ) -> DomainResult<RecurrenceRule> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let columns = pattern.to_columns();
            let updated = conn
                .execute(
                    "UPDATE event_recurrence_rules SET
                        recurrence_type = ?1, days_of_week = ?2, day_of_month = ?3,
                        week_of_month = ?4, month_of_year = ?5, custom_rule = ?6,
                        end_date = ?7, max_occurrences = ?8,
                        updated_at = CAST(strftime('%s','now') AS INTEGER)
                     WHERE id = ?9",
                    params![
                        columns.recurrence_type,
                        columns.days_of_week,
                        columns.day_of_month,
                        columns.week_of_month,
                        columns.month_of_year,
                        columns.custom_rule,
                        bounds.end_date,
                        bounds.max_occurrences,
                        rule_id,
                    ],
                )
                .map_err(map_sql_error)?;
            ensure_updated(updated, rule_id)
        })
        .await
        .map_err(map_join_error)??;

        self.find_by_id(rule_id)
            .await?
            .ok_or_else(|| CadenceError::NotFound(format!("recurrence rule {rule_id}")))
    }

    /// Enable or disable generation for a rule.
    #[instrument(skip(self))]
    pub async fn set_active(&self, rule_id: i64, active: bool) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let updated = conn
                .execute(
                    "UPDATE event_recurrence_rules
                     SET is_active = ?1, updated_at = CAST(strftime('%s','now') AS INTEGER)
                     WHERE id = ?2",
                    params![active, rule_id],
                )
                .map_err(map_sql_error)?;
            ensure_updated(updated, rule_id)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_one(&self, column: &'static str, value: i64) -> DomainResult<Option<RecurrenceRule>> {
        let db = Arc::clone(&self.db);
        let row = task::spawn_blocking(move || -> DomainResult<Option<RuleRow>> {
            let conn = db.get_connection()?;
            conn.query_row(
                &format!("SELECT {RULE_COLUMNS} FROM event_recurrence_rules WHERE {column} = ?1"),
                params![value],
                map_rule_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)??;

        row.map(|row| row.decode().map_err(|invalid| invalid.error)).transpose()
    }
}

#[async_trait]
impl RecurrenceRuleRepository for SqliteRecurrenceRuleRepository {
    #[instrument(skip(self))]
    async fn list_active(&self) -> DomainResult<Vec<LoadedRule>> {
        let db = Arc::clone(&self.db);
        let rows = task::spawn_blocking(move || -> DomainResult<Vec<RuleRow>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {RULE_COLUMNS} FROM event_recurrence_rules WHERE is_active = 1 ORDER BY id"
                ))
                .map_err(map_sql_error)?;
            let rows = stmt.query_map([], map_rule_row).map_err(map_sql_error)?;
            let mut loaded = Vec::new();
            for row in rows {
                match row {
                    Ok(row) => loaded.push(row),
                    Err(err) => {
                        warn!(error = %err, "Skipping recurrence rule row without readable keys");
                    }
                }
            }
            Ok(loaded)
        })
        .await
        .map_err(map_join_error)??;

        debug!(count = rows.len(), "loaded active recurrence rules");
        Ok(rows.into_iter().map(RuleRow::decode).collect())
    }

    #[instrument(skip(self, batch), fields(rule_id = batch.rule_id, instances = batch.instances.len()))]
    async fn commit_generation(&self, batch: GenerationBatch) -> DomainResult<Vec<Event>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<Vec<Event>> {
            let mut conn = db.get_connection()?;
            commit_batch(&mut conn, batch)
        })
        .await
        .map_err(map_join_error)?
    }
}

/// Insert every instance and write the progress in one transaction. Dropping
/// the transaction on an early return rolls everything back.
fn commit_batch(conn: &mut Connection, batch: GenerationBatch) -> DomainResult<Vec<Event>> {
    let tx = conn.transaction().map_err(map_sql_error)?;

    let mut created = Vec::with_capacity(batch.instances.len());
    for instance in batch.instances {
        let id = insert_event_row(&tx, &instance).map_err(map_sql_error)?;
        created.push(instance.with_id(id));
    }

    let updated = tx
        .execute(
            "UPDATE event_recurrence_rules
             SET occurrences_created = ?1, last_generated_date = ?2,
                 updated_at = CAST(strftime('%s','now') AS INTEGER)
             WHERE id = ?3",
            params![
                batch.progress.occurrences_created,
                batch.progress.last_generated_date,
                batch.rule_id
            ],
        )
        .map_err(map_sql_error)?;
    ensure_updated(updated, batch.rule_id)?;

    tx.commit().map_err(map_sql_error)?;
    Ok(created)
}

fn ensure_updated(updated: usize, rule_id: i64) -> DomainResult<()> {
    if updated == 0 {
        return Err(CadenceError::NotFound(format!("recurrence rule {rule_id}")));
    }
    Ok(())
}

fn map_rule_row(row: &Row<'_>) -> rusqlite::Result<RuleRow> {
    Ok(RuleRow { id: row.get(0)?, event_id: row.get(1)?, fields: read_rule_fields(row) })
}

fn read_rule_fields(row: &Row<'_>) -> rusqlite::Result<RawRuleFields> {
    Ok(RawRuleFields {
        columns: RecurrenceColumns {
            recurrence_type: row.get(2)?,
            days_of_week: row.get(3)?,
            day_of_month: row.get(4)?,
            week_of_month: row.get(5)?,
            month_of_year: row.get(6)?,
            custom_rule: row.get(7)?,
        },
        end_date: row.get(8)?,
        max_occurrences: row.get(9)?,
        occurrences_created: row.get(10)?,
        last_generated_date: row.get(11)?,
        is_active: row.get(12)?,
    })
}
