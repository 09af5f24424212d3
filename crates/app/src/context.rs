//! Application context - dependency injection container

use std::sync::Arc;

use cadence_core::{GenerationService, SystemClock};
use cadence_domain::{Config, Result};
use cadence_infra::observability::metrics::SchedulerMetrics;
use cadence_infra::scheduling::SchedulerResult;
use cadence_infra::{
    DbManager, RecurrenceScheduler, RecurrenceSchedulerConfig, SqliteEventRepository,
    SqliteRecurrenceRuleRepository,
};
use tracing::info;

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub generation: Arc<GenerationService>,
    pub metrics: Arc<SchedulerMetrics>,
}

impl AppContext {
    /// Open the database, apply the schema and wire the generation service.
    pub fn new(config: Config) -> Result<Self> {
        let db = Arc::new(DbManager::new(&config.database)?);
        db.run_migrations()?;
        db.health_check()?;
        info!(path = %db.path().display(), "Database ready");

        let generation = Arc::new(GenerationService::new(
            Arc::new(SqliteEventRepository::new(Arc::clone(&db))),
            Arc::new(SqliteRecurrenceRuleRepository::new(Arc::clone(&db))),
            Arc::new(SystemClock),
            &config.generation,
        ));

        Ok(Self { config, generation, metrics: Arc::new(SchedulerMetrics::new()) })
    }

    /// Build the cron trigger for this context. The trigger is not started.
    pub async fn create_scheduler(&self) -> SchedulerResult<RecurrenceScheduler> {
        RecurrenceScheduler::with_config(
            RecurrenceSchedulerConfig::from(&self.config.scheduler),
            Arc::clone(&self.generation),
            Arc::clone(&self.metrics),
        )
        .await
    }
}
