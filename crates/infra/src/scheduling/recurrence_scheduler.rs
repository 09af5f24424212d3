//! Daily trigger for recurring-event generation.
//!
//! Wraps a [`tokio_cron_scheduler::JobScheduler`] holding one cron job that
//! calls [`GenerationService::try_generate`]. The scheduler owns its
//! monitoring task, exposes explicit start/shutdown lifecycle methods, and
//! wraps every asynchronous operation in a timeout.
//!
//! A timed fire that lands while a pass is still running is skipped, so at
//! most one pass executes at a time. [`RecurrenceScheduler::run_now`] waits
//! for a running pass instead of skipping.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cadence_core::GenerationService;
//! use cadence_domain::SchedulerConfig;
//! use cadence_infra::observability::metrics::SchedulerMetrics;
//! use cadence_infra::scheduling::{RecurrenceScheduler, SchedulerResult};
//!
//! # async fn example(service: Arc<GenerationService>) -> SchedulerResult<()> {
//! let config = (&SchedulerConfig::default()).into();
//! let mut scheduler =
//!     RecurrenceScheduler::with_config(config, service, Arc::new(SchedulerMetrics::new()))
//!         .await?;
//! scheduler.start().await?;
//! scheduler.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use cadence_core::{GenerationReport, GenerationService};
use cadence_domain::{Result, SchedulerConfig};
use chrono::Local;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::observability::metrics::SchedulerMetrics;
use crate::observability::MetricsResult;
use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Timing configuration for [`RecurrenceScheduler`]
#[derive(Debug, Clone)]
pub struct RecurrenceSchedulerConfig {
    /// Six-field cron expression, evaluated in local time
    pub cron_expression: String,
    /// Upper bound for one timed pass
    pub job_timeout: Duration,
    pub start_timeout: Duration,
    pub stop_timeout: Duration,
    /// Upper bound for joining the monitor task on shutdown
    pub join_timeout: Duration,
}

impl Default for RecurrenceSchedulerConfig {
    fn default() -> Self {
        (&SchedulerConfig::default()).into()
    }
}

impl From<&SchedulerConfig> for RecurrenceSchedulerConfig {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            cron_expression: config.cron_expression.clone(),
            job_timeout: Duration::from_secs(config.job_timeout_secs),
            start_timeout: Duration::from_secs(config.start_timeout_secs),
            stop_timeout: Duration::from_secs(config.stop_timeout_secs),
            join_timeout: Duration::from_secs(config.stop_timeout_secs),
        }
    }
}

/// Cron trigger driving a [`GenerationService`]
pub struct RecurrenceScheduler {
    scheduler: Arc<RwLock<JobScheduler>>,
    config: RecurrenceSchedulerConfig,
    /// Registered job; `None` once the underlying scheduler has been shut down
    job_id: Option<Uuid>,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    metrics: Arc<SchedulerMetrics>,
    service: Arc<GenerationService>,
}

impl RecurrenceScheduler {
    /// Create a scheduler with the default timing and the given cron expression.
    pub async fn new(
        cron_expression: String,
        service: Arc<GenerationService>,
        metrics: Arc<SchedulerMetrics>,
    ) -> SchedulerResult<Self> {
        let config = RecurrenceSchedulerConfig { cron_expression, ..Default::default() };
        Self::with_config(config, service, metrics).await
    }

    /// Create a scheduler and register its job. The cron expression is
    /// validated here.
    pub async fn with_config(
        config: RecurrenceSchedulerConfig,
        service: Arc<GenerationService>,
        metrics: Arc<SchedulerMetrics>,
    ) -> SchedulerResult<Self> {
        let raw_scheduler = JobScheduler::new()
            .await
            .map_err(|source| SchedulerError::CreationFailed { source })?;

        let mut scheduler = Self {
            scheduler: Arc::new(RwLock::new(raw_scheduler)),
            config,
            job_id: None,
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            metrics,
            service,
        };

        scheduler.register_job().await?;
        Ok(scheduler)
    }

    /// Start firing the job. Starting a running scheduler is a no-op.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            info!("Recurrence scheduler already running");
            return Ok(());
        }

        if self.job_id.is_none() {
            self.rebuild().await?;
        }

        self.cancellation = CancellationToken::new();

        let scheduler = self.scheduler.clone();
        let start_timeout = self.config.start_timeout;
        let start_result = tokio::time::timeout(start_timeout, async move {
            let guard = scheduler.write().await;
            guard.start().await
        })
        .await
        .map_err(|source| SchedulerError::Timeout { duration: start_timeout, source })?;

        start_result.map_err(|source| SchedulerError::StartFailed { source })?;

        let cancel = self.cancellation.clone();
        self.monitor_handle = Some(tokio::spawn(Self::monitor_task(cancel)));

        info!(cron = %self.config.cron_expression, "Recurrence scheduler started");
        Ok(())
    }

    /// Stop the scheduler and wait for the monitor task. A stopped scheduler
    /// is left alone.
    #[instrument(skip(self))]
    pub async fn shutdown(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            debug!("Recurrence scheduler not running; nothing to shut down");
            return Ok(());
        }

        self.cancellation.cancel();

        let scheduler = self.scheduler.clone();
        let stop_timeout = self.config.stop_timeout;
        let stop_result = tokio::time::timeout(stop_timeout, async move {
            let mut guard = scheduler.write().await;
            guard.shutdown().await
        })
        .await
        .map_err(|source| SchedulerError::Timeout { duration: stop_timeout, source })?;

        stop_result.map_err(|source| SchedulerError::StopFailed { source })?;
        // A shut-down JobScheduler is not reused; start() builds a fresh one.
        self.job_id = None;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })??
        }

        info!("Recurrence scheduler stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Run a pass immediately, waiting for any pass already in progress.
    #[instrument(skip(self))]
    pub async fn run_now(&self) -> Result<GenerationReport> {
        let started = Instant::now();
        let result = self.service.generate().await;
        record_pass(&self.metrics, &result, started.elapsed());
        result
    }

    /// Replace the job's schedule. The previous job is removed from the
    /// scheduler before the new one is added.
    #[instrument(skip(self))]
    pub async fn reschedule(&mut self, cron_expression: String) -> SchedulerResult<()> {
        let previous = std::mem::replace(&mut self.config.cron_expression, cron_expression);
        if self.job_id.is_none() {
            return Ok(());
        }
        if let Err(err) = self.register_job().await {
            self.config.cron_expression = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Returns true when the monitor task is active.
    pub fn is_running(&self) -> bool {
        self.monitor_handle.as_ref().map_or(false, |handle| !handle.is_finished())
    }

    /// Id of the registered cron job, if any
    pub fn job_id(&self) -> Option<Uuid> {
        self.job_id
    }

    pub fn metrics(&self) -> &Arc<SchedulerMetrics> {
        &self.metrics
    }

    async fn rebuild(&mut self) -> SchedulerResult<()> {
        let raw_scheduler = JobScheduler::new()
            .await
            .map_err(|source| SchedulerError::CreationFailed { source })?;
        self.scheduler = Arc::new(RwLock::new(raw_scheduler));
        self.register_job().await
    }

    async fn register_job(&mut self) -> SchedulerResult<()> {
        let service = self.service.clone();
        let metrics = self.metrics.clone();
        let job_timeout = self.config.job_timeout;

        let job_definition =
            Job::new_async_tz(self.config.cron_expression.as_str(), Local, move |_id, _lock| {
                let service = service.clone();
                let metrics = metrics.clone();

                Box::pin(async move {
                    run_timed_pass(&service, &metrics, job_timeout).await;
                })
            })
            .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        let job_id = job_definition.guid();
        let scheduler = self.scheduler.write().await;
        if let Some(previous) = self.job_id.take() {
            scheduler
                .remove(&previous)
                .await
                .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;
            debug!(job_id = %previous, "Removed previous generation job");
        }
        scheduler
            .add(job_definition)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        debug!(cron = %self.config.cron_expression, job_id = %job_id, "Registered generation job");
        self.job_id = Some(job_id);
        Ok(())
    }

    async fn monitor_task(cancel: CancellationToken) {
        cancel.cancelled().await;
        debug!("Recurrence scheduler monitor cancelled");
    }
}

async fn run_timed_pass(
    service: &GenerationService,
    metrics: &SchedulerMetrics,
    job_timeout: Duration,
) {
    let started = Instant::now();

    match tokio::time::timeout(job_timeout, service.try_generate()).await {
        Ok(Some(result)) => record_pass(metrics, &result, started.elapsed()),
        Ok(None) => {
            log_metric(metrics.record_skipped_overlap(), "scheduler.generation.skipped_overlap");
            warn!("Generation pass still running; skipping this fire");
        }
        Err(elapsed) => {
            log_metric(metrics.record_timeout(), "scheduler.generation.timeout");
            warn!(timeout_secs = job_timeout.as_secs(), "Generation pass timed out");
            debug!(elapsed = ?elapsed, "Timeout details");
        }
    }
}

fn record_pass(metrics: &SchedulerMetrics, result: &Result<GenerationReport>, elapsed: Duration) {
    match result {
        Ok(report) => {
            log_metric(
                metrics.record_run(elapsed, report.instances_created),
                "scheduler.generation.run",
            );
            if report.failed_rules() > 0 {
                warn!(failed = report.failed_rules(), "Generation pass finished with failed rules");
            }
        }
        Err(err) => {
            log_metric(metrics.record_failure(elapsed), "scheduler.generation.failure");
            error!(error_kind = err.label(), error = %err, "Generation pass failed");
        }
    }
}

fn log_metric(result: MetricsResult<()>, metric: &'static str) {
    if let Err(err) = result {
        warn!(metric = metric, error = ?err, "Failed to record scheduler metric");
    }
}

/// Dropping a running scheduler cancels the monitor and stops the cron job on
/// the current runtime. Outside a runtime the job cannot be stopped here, so
/// callers should prefer an explicit [`RecurrenceScheduler::shutdown`].
impl Drop for RecurrenceScheduler {
    fn drop(&mut self) {
        if !self.is_running() {
            return;
        }

        warn!("RecurrenceScheduler dropped while running; cancelling tasks");
        self.cancellation.cancel();

        let scheduler = Arc::clone(&self.scheduler);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(err) = scheduler.write().await.shutdown().await {
                        warn!(error = %err, "(Drop) Failed to stop cron job");
                    } else {
                        debug!("(Drop) Cron job stopped");
                    }
                });
            }
            Err(_) => warn!("(Drop) No runtime available; cron job left registered"),
        }
    }
}
