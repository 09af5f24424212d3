//! Generation trigger metrics
//!
//! Tracks how each generation pass ended (run, failed, timed out or skipped
//! because a pass was already running) plus how many instances the passes
//! created and how long they took.
//!
//! ## Design
//! - **SeqCst ordering** for the duration total and run count used by
//!   `avg_run_time_ms`
//! - **Relaxed ordering** for independent counters
//! - **Poison-safe locking** for the last-run timestamp

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::observability::{MetricsError, MetricsResult};

/// Counters for the recurring generation trigger
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    runs: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    skipped_overlaps: AtomicU64,
    instances_created: AtomicU64,
    /// Sum of completed pass durations in microseconds
    total_run_micros: AtomicU64,
    last_run_micros: AtomicU64,
    /// Passes with a recorded duration (successes and failures)
    timed_runs: AtomicU64,
    last_run_at: Mutex<Option<DateTime<Utc>>>,
}

/// Point-in-time copy of [`SchedulerMetrics`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerStats {
    pub runs: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub skipped_overlaps: u64,
    pub instances_created: u64,
    pub last_run_ms: u64,
    pub avg_run_ms: f64,
    pub last_run_at: Option<DateTime<Utc>>,
}

impl SchedulerMetrics {
    /// Create an empty metrics set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pass that completed and created `instances` instances.
    pub fn record_run(&self, duration: Duration, instances: usize) -> MetricsResult<()> {
        self.runs.fetch_add(1, Ordering::Relaxed);
        self.instances_created.fetch_add(instances as u64, Ordering::Relaxed);
        self.record_duration(duration);
        Ok(())
    }

    /// Record a pass that returned an error.
    pub fn record_failure(&self, duration: Duration) -> MetricsResult<()> {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.record_duration(duration);
        Ok(())
    }

    /// Record a pass abandoned after `job_timeout`.
    pub fn record_timeout(&self) -> MetricsResult<()> {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
        self.touch_last_run();
        Ok(())
    }

    /// Record a timed fire skipped because a pass was already running.
    pub fn record_skipped_overlap(&self) -> MetricsResult<()> {
        self.skipped_overlaps.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn record_duration(&self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);

        // SeqCst for consistency with avg_run_time_ms
        self.total_run_micros.fetch_add(micros, Ordering::SeqCst);
        self.timed_runs.fetch_add(1, Ordering::SeqCst);

        self.last_run_micros.store(micros, Ordering::Relaxed);
        self.touch_last_run();
    }

    fn touch_last_run(&self) {
        let mut guard = match self.last_run_at.lock() {
            Ok(guard) => guard,
            Err(poison_err) => {
                tracing::warn!("Mutex poisoned during last_run_at update, recovering");
                poison_err.into_inner()
            }
        };
        *guard = Some(Utc::now());
    }

    /// Average duration of passes that reported one, in milliseconds.
    pub fn avg_run_time_ms(&self) -> MetricsResult<f64> {
        let total = self.total_run_micros.load(Ordering::SeqCst);
        let count = self.timed_runs.load(Ordering::SeqCst);

        if count == 0 {
            return Err(MetricsError::EmptyData { metric: "average run time" });
        }

        Ok((total as f64 / count as f64) / 1_000.0)
    }

    pub fn last_run_time_ms(&self) -> u64 {
        self.last_run_micros.load(Ordering::Relaxed) / 1_000
    }

    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    pub fn skipped_overlaps(&self) -> u64 {
        self.skipped_overlaps.load(Ordering::Relaxed)
    }

    pub fn instances_created(&self) -> u64 {
        self.instances_created.load(Ordering::Relaxed)
    }

    /// When the last pass finished or timed out
    pub fn last_run_at(&self) -> Option<DateTime<Utc>> {
        match self.last_run_at.lock() {
            Ok(guard) => *guard,
            Err(poison_err) => {
                tracing::warn!("Mutex poisoned during last_run_at read, recovering");
                *poison_err.into_inner()
            }
        }
    }

    /// Copy every counter into a serializable snapshot.
    pub fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            runs: self.runs(),
            failures: self.failures(),
            timeouts: self.timeouts(),
            skipped_overlaps: self.skipped_overlaps(),
            instances_created: self.instances_created(),
            last_run_ms: self.last_run_time_ms(),
            avg_run_ms: self.avg_run_time_ms().unwrap_or(0.0),
            last_run_at: self.last_run_at(),
        }
    }
}
