//! Observability infrastructure for the generation trigger
//!
//! Metrics are plain atomics read by the host process and logs.
//!
//! ## Design Principles
//!
//! 1. **Poison Recovery**: mutex locks recover the inner value instead of
//!    panicking, logging a warning when they do.
//!
//! 2. **Future-Proof Returns**: record methods return `MetricsResult<()>` so
//!    callers already handle failure, but they currently always succeed.
//!
//! ## Error Handling
//!
//! ```rust
//! use cadence_infra::observability::metrics::SchedulerMetrics;
//!
//! let metrics = SchedulerMetrics::new();
//!
//! if let Err(e) = metrics.record_skipped_overlap() {
//!     tracing::warn!("Failed to record metric: {}", e);
//! }
//! ```

pub mod metrics;

/// Metrics error type
///
/// All recording methods return `MetricsResult<()>` but **currently always
/// succeed**.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Empty data set - cannot calculate aggregate metric
    #[error("Empty data: cannot calculate {metric}")]
    EmptyData {
        /// Metric name that failed (e.g., "average")
        metric: &'static str,
    },
}

/// Result type for metrics operations
pub type MetricsResult<T> = Result<T, MetricsError>;
