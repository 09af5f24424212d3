//! Configuration management

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CRON_EXPRESSION, DEFAULT_LOOK_AHEAD_DAYS};
use crate::{CadenceError, Result};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
    pub busy_timeout_ms: u64,
}

/// Daily trigger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Six-field cron expression (seconds first), evaluated in local time.
    pub cron_expression: String,
    pub enabled: bool,
    pub job_timeout_secs: u64,
    pub start_timeout_secs: u64,
    pub stop_timeout_secs: u64,
}

/// Generation pass configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Instances are materialized up to `today + look_ahead_days`.
    pub look_ahead_days: u32,
    /// Upper bound for a single persistence call.
    pub operation_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "cadence.db".to_string(), pool_size: 4, busy_timeout_ms: 5_000 }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cron_expression: DEFAULT_CRON_EXPRESSION.to_string(),
            enabled: true,
            job_timeout_secs: 3_600,
            start_timeout_secs: 5,
            stop_timeout_secs: 5,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { look_ahead_days: DEFAULT_LOOK_AHEAD_DAYS, operation_timeout_secs: 30 }
    }
}

impl Config {
    /// Reject values that would make the service unusable.
    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(CadenceError::Config("database.path must not be empty".into()));
        }
        if self.database.pool_size == 0 {
            return Err(CadenceError::Config("database.pool_size must be at least 1".into()));
        }
        if self.scheduler.cron_expression.trim().is_empty() {
            return Err(CadenceError::Config("scheduler.cron_expression must not be empty".into()));
        }
        if self.scheduler.job_timeout_secs == 0
            || self.scheduler.start_timeout_secs == 0
            || self.scheduler.stop_timeout_secs == 0
        {
            return Err(CadenceError::Config("scheduler timeouts must be non-zero".into()));
        }
        if self.generation.look_ahead_days == 0 {
            return Err(CadenceError::Config(
                "generation.look_ahead_days must be at least 1".into(),
            ));
        }
        if self.generation.operation_timeout_secs == 0 {
            return Err(CadenceError::Config(
                "generation.operation_timeout_secs must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
