//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `CADENCE_DB_PATH` is unset, falls back to a file. A variable that is
//!    set but unparseable is an error in either case
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `CADENCE_DB_PATH`: Database file path (required)
//! - `CADENCE_DB_POOL_SIZE`: Connection pool size
//! - `CADENCE_DB_BUSY_TIMEOUT_MS`: SQLite busy timeout in milliseconds
//! - `CADENCE_SCHEDULER_CRON`: Six-field cron expression for the daily pass
//! - `CADENCE_SCHEDULER_ENABLED`: Whether the timer is armed (true/false)
//! - `CADENCE_JOB_TIMEOUT_SECS`: Upper bound for one timed pass
//! - `CADENCE_LOOK_AHEAD_DAYS`: Generation horizon in days
//! - `CADENCE_OPERATION_TIMEOUT_SECS`: Upper bound for one persistence call
//!
//! Optional variables fall back to the defaults in [`cadence_domain::Config`].
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./cadence.json` or `./cadence.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. `../../config.json` or `../../config.toml` (grandparent directory)
//! 5. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use cadence_domain::{CadenceError, Config, Result};

const DB_PATH_ENV: &str = "CADENCE_DB_PATH";

/// Load configuration with automatic fallback strategy
///
/// Uses environment variables when `CADENCE_DB_PATH` is set, otherwise
/// falls back to loading from a config file.
///
/// # Errors
/// Returns `CadenceError::Config` if:
/// - A `CADENCE_*` variable is set to an invalid value
/// - No config file is found when `CADENCE_DB_PATH` is unset
/// - File format is invalid
pub fn load() -> Result<Config> {
    if std::env::var_os(DB_PATH_ENV).is_none() {
        tracing::debug!("{DB_PATH_ENV} not set, trying config file");
        return load_from_file(None);
    }

    let config = load_from_env()?;
    tracing::info!("Configuration loaded from environment variables");
    Ok(config)
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `CadenceError::Config` if `CADENCE_DB_PATH` is missing or any
/// present variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.database.path = env_var(DB_PATH_ENV)?;
    if let Some(pool_size) = env_parse("CADENCE_DB_POOL_SIZE")? {
        config.database.pool_size = pool_size;
    }
    if let Some(busy_timeout) = env_parse("CADENCE_DB_BUSY_TIMEOUT_MS")? {
        config.database.busy_timeout_ms = busy_timeout;
    }

    if let Ok(cron) = std::env::var("CADENCE_SCHEDULER_CRON") {
        config.scheduler.cron_expression = cron;
    }
    if let Some(enabled) = env_bool("CADENCE_SCHEDULER_ENABLED")? {
        config.scheduler.enabled = enabled;
    }
    if let Some(job_timeout) = env_parse("CADENCE_JOB_TIMEOUT_SECS")? {
        config.scheduler.job_timeout_secs = job_timeout;
    }

    if let Some(look_ahead) = env_parse("CADENCE_LOOK_AHEAD_DAYS")? {
        config.generation.look_ahead_days = look_ahead;
    }
    if let Some(operation_timeout) = env_parse("CADENCE_OPERATION_TIMEOUT_SECS")? {
        config.generation.operation_timeout_secs = operation_timeout;
    }

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension). Missing
/// sections and fields take their defaults.
///
/// # Errors
/// Returns `CadenceError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CadenceError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CadenceError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CadenceError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content, format chosen by extension.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CadenceError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CadenceError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(CadenceError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidates_in(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidates_in(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("config.json"),
        dir.join("config.toml"),
        dir.join("cadence.json"),
        dir.join("cadence.toml"),
        dir.join("../config.json"),
        dir.join("../config.toml"),
        dir.join("../../config.json"),
        dir.join("../../config.toml"),
    ]
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        CadenceError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Parse an optional environment variable; `None` when unset.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| CadenceError::Config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable; `None` when unset.
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str) -> Result<Option<bool>> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(None);
    };
    parse_bool(&raw)
        .map(Some)
        .ok_or_else(|| CadenceError::Config(format!("Invalid value for {}: {:?}", key, raw)))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
