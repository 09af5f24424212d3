//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Generation window
pub const DEFAULT_LOOK_AHEAD_DAYS: u32 = 30;

// Daily trigger at 02:00 local time (sec min hour dom mon dow)
pub const DEFAULT_CRON_EXPRESSION: &str = "0 0 2 * * *";

// Fallback intervals used when a pattern is under-specified
pub const WEEKLY_INTERVAL_DAYS: u64 = 7;
pub const BIWEEKLY_INTERVAL_DAYS: u64 = 14;
pub const MONTHLY_FALLBACK_DAYS: u64 = 30;
pub const CUSTOM_FALLBACK_DAYS: u64 = 7;

/// Highest day-of-month that exists in every month.
pub const MAX_SAFE_DAY_OF_MONTH: u32 = 28;

/// `week_of_month` value meaning "last occurrence in the month".
pub const LAST_WEEK_OF_MONTH: u8 = 5;

/// Status assigned to every generated instance.
pub const DEFAULT_INSTANCE_STATUS: &str = "Upcoming";
