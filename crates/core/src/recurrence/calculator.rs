//! Occurrence calculator
//!
//! Pure date arithmetic: given a pattern and an anchor date, return the next
//! occurrence. Every result is strictly after the anchor; dates that would
//! leave chrono's range saturate to [`NaiveDate::MAX`].

use cadence_domain::constants::{
    BIWEEKLY_INTERVAL_DAYS, CUSTOM_FALLBACK_DAYS, MAX_SAFE_DAY_OF_MONTH, MONTHLY_FALLBACK_DAYS,
    WEEKLY_INTERVAL_DAYS,
};
use cadence_domain::{MonthlyPattern, NthWeekday, RecurrencePattern, WeekdaySet, YearlyPattern};
use chrono::{Datelike, Days, NaiveDate};
use serde_json::Value;

/// Next occurrence of `pattern` after `anchor`.
pub fn next_occurrence(pattern: &RecurrencePattern, anchor: NaiveDate) -> NaiveDate {
    match pattern {
        RecurrencePattern::Weekly { days } => next_weekly(days, anchor),
        RecurrencePattern::Biweekly => add_days(anchor, BIWEEKLY_INTERVAL_DAYS),
        RecurrencePattern::Monthly(monthly) => next_monthly(*monthly, anchor),
        RecurrencePattern::Yearly(yearly) => next_yearly(*yearly, anchor),
        RecurrencePattern::Custom { payload } => {
            add_days(anchor, custom_interval_days(payload.as_deref()))
        }
    }
}

/// The `nth.week`-th `nth.weekday` of `year`/`month`.
///
/// Week 5 resolves to the last such weekday, which is the fourth one in months
/// where a fifth does not exist. Returns `None` only for dates outside
/// chrono's range.
pub fn nth_weekday_of_month(year: i32, month: u32, nth: NthWeekday) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, nth.weekday, nth.week).or_else(|| {
        // Only a missing fifth occurrence gets here; step back one week.
        nth.week
            .checked_sub(1)
            .and_then(|week| NaiveDate::from_weekday_of_month_opt(year, month, nth.weekday, week))
    })
}

/// Interval encoded in a custom payload such as `{"interval_days": 10}`.
///
/// Whole-number floats such as `10.0` count as integers. Anything unusable
/// falls back to a week: a missing payload, invalid JSON, a non-object
/// document, or an interval that is not a positive whole number of days.
pub fn custom_interval_days(payload: Option<&str>) -> u64 {
    let Some(raw) = payload else {
        return CUSTOM_FALLBACK_DAYS;
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map
            .get("interval_days")
            .map_or(Some(CUSTOM_FALLBACK_DAYS), whole_days)
            .filter(|days| *days > 0)
            .unwrap_or(CUSTOM_FALLBACK_DAYS),
        _ => CUSTOM_FALLBACK_DAYS,
    }
}

fn whole_days(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        let days = value.as_f64()?;
        // Floats stop being exact past 2^53.
        (days.fract() == 0.0 && days >= 0.0 && days <= 9_007_199_254_740_992.0)
            .then_some(days as u64)
    })
}

fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX)
}

fn next_weekly(days: &WeekdaySet, anchor: NaiveDate) -> NaiveDate {
    if days.is_empty() {
        return add_days(anchor, WEEKLY_INTERVAL_DAYS);
    }

    (1..=WEEKLY_INTERVAL_DAYS)
        .map(|offset| add_days(anchor, offset))
        .find(|candidate| days.contains(candidate.weekday()))
        .unwrap_or_else(|| add_days(anchor, WEEKLY_INTERVAL_DAYS))
}

fn following_month(anchor: NaiveDate) -> (i32, u32) {
    if anchor.month() == 12 {
        (anchor.year() + 1, 1)
    } else {
        (anchor.year(), anchor.month() + 1)
    }
}

fn next_monthly(pattern: MonthlyPattern, anchor: NaiveDate) -> NaiveDate {
    match pattern {
        MonthlyPattern::DayOfMonth(day) => {
            let (year, month) = following_month(anchor);
            NaiveDate::from_ymd_opt(year, month, day.min(MAX_SAFE_DAY_OF_MONTH))
                .unwrap_or(NaiveDate::MAX)
        }
        MonthlyPattern::NthWeekday(nth) => {
            let (year, month) = following_month(anchor);
            nth_weekday_of_month(year, month, nth).unwrap_or(NaiveDate::MAX)
        }
        MonthlyPattern::Interval => add_days(anchor, MONTHLY_FALLBACK_DAYS),
    }
}

fn next_yearly(pattern: YearlyPattern, anchor: NaiveDate) -> NaiveDate {
    match pattern {
        YearlyPattern::NthWeekdayOfMonth { month, nth } => {
            nth_weekday_of_month(anchor.year(), month, nth)
                .filter(|candidate| *candidate > anchor)
                .or_else(|| nth_weekday_of_month(anchor.year() + 1, month, nth))
                .unwrap_or(NaiveDate::MAX)
        }
        YearlyPattern::SameDate => {
            let year = anchor.year() + 1;
            NaiveDate::from_ymd_opt(year, anchor.month(), anchor.day())
                .or_else(|| NaiveDate::from_ymd_opt(year, anchor.month(), MAX_SAFE_DAY_OF_MONTH))
                .unwrap_or(NaiveDate::MAX)
        }
    }
}
