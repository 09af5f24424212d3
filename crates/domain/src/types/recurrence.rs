//! Recurrence rules
//!
//! A rule is persisted as a flat row ([`RecurrenceColumns`]) but handled in
//! memory as a [`RecurrencePattern`]: one variant per recurrence type, each
//! carrying only the parameters that type actually reads. Converting the row
//! into a pattern is where malformed input is rejected.
//!
//! Weekday indices follow the frontend convention: `0 = Sunday` through
//! `6 = Saturday`.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::constants::LAST_WEEK_OF_MONTH;
use crate::impl_domain_status_conversions;
use crate::types::event::NewEvent;
use crate::{CadenceError, Result};

/// Map a `0 = Sunday` weekday index onto [`Weekday`].
pub fn weekday_from_index(index: u32) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

/// Inverse of [`weekday_from_index`].
pub fn weekday_index(weekday: Weekday) -> u32 {
    weekday.num_days_from_sunday()
}

/// Recurrence type as stored in the `recurrence_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceType {
    Weekly,
    Biweekly,
    Monthly,
    Yearly,
    Custom,
}

impl_domain_status_conversions!(RecurrenceType {
    Weekly => "weekly",
    Biweekly => "biweekly",
    Monthly => "monthly",
    Yearly => "yearly",
    Custom => "custom",
});

/// Ordered, de-duplicated set of weekdays.
///
/// Order is kept because the nth-weekday patterns use the first listed day.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WeekdaySet {
    days: Vec<Weekday>,
}

impl WeekdaySet {
    /// Parse a comma separated list such as `"1,3,5"`.
    ///
    /// Blank input yields an empty set; any token that is not an integer in
    /// `0..=6` is rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut days = Vec::new();
        for token in raw.split(',').map(str::trim).filter(|token| !token.is_empty()) {
            let weekday = token
                .parse::<u32>()
                .ok()
                .and_then(weekday_from_index)
                .ok_or_else(|| {
                    CadenceError::InvalidInput(format!("invalid days_of_week entry: {token:?}"))
                })?;
            if !days.contains(&weekday) {
                days.push(weekday);
            }
        }
        Ok(Self { days })
    }

    pub fn from_weekdays(weekdays: impl IntoIterator<Item = Weekday>) -> Self {
        let mut days = Vec::new();
        for weekday in weekdays {
            if !days.contains(&weekday) {
                days.push(weekday);
            }
        }
        Self { days }
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn contains(&self, weekday: Weekday) -> bool {
        self.days.contains(&weekday)
    }

    /// First weekday in listed order.
    pub fn first(&self) -> Option<Weekday> {
        self.days.first().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        self.days.iter().copied()
    }

    /// Column representation (`"0,6"`), `None` when empty.
    pub fn to_column(&self) -> Option<String> {
        if self.days.is_empty() {
            return None;
        }
        let joined = self
            .days
            .iter()
            .map(|day| weekday_index(*day).to_string())
            .collect::<Vec<_>>()
            .join(",");
        Some(joined)
    }
}

/// "The `week`-th `weekday` of a month"; `week == 5` means the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NthWeekday {
    pub week: u8,
    pub weekday: Weekday,
}

impl NthWeekday {
    pub fn new(week: u8, weekday: Weekday) -> Result<Self> {
        if !(1..=LAST_WEEK_OF_MONTH).contains(&week) {
            return Err(CadenceError::InvalidInput(format!(
                "week_of_month must be between 1 and {LAST_WEEK_OF_MONTH}, got {week}"
            )));
        }
        Ok(Self { week, weekday })
    }

    /// Shorthand for "last `weekday` of the month".
    pub fn last(weekday: Weekday) -> Self {
        Self { week: LAST_WEEK_OF_MONTH, weekday }
    }

    pub fn is_last(&self) -> bool {
        self.week == LAST_WEEK_OF_MONTH
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonthlyPattern {
    /// Same day number every month (clamped to the 28th when generating).
    DayOfMonth(u32),
    NthWeekday(NthWeekday),
    /// Under-specified rule: advance a fixed number of days.
    Interval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YearlyPattern {
    NthWeekdayOfMonth { month: u32, nth: NthWeekday },
    /// Same month and day as the anchor, one year later.
    SameDate,
}

/// How a parent event repeats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecurrencePattern {
    Weekly { days: WeekdaySet },
    Biweekly,
    Monthly(MonthlyPattern),
    Yearly(YearlyPattern),
    /// Opaque payload, interpreted leniently when computing occurrences.
    Custom { payload: Option<String> },
}

impl RecurrencePattern {
    pub fn recurrence_type(&self) -> RecurrenceType {
        match self {
            Self::Weekly { .. } => RecurrenceType::Weekly,
            Self::Biweekly => RecurrenceType::Biweekly,
            Self::Monthly(_) => RecurrenceType::Monthly,
            Self::Yearly(_) => RecurrenceType::Yearly,
            Self::Custom { .. } => RecurrenceType::Custom,
        }
    }

    /// Build the typed pattern from a persisted row.
    ///
    /// Zero-valued numeric columns are treated as unset. Every populated
    /// column is validated even when the selected variant ignores it, so a
    /// corrupt row is reported instead of silently generating dates.
    pub fn from_columns(columns: &RecurrenceColumns) -> Result<Self> {
        let recurrence_type: RecurrenceType = columns.recurrence_type.parse()?;
        let days = columns.days_of_week.as_deref().map(WeekdaySet::parse).transpose()?.unwrap_or_default();
        let day_of_month = non_zero(columns.day_of_month)
            .map(|day| checked_range("day_of_month", day, 1, 31))
            .transpose()?;
        let week_of_month = non_zero(columns.week_of_month)
            .map(|week| checked_range("week_of_month", week, 1, i64::from(LAST_WEEK_OF_MONTH)))
            .transpose()?;
        let month_of_year = non_zero(columns.month_of_year)
            .map(|month| checked_range("month_of_year", month, 1, 12))
            .transpose()?;

        let nth = match (week_of_month, days.first()) {
            (Some(week), Some(weekday)) => Some(NthWeekday::new(narrow_week(week)?, weekday)?),
            _ => None,
        };

        let pattern = match recurrence_type {
            RecurrenceType::Weekly => Self::Weekly { days },
            RecurrenceType::Biweekly => Self::Biweekly,
            RecurrenceType::Monthly => Self::Monthly(match (day_of_month, nth) {
                (Some(day), _) => MonthlyPattern::DayOfMonth(day),
                (None, Some(nth)) => MonthlyPattern::NthWeekday(nth),
                (None, None) => MonthlyPattern::Interval,
            }),
            RecurrenceType::Yearly => Self::Yearly(match (month_of_year, nth) {
                (Some(month), Some(nth)) => YearlyPattern::NthWeekdayOfMonth { month, nth },
                _ => YearlyPattern::SameDate,
            }),
            RecurrenceType::Custom => Self::Custom {
                payload: columns.custom_rule.clone().filter(|raw| !raw.trim().is_empty()),
            },
        };

        Ok(pattern)
    }

    /// Flatten back into row columns. Only the parameters the variant reads are
    /// populated.
    pub fn to_columns(&self) -> RecurrenceColumns {
        let mut columns = RecurrenceColumns::new(self.recurrence_type());
        match self {
            Self::Weekly { days } => columns.days_of_week = days.to_column(),
            Self::Biweekly | Self::Monthly(MonthlyPattern::Interval) | Self::Yearly(YearlyPattern::SameDate) => {}
            Self::Monthly(MonthlyPattern::DayOfMonth(day)) => {
                columns.day_of_month = Some(i64::from(*day));
            }
            Self::Monthly(MonthlyPattern::NthWeekday(nth)) => columns.set_nth(*nth),
            Self::Yearly(YearlyPattern::NthWeekdayOfMonth { month, nth }) => {
                columns.month_of_year = Some(i64::from(*month));
                columns.set_nth(*nth);
            }
            Self::Custom { payload } => columns.custom_rule = payload.clone(),
        }
        columns
    }
}

fn non_zero(value: Option<i64>) -> Option<i64> {
    value.filter(|value| *value != 0)
}

fn checked_range(field: &str, value: i64, min: i64, max: i64) -> Result<u32> {
    if (min..=max).contains(&value) {
        u32::try_from(value)
            .map_err(|_| CadenceError::InvalidInput(format!("{field} out of range: {value}")))
    } else {
        Err(CadenceError::InvalidInput(format!(
            "{field} must be between {min} and {max}, got {value}"
        )))
    }
}

fn narrow_week(week: u32) -> Result<u8> {
    u8::try_from(week)
        .map_err(|_| CadenceError::InvalidInput(format!("week_of_month out of range: {week}")))
}

/// Flat representation of the pattern columns of `event_recurrence_rules`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecurrenceColumns {
    pub recurrence_type: String,
    pub days_of_week: Option<String>,
    pub day_of_month: Option<i64>,
    pub week_of_month: Option<i64>,
    pub month_of_year: Option<i64>,
    pub custom_rule: Option<String>,
}

impl RecurrenceColumns {
    pub fn new(recurrence_type: RecurrenceType) -> Self {
        Self { recurrence_type: recurrence_type.to_string(), ..Self::default() }
    }

    fn set_nth(&mut self, nth: NthWeekday) {
        self.week_of_month = Some(i64::from(nth.week));
        self.days_of_week = Some(weekday_index(nth.weekday).to_string());
    }
}

/// Limits on how far a rule may generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleBounds {
    /// No instance may be dated after this day.
    pub end_date: Option<NaiveDate>,
    /// Cumulative number of instances the rule may ever create.
    pub max_occurrences: Option<u32>,
}

/// Progress fields, written only by the generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleProgress {
    pub occurrences_created: u32,
    /// High-water mark used as the next anchor.
    pub last_generated_date: Option<NaiveDate>,
}

/// A persisted recurrence rule (one per recurring parent event).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub id: i64,
    pub event_id: i64,
    pub pattern: RecurrencePattern,
    pub bounds: RuleBounds,
    pub progress: RuleProgress,
    pub is_active: bool,
}

impl RecurrenceRule {
    /// True once `max_occurrences` instances have been created.
    pub fn max_reached(&self) -> bool {
        self.bounds.max_occurrences.is_some_and(|max| self.progress.occurrences_created >= max)
    }

    /// True when `today` is strictly after the end date.
    pub fn expired_on(&self, today: NaiveDate) -> bool {
        self.bounds.end_date.is_some_and(|end| today > end)
    }

    /// Whether an occurrence on `date` is inside the end-date bound.
    pub fn permits_date(&self, date: NaiveDate) -> bool {
        self.bounds.end_date.map_or(true, |end| date <= end)
    }

    /// Instances still allowed, `None` when unbounded.
    pub fn remaining_budget(&self) -> Option<u32> {
        self.bounds
            .max_occurrences
            .map(|max| max.saturating_sub(self.progress.occurrences_created))
    }
}

/// Input for creating a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecurrenceRule {
    pub event_id: i64,
    pub pattern: RecurrencePattern,
    pub bounds: RuleBounds,
    pub is_active: bool,
}

impl NewRecurrenceRule {
    pub fn new(event_id: i64, pattern: RecurrencePattern) -> Self {
        Self { event_id, pattern, bounds: RuleBounds::default(), is_active: true }
    }

    pub fn with_bounds(mut self, bounds: RuleBounds) -> Self {
        self.bounds = bounds;
        self
    }
}

/// A stored rule whose pattern columns could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRule {
    pub rule_id: i64,
    pub event_id: i64,
    pub error: CadenceError,
}

/// Everything one rule's generation pass writes, committed atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationBatch {
    pub rule_id: i64,
    pub instances: Vec<NewEvent>,
    pub progress: RuleProgress,
}
