//! Domain types and models

pub mod event;
pub mod recurrence;

pub use event::{Event, EventDetails, EventStatus, NewEvent};
pub use recurrence::{
    weekday_from_index, weekday_index, GenerationBatch, InvalidRule, MonthlyPattern,
    NewRecurrenceRule, NthWeekday, RecurrenceColumns, RecurrencePattern, RecurrenceRule,
    RecurrenceType, RuleBounds, RuleProgress, WeekdaySet, YearlyPattern,
};
