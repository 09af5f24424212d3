//! Builds concrete instances from a recurring parent

use cadence_domain::{Event, EventStatus, NewEvent};
use chrono::NaiveDate;

/// Stage a new instance of `parent` on `date`.
///
/// Descriptive fields are copied verbatim. The instance is always `Upcoming`,
/// never recurring itself, and linked back through `parent_event_id`. The
/// parent's own status is not consulted, so a cancelled parent still yields
/// upcoming instances.
pub fn materialize(parent: &Event, date: NaiveDate) -> NewEvent {
    NewEvent {
        date,
        status: EventStatus::Upcoming,
        is_recurring: false,
        parent_event_id: Some(parent.id),
        details: parent.details.clone(),
    }
}
