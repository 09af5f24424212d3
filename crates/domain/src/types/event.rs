//! Event records
//!
//! A recurring parent event acts as a template. Every generated instance is a
//! plain event that points back at its parent through `parent_event_id`.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_INSTANCE_STATUS;

/// Display lifecycle of an event.
///
/// Stored as free text; values this crate does not know about are preserved
/// verbatim in [`EventStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventStatus {
    #[default]
    Upcoming,
    Highlight,
    Cancelled,
    Other(String),
}

impl EventStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Upcoming => DEFAULT_INSTANCE_STATUS,
            Self::Highlight => "Highlight",
            Self::Cancelled => "Cancelled",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for EventStatus {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "upcoming" => Self::Upcoming,
            "highlight" => Self::Highlight,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for EventStatus {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<EventStatus> for String {
    fn from(value: EventStatus) -> Self {
        match value {
            EventStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive fields copied verbatim from a parent onto its instances.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventDetails {
    pub name: String,
    pub chinese_name: Option<String>,
    /// Time of day as entered by organisers (e.g. "7:00 AM").
    pub time: Option<String>,
    pub location: Option<String>,
    pub chinese_location: Option<String>,
    pub description: Option<String>,
    pub chinese_description: Option<String>,
    pub image: Option<String>,
    pub signup_link: Option<String>,
    pub event_type: Option<String>,
    pub heylo_embed: Option<String>,
}

impl EventDetails {
    /// Details with only a name set.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }
}

/// A persisted event row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub date: NaiveDate,
    pub status: EventStatus,
    pub is_recurring: bool,
    pub parent_event_id: Option<i64>,
    pub details: EventDetails,
}

impl Event {
    /// True for rows produced from a recurring parent.
    pub fn is_instance(&self) -> bool {
        self.parent_event_id.is_some()
    }
}

/// An event staged for insertion (no id yet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub date: NaiveDate,
    pub status: EventStatus,
    pub is_recurring: bool,
    pub parent_event_id: Option<i64>,
    pub details: EventDetails,
}

impl NewEvent {
    /// A standalone or parent event that is not linked to anything.
    pub fn standalone(date: NaiveDate, details: EventDetails) -> Self {
        Self {
            date,
            status: EventStatus::Upcoming,
            is_recurring: false,
            parent_event_id: None,
            details,
        }
    }

    /// Mark this event as a recurring template.
    pub fn recurring(mut self) -> Self {
        self.is_recurring = true;
        self
    }

    /// Attach the persisted id.
    pub fn with_id(self, id: i64) -> Event {
        Event {
            id,
            date: self.date,
            status: self.status,
            is_recurring: self.is_recurring,
            parent_event_id: self.parent_event_id,
            details: self.details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_statuses_parse_case_insensitively() {
        assert_eq!(EventStatus::from("upcoming"), EventStatus::Upcoming);
        assert_eq!(EventStatus::from("HIGHLIGHT"), EventStatus::Highlight);
        assert_eq!(EventStatus::from("Canceled"), EventStatus::Cancelled);
    }

    #[test]
    fn unknown_status_is_preserved() {
        let status = EventStatus::from("Postponed");
        assert_eq!(status, EventStatus::Other("Postponed".into()));
        assert_eq!(String::from(status), "Postponed");
    }

    #[test]
    fn status_serializes_as_plain_string() {
        let json = serde_json::to_string(&EventStatus::Upcoming).unwrap();
        assert_eq!(json, "\"Upcoming\"");
    }

    #[test]
    fn with_id_keeps_linkage() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 4).unwrap();
        let staged = NewEvent {
            parent_event_id: Some(3),
            ..NewEvent::standalone(date, EventDetails::named("Run"))
        };
        let event = staged.with_id(11);
        assert_eq!(event.id, 11);
        assert!(event.is_instance());
        assert_eq!(event.details.name, "Run");
    }
}
