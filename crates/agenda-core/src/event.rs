//! Calendar and event types.
//!
//! These are the read-only views of the remote entities the tool works
//! with: [`Calendar`] (one entry of the user's calendar list) and [`Event`]
//! (one event inside a calendar).

use serde::{Deserialize, Serialize};

use crate::time::EventTime;

/// A calendar the user has access to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    /// Unique identifier for the calendar.
    pub id: String,
    /// Display name of the calendar.
    pub summary: String,
    /// Description of the calendar, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// IANA timezone of the calendar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    /// Whether this is the user's primary calendar.
    #[serde(default)]
    pub primary: bool,
}

impl Calendar {
    /// Creates a new calendar with the given ID and display name.
    pub fn new(id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            summary: summary.into(),
            description: None,
            time_zone: None,
            primary: false,
        }
    }

    /// Builder method to mark as primary.
    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }
}

/// A single calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier, unique within its calendar.
    pub id: String,
    /// The calendar this event was fetched from.
    pub calendar_id: String,
    /// Event title. Empty when the event has none.
    pub summary: String,
    /// Event start.
    pub start: EventTime,
    /// Event end.
    pub end: EventTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Link to the event in the calendar web UI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
    /// Event status as reported by the server (`confirmed`, `tentative`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Event {
    /// Creates a new event with the required fields.
    pub fn new(
        id: impl Into<String>,
        calendar_id: impl Into<String>,
        summary: impl Into<String>,
        start: EventTime,
        end: EventTime,
    ) -> Self {
        Self {
            id: id.into(),
            calendar_id: calendar_id.into(),
            summary: summary.into(),
            start,
            end,
            location: None,
            description: None,
            html_link: None,
            status: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn timed_event() -> Event {
        Event::new(
            "evt-1",
            "primary",
            "Standup",
            EventTime::from_utc(Utc.with_ymd_and_hms(2025, 2, 5, 9, 0, 0).unwrap()),
            EventTime::from_utc(Utc.with_ymd_and_hms(2025, 2, 5, 9, 15, 0).unwrap()),
        )
    }

    #[test]
    fn calendar_builder() {
        let cal = Calendar::new("work@example.com", "Work").with_primary(true);

        assert_eq!(cal.summary, "Work");
        assert!(cal.primary);
        assert!(cal.time_zone.is_none());
    }

    #[test]
    fn all_day_event() {
        let day = NaiveDate::from_ymd_opt(2025, 2, 5).unwrap();
        let event = Event::new(
            "evt-2",
            "holidays",
            "Holiday",
            EventTime::from_date(day),
            EventTime::from_date(day.succ_opt().unwrap()),
        );
        assert!(matches!(event.start, EventTime::AllDay(_)));
    }

    #[test]
    fn event_json_omits_empty_optionals() {
        let json = serde_json::to_value(timed_event()).unwrap();
        assert!(json.get("location").is_none());
        assert_eq!(json["summary"], "Standup");
    }
}
