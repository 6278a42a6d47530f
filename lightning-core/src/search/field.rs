//! Named event fields for search, suggestions and grouping.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::event::EventRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventField {
    Title,
    Description,
    Location,
    /// Multi-valued: every category.
    Categories,
    /// Multi-valued: attendee emails, plus names for text search.
    Attendees,
    TimeZone,
    Status,
    AllDay,
    Recurring,
    /// Start date in the record's own zone, `YYYY-MM-DD`.
    Date,
}

impl EventField {
    /// Fields searched when the caller names none.
    pub const DEFAULT_SEARCH: [EventField; 3] =
        [EventField::Title, EventField::Description, EventField::Location];

    pub const ALL: [EventField; 10] = [
        EventField::Title,
        EventField::Description,
        EventField::Location,
        EventField::Categories,
        EventField::Attendees,
        EventField::TimeZone,
        EventField::Status,
        EventField::AllDay,
        EventField::Recurring,
        EventField::Date,
    ];

    /// Discrete values of this field on `record`.
    pub fn values(self, record: &EventRecord) -> Vec<String> {
        match self {
            EventField::Title => vec![record.title().to_string()],
            EventField::Description => record.description().map(str::to_string).into_iter().collect(),
            EventField::Location => record.location().map(str::to_string).into_iter().collect(),
            EventField::Categories => record.categories().to_vec(),
            EventField::Attendees => record.attendees().iter().map(|a| a.email.clone()).collect(),
            EventField::TimeZone => vec![record.time_zone().to_string()],
            EventField::Status => record
                .status()
                .map(|s| s.as_ics_str().to_lowercase())
                .into_iter()
                .collect(),
            EventField::AllDay => vec![record.all_day().to_string()],
            EventField::Recurring => vec![record.recurring().to_string()],
            EventField::Date => vec![record.start().local.date().format("%Y-%m-%d").to_string()],
        }
    }

    /// Free text searched for this field.
    pub fn search_text(self, record: &EventRecord) -> String {
        match self {
            EventField::Attendees => record
                .attendees()
                .iter()
                .flat_map(|a| a.name.iter().chain(std::iter::once(&a.email)))
                .cloned()
                .collect::<Vec<_>>()
                .join(" "),
            _ => self.values(record).join(" "),
        }
    }
}

impl FromStr for EventField {
    type Err = String;

    /// Accepts the singular spellings (`category`, `attendee`) alongside the plural ones.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" | "summary" => Ok(EventField::Title),
            "description" => Ok(EventField::Description),
            "location" => Ok(EventField::Location),
            "category" | "categories" => Ok(EventField::Categories),
            "attendee" | "attendees" => Ok(EventField::Attendees),
            "timezone" | "time_zone" => Ok(EventField::TimeZone),
            "status" => Ok(EventField::Status),
            "allday" | "all_day" => Ok(EventField::AllDay),
            "recurring" => Ok(EventField::Recurring),
            "date" => Ok(EventField::Date),
            other => Err(format!("Unknown event field '{}'", other)),
        }
    }
}

impl fmt::Display for EventField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventField::Title => "title",
            EventField::Description => "description",
            EventField::Location => "location",
            EventField::Categories => "categories",
            EventField::Attendees => "attendees",
            EventField::TimeZone => "timeZone",
            EventField::Status => "status",
            EventField::AllDay => "allDay",
            EventField::Recurring => "recurring",
            EventField::Date => "date",
        };
        write!(f, "{}", name)
    }
}
