//! Loosely-typed event input as hosts hand it to the engine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

use super::{Attendee, EventStatus, Reminder};
use crate::error::ValidationError;

/// A start/end value as supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateInput {
    /// Wall clock, interpreted in the event's zone.
    Local(NaiveDateTime),
    /// Date only, local midnight in the event's zone.
    Date(NaiveDate),
    /// Absolute instant, rendered into the event's zone for its wall clock.
    Instant(DateTime<Utc>),
}

impl FromStr for DateInput {
    type Err = ValidationError;

    /// Accepts RFC 3339 instants, `YYYY-MM-DDTHH:MM[:SS]` wall clocks and `YYYY-MM-DD` dates.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(DateInput::Instant(dt.with_timezone(&Utc)));
        }

        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(DateInput::Local(dt));
            }
        }

        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(DateInput::Date)
            .map_err(|_| ValidationError::InvalidDate(s.to_string()))
    }
}

impl fmt::Display for DateInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateInput::Local(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            DateInput::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            DateInput::Instant(dt) => write!(f, "{}", dt.to_rfc3339()),
        }
    }
}

impl<'de> Deserialize<'de> for DateInput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl From<NaiveDateTime> for DateInput {
    fn from(dt: NaiveDateTime) -> Self {
        DateInput::Local(dt)
    }
}

impl From<NaiveDate> for DateInput {
    fn from(d: NaiveDate) -> Self {
        DateInput::Date(d)
    }
}

impl From<DateTime<Utc>> for DateInput {
    fn from(dt: DateTime<Utc>) -> Self {
        DateInput::Instant(dt)
    }
}

/// Event input before normalization. Every field is optional here;
/// [`super::normalize`] decides what is required.
///
/// Both the legacy singular `category` and the plural `categories` are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub start: Option<DateInput>,
    pub end: Option<DateInput>,
    #[serde(default)]
    pub all_day: bool,
    pub location: Option<String>,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    pub category: Option<String>,
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    #[serde(alias = "recurrence")]
    pub recurrence_rule: Option<String>,
    pub status: Option<EventStatus>,
    pub time_zone: Option<String>,
}

impl RawEvent {
    pub fn new(title: impl Into<String>, start: impl Into<DateInput>) -> Self {
        RawEvent {
            title: Some(title.into()),
            start: Some(start.into()),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_end(mut self, end: impl Into<DateInput>) -> Self {
        self.end = Some(end.into());
        self
    }

    pub fn in_zone(mut self, zone: impl Into<String>) -> Self {
        self.time_zone = Some(zone.into());
        self
    }

    pub fn at_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = Some(categories.into_iter().map(Into::into).collect());
        self
    }
}
