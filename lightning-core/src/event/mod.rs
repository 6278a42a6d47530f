//! Canonical event records.
//!
//! An `EventRecord` only comes out of [`normalize`]; its fields are read-only
//! afterwards. Changing an event means normalizing new input and handing the
//! result to the store.

mod normalize;
mod raw;

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::timezone::{TimezoneManager, resolve_local};

pub use normalize::{normalize, normalize_json};
pub use raw::{DateInput, RawEvent};

/// A wall-clock value together with the instant it denotes in the owning record's zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZonedTime {
    pub local: NaiveDateTime,
    pub utc: DateTime<Utc>,
}

/// An event attendee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub response_status: Option<ResponseStatus>,
}

/// Attendee participation status (PARTSTAT)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseStatus {
    NeedsAction,
    Accepted,
    Declined,
    Tentative,
    Delegated,
}

impl ResponseStatus {
    pub fn as_ics_str(self) -> &'static str {
        match self {
            ResponseStatus::NeedsAction => "NEEDS-ACTION",
            ResponseStatus::Accepted => "ACCEPTED",
            ResponseStatus::Declined => "DECLINED",
            ResponseStatus::Tentative => "TENTATIVE",
            ResponseStatus::Delegated => "DELEGATED",
        }
    }

    pub fn from_ics_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NEEDS-ACTION" => Some(ResponseStatus::NeedsAction),
            "ACCEPTED" => Some(ResponseStatus::Accepted),
            "DECLINED" => Some(ResponseStatus::Declined),
            "TENTATIVE" => Some(ResponseStatus::Tentative),
            "DELEGATED" => Some(ResponseStatus::Delegated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderMethod {
    Popup,
    Email,
    Display,
    Audio,
}

impl ReminderMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ReminderMethod::Popup => "popup",
            ReminderMethod::Email => "email",
            ReminderMethod::Display => "display",
            ReminderMethod::Audio => "audio",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "popup" => Some(ReminderMethod::Popup),
            "email" => Some(ReminderMethod::Email),
            "display" => Some(ReminderMethod::Display),
            "audio" => Some(ReminderMethod::Audio),
            _ => None,
        }
    }
}

/// A reminder/alarm for an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    #[serde(default = "default_reminder_method")]
    pub method: ReminderMethod,
    /// Minutes before the event start to trigger
    pub minutes_before: i64,
}

fn default_reminder_method() -> ReminderMethod {
    ReminderMethod::Popup
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Cancelled,
}

impl EventStatus {
    pub fn as_ics_str(self) -> &'static str {
        match self {
            EventStatus::Confirmed => "CONFIRMED",
            EventStatus::Tentative => "TENTATIVE",
            EventStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_ics_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CONFIRMED" => Some(EventStatus::Confirmed),
            "TENTATIVE" => Some(EventStatus::Tentative),
            "CANCELLED" => Some(EventStatus::Cancelled),
            _ => None,
        }
    }
}

/// A validated calendar event.
///
/// `start`/`end` hold both the wall clock in `time_zone` and the derived UTC
/// instant. There is no singular `category` field; [`EventRecord::category`]
/// reads the first entry of `categories` for callers that still expect one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    id: String,
    title: String,
    description: Option<String>,
    start: ZonedTime,
    end: Option<ZonedTime>,
    all_day: bool,
    location: Option<String>,
    attendees: Vec<Attendee>,
    categories: Vec<String>,
    reminders: Vec<Reminder>,
    recurrence_rule: Option<String>,
    recurring: bool,
    status: Option<EventStatus>,
    time_zone: String,
}

impl EventRecord {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn start(&self) -> &ZonedTime {
        &self.start
    }

    pub fn end(&self) -> Option<&ZonedTime> {
        self.end.as_ref()
    }

    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start.utc
    }

    pub fn end_utc(&self) -> Option<DateTime<Utc>> {
        self.end.map(|e| e.utc)
    }

    pub fn all_day(&self) -> bool {
        self.all_day
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn attendees(&self) -> &[Attendee] {
        &self.attendees
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Compatibility read of the old singular field: the first category.
    pub fn category(&self) -> Option<&str> {
        self.categories.first().map(String::as_str)
    }

    pub fn reminders(&self) -> &[Reminder] {
        &self.reminders
    }

    pub fn recurrence_rule(&self) -> Option<&str> {
        self.recurrence_rule.as_deref()
    }

    pub fn recurring(&self) -> bool {
        self.recurring
    }

    pub fn status(&self) -> Option<EventStatus> {
        self.status
    }

    pub fn time_zone(&self) -> &str {
        &self.time_zone
    }

    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }

    /// Copy of this record under another id. Only the store assigns ids.
    pub(crate) fn with_id(mut self, id: String) -> Self {
        self.id = id;
        self
    }

    /// Start wall clock rendered in another zone.
    pub fn start_in_timezone(&self, timezones: &TimezoneManager, zone: &str) -> NaiveDateTime {
        timezones.utc_to_local(self.start.utc, zone)
    }

    pub fn end_in_timezone(
        &self,
        timezones: &TimezoneManager,
        zone: &str,
    ) -> Option<NaiveDateTime> {
        self.end.map(|e| timezones.utc_to_local(e.utc, zone))
    }

    /// The half-open UTC interval this event occupies.
    ///
    /// Without an end the event is an instant, unless it is all-day, in which
    /// case it spans its whole local day in `time_zone`.
    pub fn effective_interval(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.start.utc;
        match self.end {
            Some(end) => (start, end.utc),
            None if self.all_day => {
                let tz = TimezoneManager::parse_zone(&self.time_zone).unwrap_or(Tz::UTC);
                let next_midnight = (self.start.local.date() + Duration::days(1))
                    .and_time(NaiveTime::MIN);
                (start, resolve_local(tz, next_midnight))
            }
            None => (start, start),
        }
    }

    /// Half-open overlap. A zero-length event overlaps an interval that contains its instant.
    pub fn overlaps_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        let (start, end) = self.effective_interval();
        if start == end {
            from <= start && start < to
        } else {
            start < to && from < end
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn record(raw: RawEvent) -> EventRecord {
        normalize(raw, "UTC", &TimezoneManager::new()).expect("valid event")
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_instant_event_interval_is_empty() {
        let event = record(RawEvent::new("Deadline", at(23, 59)));
        let (start, end) = event.effective_interval();
        assert_eq!(start, end);
    }

    #[test]
    fn test_all_day_event_spans_local_day() {
        let event = record(RawEvent {
            all_day: true,
            time_zone: Some("America/New_York".into()),
            ..RawEvent::new("Holiday", NaiveDate::from_ymd_opt(2025, 1, 26).unwrap())
        });

        let (start, end) = event.effective_interval();
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 1, 26, 5, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 27, 5, 0, 0).unwrap());
    }

    #[test]
    fn test_overlaps_range_is_half_open() {
        let event = record(RawEvent::new("Sync", at(10, 0)).with_end(at(11, 0)));
        let utc = |h| Utc.with_ymd_and_hms(2025, 1, 15, h, 0, 0).unwrap();

        assert!(event.overlaps_range(utc(10), utc(12)));
        assert!(!event.overlaps_range(utc(11), utc(12)));
        assert!(!event.overlaps_range(utc(8), utc(10)));
    }

    #[test]
    fn test_start_in_other_timezone() {
        let tm = TimezoneManager::new();
        let event = normalize(
            RawEvent::new("Morning Meeting", at(10, 0)).in_zone("America/New_York"),
            "UTC",
            &tm,
        )
        .unwrap();

        assert_eq!(
            event.start_in_timezone(&tm, "Europe/London"),
            at(15, 0)
        );
    }

    #[test]
    fn test_status_ics_strings() {
        assert_eq!(
            EventStatus::from_ics_str("tentative"),
            Some(EventStatus::Tentative)
        );
        assert_eq!(EventStatus::Cancelled.as_ics_str(), "CANCELLED");
        assert_eq!(
            ResponseStatus::from_ics_str("NEEDS-ACTION"),
            Some(ResponseStatus::NeedsAction)
        );
    }
}
