//! ICS generation.

use chrono::{Duration, Utc};
use icalendar::{Alarm, Calendar, Component, EventLike, Property, Trigger, ValueType};
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::event::{EventRecord, ZonedTime};

pub const DEFAULT_PRODUCT_ID: &str = "-//Lightning Calendar//Core//EN";

/// Carries the zone of every all-day event, whose DATE values cannot.
pub(crate) const ALL_DAY_ZONE_PROPERTY: &str = "X-LIGHTNING-TZID";
pub(crate) const REMINDER_METHOD_PROPERTY: &str = "X-REMINDER-METHOD";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub product_id: String,
    /// Written as `X-WR-CALNAME` when set.
    pub calendar_name: Option<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            product_id: DEFAULT_PRODUCT_ID.to_string(),
            calendar_name: None,
        }
    }
}

impl ExportOptions {
    pub fn named(name: impl Into<String>) -> Self {
        ExportOptions {
            calendar_name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Serialize records into one VCALENDAR document.
#[tracing::instrument(skip_all, fields(calendar = options.calendar_name.as_deref()))]
pub fn export_ics<'a>(
    records: impl IntoIterator<Item = &'a EventRecord>,
    options: &ExportOptions,
) -> EngineResult<String> {
    let mut cal = Calendar::new();
    let mut count = 0usize;

    for record in records {
        cal.push(to_vevent(record));
        count += 1;
    }

    let cal = cal.done();
    let output = strip_ics_bloat(&cal.to_string(), options);
    tracing::debug!(events = count, bytes = output.len(), "Exported calendar");
    Ok(output)
}

fn to_vevent(record: &EventRecord) -> icalendar::Event {
    let mut ics_event = icalendar::Event::new();
    ics_event.uid(record.id());
    ics_event.summary(record.title());
    ics_event.add_property("DTSTAMP", Utc::now().format("%Y%m%dT%H%M%SZ").to_string());

    add_datetime_property(&mut ics_event, "DTSTART", record, record.start());
    match record.end() {
        Some(end) => add_datetime_property(&mut ics_event, "DTEND", record, end),
        None if record.all_day() => {
            ics_event.add_property("DURATION", "P1D");
        }
        None => {
            ics_event.add_property("DURATION", "PT0S");
        }
    }

    if record.all_day() {
        ics_event.add_property(ALL_DAY_ZONE_PROPERTY, record.time_zone());
    }

    if let Some(desc) = record.description() {
        ics_event.description(desc);
    }

    if let Some(loc) = record.location() {
        ics_event.location(loc);
    }

    if let Some(status) = record.status() {
        ics_event.add_property("STATUS", status.as_ics_str());
    }

    if let Some(rule) = record.recurrence_rule() {
        ics_event.add_property("RRULE", rule);
    }

    for category in record.categories() {
        ics_event.append_multi_property(Property::new("CATEGORIES", category));
    }

    for reminder in record.reminders() {
        let trigger = Trigger::before_start(Duration::minutes(reminder.minutes_before));
        let mut alarm = Alarm::display("Reminder", trigger);
        alarm.add_property(REMINDER_METHOD_PROPERTY, reminder.method.as_str());
        ics_event.alarm(alarm);
    }

    // ATTENDEE may repeat
    for attendee in record.attendees() {
        let mut prop = Property::new("ATTENDEE", format!("mailto:{}", attendee.email));
        if let Some(ref name) = attendee.name {
            prop.add_parameter("CN", name);
        }
        if let Some(partstat) = attendee.response_status {
            prop.add_parameter("PARTSTAT", partstat.as_ics_str());
        }
        ics_event.append_multi_property(prop);
    }

    ics_event.done()
}

/// Clean up the icalendar crate's output:
/// - PRODID replaced with ours, calendar name inserted after it
/// - CALSCALE:GREGORIAN dropped (it's the default)
/// - DTSTAMP and UID dropped inside VALARM
fn strip_ics_bloat(ics: &str, options: &ExportOptions) -> String {
    let mut result = String::with_capacity(ics.len());
    let mut in_valarm = false;

    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            result.push_str(&format!("PRODID:{}\r\n", options.product_id));
            if let Some(ref name) = options.calendar_name {
                result.push_str(&format!("X-WR-CALNAME:{}\r\n", name));
            }
            continue;
        }

        if line == "CALSCALE:GREGORIAN" {
            continue;
        }

        if line == "BEGIN:VALARM" {
            in_valarm = true;
        } else if line == "END:VALARM" {
            in_valarm = false;
        }

        if in_valarm && (line.starts_with("DTSTAMP:") || line.starts_with("UID:")) {
            continue;
        }

        result.push_str(line);
        result.push_str("\r\n");
    }

    result
}

/// DATE for all-day records, `Z` for UTC, TZID otherwise.
fn add_datetime_property(
    ics_event: &mut icalendar::Event,
    name: &str,
    record: &EventRecord,
    time: &ZonedTime,
) {
    if record.all_day() {
        let mut prop = Property::new(name, time.local.format("%Y%m%d").to_string());
        prop.append_parameter(ValueType::Date);
        ics_event.append_property(prop);
    } else if record.time_zone() == "UTC" {
        ics_event.add_property(name, time.utc.format("%Y%m%dT%H%M%SZ").to_string());
    } else {
        let mut prop = Property::new(name, time.local.format("%Y%m%dT%H%M%S").to_string());
        prop.add_parameter("TZID", record.time_zone());
        ics_event.append_property(prop);
    }
}
