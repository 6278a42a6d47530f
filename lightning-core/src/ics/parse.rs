//! ICS parsing using the icalendar crate's parser.
//!
//! Documents are first carved into VEVENT blocks, and each block is parsed
//! on its own so a malformed event never hides its neighbours.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{Component, Property, read_calendar, unfold},
};

use super::generate::{ALL_DAY_ZONE_PROPERTY, REMINDER_METHOD_PROPERTY};
use crate::event::{
    Attendee, DateInput, EventRecord, EventStatus, RawEvent, Reminder, ReminderMethod,
    ResponseStatus, normalize,
};
use crate::timezone::TimezoneManager;

const UNTITLED: &str = "(No title)";

/// One `BEGIN:VEVENT ... END:VEVENT` span of an unfolded document.
#[derive(Debug, Clone)]
pub(crate) struct VeventBlock {
    /// Position among the document's VEVENTs, from 1.
    pub position: usize,
    pub uid: Option<String>,
    pub text: String,
    pub terminated: bool,
}

impl VeventBlock {
    /// Name used when reporting problems with this block.
    pub fn source(&self) -> String {
        match self.uid {
            Some(ref uid) => uid.clone(),
            None => format!("VEVENT #{}", self.position),
        }
    }
}

/// Unfolded content lines, without line terminators.
pub(crate) fn content_lines(content: &str) -> Vec<String> {
    unfold(content)
        .lines()
        .map(|l| l.trim_end_matches('\r').to_string())
        .filter(|l| !l.trim().is_empty())
        .collect()
}

/// Carve every VEVENT out of a document. Nested components stay in their block.
pub(crate) fn split_vevents(content: &str) -> Vec<VeventBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<(Vec<String>, Option<String>)> = None;
    let mut depth = 0usize;

    for line in content_lines(content) {
        let upper = line.to_ascii_uppercase();
        match current.as_mut() {
            None => {
                if upper == "BEGIN:VEVENT" {
                    current = Some((vec![line], None));
                    depth = 0;
                }
            }
            Some((lines, uid)) => {
                if upper == "BEGIN:VEVENT" && depth == 0 {
                    // Previous event never ended; report it and start over.
                    let (lines, uid) = current.take().unwrap_or_default();
                    blocks.push(VeventBlock {
                        position: blocks.len() + 1,
                        uid,
                        text: lines.join("\r\n"),
                        terminated: false,
                    });
                    current = Some((vec![line], None));
                    continue;
                }
                if upper.starts_with("BEGIN:") {
                    depth += 1;
                } else if upper == "END:VEVENT" && depth == 0 {
                    lines.push(line);
                    let (lines, uid) = current.take().unwrap_or_default();
                    blocks.push(VeventBlock {
                        position: blocks.len() + 1,
                        uid,
                        text: lines.join("\r\n"),
                        terminated: true,
                    });
                    continue;
                } else if upper.starts_with("END:") {
                    depth = depth.saturating_sub(1);
                } else if depth == 0 && upper.starts_with("UID:") {
                    let value = line[4..].trim();
                    if !value.is_empty() {
                        *uid = Some(value.to_string());
                    }
                }
                lines.push(line);
            }
        }
    }

    if let Some((lines, uid)) = current {
        blocks.push(VeventBlock {
            position: blocks.len() + 1,
            uid,
            text: lines.join("\r\n"),
            terminated: false,
        });
    }

    blocks
}

/// Parse a date or date-time value as written in DTSTART/DTEND.
pub(crate) fn parse_ics_datetime(value: &str) -> Option<DatePerhapsTime> {
    let value = value.trim();
    if let Some(utc) = value.strip_suffix('Z') {
        return NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
            .ok()
            .map(|dt| DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt.and_utc())));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S") {
        return Some(DatePerhapsTime::DateTime(CalendarDateTime::Floating(dt)));
    }
    NaiveDate::parse_from_str(value, "%Y%m%d")
        .ok()
        .map(DatePerhapsTime::Date)
}

/// Undo RFC 5545 TEXT escaping.
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn text_prop(vevent: &Component, name: &str) -> Option<String> {
    vevent
        .find_prop(name)
        .map(|p| unescape_text(p.val.as_ref()))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn param<'p>(prop: &'p Property, key: &str) -> Option<&'p str> {
    prop.params
        .iter()
        .find(|p| p.key.as_ref().eq_ignore_ascii_case(key))
        .and_then(|p| p.val.as_ref())
        .map(|v| v.as_ref())
}

/// Where a DTSTART puts the event: its input and the zone it implies.
struct StartPoint {
    input: DateInput,
    zone: String,
    all_day: bool,
}

fn start_point(
    dpt: DatePerhapsTime,
    all_day_zone: Option<String>,
    default_zone: &str,
) -> StartPoint {
    match dpt {
        DatePerhapsTime::Date(d) => StartPoint {
            input: DateInput::Date(d),
            zone: all_day_zone.unwrap_or_else(|| default_zone.to_string()),
            all_day: true,
        },
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => StartPoint {
            input: DateInput::Instant(dt),
            zone: "UTC".to_string(),
            all_day: false,
        },
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => StartPoint {
            input: DateInput::Local(naive),
            zone: default_zone.to_string(),
            all_day: false,
        },
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            StartPoint {
                input: DateInput::Local(date_time),
                zone: tzid,
                all_day: false,
            }
        }
    }
}

/// DTEND in terms of the start's zone.
fn end_input(dpt: DatePerhapsTime, start: &StartPoint, timezones: &TimezoneManager) -> DateInput {
    match dpt {
        DatePerhapsTime::Date(d) => DateInput::Date(d),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => DateInput::Instant(dt),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => DateInput::Local(naive),
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            if tzid == start.zone {
                DateInput::Local(date_time)
            } else {
                DateInput::Instant(timezones.local_to_utc(date_time, &tzid))
            }
        }
    }
}

/// Signed ISO 8601 duration (`-PT15M`, `P1D`).
pub(crate) fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (negative, rest) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.trim_start_matches('+')),
    };
    let duration = iso8601::duration(rest).ok()?;
    let std_duration: std::time::Duration = duration.into();
    let duration = Duration::from_std(std_duration).ok()?;
    Some(if negative { -duration } else { duration })
}

/// End implied by DURATION. Zero durations, and one day on an all-day event, mean no end.
fn end_from_duration(
    duration: Duration,
    start: &StartPoint,
    timezones: &TimezoneManager,
) -> Option<DateInput> {
    if duration.is_zero() || (start.all_day && duration == Duration::days(1)) {
        return None;
    }
    match start.input {
        DateInput::Date(d) => Some(DateInput::Date(d + Duration::days(duration.num_days()))),
        DateInput::Instant(instant) => Some(DateInput::Instant(instant + duration)),
        DateInput::Local(naive) => {
            let instant: DateTime<Utc> = timezones.local_to_utc(naive, &start.zone);
            Some(DateInput::Instant(instant + duration))
        }
    }
}

const MAILTO: &str = "mailto:";

fn parse_attendee(prop: &Property) -> Attendee {
    let value = prop.val.as_ref().trim();
    let email = match value.split_at_checked(MAILTO.len()) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case(MAILTO) => rest,
        _ => value,
    };

    Attendee {
        name: param(prop, "CN").map(|v| v.trim_matches('"').to_string()),
        email: email.to_string(),
        response_status: param(prop, "PARTSTAT").and_then(ResponseStatus::from_ics_str),
    }
}

fn parse_reminder(alarm: &Component) -> Option<Reminder> {
    let trigger = alarm.find_prop("TRIGGER")?;
    let minutes_before = -parse_duration(trigger.val.as_ref())?.num_minutes();

    let method = alarm
        .find_prop(REMINDER_METHOD_PROPERTY)
        .and_then(|p| ReminderMethod::parse(p.val.as_ref()))
        .or_else(|| {
            alarm
                .find_prop("ACTION")
                .and_then(|p| ReminderMethod::parse(p.val.as_ref()))
        })
        .unwrap_or(ReminderMethod::Display);

    Some(Reminder {
        method,
        minutes_before,
    })
}

fn parse_categories(vevent: &Component) -> Vec<String> {
    vevent
        .properties
        .iter()
        .filter(|p| p.name.as_ref().eq_ignore_ascii_case("CATEGORIES"))
        .flat_map(|p| split_unescaped_commas(p.val.as_ref()))
        .collect()
}

fn split_unescaped_commas(value: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in value.chars() {
        if escaped {
            current.push('\\');
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == ',' {
            parts.push(unescape_text(&current));
            current.clear();
        } else {
            current.push(c);
        }
    }
    parts.push(unescape_text(&current));
    parts
}

/// Parse one carved VEVENT block into a normalized record.
///
/// Floating times, and DATE values without a zone marker, are read in `default_zone`.
/// The error is a human-readable reason.
pub(crate) fn parse_vevent(
    block: &VeventBlock,
    default_zone: &str,
    timezones: &TimezoneManager,
) -> Result<EventRecord, String> {
    if !block.terminated {
        return Err("VEVENT is not terminated by END:VEVENT".to_string());
    }

    let wrapped = format!(
        "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Lightning Calendar//Import//EN\r\n{}\r\nEND:VCALENDAR\r\n",
        block.text
    );
    let calendar = read_calendar(&wrapped).map_err(|e| format!("unreadable VEVENT: {}", e))?;
    let vevent = calendar
        .components
        .iter()
        .find(|c| c.name == "VEVENT")
        .ok_or_else(|| "no VEVENT component".to_string())?;

    let uid = text_prop(vevent, "UID").ok_or_else(|| "missing UID".to_string())?;
    let dtstart = vevent
        .find_prop("DTSTART")
        .ok_or_else(|| "missing DTSTART".to_string())?;
    let dtstart = DatePerhapsTime::try_from(dtstart)
        .ok()
        .or_else(|| parse_ics_datetime(dtstart.val.as_ref()))
        .ok_or_else(|| format!("invalid DTSTART '{}'", dtstart.val.as_ref()))?;

    let start = start_point(
        dtstart,
        text_prop(vevent, ALL_DAY_ZONE_PROPERTY),
        default_zone,
    );

    let end = match vevent.find_prop("DTEND") {
        Some(dtend) => {
            let dpt = DatePerhapsTime::try_from(dtend)
                .ok()
                .or_else(|| parse_ics_datetime(dtend.val.as_ref()))
                .ok_or_else(|| format!("invalid DTEND '{}'", dtend.val.as_ref()))?;
            Some(end_input(dpt, &start, timezones))
        }
        None => match vevent.find_prop("DURATION") {
            Some(prop) => {
                let duration = parse_duration(prop.val.as_ref())
                    .ok_or_else(|| format!("invalid DURATION '{}'", prop.val.as_ref()))?;
                end_from_duration(duration, &start, timezones)
            }
            None => None,
        },
    };

    let status = vevent
        .find_prop("STATUS")
        .and_then(|p| EventStatus::from_ics_str(p.val.as_ref()));

    let attendees = vevent
        .properties
        .iter()
        .filter(|p| p.name.as_ref().eq_ignore_ascii_case("ATTENDEE"))
        .map(parse_attendee)
        .collect();

    let reminders = vevent
        .components
        .iter()
        .filter(|c| c.name == "VALARM")
        .filter_map(parse_reminder)
        .collect();

    let raw = RawEvent {
        id: Some(uid),
        title: Some(text_prop(vevent, "SUMMARY").unwrap_or_else(|| UNTITLED.to_string())),
        description: text_prop(vevent, "DESCRIPTION"),
        start: Some(start.input),
        end,
        all_day: start.all_day,
        location: text_prop(vevent, "LOCATION"),
        attendees,
        category: None,
        categories: Some(parse_categories(vevent)),
        reminders,
        recurrence_rule: vevent.find_prop("RRULE").map(|p| p.val.to_string()),
        status,
        time_zone: Some(start.zone),
    };

    normalize(raw, default_zone, timezones).map_err(|e| e.to_string())
}
