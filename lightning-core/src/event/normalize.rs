//! Raw input → `EventRecord`.

use chrono::NaiveTime;

use super::{DateInput, EventRecord, RawEvent, ZonedTime};
use crate::error::{EngineResult, ValidationError};
use crate::timezone::TimezoneManager;

/// How the caller spelled categories. Resolved once, at ingestion.
enum CategoryInput {
    Singular(String),
    Plural(Vec<String>),
    Neither,
}

impl CategoryInput {
    /// The plural form wins when both are present.
    fn from_raw(category: Option<String>, categories: Option<Vec<String>>) -> Self {
        match (category, categories) {
            (_, Some(plural)) => CategoryInput::Plural(plural),
            (Some(single), None) => CategoryInput::Singular(single),
            (None, None) => CategoryInput::Neither,
        }
    }

    fn into_categories(self) -> Vec<String> {
        let values = match self {
            CategoryInput::Singular(single) => vec![single],
            CategoryInput::Plural(plural) => plural,
            CategoryInput::Neither => Vec::new(),
        };

        let mut categories: Vec<String> = Vec::with_capacity(values.len());
        for value in values {
            let value = value.trim();
            if !value.is_empty() && !categories.iter().any(|c| c == value) {
                categories.push(value.to_string());
            }
        }
        categories
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn to_zoned(
    input: DateInput,
    zone: &str,
    all_day: bool,
    timezones: &TimezoneManager,
) -> ZonedTime {
    let local = match input {
        DateInput::Local(dt) => dt,
        DateInput::Date(d) => d.and_time(NaiveTime::MIN),
        DateInput::Instant(instant) => timezones.utc_to_local(instant, zone),
    };

    // All-day events live at local midnight.
    let local = if all_day {
        local.date().and_time(NaiveTime::MIN)
    } else {
        local
    };

    let utc = match input {
        DateInput::Instant(instant) if !all_day => instant,
        _ => timezones.local_to_utc(local, zone),
    };

    ZonedTime { local, utc }
}

/// Validate raw input and produce the canonical record.
///
/// `default_zone` applies when the input names no zone. An unknown zone
/// resolves to UTC. The id is carried through untouched (possibly empty);
/// assigning one is the store's job.
pub fn normalize(
    raw: RawEvent,
    default_zone: &str,
    timezones: &TimezoneManager,
) -> Result<EventRecord, ValidationError> {
    let title = non_empty(raw.title).ok_or(ValidationError::EmptyTitle)?;
    let start_input = raw.start.ok_or(ValidationError::MissingStart)?;

    let requested_zone = non_empty(raw.time_zone).unwrap_or_else(|| default_zone.to_string());
    let time_zone = timezones.resolve(&requested_zone).name().to_string();

    let start = to_zoned(start_input, &time_zone, raw.all_day, timezones);
    let end = raw
        .end
        .map(|input| to_zoned(input, &time_zone, raw.all_day, timezones));

    if let Some(end) = end {
        if end.utc < start.utc {
            return Err(ValidationError::EndBeforeStart {
                start: start.utc,
                end: end.utc,
            });
        }
    }

    let categories = CategoryInput::from_raw(raw.category, raw.categories).into_categories();

    let recurrence_rule = non_empty(raw.recurrence_rule).map(|rule| {
        rule.strip_prefix("RRULE:")
            .map(str::to_string)
            .unwrap_or(rule)
    });

    let attendees = raw
        .attendees
        .into_iter()
        .filter(|a| !a.email.trim().is_empty())
        .map(|mut a| {
            a.email = a.email.trim().to_string();
            a.name = non_empty(a.name);
            a
        })
        .collect();

    Ok(EventRecord {
        id: raw.id.map(|id| id.trim().to_string()).unwrap_or_default(),
        title,
        description: non_empty(raw.description),
        start,
        end,
        all_day: raw.all_day,
        location: non_empty(raw.location),
        attendees,
        categories,
        reminders: raw.reminders,
        recurring: recurrence_rule.is_some(),
        recurrence_rule,
        status: raw.status,
        time_zone,
    })
}

/// Normalize a JSON object as produced by hosts that speak JSON.
pub fn normalize_json(
    value: serde_json::Value,
    default_zone: &str,
    timezones: &TimezoneManager,
) -> EngineResult<EventRecord> {
    let raw: RawEvent = serde_json::from_value(value)?;
    Ok(normalize(raw, default_zone, timezones)?)
}
