//! RRULE expansion for recurring events.
//!
//! Expands a record's recurrence rule into occurrence instants within a date
//! range. The rule is evaluated in the record's own zone, so a daily 09:00 in
//! New York stays at 09:00 local across DST changes.

use chrono::{DateTime, Duration, Utc};
use rrule::RRuleSet;
use serde::Serialize;

use crate::date_range::DateRange;
use crate::error::{EngineError, EngineResult};
use crate::event::EventRecord;

/// Upper bound on occurrences produced by one expansion.
pub const DEFAULT_OCCURRENCE_LIMIT: u16 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

/// Build an iCalendar-format RRULE string for the rrule crate parser.
fn build_rrule_string(record: &EventRecord, rule: &str) -> String {
    let start = record.start();
    let dtstart = if record.time_zone() == "UTC" {
        format!("DTSTART:{}", start.utc.format("%Y%m%dT%H%M%SZ"))
    } else {
        format!(
            "DTSTART;TZID={}:{}",
            record.time_zone(),
            start.local.format("%Y%m%dT%H%M%S")
        )
    };

    format!("{}\nRRULE:{}", dtstart, rule)
}

/// Occurrences of `record` starting inside `range`, at most `limit` of them.
///
/// A record without a rule has one occurrence, itself. Each occurrence keeps
/// the master's duration.
pub fn expand_occurrences(
    record: &EventRecord,
    range: &DateRange,
    limit: u16,
) -> EngineResult<Vec<Occurrence>> {
    let duration = record.end_utc().map(|end| end - record.start_utc());
    let occurrence = |start: DateTime<Utc>| Occurrence {
        start,
        end: duration.map(|d| start + d),
    };

    let Some(rule) = record.recurrence_rule() else {
        return Ok(if range.contains(record.start_utc()) && limit > 0 {
            vec![occurrence(record.start_utc())]
        } else {
            Vec::new()
        });
    };

    let rrule_set: RRuleSet = build_rrule_string(record, rule).parse().map_err(|e| {
        EngineError::Recurrence(format!(
            "Failed to parse RRULE for event '{}': {}",
            record.id(),
            e
        ))
    })?;

    // `after`/`before` are exclusive; pad by a second and filter exactly below.
    let tz: rrule::Tz = Utc.into();
    let mut query = rrule_set;
    if let Some(from) = range.from {
        query = query.after((from - Duration::seconds(1)).with_timezone(&tz));
    }
    if let Some(to) = range.to {
        query = query.before(to.with_timezone(&tz));
    }

    let result = query.all(limit);
    if result.limited {
        tracing::debug!(id = record.id(), limit, "Occurrence expansion hit its limit");
    }

    Ok(result
        .dates
        .iter()
        .map(|dt| dt.with_timezone(&Utc))
        .filter(|start| range.contains(*start))
        .map(occurrence)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{RawEvent, normalize};
    use crate::timezone::TimezoneManager;
    use chrono::{NaiveDate, NaiveDateTime, TimeZone};

    fn local(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn recurring(raw: RawEvent, rule: &str) -> EventRecord {
        let raw = RawEvent {
            recurrence_rule: Some(rule.into()),
            ..raw
        };
        normalize(raw, "UTC", &TimezoneManager::new()).unwrap()
    }

    #[test]
    fn test_daily_rule_within_range() {
        let record = recurring(
            RawEvent::new("Standup", local(2025, 1, 15, 9))
                .with_id("standup")
                .with_end(local(2025, 1, 15, 9) + Duration::minutes(30)),
            "FREQ=DAILY;COUNT=5",
        );
        let range = DateRange::new(
            Utc.with_ymd_and_hms(2025, 1, 16, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 19, 0, 0, 0).unwrap(),
        );

        let occurrences = expand_occurrences(&record, &range, DEFAULT_OCCURRENCE_LIMIT).unwrap();
        let starts: Vec<u32> = occurrences
            .iter()
            .map(|o| o.start.format("%d").to_string().parse().unwrap())
            .collect();
        assert_eq!(starts, [16, 17, 18]);
        assert_eq!(
            occurrences[0].end,
            Some(Utc.with_ymd_and_hms(2025, 1, 16, 9, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_zoned_rule_keeps_wall_clock_across_dst() {
        let record = recurring(
            RawEvent::new("Weekly", local(2025, 3, 3, 9)).in_zone("America/New_York"),
            "FREQ=WEEKLY;COUNT=2",
        );
        let occurrences = expand_occurrences(&record, &DateRange::unbounded(), 10).unwrap();

        assert_eq!(
            occurrences.iter().map(|o| o.start).collect::<Vec<_>>(),
            [
                Utc.with_ymd_and_hms(2025, 3, 3, 14, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 3, 10, 13, 0, 0).unwrap(),
            ]
        );
        assert_eq!(occurrences[0].end, None);
    }

    #[test]
    fn test_limit_caps_unbounded_rules() {
        let record = recurring(RawEvent::new("Forever", local(2025, 1, 1, 8)), "FREQ=DAILY");
        let occurrences = expand_occurrences(&record, &DateRange::unbounded(), 7).unwrap();
        assert_eq!(occurrences.len(), 7);
    }

    #[test]
    fn test_single_event_is_its_own_occurrence() {
        let record = normalize(
            RawEvent::new("Once", local(2025, 1, 15, 9)),
            "UTC",
            &TimezoneManager::new(),
        )
        .unwrap();
        assert_eq!(
            expand_occurrences(&record, &DateRange::unbounded(), 10)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_invalid_rule_is_an_error() {
        let record = recurring(RawEvent::new("Broken", local(2025, 1, 15, 9)), "FREQ=SOMETIMES");
        let err = expand_occurrences(&record, &DateRange::unbounded(), 10).unwrap_err();
        assert!(matches!(err, EngineError::Recurrence(_)));
    }
}
