//! Partition records into groups keyed by one field.

use serde::Serialize;

use super::field::EventField;
use crate::event::EventRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupOptions {
    /// Order groups by key; records without a value come last.
    pub sort_groups: bool,
    /// Order members by start instead of by id.
    pub sort_events: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventGroup<'a> {
    /// `None` collects records with no value for the field.
    pub key: Option<String>,
    pub events: Vec<&'a EventRecord>,
}

/// Partition `records` by the first value of `field`.
///
/// Groups appear in first-seen order over `records` unless `sort_groups` is set.
pub(crate) fn group_records<'a>(
    records: Vec<&'a EventRecord>,
    field: EventField,
    options: GroupOptions,
) -> Vec<EventGroup<'a>> {
    let mut groups: Vec<EventGroup<'a>> = Vec::new();

    for record in records {
        let key = field.values(record).into_iter().next();
        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => group.events.push(record),
            None => groups.push(EventGroup {
                key,
                events: vec![record],
            }),
        }
    }

    if options.sort_groups {
        groups.sort_by(|a, b| match (&a.key, &b.key) {
            (Some(a), Some(b)) => a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
    }

    if options.sort_events {
        for group in &mut groups {
            group.events.sort_by(|a, b| {
                a.start_utc()
                    .cmp(&b.start_utc())
                    .then_with(|| a.id().cmp(b.id()))
            });
        }
    }

    groups
}
