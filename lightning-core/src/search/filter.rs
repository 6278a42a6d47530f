//! Structured event filters.

use std::fmt;

use crate::date_range::DateRange;
use crate::event::EventRecord;

type Predicate = Box<dyn Fn(&EventRecord) -> bool>;

/// Every `Some` key must hold for a record to pass; `None` keys impose nothing.
#[derive(Default)]
pub struct FilterSpec {
    /// Case-insensitive; passes when the record shares at least one.
    pub categories: Option<Vec<String>>,
    /// Half-open overlap with the record's effective interval.
    pub date_range: Option<DateRange>,
    pub all_day: Option<bool>,
    pub has_reminders: Option<bool>,
    /// Case-insensitive attendee emails; passes when any attendee is listed.
    pub attendees: Option<Vec<String>>,
    pub recurring: Option<bool>,
    pub custom: Option<Predicate>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = Some(categories.into_iter().map(Into::into).collect());
        self
    }

    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn all_day(mut self, all_day: bool) -> Self {
        self.all_day = Some(all_day);
        self
    }

    pub fn has_reminders(mut self, has_reminders: bool) -> Self {
        self.has_reminders = Some(has_reminders);
        self
    }

    pub fn attendees<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attendees = Some(emails.into_iter().map(Into::into).collect());
        self
    }

    pub fn recurring(mut self, recurring: bool) -> Self {
        self.recurring = Some(recurring);
        self
    }

    pub fn custom(mut self, predicate: impl Fn(&EventRecord) -> bool + 'static) -> Self {
        self.custom = Some(Box::new(predicate));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_none()
            && self.date_range.is_none()
            && self.all_day.is_none()
            && self.has_reminders.is_none()
            && self.attendees.is_none()
            && self.recurring.is_none()
            && self.custom.is_none()
    }

    pub fn matches(&self, record: &EventRecord) -> bool {
        if let Some(wanted) = &self.categories {
            let shared = record
                .categories()
                .iter()
                .any(|c| wanted.iter().any(|w| same_text(w, c)));
            if !shared {
                return false;
            }
        }

        if let Some(range) = &self.date_range {
            if !record.overlaps_range(range.lower(), range.upper()) {
                return false;
            }
        }

        if self.all_day.is_some_and(|all_day| record.all_day() != all_day) {
            return false;
        }

        if self
            .has_reminders
            .is_some_and(|wanted| record.reminders().is_empty() == wanted)
        {
            return false;
        }

        if let Some(emails) = &self.attendees {
            let listed = record
                .attendees()
                .iter()
                .any(|a| emails.iter().any(|e| same_text(e, &a.email)));
            if !listed {
                return false;
            }
        }

        if self
            .recurring
            .is_some_and(|recurring| record.recurring() != recurring)
        {
            return false;
        }

        self.custom.as_ref().is_none_or(|predicate| predicate(record))
    }
}

impl fmt::Debug for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterSpec")
            .field("categories", &self.categories)
            .field("date_range", &self.date_range)
            .field("all_day", &self.all_day)
            .field("has_reminders", &self.has_reminders)
            .field("attendees", &self.attendees)
            .field("recurring", &self.recurring)
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

/// Unicode case-insensitive equality, folded the same way as the store's category index.
fn same_text(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Attendee, RawEvent, Reminder, ReminderMethod, normalize};
    use crate::timezone::TimezoneManager;
    use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn record(raw: RawEvent) -> EventRecord {
        normalize(raw, "UTC", &TimezoneManager::new()).unwrap()
    }

    #[test]
    fn test_empty_spec_matches_everything() {
        let spec = FilterSpec::new();
        assert!(spec.is_empty());
        assert!(spec.matches(&record(RawEvent::new("Anything", at(15, 9)))));
    }

    #[test]
    fn test_categories_intersect_case_insensitively() {
        let event = record(RawEvent::new("Review", at(15, 9)).with_categories(["Meeting", "important"]));
        assert!(FilterSpec::new().categories(["meeting"]).matches(&event));
        assert!(FilterSpec::new().categories(["social", "IMPORTANT"]).matches(&event));
        assert!(!FilterSpec::new().categories(["social"]).matches(&event));
    }

    #[test]
    fn test_non_ascii_categories_and_emails_fold_case() {
        let event = record(RawEvent {
            attendees: vec![Attendee {
                name: None,
                email: "Zoé@Exemple.fr".into(),
                response_status: None,
            }],
            ..RawEvent::new("Point hebdo", at(15, 9)).with_categories(["Réunion"])
        });
        assert!(FilterSpec::new().categories(["RÉUNION"]).matches(&event));
        assert!(FilterSpec::new().attendees(["ZOÉ@EXEMPLE.FR"]).matches(&event));
        assert!(!FilterSpec::new().categories(["reunion"]).matches(&event));
    }

    #[test]
    fn test_date_range_is_half_open() {
        let event = record(RawEvent::new("Sync", at(15, 10)).with_end(at(15, 11)));
        let range = |from, to| {
            DateRange::new(
                Utc.with_ymd_and_hms(2025, 1, 15, from, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 1, 15, to, 0, 0).unwrap(),
            )
        };
        assert!(FilterSpec::new().date_range(range(10, 12)).matches(&event));
        assert!(!FilterSpec::new().date_range(range(11, 12)).matches(&event));
    }

    #[test]
    fn test_flags_reminders_attendees_and_custom() {
        let event = record(RawEvent {
            attendees: vec![Attendee {
                name: Some("John".into()),
                email: "john@example.com".into(),
                response_status: None,
            }],
            reminders: vec![Reminder {
                method: ReminderMethod::Popup,
                minutes_before: 15,
            }],
            ..RawEvent::new("Planning", at(16, 9))
        });

        assert!(FilterSpec::new().all_day(false).matches(&event));
        assert!(!FilterSpec::new().all_day(true).matches(&event));
        assert!(FilterSpec::new().has_reminders(true).matches(&event));
        assert!(!FilterSpec::new().has_reminders(false).matches(&event));
        assert!(FilterSpec::new().attendees(["JOHN@example.com"]).matches(&event));
        assert!(!FilterSpec::new().attendees(["jane@example.com"]).matches(&event));
        assert!(FilterSpec::new().recurring(false).matches(&event));
        assert!(
            !FilterSpec::new()
                .all_day(false)
                .custom(|e| e.title().starts_with("Lunch"))
                .matches(&event)
        );
    }
}
