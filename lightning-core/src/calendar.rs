//! The `Calendar` facade.
//!
//! Owns one store, one timezone manager and one search index, plus the
//! default zone applied to input that names none. Everything surrounding code
//! needs goes through here.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::config::CalendarConfig;
use crate::conflict::{Conflict, detect_conflicts};
use crate::date_range::DateRange;
use crate::error::{EngineError, EngineResult};
use crate::event::{EventRecord, RawEvent, normalize, normalize_json};
use crate::ics::{
    ExportOptions, ImportControl, ImportResult, ValidationReport, export_ics, import_ics,
    validate_ics,
};
use crate::recurrence::{Occurrence, expand_occurrences};
use crate::search::{EventField, EventGroup, EventSearch, FilterSpec, GroupOptions, SearchOptions};
use crate::store::{AddOptions, EventStore};
use crate::timezone::{TimezoneInfo, TimezoneManager};

/// Summary counts over the whole calendar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarStats {
    pub total_events: usize,
    pub with_attendees: usize,
    pub recurring: usize,
    pub all_day: usize,
    /// Fraction of offset lookups served from the timezone cache.
    pub timezone_cache_hit_rate: f64,
}

#[derive(Debug)]
pub struct Calendar {
    config: CalendarConfig,
    timezone: String,
    store: EventStore,
    timezones: TimezoneManager,
    search: EventSearch,
}

impl Default for Calendar {
    fn default() -> Self {
        Self::from_config(CalendarConfig::default())
    }
}

impl Calendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// A calendar whose default zone is `zone` (UTC if unknown).
    pub fn with_timezone(zone: &str) -> Self {
        let mut calendar = Self::default();
        calendar.set_timezone(zone);
        calendar
    }

    pub fn from_config(config: CalendarConfig) -> Self {
        let timezones = TimezoneManager::with_cache_capacity(config.timezone_cache_capacity);
        let timezone = timezones.resolve(&config.default_timezone).name().to_string();
        Calendar {
            config,
            timezone,
            store: EventStore::new(),
            timezones,
            search: EventSearch::new(),
        }
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn timezone_manager(&self) -> &TimezoneManager {
        &self.timezones
    }

    // --- Timezone ---

    /// The zone applied to input that names none.
    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    /// Change the default zone. Returns the zone actually used, UTC when `zone` is unknown.
    /// Stored records keep their own zones.
    pub fn set_timezone(&mut self, zone: &str) -> &str {
        self.timezone = self.timezones.resolve(zone).name().to_string();
        self.config.default_timezone = self.timezone.clone();
        &self.timezone
    }

    /// Common zones with their current offsets.
    pub fn timezones(&self) -> Vec<TimezoneInfo> {
        self.timezones.common_timezones(Utc::now())
    }

    pub fn format_in_timezone(&self, instant: DateTime<Utc>, zone: &str) -> String {
        self.timezones.format_in_timezone(instant, zone)
    }

    pub fn system_timezone() -> String {
        TimezoneManager::system_timezone()
    }

    // --- Events ---

    /// Normalize and store a new event. Returns its id.
    pub fn add_event(&mut self, raw: RawEvent) -> EngineResult<String> {
        let record = normalize(raw, &self.timezone, &self.timezones)?;
        let id = self.store.add(record, AddOptions::default())?;
        tracing::debug!(id = %id, "Added event");
        Ok(id)
    }

    /// `add_event` for JSON input.
    pub fn add_event_json(&mut self, value: serde_json::Value) -> EngineResult<String> {
        let record = normalize_json(value, &self.timezone, &self.timezones)?;
        self.store.add(record, AddOptions::default())
    }

    /// Replace the event `id` with freshly normalized input.
    pub fn update_event(&mut self, id: &str, raw: RawEvent) -> EngineResult<()> {
        if !self.store.contains(id) {
            return Err(EngineError::NotFound(id.to_string()));
        }
        let raw = RawEvent {
            id: Some(id.to_string()),
            ..raw
        };
        let record = normalize(raw, &self.timezone, &self.timezones)?;
        self.store.update(record)?;
        Ok(())
    }

    pub fn remove_event(&mut self, id: &str) -> Option<EventRecord> {
        self.store.remove(id)
    }

    pub fn get_event(&self, id: &str) -> Option<&EventRecord> {
        self.store.get(id)
    }

    /// All events, ordered by start.
    pub fn events(&self) -> Vec<&EventRecord> {
        self.store.all_events()
    }

    /// Events starting on `date` as seen from `zone`.
    pub fn events_for_date(&self, date: NaiveDate, zone: &str) -> Vec<&EventRecord> {
        self.store.events_for_date(date, zone, &self.timezones)
    }

    pub fn events_in_range(&self, range: &DateRange) -> Vec<&EventRecord> {
        self.store.events_in_range(range)
    }

    /// Occurrences of one event inside `range`.
    pub fn occurrences(
        &self,
        id: &str,
        range: &DateRange,
        limit: u16,
    ) -> EngineResult<Vec<Occurrence>> {
        let record = self
            .store
            .get(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        expand_occurrences(record, range, limit)
    }

    // --- Search ---

    /// Search with the configured fields and fuzziness.
    pub fn search(&self, query: &str) -> Vec<&EventRecord> {
        self.search.search(&self.store, query, &self.config.search)
    }

    pub fn search_with(&self, query: &str, options: &SearchOptions) -> Vec<&EventRecord> {
        self.search.search(&self.store, query, options)
    }

    pub fn filter(&self, spec: &FilterSpec) -> Vec<&EventRecord> {
        self.search.filter(&self.store, spec)
    }

    pub fn advanced_search(&self, query: &str, spec: &FilterSpec) -> Vec<&EventRecord> {
        self.search
            .advanced_search(&self.store, query, &self.config.search, spec)
    }

    pub fn suggestions(&self, prefix: &str, field: EventField, limit: usize) -> Vec<String> {
        self.search.suggestions(&self.store, prefix, field, limit)
    }

    pub fn unique_values(&self, field: EventField) -> Vec<String> {
        self.search.unique_values(&self.store, field)
    }

    pub fn group_by(&self, field: EventField, options: GroupOptions) -> Vec<EventGroup<'_>> {
        self.search.group_by(&self.store, field, options)
    }

    // --- ICS ---

    /// Export every event with the configured product id and name.
    pub fn export_ics(&self) -> EngineResult<String> {
        export_ics(self.store.all_events(), &self.config.ics)
    }

    pub fn export_ics_with(&self, options: &ExportOptions) -> EngineResult<String> {
        export_ics(self.store.all_events(), options)
    }

    pub fn validate_ics(&self, content: &str) -> ValidationReport {
        validate_ics(content)
    }

    /// Merge an ICS document into this calendar.
    pub async fn import_ics(&mut self, content: &str) -> ImportResult {
        self.import_ics_with(content, &ImportControl::new()).await
    }

    /// Merge an ICS document, stopping early once `control` is cancelled.
    pub async fn import_ics_with(&mut self, content: &str, control: &ImportControl) -> ImportResult {
        import_ics(
            &mut self.store,
            content,
            &self.timezone,
            &self.timezones,
            control,
        )
        .await
    }

    // --- Conflicts & stats ---

    /// Conflicts among all events.
    pub fn detect_conflicts(&self) -> Vec<Conflict> {
        detect_conflicts(&self.store.all_events())
    }

    /// Conflicts among events starting on `date` in the default zone.
    pub fn detect_conflicts_for_date(&self, date: NaiveDate) -> Vec<Conflict> {
        detect_conflicts(&self.events_for_date(date, &self.timezone))
    }

    pub fn stats(&self) -> CalendarStats {
        let events = self.store.all_events();
        CalendarStats {
            total_events: events.len(),
            with_attendees: events.iter().filter(|e| !e.attendees().is_empty()).count(),
            recurring: events.iter().filter(|e| e.recurring()).count(),
            all_day: events.iter().filter(|e| e.all_day()).count(),
            timezone_cache_hit_rate: self.timezones.cache_stats().hit_rate(),
        }
    }
}
