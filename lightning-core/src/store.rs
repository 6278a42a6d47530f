//! Indexed in-memory event collection.
//!
//! The primary map and every secondary index change together inside one
//! `&mut self` call, after all fallible checks have passed, so readers never
//! see a record without its index entries or the reverse.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};

use chrono::{Duration, NaiveDate};

use crate::date_range::DateRange;
use crate::error::{EngineError, EngineResult};
use crate::event::EventRecord;
use crate::timezone::TimezoneManager;

const GENERATED_ID_PREFIX: &str = "evt-";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddOptions {
    /// Overwrite an existing record with the same id instead of failing.
    pub upsert: bool,
}

impl AddOptions {
    pub fn upsert() -> Self {
        AddOptions { upsert: true }
    }
}

/// One state of one store.
///
/// Holds the store's identity weakly: it never keeps the store alive, and
/// while it exists no other store can reuse that identity.
#[derive(Debug, Clone)]
pub struct StoreVersion {
    identity: Weak<()>,
    revision: u64,
}

impl StoreVersion {
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

impl PartialEq for StoreVersion {
    fn eq(&self, other: &Self) -> bool {
        self.revision == other.revision && self.identity.ptr_eq(&other.identity)
    }
}

#[derive(Debug)]
pub struct EventStore {
    identity: Arc<()>,
    events: HashMap<String, EventRecord>,
    /// Start date in the record's own zone.
    by_date: HashMap<NaiveDate, BTreeSet<String>>,
    /// Lowercased category.
    by_category: HashMap<String, BTreeSet<String>>,
    by_location: HashMap<String, BTreeSet<String>>,
    next_id: u64,
    revision: u64,
}

fn sort_by_start(events: &mut [&EventRecord]) {
    events.sort_by(|a, b| {
        a.start_utc()
            .cmp(&b.start_utc())
            .then_with(|| a.id().cmp(b.id()))
    });
}

fn index_insert(index: &mut HashMap<String, BTreeSet<String>>, key: String, id: &str) {
    index.entry(key).or_default().insert(id.to_string());
}

fn index_remove<K: std::hash::Hash + Eq>(
    index: &mut HashMap<K, BTreeSet<String>>,
    key: &K,
    id: &str,
) {
    if let Some(ids) = index.get_mut(key) {
        ids.remove(id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

impl Default for EventStore {
    fn default() -> Self {
        EventStore {
            identity: Arc::new(()),
            events: HashMap::new(),
            by_date: HashMap::new(),
            by_category: HashMap::new(),
            by_location: HashMap::new(),
            next_id: 0,
            revision: 0,
        }
    }
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, assigning an id when it has none.
    ///
    /// Fails with `DuplicateId` when the id is taken, unless `options.upsert`
    /// is set, in which case the old record and its index entries are replaced.
    pub fn add(&mut self, record: EventRecord, options: AddOptions) -> EngineResult<String> {
        let record = if record.has_id() {
            record
        } else {
            let id = self.next_free_id();
            record.with_id(id)
        };
        let id = record.id().to_string();

        if self.events.contains_key(&id) {
            if !options.upsert {
                return Err(EngineError::DuplicateId(id));
            }
            self.unindex(&id);
        }

        self.index(&record);
        self.events.insert(id.clone(), record);
        self.revision += 1;

        tracing::trace!(id = %id, revision = self.revision, "Stored event");
        Ok(id)
    }

    /// Replace an existing record.
    pub fn update(&mut self, record: EventRecord) -> EngineResult<String> {
        if !self.events.contains_key(record.id()) {
            return Err(EngineError::NotFound(record.id().to_string()));
        }
        self.add(record, AddOptions::upsert())
    }

    pub fn get(&self, id: &str) -> Option<&EventRecord> {
        self.events.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.events.contains_key(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<EventRecord> {
        if !self.events.contains_key(id) {
            return None;
        }
        self.unindex(id);
        let removed = self.events.remove(id);
        self.revision += 1;
        removed
    }

    /// Drop every record and index entry.
    pub fn clear(&mut self) {
        self.events.clear();
        self.by_date.clear();
        self.by_category.clear();
        self.by_location.clear();
        self.revision += 1;
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Bumped on every mutation; readers caching derived data compare against it.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Revision tied to this store, so caches never mix two stores.
    pub fn version(&self) -> StoreVersion {
        StoreVersion {
            identity: Arc::downgrade(&self.identity),
            revision: self.revision,
        }
    }

    /// All records ordered by start, ties broken by id.
    pub fn all_events(&self) -> Vec<&EventRecord> {
        let mut events: Vec<&EventRecord> = self.events.values().collect();
        sort_by_start(&mut events);
        events
    }

    /// Records whose start falls on `date` when rendered in `zone`.
    ///
    /// The date index is keyed by each record's own local date; two zones
    /// disagree by at most two calendar days, so only those buckets are scanned.
    pub fn events_for_date(
        &self,
        date: NaiveDate,
        zone: &str,
        timezones: &TimezoneManager,
    ) -> Vec<&EventRecord> {
        let mut events: Vec<&EventRecord> = (-2..=2)
            .map(|offset| date + Duration::days(offset))
            .filter_map(|bucket| self.by_date.get(&bucket))
            .flatten()
            .filter_map(|id| self.events.get(id))
            .filter(|e| timezones.utc_to_local(e.start_utc(), zone).date() == date)
            .collect();
        sort_by_start(&mut events);
        events
    }

    pub fn events_in_range(&self, range: &DateRange) -> Vec<&EventRecord> {
        let mut events: Vec<&EventRecord> = self
            .events
            .values()
            .filter(|e| e.overlaps_range(range.lower(), range.upper()))
            .collect();
        sort_by_start(&mut events);
        events
    }

    /// Case-insensitive category lookup.
    pub fn events_by_category(&self, category: &str) -> Vec<&EventRecord> {
        self.lookup(&self.by_category, &category.to_lowercase())
    }

    pub fn events_by_location(&self, location: &str) -> Vec<&EventRecord> {
        self.lookup(&self.by_location, location)
    }

    fn lookup(&self, index: &HashMap<String, BTreeSet<String>>, key: &str) -> Vec<&EventRecord> {
        let mut events: Vec<&EventRecord> = index
            .get(key)
            .into_iter()
            .flatten()
            .filter_map(|id| self.events.get(id))
            .collect();
        sort_by_start(&mut events);
        events
    }

    fn next_free_id(&mut self) -> String {
        loop {
            self.next_id += 1;
            let id = format!("{}{}", GENERATED_ID_PREFIX, self.next_id);
            if !self.events.contains_key(&id) {
                return id;
            }
        }
    }

    fn index(&mut self, record: &EventRecord) {
        let id = record.id();
        self.by_date
            .entry(record.start().local.date())
            .or_default()
            .insert(id.to_string());
        for category in record.categories() {
            index_insert(&mut self.by_category, category.to_lowercase(), id);
        }
        if let Some(location) = record.location() {
            index_insert(&mut self.by_location, location.to_string(), id);
        }
    }

    fn unindex(&mut self, id: &str) {
        let Some(old) = self.events.get(id) else {
            return;
        };
        let date = old.start().local.date();
        let categories: Vec<String> = old.categories().iter().map(|c| c.to_lowercase()).collect();
        let location = old.location().map(str::to_string);

        index_remove(&mut self.by_date, &date, id);
        for category in &categories {
            index_remove(&mut self.by_category, category, id);
        }
        if let Some(location) = location {
            index_remove(&mut self.by_location, &location, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{RawEvent, normalize};
    use chrono::NaiveDateTime;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn record(raw: RawEvent) -> EventRecord {
        normalize(raw, "UTC", &TimezoneManager::new()).unwrap()
    }

    #[test]
    fn test_add_assigns_monotonic_ids() {
        let mut store = EventStore::new();
        let a = store
            .add(record(RawEvent::new("A", local(2025, 1, 1, 9, 0))), AddOptions::default())
            .unwrap();
        let b = store
            .add(record(RawEvent::new("B", local(2025, 1, 1, 10, 0))), AddOptions::default())
            .unwrap();

        assert_eq!(a, "evt-1");
        assert_eq!(b, "evt-2");
        assert_eq!(store.get(&a).unwrap().title(), "A");
    }

    #[test]
    fn test_generated_ids_skip_taken_ones() {
        let mut store = EventStore::new();
        store
            .add(
                record(RawEvent::new("Taken", local(2025, 1, 1, 9, 0)).with_id("evt-1")),
                AddOptions::default(),
            )
            .unwrap();
        let id = store
            .add(record(RawEvent::new("Fresh", local(2025, 1, 1, 9, 0))), AddOptions::default())
            .unwrap();
        assert_eq!(id, "evt-2");
    }

    #[test]
    fn test_duplicate_id_rejected_without_upsert() {
        let mut store = EventStore::new();
        let first = record(RawEvent::new("First", local(2025, 1, 1, 9, 0)).with_id("x"));
        let second = record(RawEvent::new("Second", local(2025, 1, 2, 9, 0)).with_id("x"));

        store.add(first, AddOptions::default()).unwrap();
        let err = store.add(second.clone(), AddOptions::default()).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateId(ref id) if id == "x"));
        assert_eq!(store.get("x").unwrap().title(), "First");

        store.add(second, AddOptions::upsert()).unwrap();
        assert_eq!(store.get("x").unwrap().title(), "Second");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_upsert_reindexes() {
        let tm = TimezoneManager::new();
        let mut store = EventStore::new();
        store
            .add(
                record(
                    RawEvent::new("Old", local(2025, 1, 1, 9, 0))
                        .with_id("x")
                        .with_categories(["work"])
                        .at_location("Room A"),
                ),
                AddOptions::default(),
            )
            .unwrap();
        store
            .add(
                record(
                    RawEvent::new("New", local(2025, 1, 3, 9, 0))
                        .with_id("x")
                        .with_categories(["home"]),
                ),
                AddOptions::upsert(),
            )
            .unwrap();

        assert!(store.events_by_category("work").is_empty());
        assert_eq!(store.events_by_category("HOME").len(), 1);
        assert!(store.events_by_location("Room A").is_empty());
        assert!(
            store
                .events_for_date(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), "UTC", &tm)
                .is_empty()
        );
        assert_eq!(
            store
                .events_for_date(NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(), "UTC", &tm)
                .len(),
            1
        );
    }

    #[test]
    fn test_remove_cleans_indices() {
        let mut store = EventStore::new();
        let id = store
            .add(
                record(
                    RawEvent::new("Gone", local(2025, 1, 1, 9, 0))
                        .with_categories(["x"])
                        .at_location("Zoom"),
                ),
                AddOptions::default(),
            )
            .unwrap();

        let removed = store.remove(&id).unwrap();
        assert_eq!(removed.title(), "Gone");
        assert!(store.is_empty());
        assert!(store.events_by_category("x").is_empty());
        assert!(store.events_by_location("Zoom").is_empty());
        assert!(store.by_date.is_empty());
        assert!(store.remove(&id).is_none());
    }

    #[test]
    fn test_all_events_sorted_by_start_then_id() {
        let mut store = EventStore::new();
        for (id, hour) in [("c", 9), ("a", 9), ("b", 8)] {
            store
                .add(
                    record(RawEvent::new(id, local(2025, 1, 1, hour, 0)).with_id(id)),
                    AddOptions::default(),
                )
                .unwrap();
        }
        let ids: Vec<&str> = store.all_events().iter().map(|e| e.id()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
    }

    #[test]
    fn test_events_for_date_is_zone_relative() {
        let tm = TimezoneManager::new();
        let mut store = EventStore::new();
        store
            .add(
                record(
                    RawEvent::new("Late", local(2024, 12, 24, 23, 30)).in_zone("America/New_York"),
                ),
                AddOptions::default(),
            )
            .unwrap();

        let dec24 = NaiveDate::from_ymd_opt(2024, 12, 24).unwrap();
        let dec25 = NaiveDate::from_ymd_opt(2024, 12, 25).unwrap();

        assert_eq!(store.events_for_date(dec24, "America/New_York", &tm).len(), 1);
        assert!(store.events_for_date(dec25, "America/New_York", &tm).is_empty());
        assert!(store.events_for_date(dec24, "UTC", &tm).is_empty());
        assert_eq!(store.events_for_date(dec25, "UTC", &tm).len(), 1);
    }

    #[test]
    fn test_revision_tracks_mutations() {
        let mut store = EventStore::new();
        assert_eq!(store.revision(), 0);
        let id = store
            .add(record(RawEvent::new("A", local(2025, 1, 1, 9, 0))), AddOptions::default())
            .unwrap();
        store.remove(&id);
        store.remove(&id);
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn test_version_is_per_store() {
        let mut store = EventStore::new();
        let before = store.version();
        assert_eq!(before, store.version());

        let other = EventStore::new();
        assert_eq!(other.revision(), 0);
        assert_ne!(EventStore::new().version(), other.version());

        store
            .add(record(RawEvent::new("A", local(2025, 1, 1, 9, 0))), AddOptions::default())
            .unwrap();
        assert_ne!(before, store.version());
        assert_eq!(store.version().revision(), 1);
    }

    #[test]
    fn test_update_requires_existing_record() {
        let mut store = EventStore::new();
        let err = store
            .update(record(RawEvent::new("Ghost", local(2025, 1, 1, 9, 0)).with_id("ghost")))
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }
}
