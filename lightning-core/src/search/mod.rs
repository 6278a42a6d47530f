//! Text search, filtering, suggestions and grouping over an `EventStore`.
//!
//! `EventSearch` never mutates the store. It keeps a text index tagged with
//! the store version it was built from; the first query after any mutation
//! rebuilds it.

mod field;
mod filter;
pub mod fuzzy;
mod group;
mod index;

use std::cell::RefCell;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::event::EventRecord;
use crate::store::EventStore;
use index::SearchIndex;

pub use field::EventField;
pub use filter::FilterSpec;
pub use group::{EventGroup, GroupOptions};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub fields: Vec<EventField>,
    pub fuzzy: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            fields: EventField::DEFAULT_SEARCH.to_vec(),
            fuzzy: false,
        }
    }
}

impl SearchOptions {
    pub fn fuzzy() -> Self {
        SearchOptions {
            fuzzy: true,
            ..Self::default()
        }
    }

    pub fn in_fields(mut self, fields: impl IntoIterator<Item = EventField>) -> Self {
        self.fields = fields.into_iter().collect();
        self
    }
}

#[derive(Debug, Default)]
pub struct EventSearch {
    index: RefCell<SearchIndex>,
}

impl EventSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records whose configured fields contain `query`.
    ///
    /// Exact mode is a case-insensitive substring test. Fuzzy mode also
    /// accepts records where every query token is within a few edits of
    /// some field token. An empty query matches everything.
    pub fn search<'s>(
        &self,
        store: &'s EventStore,
        query: &str,
        options: &SearchOptions,
    ) -> Vec<&'s EventRecord> {
        let ids = {
            let mut index = self.index.borrow_mut();
            if !index.is_fresh(store) {
                index.rebuild(store);
            }
            index.matching_ids(query, &options.fields, options.fuzzy)
        };

        tracing::debug!(query, fuzzy = options.fuzzy, hits = ids.len(), "Searched events");
        ids.iter().filter_map(|id| store.get(id)).collect()
    }

    /// Records passing every predicate in `spec`, ordered by start.
    pub fn filter<'s>(&self, store: &'s EventStore, spec: &FilterSpec) -> Vec<&'s EventRecord> {
        let candidates = match (&spec.categories, &spec.date_range) {
            (Some(categories), _) => {
                let mut seen = HashSet::new();
                let mut events: Vec<&EventRecord> = categories
                    .iter()
                    .flat_map(|c| store.events_by_category(c))
                    .filter(|e| seen.insert(e.id().to_string()))
                    .collect();
                events.sort_by(|a, b| {
                    a.start_utc()
                        .cmp(&b.start_utc())
                        .then_with(|| a.id().cmp(b.id()))
                });
                events
            }
            (None, Some(range)) => store.events_in_range(range),
            (None, None) => store.all_events(),
        };

        candidates.into_iter().filter(|e| spec.matches(e)).collect()
    }

    /// Records matching both the text query and the filter.
    pub fn advanced_search<'s>(
        &self,
        store: &'s EventStore,
        query: &str,
        options: &SearchOptions,
        spec: &FilterSpec,
    ) -> Vec<&'s EventRecord> {
        self.search(store, query, options)
            .into_iter()
            .filter(|e| spec.matches(e))
            .collect()
    }

    /// Up to `limit` distinct values of `field` starting with `prefix`, in first-seen order.
    pub fn suggestions(
        &self,
        store: &EventStore,
        prefix: &str,
        field: EventField,
        limit: usize,
    ) -> Vec<String> {
        let prefix = prefix.to_lowercase();
        let mut seen = HashSet::new();

        store
            .all_events()
            .into_iter()
            .flat_map(|e| field.values(e))
            .filter(|v| v.to_lowercase().starts_with(&prefix))
            .filter(|v| seen.insert(v.clone()))
            .take(limit)
            .collect()
    }

    /// Distinct values of `field` across the store. Multi-valued fields are flattened first.
    pub fn unique_values(&self, store: &EventStore, field: EventField) -> Vec<String> {
        let mut seen = HashSet::new();
        store
            .all_events()
            .into_iter()
            .flat_map(|e| field.values(e))
            .filter(|v| seen.insert(v.clone()))
            .collect()
    }

    /// Partition every record by `field`. Base order is by id.
    pub fn group_by<'s>(
        &self,
        store: &'s EventStore,
        field: EventField,
        options: GroupOptions,
    ) -> Vec<EventGroup<'s>> {
        let mut records = store.all_events();
        records.sort_by(|a, b| a.id().cmp(b.id()));
        group::group_records(records, field, options)
    }

    /// How many times the text index has been rebuilt.
    pub fn index_rebuilds(&self) -> u64 {
        self.index.borrow().rebuilds()
    }
}
