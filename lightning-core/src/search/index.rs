//! Per-record search text, rebuilt lazily from the store.

use std::collections::HashMap;

use super::field::EventField;
use super::fuzzy::{token_matches, tokenize};
use crate::event::EventRecord;
use crate::store::{EventStore, StoreVersion};

#[derive(Debug, Default)]
struct FieldText {
    lower: String,
    tokens: Vec<String>,
}

impl FieldText {
    fn new(text: &str) -> Self {
        FieldText {
            lower: text.to_lowercase(),
            tokens: tokenize(text),
        }
    }
}

#[derive(Debug)]
struct IndexEntry {
    id: String,
    fields: HashMap<EventField, FieldText>,
}

impl IndexEntry {
    fn build(record: &EventRecord) -> Self {
        let fields = EventField::ALL
            .iter()
            .map(|&field| (field, FieldText::new(&field.search_text(record))))
            .collect();
        IndexEntry {
            id: record.id().to_string(),
            fields,
        }
    }

    fn text(&self, field: EventField) -> Option<&FieldText> {
        self.fields.get(&field)
    }

    fn contains(&self, fields: &[EventField], needle: &str) -> bool {
        fields
            .iter()
            .filter_map(|&f| self.text(f))
            .any(|t| t.lower.contains(needle))
    }

    /// Every query token must match some token of some searched field.
    fn fuzzy_matches(&self, fields: &[EventField], query_tokens: &[String]) -> bool {
        query_tokens.iter().all(|q| {
            fields
                .iter()
                .filter_map(|&f| self.text(f))
                .flat_map(|t| t.tokens.iter())
                .any(|candidate| token_matches(q, candidate))
        })
    }
}

/// Snapshot of the store's searchable text, in store start order.
#[derive(Debug, Default)]
pub(crate) struct SearchIndex {
    built_for: Option<StoreVersion>,
    entries: Vec<IndexEntry>,
    rebuilds: u64,
}

impl SearchIndex {
    pub fn is_fresh(&self, store: &EventStore) -> bool {
        self.built_for.as_ref() == Some(&store.version())
    }

    pub fn rebuild(&mut self, store: &EventStore) {
        self.entries = store.all_events().into_iter().map(IndexEntry::build).collect();
        self.built_for = Some(store.version());
        self.rebuilds += 1;
        tracing::debug!(
            entries = self.entries.len(),
            revision = store.revision(),
            "Rebuilt search index"
        );
    }

    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Ids of matching records, in index order.
    pub fn matching_ids(&self, query: &str, fields: &[EventField], fuzzy: bool) -> Vec<String> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.entries.iter().map(|e| e.id.clone()).collect();
        }
        let query_tokens = tokenize(&needle);

        self.entries
            .iter()
            .filter(|entry| {
                entry.contains(fields, &needle)
                    || (fuzzy
                        && !query_tokens.is_empty()
                        && entry.fuzzy_matches(fields, &query_tokens))
            })
            .map(|entry| entry.id.clone())
            .collect()
    }
}
