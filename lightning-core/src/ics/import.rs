//! Merge-import of ICS text into a store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::merge::{ImportResult, MergeOutcome};
use super::parse::{parse_vevent, split_vevents};
use crate::store::{AddOptions, EventStore};
use crate::timezone::TimezoneManager;

/// Cancellation handle for a running import. Clones share one flag.
#[derive(Debug, Clone, Default)]
pub struct ImportControl {
    cancelled: Arc<AtomicBool>,
}

impl ImportControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the import to stop before its next event.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Parse `content` and merge each VEVENT into `store` on its own.
///
/// A VEVENT that fails to parse or normalize lands in `errors` and leaves the
/// store untouched. The task yields after every merge and checks `control`
/// before the next one, so a cancelled import keeps everything merged so far.
#[tracing::instrument(skip_all, fields(bytes = content.len()))]
pub async fn import_ics(
    store: &mut EventStore,
    content: &str,
    default_zone: &str,
    timezones: &TimezoneManager,
    control: &ImportControl,
) -> ImportResult {
    let mut result = ImportResult::default();

    if !content.to_ascii_uppercase().contains("BEGIN:VCALENDAR") {
        result.error("document", "no VCALENDAR component");
        return result;
    }

    let blocks = split_vevents(content);
    tracing::debug!(events = blocks.len(), "Importing calendar");

    for block in blocks {
        if control.is_cancelled() {
            tracing::debug!(remaining_from = block.position, "Import cancelled");
            result.cancelled = true;
            break;
        }

        match parse_vevent(&block, default_zone, timezones) {
            Ok(candidate) => {
                let outcome = MergeOutcome::classify(store.get(candidate.id()), &candidate);
                if outcome != MergeOutcome::Skipped {
                    if let Err(e) = store.add(candidate.clone(), AddOptions::upsert()) {
                        result.error(block.source(), e.to_string());
                        continue;
                    }
                }
                tracing::trace!(id = candidate.id(), %outcome, "Merged event");
                result.record(outcome, candidate);
            }
            Err(reason) => {
                tracing::warn!(source = %block.source(), %reason, "Skipping VEVENT");
                result.error(block.source(), reason);
            }
        }

        tokio::task::yield_now().await;
    }

    tracing::debug!(summary = %result, "Import finished");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//External Calendar//EN\r\n\
BEGIN:VEVENT\r\n\
UID:one\r\n\
DTSTART:20250130T140000Z\r\n\
DTEND:20250130T150000Z\r\n\
SUMMARY:First\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
SUMMARY:No uid\r\n\
DTSTART:20250131T140000Z\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:three\r\n\
DTSTART:20250201T140000Z\r\n\
SUMMARY:Third\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    async fn import(store: &mut EventStore, content: &str, control: &ImportControl) -> ImportResult {
        import_ics(store, content, "UTC", &TimezoneManager::new(), control).await
    }

    #[test_log::test(tokio::test)]
    async fn test_bad_event_does_not_stop_the_rest() {
        let mut store = EventStore::new();
        let result = import(&mut store, FEED, &ImportControl::new()).await;

        assert_eq!(result.imported.len(), 2);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].source, "VEVENT #2");
        assert_eq!(result.errors[0].reason, "missing UID");
        assert!(store.contains("one"));
        assert!(store.contains("three"));
        assert_eq!(store.len(), 2);
    }

    #[test_log::test(tokio::test)]
    async fn test_second_import_skips_everything() {
        let mut store = EventStore::new();
        import(&mut store, FEED, &ImportControl::new()).await;
        let revision = store.revision();

        let again = import(&mut store, FEED, &ImportControl::new()).await;
        assert_eq!(again.skipped.len(), 2);
        assert!(again.imported.is_empty());
        assert!(again.updated.is_empty());
        assert_eq!(store.revision(), revision);
    }

    #[test_log::test(tokio::test)]
    async fn test_changed_content_updates() {
        let mut store = EventStore::new();
        import(&mut store, FEED, &ImportControl::new()).await;

        let changed = FEED.replace("SUMMARY:First", "SUMMARY:First (moved)");
        let result = import(&mut store, &changed, &ImportControl::new()).await;

        assert_eq!(result.updated.len(), 1);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(store.get("one").unwrap().title(), "First (moved)");
    }

    #[test_log::test(tokio::test)]
    async fn test_cancel_before_start_merges_nothing() {
        let mut store = EventStore::new();
        let control = ImportControl::new();
        control.cancel();

        let result = import(&mut store, FEED, &control).await;
        assert!(result.cancelled);
        assert_eq!(result.processed(), 0);
        assert!(store.is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_cancel_between_events_keeps_completed_merges() {
        let mut store = EventStore::new();
        let control = ImportControl::new();
        let canceller = control.clone();

        let (result, ()) = tokio::join!(import(&mut store, FEED, &control), async move {
            canceller.cancel();
        });

        assert!(result.cancelled);
        assert_eq!(result.imported.len(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.contains("one"));
    }

    #[test_log::test(tokio::test)]
    async fn test_not_a_calendar() {
        let mut store = EventStore::new();
        let result = import(&mut store, "hello", &ImportControl::new()).await;
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].source, "document");
    }
}
