//! Calendar data engine.
//!
//! Turns loosely-typed event input into canonical records and keeps them in
//! an indexed in-memory store. On top of the store it provides:
//! - timezone conversion with a bounded offset cache
//! - text search, filtering and grouping
//! - iCalendar export, validation and merge-import
//! - recurrence expansion and conflict detection
//!
//! [`Calendar`] ties these together and is the usual entry point.

pub mod calendar;
pub mod config;
pub mod conflict;
pub mod date_range;
pub mod error;
pub mod event;
pub mod ics;
pub mod recurrence;
pub mod search;
pub mod store;
pub mod timezone;

pub use calendar::{Calendar, CalendarStats};
pub use config::CalendarConfig;
pub use conflict::{Conflict, ConflictType, Severity, detect_conflicts};
pub use date_range::DateRange;
pub use error::{EngineError, EngineResult, ValidationError};
pub use event::{
    Attendee, DateInput, EventRecord, EventStatus, RawEvent, Reminder, ReminderMethod,
    ResponseStatus, normalize, normalize_json,
};
pub use ics::{ExportOptions, ImportControl, ImportResult, ValidationReport};
pub use recurrence::Occurrence;
pub use search::{EventField, EventGroup, EventSearch, FilterSpec, GroupOptions, SearchOptions};
pub use store::{AddOptions, EventStore};
pub use timezone::{TimezoneInfo, TimezoneManager};
