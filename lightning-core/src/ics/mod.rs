//! iCalendar (RFC 5545) export, validation and merge-import.
//!
//! Time values follow one convention in both directions. All-day records use
//! DATE values plus an `X-LIGHTNING-TZID` zone marker. Timed UTC records use
//! the `Z` suffix; any other zone is written with a TZID parameter. Floating
//! times, and DATE values without a marker, belong to the default zone on import.

mod generate;
mod import;
mod merge;
mod parse;
mod validate;

pub use generate::{DEFAULT_PRODUCT_ID, ExportOptions, export_ics};
pub use import::{ImportControl, import_ics};
pub use merge::{ImportError, ImportResult, MergeOutcome};
pub use validate::{ValidationReport, validate_ics};
