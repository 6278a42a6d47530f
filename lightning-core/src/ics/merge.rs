use std::fmt;

use serde::Serialize;

use crate::event::EventRecord;

/// What importing a candidate does to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeOutcome {
    Imported,
    Updated,
    Skipped,
}

impl fmt::Display for MergeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeOutcome::Imported => write!(f, "+"),
            MergeOutcome::Updated => write!(f, "~"),
            MergeOutcome::Skipped => write!(f, "="),
        }
    }
}

impl MergeOutcome {
    pub fn classify(existing: Option<&EventRecord>, candidate: &EventRecord) -> Self {
        match existing {
            None => MergeOutcome::Imported,
            Some(old) if old == candidate => MergeOutcome::Skipped,
            Some(_) => MergeOutcome::Updated,
        }
    }
}

/// A VEVENT that could not be merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportError {
    /// UID when known, otherwise the VEVENT's position.
    pub source: String,
    pub reason: String,
}

/// Everything an import did. Never an `Err`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportResult {
    pub imported: Vec<EventRecord>,
    pub updated: Vec<EventRecord>,
    pub skipped: Vec<EventRecord>,
    pub errors: Vec<ImportError>,
    /// Set when the import stopped early on request.
    pub cancelled: bool,
}

impl ImportResult {
    pub fn record(&mut self, outcome: MergeOutcome, record: EventRecord) {
        match outcome {
            MergeOutcome::Imported => self.imported.push(record),
            MergeOutcome::Updated => self.updated.push(record),
            MergeOutcome::Skipped => self.skipped.push(record),
        }
    }

    pub fn error(&mut self, source: impl Into<String>, reason: impl Into<String>) {
        self.errors.push(ImportError {
            source: source.into(),
            reason: reason.into(),
        });
    }

    /// Records that were processed, whatever their outcome.
    pub fn processed(&self) -> usize {
        self.imported.len() + self.updated.len() + self.skipped.len()
    }
}

impl fmt::Display for ImportResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} imported, {} updated, {} skipped, {} errors",
            self.imported.len(),
            self.updated.len(),
            self.skipped.len(),
            self.errors.len()
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}
