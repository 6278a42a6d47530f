//! Scheduling conflict detection.
//!
//! Exhaustive pairwise scan over the given records. Two records conflict when
//! their effective intervals overlap as half-open intervals, so back-to-back
//! events do not conflict. Sharing a non-empty location (compared exactly)
//! makes the conflict a high-severity location clash.

use serde::Serialize;

use crate::event::EventRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictType {
    Location,
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    #[serde(rename = "type")]
    pub kind: ConflictType,
    pub description: String,
    pub severity: Severity,
    pub event_ids: Vec<String>,
}

fn overlaps(a: &EventRecord, b: &EventRecord) -> bool {
    let (start_a, end_a) = a.effective_interval();
    let (start_b, end_b) = b.effective_interval();
    start_a < end_b && start_b < end_a
}

fn shared_location<'a>(a: &'a EventRecord, b: &EventRecord) -> Option<&'a str> {
    match (a.location(), b.location()) {
        (Some(la), Some(lb)) if !la.is_empty() && la == lb => Some(la),
        _ => None,
    }
}

/// Every conflicting pair, in input order (`i < j`).
pub fn detect_conflicts(records: &[&EventRecord]) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    for (i, a) in records.iter().enumerate() {
        for b in &records[i + 1..] {
            if !overlaps(a, b) {
                continue;
            }

            let conflict = match shared_location(a, b) {
                Some(location) => Conflict {
                    kind: ConflictType::Location,
                    description: format!("{} and {} both in {}", a.title(), b.title(), location),
                    severity: Severity::High,
                    event_ids: vec![a.id().to_string(), b.id().to_string()],
                },
                None => Conflict {
                    kind: ConflictType::Time,
                    description: format!("{} overlaps with {}", a.title(), b.title()),
                    severity: Severity::Medium,
                    event_ids: vec![a.id().to_string(), b.id().to_string()],
                },
            };
            conflicts.push(conflict);
        }
    }

    tracing::debug!(
        records = records.len(),
        conflicts = conflicts.len(),
        "Detected conflicts"
    );
    conflicts
}
