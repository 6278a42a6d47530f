//! Structural checks on ICS text.

use serde::Serialize;

use super::parse::{content_lines, parse_ics_datetime};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// False when the envelope is broken or an event lacks UID or a usable DTSTART.
    pub valid: bool,
    pub warnings: Vec<String>,
}

#[derive(Default)]
struct EventFacts {
    begin_line: usize,
    uid: bool,
    dtstart: bool,
}

/// Check BEGIN/END balance and the required VEVENT properties.
///
/// Never fails; every problem becomes a warning. Missing SUMMARY or an
/// empty calendar are reported without invalidating the document.
pub fn validate_ics(content: &str) -> ValidationReport {
    let mut warnings = Vec::new();
    let mut valid = true;
    let mut stack: Vec<(String, usize)> = Vec::new();
    let mut event: Option<EventFacts> = None;
    let mut saw_calendar = false;
    let mut event_count = 0usize;
    let mut has_summary = false;

    for (idx, line) in content_lines(content).iter().enumerate() {
        let line_no = idx + 1;
        let (head, value) = match line.split_once(':') {
            Some(parts) => parts,
            None => {
                warnings.push(format!("Line {}: not a content line: '{}'", line_no, line));
                continue;
            }
        };
        let name = head
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_uppercase();
        let value = value.trim();

        match name.as_str() {
            "BEGIN" => {
                let component = value.to_ascii_uppercase();
                if component == "VCALENDAR" {
                    saw_calendar = true;
                }
                if component == "VEVENT" {
                    event = Some(EventFacts {
                        begin_line: line_no,
                        ..EventFacts::default()
                    });
                    has_summary = false;
                }
                stack.push((component, line_no));
            }
            "END" => {
                let component = value.to_ascii_uppercase();
                match stack.pop() {
                    Some((open, _)) if open == component => {}
                    Some((open, open_line)) => {
                        valid = false;
                        warnings.push(format!(
                            "Line {}: END:{} does not close BEGIN:{} from line {}",
                            line_no, component, open, open_line
                        ));
                    }
                    None => {
                        valid = false;
                        warnings.push(format!(
                            "Line {}: END:{} without matching BEGIN",
                            line_no, component
                        ));
                    }
                }
                if component == "VEVENT" {
                    if let Some(facts) = event.take() {
                        event_count += 1;
                        valid &= check_event(&facts, has_summary, &mut warnings);
                    }
                }
            }
            "UID" if in_event_body(&stack) => {
                if let Some(facts) = event.as_mut() {
                    facts.uid = !value.is_empty();
                }
            }
            "SUMMARY" if in_event_body(&stack) => has_summary = true,
            "DTSTART" if in_event_body(&stack) => {
                if parse_ics_datetime(value).is_some() {
                    if let Some(facts) = event.as_mut() {
                        facts.dtstart = true;
                    }
                } else {
                    warnings.push(format!(
                        "Line {}: DTSTART value '{}' is not a date or date-time",
                        line_no, value
                    ));
                }
            }
            _ => {}
        }
    }

    for (open, line_no) in stack {
        valid = false;
        warnings.push(format!("BEGIN:{} on line {} is never closed", open, line_no));
    }

    if !saw_calendar {
        valid = false;
        warnings.push("No VCALENDAR component".to_string());
    } else if event_count == 0 {
        warnings.push("Calendar contains no events".to_string());
    }

    ValidationReport { valid, warnings }
}

/// Directly inside a VEVENT, not in one of its alarms.
fn in_event_body(stack: &[(String, usize)]) -> bool {
    stack.last().is_some_and(|(c, _)| c == "VEVENT")
}

fn check_event(facts: &EventFacts, has_summary: bool, warnings: &mut Vec<String>) -> bool {
    let mut ok = true;
    if !facts.uid {
        ok = false;
        warnings.push(format!("VEVENT at line {} has no UID", facts.begin_line));
    }
    if !facts.dtstart {
        ok = false;
        warnings.push(format!(
            "VEVENT at line {} has no valid DTSTART",
            facts.begin_line
        ));
    }
    if !has_summary {
        warnings.push(format!("VEVENT at line {} has no SUMMARY", facts.begin_line));
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:TEST\r\n\
BEGIN:VEVENT\r\n\
UID:one\r\n\
DTSTART;TZID=America/New_York:20250115T090000\r\n\
SUMMARY:Standup\r\n\
BEGIN:VALARM\r\n\
TRIGGER:-PT5M\r\n\
END:VALARM\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    #[test]
    fn test_well_formed_document_is_valid() {
        let report = validate_ics(GOOD);
        assert!(report.valid, "{:?}", report.warnings);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_unbalanced_components() {
        let report = validate_ics("BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:x\r\nDTSTART:20250101\r\nEND:VCALENDAR\r\n");
        assert!(!report.valid);
        assert!(report.warnings.iter().any(|w| w.contains("does not close")));
        assert!(report.warnings.iter().any(|w| w.contains("never closed")));
    }

    #[test]
    fn test_missing_uid_and_bad_dtstart() {
        let report = validate_ics(
            "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nSUMMARY:x\r\nDTSTART:soon\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n",
        );
        assert!(!report.valid);
        assert!(report.warnings.iter().any(|w| w.contains("no UID")));
        assert!(report.warnings.iter().any(|w| w.contains("'soon'")));
        assert!(report.warnings.iter().any(|w| w.contains("no valid DTSTART")));
    }

    #[test]
    fn test_soft_warnings_keep_document_valid() {
        let report = validate_ics("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nEND:VCALENDAR\r\n");
        assert!(report.valid);
        assert_eq!(report.warnings, ["Calendar contains no events"]);
    }

    #[test]
    fn test_garbage_is_invalid_without_panicking() {
        let report = validate_ics("this is not a calendar");
        assert!(!report.valid);
        assert!(!report.warnings.is_empty());
    }
}
