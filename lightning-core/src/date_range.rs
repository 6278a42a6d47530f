//! Date range for filtering events.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::error::ValidationError;
use crate::timezone::TimezoneManager;

/// Half-open UTC interval `[from, to)`.
/// None values mean unbounded in that direction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        DateRange {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Whole local days `from..=to` in `zone`.
    pub fn local_days(
        from: NaiveDate,
        to: NaiveDate,
        zone: &str,
        timezones: &TimezoneManager,
    ) -> Self {
        let start = timezones.local_to_utc(from.and_time(NaiveTime::MIN), zone);
        let end = timezones.local_to_utc((to + Duration::days(1)).and_time(NaiveTime::MIN), zone);
        Self::new(start, end)
    }

    /// Parse date strings into a DateRange.
    /// - `from`: "start" or missing for unbounded, or YYYY-MM-DD
    /// - `to`: "end" or missing for unbounded, or YYYY-MM-DD (inclusive day)
    pub fn from_args(
        from: Option<&str>,
        to: Option<&str>,
        zone: &str,
        timezones: &TimezoneManager,
    ) -> Result<Self, ValidationError> {
        let from_dt = match from {
            None | Some("start") => None,
            Some(s) => {
                let day = parse_date(s)?;
                Some(timezones.local_to_utc(day.and_time(NaiveTime::MIN), zone))
            }
        };

        let to_dt = match to {
            None | Some("end") => None,
            Some(s) => {
                let day = parse_date(s)? + Duration::days(1);
                Some(timezones.local_to_utc(day.and_time(NaiveTime::MIN), zone))
            }
        };

        Ok(DateRange {
            from: from_dt,
            to: to_dt,
        })
    }

    pub fn lower(&self) -> DateTime<Utc> {
        self.from.unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn upper(&self) -> DateTime<Utc> {
        self.to.unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.lower() <= instant && instant < self.upper()
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(format!("'{}' (expected YYYY-MM-DD)", s)))
}
