//! Timezone conversion, offset and DST utilities.
//!
//! Every operation takes its zone explicitly. Unknown identifiers never fail:
//! they resolve to UTC and emit a warning so rendering and search keep working.

mod cache;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use thiserror::Error;

pub use cache::{CacheStats, DEFAULT_CACHE_CAPACITY, OffsetEntry};
use cache::OffsetCache;

/// Zones offered to pickers, with a human label.
const COMMON_TIMEZONES: &[(&str, &str)] = &[
    ("UTC", "Coordinated Universal Time"),
    ("America/New_York", "Eastern Time (New York)"),
    ("America/Chicago", "Central Time (Chicago)"),
    ("America/Denver", "Mountain Time (Denver)"),
    ("America/Los_Angeles", "Pacific Time (Los Angeles)"),
    ("America/Anchorage", "Alaska Time (Anchorage)"),
    ("Pacific/Honolulu", "Hawaii Time (Honolulu)"),
    ("America/Sao_Paulo", "Brasilia Time (Sao Paulo)"),
    ("Europe/London", "London"),
    ("Europe/Paris", "Paris"),
    ("Europe/Berlin", "Berlin"),
    ("Europe/Moscow", "Moscow"),
    ("Asia/Dubai", "Dubai"),
    ("Asia/Kolkata", "India (Kolkata)"),
    ("Asia/Singapore", "Singapore"),
    ("Asia/Shanghai", "China (Shanghai)"),
    ("Asia/Tokyo", "Tokyo"),
    ("Australia/Sydney", "Sydney"),
    ("Pacific/Auckland", "Auckland"),
];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimezoneError {
    #[error("Unknown timezone: {0}")]
    Unknown(String),
}

/// A selectable zone with its current offset rendered as `UTC±HH:MM`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimezoneInfo {
    pub id: String,
    pub label: String,
    pub offset: String,
}

pub struct TimezoneManager {
    cache: OffsetCache,
}

impl fmt::Debug for TimezoneManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimezoneManager")
            .field("cache", &self.cache.stats())
            .finish()
    }
}

impl TimezoneManager {
    pub fn new() -> Self {
        Self::with_cache_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_cache_capacity(capacity: usize) -> Self {
        TimezoneManager {
            cache: OffsetCache::new(capacity),
        }
    }

    /// Strictly parse an IANA identifier.
    ///
    /// Accepts the `/mozilla.org/` style prefixes some calendar clients emit.
    pub fn parse_zone(zone: &str) -> Result<Tz, TimezoneError> {
        let trimmed = zone.trim();
        let stripped = trimmed
            .strip_prefix("/mozilla.org/")
            .or_else(|| trimmed.strip_prefix("/softwarestudio.org/"))
            .unwrap_or(trimmed);

        Tz::from_str(stripped).map_err(|_| TimezoneError::Unknown(zone.to_string()))
    }

    pub fn is_valid_zone(zone: &str) -> bool {
        Self::parse_zone(zone).is_ok()
    }

    /// Resolve a zone leniently: unknown identifiers fall back to UTC with a warning.
    pub fn resolve(&self, zone: &str) -> Tz {
        match Self::parse_zone(zone) {
            Ok(tz) => tz,
            Err(err) => {
                tracing::warn!(zone = %zone, error = %err, "Falling back to UTC");
                Tz::UTC
            }
        }
    }

    /// Interpret a wall-clock value as local time in `zone`.
    pub fn local_to_utc(&self, local: NaiveDateTime, zone: &str) -> DateTime<Utc> {
        resolve_local(self.resolve(zone), local)
    }

    /// Wall-clock rendering of an instant in `zone`.
    pub fn utc_to_local(&self, instant: DateTime<Utc>, zone: &str) -> NaiveDateTime {
        instant.with_timezone(&self.resolve(zone)).naive_local()
    }

    /// Render an instant's wall clock in `to_zone`.
    ///
    /// The instant is zone-independent; an unknown `from_zone` is only logged.
    pub fn convert_timezone(
        &self,
        instant: DateTime<Utc>,
        from_zone: &str,
        to_zone: &str,
    ) -> NaiveDateTime {
        if let Err(err) = Self::parse_zone(from_zone) {
            tracing::warn!(zone = %from_zone, error = %err, "Unknown source timezone");
        }
        self.utc_to_local(instant, to_zone)
    }

    fn offset_entry(&self, instant: DateTime<Utc>, zone: &str) -> OffsetEntry {
        let tz = self.resolve(zone);
        let minute = instant.timestamp().div_euclid(60);

        self.cache.get_or_compute(tz.name(), minute, || {
            let at = DateTime::from_timestamp(minute * 60, 0).unwrap_or(instant);
            let offset_minutes = offset_minutes_at(tz, at);
            OffsetEntry {
                offset_minutes,
                dst: offset_minutes != standard_offset_minutes(tz, at.year()),
            }
        })
    }

    /// Signed minutes east of UTC for `zone` at `instant`.
    pub fn timezone_offset(&self, instant: DateTime<Utc>, zone: &str) -> i32 {
        self.offset_entry(instant, zone).offset_minutes
    }

    /// True when the zone's offset at `instant` differs from its winter (standard) offset.
    ///
    /// The standard offset is the smaller of the zone's January and July offsets,
    /// so zones whose tz data encodes a negative DST (Europe/Dublin) read the same
    /// way as everyone else.
    pub fn is_dst(&self, instant: DateTime<Utc>, zone: &str) -> bool {
        self.offset_entry(instant, zone).dst
    }

    /// Hours to add to a wall clock in `zone_a` to get the wall clock in `zone_b` at `instant`.
    pub fn timezone_difference_at(
        &self,
        zone_a: &str,
        zone_b: &str,
        instant: DateTime<Utc>,
    ) -> f64 {
        let a = self.timezone_offset(instant, zone_a);
        let b = self.timezone_offset(instant, zone_b);
        f64::from(b - a) / 60.0
    }

    /// `timezone_difference_at` evaluated now.
    pub fn timezone_difference(&self, zone_a: &str, zone_b: &str) -> f64 {
        self.timezone_difference_at(zone_a, zone_b, Utc::now())
    }

    /// `YYYY-MM-DD HH:MM:SS ABBR` in `zone`.
    pub fn format_in_timezone(&self, instant: DateTime<Utc>, zone: &str) -> String {
        instant
            .with_timezone(&self.resolve(zone))
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string()
    }

    pub fn common_timezones(&self, instant: DateTime<Utc>) -> Vec<TimezoneInfo> {
        COMMON_TIMEZONES
            .iter()
            .map(|(id, label)| TimezoneInfo {
                id: id.to_string(),
                label: label.to_string(),
                offset: format_offset(self.timezone_offset(instant, id)),
            })
            .collect()
    }

    /// The host's IANA zone, or UTC when it cannot be determined.
    pub fn system_timezone() -> String {
        match iana_time_zone::get_timezone() {
            Ok(zone) if Self::is_valid_zone(&zone) => zone,
            Ok(zone) => {
                tracing::warn!(zone = %zone, "System timezone is not a known IANA zone");
                "UTC".to_string()
            }
            Err(err) => {
                tracing::warn!(error = %err, "Could not determine system timezone");
                "UTC".to_string()
            }
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl Default for TimezoneManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a wall clock in `tz` to its instant.
///
/// Times inside a spring-forward gap move forward one hour; times repeated
/// by a fall-back transition resolve to the earlier instant.
pub fn resolve_local(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            tracing::warn!(%local, zone = %tz.name(), "Local time falls in a DST gap, shifting forward");
            tz.from_local_datetime(&(local + Duration::hours(1)))
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| local.and_utc())
        }
    }
}

fn offset_minutes_at(tz: Tz, instant: DateTime<Utc>) -> i32 {
    tz.offset_from_utc_datetime(&instant.naive_utc())
        .fix()
        .local_minus_utc()
        / 60
}

/// The zone's winter offset in `year`: the smaller of its January and July offsets.
fn standard_offset_minutes(tz: Tz, year: i32) -> i32 {
    [1, 7]
        .into_iter()
        .filter_map(|month| Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single())
        .map(|first_of_month| offset_minutes_at(tz, first_of_month))
        .min()
        .unwrap_or(0)
}

/// Render minutes east of UTC as `UTC±HH:MM`.
pub fn format_offset(offset_minutes: i32) -> String {
    let sign = if offset_minutes < 0 { '-' } else { '+' };
    let abs = offset_minutes.abs();
    format!("UTC{}{:02}:{:02}", sign, abs / 60, abs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_new_york_offset_changes_with_dst() {
        let tm = TimezoneManager::new();
        let summer = utc(2024, 7, 15, 12, 0);
        let winter = utc(2024, 12, 15, 12, 0);

        assert_eq!(tm.timezone_offset(summer, "America/New_York"), -240);
        assert_eq!(tm.timezone_offset(winter, "America/New_York"), -300);
        assert!(tm.is_dst(summer, "America/New_York"));
        assert!(!tm.is_dst(winter, "America/New_York"));
    }

    #[test]
    fn test_southern_hemisphere_dst() {
        let tm = TimezoneManager::new();
        assert!(tm.is_dst(utc(2024, 1, 15, 0, 0), "Australia/Sydney"));
        assert!(!tm.is_dst(utc(2024, 7, 15, 0, 0), "Australia/Sydney"));
    }

    #[test]
    fn test_negative_dst_zone_reads_summer_as_dst() {
        let tm = TimezoneManager::new();
        let january = utc(2025, 1, 15, 12, 0);
        let july = utc(2025, 7, 15, 12, 0);

        assert_eq!(tm.timezone_offset(january, "Europe/Dublin"), 0);
        assert_eq!(tm.timezone_offset(july, "Europe/Dublin"), 60);
        assert!(!tm.is_dst(january, "Europe/Dublin"));
        assert!(tm.is_dst(july, "Europe/Dublin"));
    }

    #[test]
    fn test_zone_without_dst_is_never_dst() {
        let tm = TimezoneManager::new();
        assert!(!tm.is_dst(utc(2025, 1, 15, 12, 0), "Asia/Tokyo"));
        assert!(!tm.is_dst(utc(2025, 7, 15, 12, 0), "Asia/Tokyo"));
        assert!(!tm.is_dst(utc(2025, 7, 15, 12, 0), "UTC"));
    }

    #[test]
    fn test_convert_timezone_renders_same_instant() {
        let tm = TimezoneManager::new();
        let instant = utc(2024, 12, 24, 15, 30);

        assert_eq!(
            tm.convert_timezone(instant, "UTC", "America/New_York"),
            local(2024, 12, 24, 10, 30)
        );
        assert_eq!(
            tm.convert_timezone(instant, "America/New_York", "Asia/Tokyo"),
            local(2024, 12, 25, 0, 30)
        );
    }

    #[test]
    fn test_local_to_utc_round_trips() {
        let tm = TimezoneManager::new();
        let wall = local(2024, 12, 24, 23, 30);
        let instant = tm.local_to_utc(wall, "America/New_York");

        assert_eq!(instant, utc(2024, 12, 25, 4, 30));
        assert_eq!(tm.utc_to_local(instant, "America/New_York"), wall);
    }

    #[test]
    fn test_dst_gap_shifts_forward() {
        let tm = TimezoneManager::new();
        // 02:30 does not exist on 2024-03-10 in New York
        let instant = tm.local_to_utc(local(2024, 3, 10, 2, 30), "America/New_York");
        assert_eq!(instant, utc(2024, 3, 10, 7, 30));
    }

    #[test]
    fn test_dst_fold_picks_earlier_instant() {
        let tm = TimezoneManager::new();
        // 01:30 happens twice on 2024-11-03 in New York
        let instant = tm.local_to_utc(local(2024, 11, 3, 1, 30), "America/New_York");
        assert_eq!(instant, utc(2024, 11, 3, 5, 30));
    }

    #[test]
    fn test_unknown_zone_falls_back_to_utc() {
        let tm = TimezoneManager::new();
        let instant = utc(2024, 7, 1, 12, 0);

        assert_eq!(tm.resolve("Mars/Olympus_Mons"), Tz::UTC);
        assert_eq!(tm.timezone_offset(instant, "Mars/Olympus_Mons"), 0);
        assert!(TimezoneManager::parse_zone("Mars/Olympus_Mons").is_err());
    }

    #[test]
    fn test_mozilla_prefix_is_accepted() {
        assert_eq!(
            TimezoneManager::parse_zone("/mozilla.org/Europe/London"),
            Ok(Tz::Europe__London)
        );
    }

    #[test]
    fn test_timezone_difference() {
        let tm = TimezoneManager::new();
        let instant = utc(2024, 12, 1, 12, 0);

        assert_eq!(
            tm.timezone_difference_at("America/New_York", "America/Los_Angeles", instant),
            -3.0
        );
        assert_eq!(
            tm.timezone_difference_at("UTC", "Asia/Kolkata", instant),
            5.5
        );
    }

    #[test]
    fn test_format_in_timezone() {
        let tm = TimezoneManager::new();
        let instant = utc(2024, 12, 24, 15, 30);

        assert_eq!(
            tm.format_in_timezone(instant, "America/New_York"),
            "2024-12-24 10:30:00 EST"
        );
        assert_eq!(
            tm.format_in_timezone(instant, "Asia/Tokyo"),
            "2024-12-25 00:30:00 JST"
        );
    }

    #[test]
    fn test_common_timezones_have_offsets() {
        let tm = TimezoneManager::new();
        let zones = tm.common_timezones(utc(2024, 12, 1, 0, 0));

        let ny = zones
            .iter()
            .find(|z| z.id == "America/New_York")
            .expect("New York should be listed");
        assert_eq!(ny.offset, "UTC-05:00");

        let kolkata = zones.iter().find(|z| z.id == "Asia/Kolkata").unwrap();
        assert_eq!(kolkata.offset, "UTC+05:30");
    }

    #[test]
    fn test_repeated_lookups_hit_cache() {
        let tm = TimezoneManager::new();
        let instant = utc(2024, 7, 15, 12, 0);
        for _ in 0..10 {
            tm.timezone_offset(instant, "Europe/Paris");
        }
        let stats = tm.cache_stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 9);
    }
}
