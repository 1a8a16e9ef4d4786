//! Five-field calendar expressions ("minute hour day-of-month month
//! day-of-week") evaluated in a named time zone.
//!
//! Matching is computed in the zone's local wall-clock time and converted
//! back to the absolute timeline, so DST transitions behave as users
//! expect: a local time skipped by spring-forward yields the next valid
//! match, and a local time that occurs twice on fall-back fires on the
//! first occurrence.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;

use crate::error::{Error, Result};

const FIELD_NAMES: [&str; 5] = ["minute", "hour", "day-of-month", "month", "day-of-week"];

/// Parses calendar expressions and yields upcoming instants
#[derive(Debug, Clone, Copy, Default)]
pub struct CalendarEngine;

impl CalendarEngine {
    pub fn new() -> Self {
        Self
    }

    /// Check an expression, naming the offending field on error
    pub fn validate(&self, expression: &str) -> Result<()> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(Error::invalid_schedule(format!(
                "expected 5 fields (minute hour day-of-month month day-of-week), got {}",
                fields.len()
            )));
        }

        // Probe each field in isolation so the error names the bad one
        for (idx, field) in fields.iter().copied().enumerate() {
            let mut probe = ["*"; 5];
            probe[idx] = field;
            if Schedule::from_str(&normalize(&probe.join(" "))).is_err() {
                return Err(Error::invalid_schedule(format!(
                    "invalid {} field: {}",
                    FIELD_NAMES[idx], field
                )));
            }
        }

        // Full parse catches anything the per-field probes cannot
        Schedule::from_str(&normalize(expression))
            .map_err(|e| Error::invalid_schedule(e.to_string()))?;

        Ok(())
    }

    /// Parse an IANA zone name
    pub fn parse_timezone(&self, zone: &str) -> Result<Tz> {
        zone.parse::<Tz>()
            .map_err(|_| Error::invalid_schedule(format!("unknown timezone: {}", zone)))
    }

    /// Earliest instant strictly after `after` whose wall-clock fields in
    /// `zone` match the expression. Returns None when the expression has
    /// no future match.
    pub fn next(
        &self,
        expression: &str,
        zone: &str,
        after: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        let schedule = Schedule::from_str(&normalize(expression))
            .map_err(|e| Error::invalid_schedule(e.to_string()))?;
        let tz = self.parse_timezone(zone)?;

        let reference = after.with_timezone(&tz);
        Ok(schedule
            .after(&reference)
            .next()
            .map(|dt| dt.with_timezone(&Utc)))
    }
}

/// The underlying parser wants a seconds field; pin it to zero so a
/// 5-field expression fires at most once per minute.
fn normalize(expression: &str) -> String {
    format!("0 {}", expression.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_validate_accepts_common_forms() {
        let engine = CalendarEngine::new();
        for expr in [
            "*/5 * * * *",
            "0 0 * * *",
            "15 2,14 * * 1-5",
            "0 9 1 */3 *",
        ] {
            assert!(engine.validate(expr).is_ok(), "expected ok: {}", expr);
        }
    }

    #[test]
    fn test_validate_field_count() {
        let engine = CalendarEngine::new();
        let err = engine.validate("* * * *").unwrap_err();
        assert!(err.to_string().contains("5 fields"), "{}", err);

        assert!(engine.validate("* * * * * *").is_err());
    }

    #[test]
    fn test_validate_names_offending_field() {
        let engine = CalendarEngine::new();
        let err = engine.validate("99 * * * *").unwrap_err();
        assert!(err.to_string().contains("minute"), "{}", err);

        let err = engine.validate("* 25 * * *").unwrap_err();
        assert!(err.to_string().contains("hour"), "{}", err);

        let err = engine.validate("* * * 13 *").unwrap_err();
        assert!(err.to_string().contains("month"), "{}", err);
    }

    #[test]
    fn test_next_strictly_after_reference() {
        let engine = CalendarEngine::new();

        // Reference exactly on a match still yields the following one
        let next = engine
            .next("*/5 * * * *", "UTC", utc(2024, 1, 1, 0, 0, 0))
            .unwrap()
            .unwrap();
        assert_eq!(next, utc(2024, 1, 1, 0, 5, 0));

        let next = engine
            .next("*/5 * * * *", "UTC", utc(2024, 1, 1, 0, 5, 0))
            .unwrap()
            .unwrap();
        assert_eq!(next, utc(2024, 1, 1, 0, 10, 0));
    }

    #[test]
    fn test_next_from_mid_interval() {
        let engine = CalendarEngine::new();
        // Resuming at 00:07 lands on the 00:10 fire
        let next = engine
            .next("*/5 * * * *", "UTC", utc(2024, 1, 1, 0, 7, 0))
            .unwrap()
            .unwrap();
        assert_eq!(next, utc(2024, 1, 1, 0, 10, 0));
    }

    #[test]
    fn test_next_in_zone_matches_local_wall_clock() {
        let engine = CalendarEngine::new();
        // 09:00 New York in January is 14:00 UTC (EST, UTC-5)
        let next = engine
            .next("0 9 * * *", "America/New_York", utc(2024, 1, 15, 0, 0, 0))
            .unwrap()
            .unwrap();
        assert_eq!(next, utc(2024, 1, 15, 14, 0, 0));

        // Same wall-clock in July is 13:00 UTC (EDT, UTC-4)
        let next = engine
            .next("0 9 * * *", "America/New_York", utc(2024, 7, 15, 0, 0, 0))
            .unwrap()
            .unwrap();
        assert_eq!(next, utc(2024, 7, 15, 13, 0, 0));
    }

    #[test]
    fn test_spring_forward_skips_to_valid_match() {
        let engine = CalendarEngine::new();
        // 2024-03-10 02:30 does not exist in America/New_York; the daily
        // 02:30 job must not fire at a phantom local time
        let next = engine
            .next("30 2 * * *", "America/New_York", utc(2024, 3, 10, 0, 0, 0))
            .unwrap()
            .unwrap();
        let local = next.with_timezone(&"America/New_York".parse::<Tz>().unwrap());
        assert_eq!(local.format("%H:%M").to_string(), "02:30");
        // Next valid 02:30 wall-clock is on March 11
        assert_eq!(local.format("%Y-%m-%d").to_string(), "2024-03-11");
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        let engine = CalendarEngine::new();
        let err = engine
            .next("*/5 * * * *", "Mars/Olympus", utc(2024, 1, 1, 0, 0, 0))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchedule(_)));
    }

    #[test]
    fn test_round_trip_local_fields() {
        let engine = CalendarEngine::new();
        let next = engine
            .next("15 2,14 * * *", "Europe/Berlin", utc(2024, 6, 1, 0, 0, 0))
            .unwrap()
            .unwrap();
        let local = next.with_timezone(&"Europe/Berlin".parse::<Tz>().unwrap());
        assert_eq!(local.format("%M").to_string(), "15");
        assert!(matches!(local.format("%H").to_string().as_str(), "02" | "14"));
    }
}
