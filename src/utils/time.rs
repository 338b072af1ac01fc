//! XMLTV timestamp parsing and the programme retention window

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::errors::{AppError, AppResult};

/// Programmes starting this far ahead or later are dropped
pub const LOOKAHEAD_HOURS: i64 = 48;
/// Programmes that ended longer ago than this are dropped
pub const LOOKBEHIND_HOURS: i64 = 1;

fn timestamp_regex() -> &'static Regex {
    static TIMESTAMP: OnceLock<Regex> = OnceLock::new();
    TIMESTAMP.get_or_init(|| {
        Regex::new(r"^(\d{4})(\d{2})(\d{2})(\d{2})(\d{2})(\d{2})(?:\s*([+-])(\d{2})(\d{2}))?$")
            .expect("XMLTV timestamp pattern is a valid regex")
    })
}

/// Parse an XMLTV timestamp such as `20231215120000 +0100`.
///
/// A missing offset is read as UTC.
pub fn parse_xmltv_timestamp(value: &str) -> AppResult<DateTime<FixedOffset>> {
    let invalid = || AppError::timestamp_parse(value);
    let caps = timestamp_regex().captures(value.trim()).ok_or_else(invalid)?;

    let number = |i: usize| -> AppResult<u32> {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .ok_or_else(invalid)
    };

    let offset_seconds = match caps.get(7) {
        Some(sign) => {
            let magnitude = (number(8)? * 3600 + number(9)? * 60) as i32;
            if sign.as_str() == "-" {
                -magnitude
            } else {
                magnitude
            }
        }
        None => 0,
    };
    let offset = FixedOffset::east_opt(offset_seconds).ok_or_else(invalid)?;

    let naive = NaiveDate::from_ymd_opt(number(1)? as i32, number(2)?, number(3)?)
        .and_then(|date| date.and_hms_opt(number(4).ok()?, number(5).ok()?, number(6).ok()?))
        .ok_or_else(invalid)?;

    offset.from_local_datetime(&naive).single().ok_or_else(invalid)
}

/// Rolling retention window, fixed once per guide filter pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub now: DateTime<Utc>,
    pub earliest_stop: DateTime<Utc>,
    pub latest_start: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            earliest_stop: now - Duration::hours(LOOKBEHIND_HOURS),
            latest_start: now + Duration::hours(LOOKAHEAD_HOURS),
        }
    }

    /// Starts before the lookahead horizon and stops no earlier than the lookbehind cutoff
    pub fn overlaps<A: TimeZone, B: TimeZone>(
        &self,
        start: &DateTime<A>,
        stop: &DateTime<B>,
    ) -> bool {
        start.with_timezone(&Utc) < self.latest_start
            && stop.with_timezone(&Utc) >= self.earliest_stop
    }

    /// Evaluate raw `start`/`stop` attributes; a missing stop is judged by its start
    pub fn contains_programme(&self, start: &str, stop: Option<&str>) -> AppResult<bool> {
        let start = parse_xmltv_timestamp(start)?;
        let stop = match stop {
            Some(stop) => parse_xmltv_timestamp(stop)?,
            None => start,
        };
        Ok(self.overlaps(&start, &stop))
    }
}

/// Format an instant the way XMLTV writes it
pub fn format_xmltv_timestamp<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    dt.format("%Y%m%d%H%M%S %z").to_string()
}
