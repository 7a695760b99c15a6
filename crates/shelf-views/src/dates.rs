//! Absolute and relative date bounds for temporal predicates.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use shelf_core::parse_timestamp;

lazy_static! {
    static ref RELATIVE_RE: Regex =
        Regex::new(r"(?i)^\s*(\d+)\s*(day|week|month|year)s?(\s+ago)?\s*$").unwrap();
}

/// Unit of a relative date. Months are 30 days and years 365 days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateUnit {
    Day,
    Week,
    Month,
    Year,
}

impl DateUnit {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Some(DateUnit::Day),
            "week" => Some(DateUnit::Week),
            "month" => Some(DateUnit::Month),
            "year" => Some(DateUnit::Year),
            _ => None,
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            DateUnit::Day => 1,
            DateUnit::Week => 7,
            DateUnit::Month => 30,
            DateUnit::Year => 365,
        }
    }
}

/// Longest relative span accepted when parsing, in days.
pub const MAX_RELATIVE_DAYS: i64 = 365 * 10_000;

/// One side of a temporal range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DateBound {
    Absolute(DateTime<Utc>),
    /// `amount` units before "now"
    Relative { amount: i64, unit: DateUnit },
    /// Midnight UTC `days_back` days before "now"
    StartOfDay { days_back: i64 },
}

impl DateBound {
    /// Parse an absolute date or a `<N> <unit> ago` expression.
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim();
        match s.to_ascii_lowercase().as_str() {
            "today" => return Some(DateBound::StartOfDay { days_back: 0 }),
            "yesterday" => return Some(DateBound::StartOfDay { days_back: 1 }),
            _ => {}
        }
        if let Some(caps) = RELATIVE_RE.captures(s) {
            // Bare "<N> <unit>" without "ago" is only valid for `within`.
            caps.get(3)?;
            return Self::relative_from(&caps);
        }
        parse_timestamp(s).map(DateBound::Absolute)
    }

    /// Parse a `within` span: `<N> <unit>`, with or without `ago`.
    pub fn parse_within(input: &str) -> Option<Self> {
        RELATIVE_RE
            .captures(input)
            .and_then(|caps| Self::relative_from(&caps))
    }

    fn relative_from(caps: &regex::Captures<'_>) -> Option<Self> {
        let amount: i64 = caps.get(1)?.as_str().parse().ok()?;
        let unit = DateUnit::parse(caps.get(2)?.as_str())?;
        let days = amount.checked_mul(unit.days())?;
        if days > MAX_RELATIVE_DAYS {
            return None;
        }
        Duration::try_days(days)?;
        Some(DateBound::Relative { amount, unit })
    }

    /// Length of a relative span, if it fits in a `Duration`.
    fn span(amount: i64, unit: DateUnit) -> Option<Duration> {
        amount.checked_mul(unit.days()).and_then(Duration::try_days)
    }

    pub fn ago(amount: i64, unit: DateUnit) -> Self {
        DateBound::Relative { amount, unit }
    }

    /// Concrete instant relative to `now`. Spans reaching past the
    /// representable range clamp to its earliest or latest instant.
    pub fn resolve(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let back = |amount: i64, unit: DateUnit| {
            Self::span(amount, unit)
                .and_then(|span| now.checked_sub_signed(span))
                .unwrap_or(if amount < 0 {
                    DateTime::<Utc>::MAX_UTC
                } else {
                    DateTime::<Utc>::MIN_UTC
                })
        };
        match self {
            DateBound::Absolute(dt) => *dt,
            DateBound::Relative { amount, unit } => back(*amount, *unit),
            DateBound::StartOfDay { days_back } => {
                let day = back(*days_back, DateUnit::Day);
                day.with_hour(0)
                    .and_then(|d| d.with_minute(0))
                    .and_then(|d| d.with_second(0))
                    .and_then(|d| d.with_nanosecond(0))
                    .unwrap_or(day)
            }
        }
    }
}

/// Truncate to whole seconds.
pub(crate) fn floor_second(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

/// Round up to the next whole second unless already whole.
pub(crate) fn ceil_second(dt: DateTime<Utc>) -> DateTime<Utc> {
    if dt.nanosecond() == 0 {
        dt
    } else {
        floor_second(dt)
            .checked_add_signed(Duration::seconds(1))
            .unwrap_or(dt)
    }
}

/// ISO week label pieces used by temporal grouping.
pub(crate) fn iso_week(dt: &DateTime<Utc>) -> (i32, u32) {
    let week = dt.iso_week();
    (week.year(), week.week())
}
