//! Canonical string keys for timestamps.
//!
//! Two forms are used by the persistence layer: a day key (`YYYY-MM-DD`) that
//! serialises a single sample, and a month key (`YYYY-MM`) that decides which
//! chunk a sample belongs to. Queries never compare these strings; they
//! compare timestamps.
//!
//! All conversions are done in UTC.

use crate::{CodecError, Timestamp};
use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use std::fmt;
use std::str::FromStr;

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// Format `t` as `YYYY-MM-DD`.
pub fn to_day_key(t: Timestamp) -> String {
    t.format(DAY_KEY_FORMAT).to_string()
}

/// Format `t` as `YYYY-MM`.
pub fn to_month_key(t: Timestamp) -> String {
    MonthKey::of(t).to_string()
}

/// Parse a `YYYY-MM-DD` key back into midnight UTC of that day.
pub fn from_day_key(key: &str) -> Result<Timestamp, CodecError> {
    // chrono accepts unpadded fields; day keys are always zero-padded.
    if key.len() != 10 {
        return Err(CodecError::InvalidDayKey {
            key: key.to_string(),
        });
    }
    let date = NaiveDate::parse_from_str(key, DAY_KEY_FORMAT).map_err(|_| {
        CodecError::InvalidDayKey {
            key: key.to_string(),
        }
    })?;
    Ok(date.and_time(NaiveTime::MIN).and_utc())
}

/// Midnight UTC of the day containing `t`.
///
/// Persisted samples have day granularity; this is the timestamp a sample
/// reads back as after a store round trip.
pub fn day_start(t: Timestamp) -> Timestamp {
    t.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// First instant (midnight UTC on the 1st) of the month containing `t`.
pub fn month_start(t: Timestamp) -> Timestamp {
    day_start(t) - Duration::days(i64::from(t.day0()))
}

/// First instant of the month after the one containing `t`, if representable.
pub fn next_month_start(t: Timestamp) -> Option<Timestamp> {
    MonthKey::of(t).next().start()
}

/// Year-month partition identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// Build a key, rejecting months outside 1..=12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Partition that `t` belongs to.
    pub fn of(t: Timestamp) -> Self {
        Self {
            year: t.year(),
            month: t.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The following month.
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Midnight UTC on the first day of this month.
    pub fn start(&self) -> Option<Timestamp> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .map(|date| date.and_time(NaiveTime::MIN).and_utc())
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CodecError::InvalidMonthKey { key: s.to_string() };
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        MonthKey::new(year, month).ok_or_else(invalid)
    }
}
