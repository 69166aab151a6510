//! climagraph Core - Series Types
//!
//! Pure data structures shared by every other crate: samples, series, date
//! ranges and series kinds, plus the range filter and the date-key codec.
//! Nothing in here performs I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod datekey;
pub mod error;
pub mod filter;

pub use datekey::{
    day_start, from_day_key, month_start, next_month_start, to_day_key, to_month_key, MonthKey,
};
pub use error::{
    ClimagraphError, ClimagraphResult, CodecError, ConfigError, RemoteError, StorageError,
};
pub use filter::filter;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Ordered sequence of samples, ascending by timestamp.
///
/// Series handed out by any tier are snapshots: callers that want to mutate
/// one work on their own copy.
pub type Series = Vec<Sample>;

// ============================================================================
// SAMPLE
// ============================================================================

/// One observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// When the observation was taken.
    pub t: Timestamp,
    /// Observed value.
    pub v: f64,
}

impl Sample {
    pub fn new(t: Timestamp, v: f64) -> Self {
        Self { t, v }
    }
}

// ============================================================================
// SERIES KIND
// ============================================================================

/// Named category of time series. Each kind is cached, persisted and fetched
/// independently of the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    Temperature,
    Precipitation,
}

impl SeriesKind {
    /// Every kind, in a stable order.
    pub const ALL: [SeriesKind; 2] = [SeriesKind::Temperature, SeriesKind::Precipitation];

    /// Stable lowercase name, used for store partitions and config keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesKind::Temperature => "temperature",
            SeriesKind::Precipitation => "precipitation",
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown series kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown series kind: {0}")]
pub struct SeriesKindParseError(pub String);

impl FromStr for SeriesKind {
    type Err = SeriesKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "temperature" => Ok(SeriesKind::Temperature),
            "precipitation" => Ok(SeriesKind::Precipitation),
            _ => Err(SeriesKindParseError(s.to_string())),
        }
    }
}

// ============================================================================
// DATE RANGE
// ============================================================================

/// Half-open date interval: `from` is inclusive, `to` is exclusive.
///
/// Either bound may be absent. With both absent the range covers the entire
/// series, which is what makes a request a "full fetch".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
}

impl DateRange {
    /// The unbounded range.
    pub fn full() -> Self {
        Self::default()
    }

    pub fn new(from: Option<Timestamp>, to: Option<Timestamp>) -> Self {
        Self { from, to }
    }

    /// `[from, to)`.
    pub fn between(from: Timestamp, to: Timestamp) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// `[from, ∞)`.
    pub fn since(from: Timestamp) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    /// `(-∞, to)`.
    pub fn until(to: Timestamp) -> Self {
        Self {
            from: None,
            to: Some(to),
        }
    }

    /// True when neither bound is set.
    pub fn is_full(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Whether `t` falls inside the range.
    pub fn contains(&self, t: Timestamp) -> bool {
        let after_from = self.from.map_or(true, |from| t >= from);
        let before_to = self.to.map_or(true, |to| t < to);
        after_from && before_to
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.from, self.to) {
            (None, None) => f.write_str("[full]"),
            (Some(from), None) => write!(f, "[{}, ..)", to_day_key(from)),
            (None, Some(to)) => write!(f, "[.., {})", to_day_key(to)),
            (Some(from), Some(to)) => write!(f, "[{}, {})", to_day_key(from), to_day_key(to)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2020, 1, d, 0, 0, 0)
            .single()
            .expect("valid date")
    }

    #[test]
    fn test_series_kind_roundtrip() {
        for kind in SeriesKind::ALL {
            assert_eq!(kind.as_str().parse::<SeriesKind>(), Ok(kind));
        }
        assert_eq!("TEMPERATURE".parse::<SeriesKind>(), Ok(SeriesKind::Temperature));
        assert!("humidity".parse::<SeriesKind>().is_err());
    }

    #[test]
    fn test_series_kind_serde_lowercase() {
        let json = serde_json::to_string(&SeriesKind::Precipitation).expect("serialize");
        assert_eq!(json, "\"precipitation\"");
    }

    #[test]
    fn test_date_range_full() {
        assert!(DateRange::full().is_full());
        assert!(!DateRange::since(day(1)).is_full());
        assert!(!DateRange::until(day(1)).is_full());
    }

    #[test]
    fn test_date_range_contains_half_open() {
        let range = DateRange::between(day(2), day(4));
        assert!(!range.contains(day(1)));
        assert!(range.contains(day(2)));
        assert!(range.contains(day(3)));
        assert!(!range.contains(day(4)));
    }

    #[test]
    fn test_date_range_display() {
        assert_eq!(DateRange::full().to_string(), "[full]");
        assert_eq!(
            DateRange::between(day(2), day(4)).to_string(),
            "[2020-01-02, 2020-01-04)"
        );
    }
}
