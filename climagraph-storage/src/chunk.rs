//! Month partitioning and the on-disk chunk format.
//!
//! A chunk holds every stored sample of one kind for one calendar month. It is
//! keyed by the timestamp of its first sample, encoded so that byte order
//! equals time order:
//!
//! ```text
//! key   = big-endian(u64(millis) XOR 1 << 63)            8 bytes
//! value = {"month":"YYYY-MM","samples":[{"t":"YYYY-MM-DD","v":f64},...]}
//! ```
//!
//! With the sign bit flipped, pre-1970 keys sort first under LMDB's
//! lexicographic key comparison.

use std::collections::BTreeMap;
use std::fmt;

use chrono::DateTime;
use climagraph_core::{
    day_start, from_day_key, to_day_key, CodecError, MonthKey, Sample, Series, Timestamp,
};
use serde::{Deserialize, Serialize};

const SIGN_BIT: u64 = 1 << 63;

/// Errors raised while encoding or decoding chunks.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("Chunk key must be {expected} bytes, got {actual}")]
    KeyLength { expected: usize, actual: usize },

    #[error("Chunk JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Chunk {month} holds no samples")]
    Empty { month: String },

    #[error("Sample {day} does not belong to chunk {month}")]
    ForeignSample { month: String, day: String },
}

// ============================================================================
// CHUNK KEY
// ============================================================================

/// Order-preserving key of a persisted chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    millis: i64,
}

impl ChunkKey {
    /// Encoded key length in bytes.
    pub const LEN: usize = 8;

    pub fn from_timestamp(t: Timestamp) -> Self {
        Self {
            millis: t.timestamp_millis(),
        }
    }

    pub fn millis(&self) -> i64 {
        self.millis
    }

    pub fn timestamp(&self) -> Option<Timestamp> {
        DateTime::from_timestamp_millis(self.millis)
    }

    pub fn encode(&self) -> [u8; Self::LEN] {
        ((self.millis as u64) ^ SIGN_BIT).to_be_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ChunkError> {
        let raw: [u8; Self::LEN] = bytes.try_into().map_err(|_| ChunkError::KeyLength {
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Self {
            millis: (u64::from_be_bytes(raw) ^ SIGN_BIT) as i64,
        })
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.timestamp() {
            Some(t) => f.write_str(&to_day_key(t)),
            None => write!(f, "{}ms", self.millis),
        }
    }
}

// ============================================================================
// PERSISTED CHUNK
// ============================================================================

#[derive(Serialize, Deserialize)]
struct StoredChunk {
    month: String,
    samples: Vec<StoredSample>,
}

#[derive(Serialize, Deserialize)]
struct StoredSample {
    t: String,
    v: f64,
}

/// All stored samples of one month, at day granularity.
///
/// Always non-empty, sorted ascending, one sample per day, every sample
/// inside `month`.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedChunk {
    month: MonthKey,
    key: ChunkKey,
    samples: Series,
}

impl PersistedChunk {
    /// Build a chunk from day-normalised samples of a single month.
    fn from_days(month: MonthKey, days: BTreeMap<Timestamp, f64>) -> Option<Self> {
        let samples: Series = days.into_iter().map(|(t, v)| Sample::new(t, v)).collect();
        let key = ChunkKey::from_timestamp(samples.first()?.t);
        Some(Self {
            month,
            key,
            samples,
        })
    }

    pub fn month(&self) -> MonthKey {
        self.month
    }

    /// Key under which this chunk is stored.
    pub fn key(&self) -> ChunkKey {
        self.key
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn into_samples(self) -> Series {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Combine with a newer chunk of the same month. Values from `newer` win
    /// on days present in both.
    pub fn merge(&self, newer: &PersistedChunk) -> PersistedChunk {
        let mut days: BTreeMap<Timestamp, f64> =
            self.samples.iter().map(|s| (s.t, s.v)).collect();
        days.extend(newer.samples.iter().map(|s| (s.t, s.v)));

        let samples: Series = days.into_iter().map(|(t, v)| Sample::new(t, v)).collect();
        let key = samples
            .first()
            .map(|s| ChunkKey::from_timestamp(s.t))
            .unwrap_or(self.key);
        PersistedChunk {
            month: self.month,
            key,
            samples,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ChunkError> {
        let stored = StoredChunk {
            month: self.month.to_string(),
            samples: self
                .samples
                .iter()
                .map(|s| StoredSample {
                    t: to_day_key(s.t),
                    v: s.v,
                })
                .collect(),
        };
        Ok(serde_json::to_vec(&stored)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ChunkError> {
        let stored: StoredChunk = serde_json::from_slice(bytes)?;
        let month: MonthKey = stored.month.parse()?;

        let mut days = BTreeMap::new();
        for sample in stored.samples {
            let t = from_day_key(&sample.t)?;
            if MonthKey::of(t) != month {
                return Err(ChunkError::ForeignSample {
                    month: stored.month,
                    day: sample.t,
                });
            }
            days.insert(t, sample.v);
        }

        Self::from_days(month, days).ok_or(ChunkError::Empty {
            month: stored.month,
        })
    }
}

/// Split a sorted series into month chunks.
///
/// Each contiguous run of samples sharing a month becomes one chunk.
/// Timestamps are truncated to midnight UTC; when several samples fall on the
/// same day the last one wins.
pub fn partition_by_month(samples: &[Sample]) -> Vec<PersistedChunk> {
    let mut chunks = Vec::new();
    let mut current: Option<(MonthKey, BTreeMap<Timestamp, f64>)> = None;

    for sample in samples {
        let month = MonthKey::of(sample.t);
        match current.as_mut() {
            Some((run_month, days)) if *run_month == month => {
                days.insert(day_start(sample.t), sample.v);
            }
            _ => {
                if let Some((run_month, days)) = current.take() {
                    chunks.extend(PersistedChunk::from_days(run_month, days));
                }
                let mut days = BTreeMap::new();
                days.insert(day_start(sample.t), sample.v);
                current = Some((month, days));
            }
        }
    }

    if let Some((run_month, days)) = current {
        chunks.extend(PersistedChunk::from_days(run_month, days));
    }

    chunks
}
