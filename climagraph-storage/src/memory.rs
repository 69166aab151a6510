//! Non-durable store backends.
//!
//! [`InMemorySeriesStore`] keeps month chunks in a map and follows the same
//! merge rules as the LMDB backend; it backs `store.backend = "memory"` and
//! tests that don't need a filesystem. [`DisabledStore`] is the always-empty
//! tier used when no durable storage could be opened.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use climagraph_core::{
    ClimagraphResult, DateRange, MonthKey, Sample, Series, SeriesKind, StorageError,
};

use crate::chunk::{partition_by_month, PersistedChunk};
use crate::traits::PersistentStore;

/// In-memory store with month-chunk semantics.
#[derive(Debug, Default)]
pub struct InMemorySeriesStore {
    chunks: RwLock<HashMap<SeriesKind, BTreeMap<MonthKey, PersistedChunk>>>,
}

impl InMemorySeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of month chunks stored for `kind`.
    pub fn chunk_count(&self, kind: SeriesKind) -> usize {
        self.chunks
            .read()
            .map(|chunks| chunks.get(&kind).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }
}

#[async_trait]
impl PersistentStore for InMemorySeriesStore {
    fn is_available(&self) -> bool {
        true
    }

    async fn bulk_insert(&self, kind: SeriesKind, samples: &[Sample]) -> ClimagraphResult<()> {
        let incoming = partition_by_month(samples);
        let mut chunks = self
            .chunks
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        let months = chunks.entry(kind).or_default();

        for chunk in incoming {
            let merged = match months.get(&chunk.month()) {
                Some(existing) => existing.merge(&chunk),
                None => chunk,
            };
            months.insert(merged.month(), merged);
        }
        Ok(())
    }

    async fn query_range(&self, kind: SeriesKind, range: &DateRange) -> ClimagraphResult<Series> {
        let chunks = self.chunks.read().map_err(|_| StorageError::LockPoisoned)?;
        let Some(months) = chunks.get(&kind) else {
            return Ok(Vec::new());
        };

        Ok(months
            .values()
            .flat_map(|chunk| chunk.samples().iter().copied())
            .filter(|sample| range.contains(sample.t))
            .collect())
    }
}

/// Store that could not be opened.
///
/// Reads are always empty. Writes fail with [`StorageError::Unavailable`],
/// though the cache never issues them because `is_available` is false.
#[derive(Debug, Clone)]
pub struct DisabledStore {
    reason: String,
}

impl DisabledStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[async_trait]
impl PersistentStore for DisabledStore {
    fn is_available(&self) -> bool {
        false
    }

    async fn bulk_insert(&self, _kind: SeriesKind, _samples: &[Sample]) -> ClimagraphResult<()> {
        Err(StorageError::Unavailable {
            reason: self.reason.clone(),
        }
        .into())
    }

    async fn query_range(&self, _kind: SeriesKind, _range: &DateRange) -> ClimagraphResult<Series> {
        Ok(Vec::new())
    }
}
