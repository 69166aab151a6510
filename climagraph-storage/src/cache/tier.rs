//! Local read tiers.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use climagraph_core::{filter, ClimagraphResult, DateRange, Series, SeriesKind, StorageError};

use super::read::ReadSource;
use crate::traits::PersistentStore;

/// Outcome of consulting one tier.
#[derive(Debug, Clone, PartialEq)]
pub enum TierLookup {
    /// The tier answered. The series is already range-filtered.
    Hit(Series),
    /// The tier has nothing for this request; try the next one.
    Miss,
}

/// One step of the local fallback chain.
///
/// A lookup error is not fatal: the cache logs it and moves on to the next
/// tier as if the lookup had missed.
#[async_trait]
pub trait ReadTier: Send + Sync {
    /// Which tier this is, for results and statistics.
    fn source(&self) -> ReadSource;

    async fn lookup(&self, kind: SeriesKind, range: &DateRange) -> ClimagraphResult<TierLookup>;
}

// ============================================================================
// MEMORY TIER
// ============================================================================

/// Full series per kind, held for the lifetime of the cache.
///
/// Entries are only ever created from full-range remote fetches, so an entry
/// is authoritative for every range: a lookup that filters down to nothing is
/// still a hit.
#[derive(Debug, Default)]
pub struct MemoryTier {
    entries: RwLock<HashMap<SeriesKind, Arc<Series>>>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: SeriesKind) -> ClimagraphResult<Option<Arc<Series>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries.get(&kind).cloned())
    }

    pub fn contains(&self, kind: SeriesKind) -> bool {
        matches!(self.get(kind), Ok(Some(_)))
    }

    /// Install `series` as the entry for `kind`, replacing any previous one.
    pub fn replace(&self, kind: SeriesKind, series: Arc<Series>) -> ClimagraphResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        entries.insert(kind, series);
        Ok(())
    }
}

#[async_trait]
impl ReadTier for MemoryTier {
    fn source(&self) -> ReadSource {
        ReadSource::Memory
    }

    async fn lookup(&self, kind: SeriesKind, range: &DateRange) -> ClimagraphResult<TierLookup> {
        Ok(match self.get(kind)? {
            Some(entry) => TierLookup::Hit(filter(&entry, range)),
            None => TierLookup::Miss,
        })
    }
}

// ============================================================================
// PERSISTENT TIER
// ============================================================================

/// Adapts a [`PersistentStore`] to the fallback chain.
///
/// An unavailable store and an empty result are both misses.
pub struct PersistentTier<S: ?Sized> {
    store: Arc<S>,
}

impl<S: PersistentStore + ?Sized> PersistentTier<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: PersistentStore + ?Sized> ReadTier for PersistentTier<S> {
    fn source(&self) -> ReadSource {
        ReadSource::Persistent
    }

    async fn lookup(&self, kind: SeriesKind, range: &DateRange) -> ClimagraphResult<TierLookup> {
        if !self.store.is_available() {
            return Ok(TierLookup::Miss);
        }

        let series = self.store.query_range(kind, range).await?;
        if series.is_empty() {
            Ok(TierLookup::Miss)
        } else {
            Ok(TierLookup::Hit(series))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{DisabledStore, InMemorySeriesStore};
    use chrono::{TimeZone, Utc};
    use climagraph_core::{Sample, Timestamp};

    fn day(d: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2006, 12, d, 0, 0, 0)
            .single()
            .expect("valid date")
    }

    fn series() -> Series {
        vec![
            Sample::new(day(28), 5.0),
            Sample::new(day(29), 7.0),
            Sample::new(day(30), 3.0),
        ]
    }

    #[tokio::test]
    async fn test_memory_tier_miss_then_hit() {
        let tier = MemoryTier::new();
        let lookup = tier.lookup(SeriesKind::Temperature, &DateRange::full()).await;
        assert_eq!(lookup, Ok(TierLookup::Miss));

        tier.replace(SeriesKind::Temperature, Arc::new(series())).unwrap();
        assert!(tier.contains(SeriesKind::Temperature));
        assert!(!tier.contains(SeriesKind::Precipitation));

        let lookup = tier
            .lookup(SeriesKind::Temperature, &DateRange::since(day(29)))
            .await
            .unwrap();
        assert_eq!(lookup, TierLookup::Hit(series()[1..].to_vec()));
    }

    #[tokio::test]
    async fn test_memory_tier_empty_filter_is_still_hit() {
        let tier = MemoryTier::new();
        tier.replace(SeriesKind::Temperature, Arc::new(series())).unwrap();
        let lookup = tier
            .lookup(SeriesKind::Temperature, &DateRange::until(day(1)))
            .await
            .unwrap();
        assert_eq!(lookup, TierLookup::Hit(Vec::new()));
    }

    #[tokio::test]
    async fn test_persistent_tier_empty_is_miss() {
        let tier = PersistentTier::new(Arc::new(InMemorySeriesStore::new()));
        let lookup = tier.lookup(SeriesKind::Temperature, &DateRange::full()).await;
        assert_eq!(lookup, Ok(TierLookup::Miss));
    }

    #[tokio::test]
    async fn test_persistent_tier_hit() {
        let store = Arc::new(InMemorySeriesStore::new());
        store.bulk_insert(SeriesKind::Temperature, &series()).await.unwrap();
        let tier = PersistentTier::new(store);

        let lookup = tier
            .lookup(SeriesKind::Temperature, &DateRange::between(day(29), day(30)))
            .await
            .unwrap();
        assert_eq!(lookup, TierLookup::Hit(vec![Sample::new(day(29), 7.0)]));
    }

    #[tokio::test]
    async fn test_unavailable_store_is_miss_for_every_kind() {
        let tier = PersistentTier::new(Arc::new(DisabledStore::new("missing")));
        for kind in SeriesKind::ALL {
            let lookup = tier.lookup(kind, &DateRange::full()).await;
            assert_eq!(lookup, Ok(TierLookup::Miss));
        }
    }
}
