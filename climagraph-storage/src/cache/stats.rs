//! Per-cache counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::read::ReadSource;

/// Live counters, updated with relaxed atomics.
#[derive(Debug, Default)]
pub struct TierStats {
    memory_hits: AtomicU64,
    persistent_hits: AtomicU64,
    remote_fetches: AtomicU64,
    tier_errors: AtomicU64,
    persist_successes: AtomicU64,
    persist_failures: AtomicU64,
}

impl TierStats {
    pub fn record_hit(&self, source: ReadSource) {
        let counter = match source {
            ReadSource::Memory => &self.memory_hits,
            ReadSource::Persistent => &self.persistent_hits,
            ReadSource::Remote => &self.remote_fetches,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remote_fetch(&self) {
        self.remote_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tier_error(&self) {
        self.tier_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persist(&self, ok: bool) {
        let counter = if ok {
            &self.persist_successes
        } else {
            &self.persist_failures
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TierStatsSnapshot {
        TierStatsSnapshot {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            persistent_hits: self.persistent_hits.load(Ordering::Relaxed),
            remote_fetches: self.remote_fetches.load(Ordering::Relaxed),
            tier_errors: self.tier_errors.load(Ordering::Relaxed),
            persist_successes: self.persist_successes.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`TierStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierStatsSnapshot {
    /// Reads answered from memory.
    pub memory_hits: u64,
    /// Reads answered by the persistent store.
    pub persistent_hits: u64,
    /// Full series fetched over the network.
    pub remote_fetches: u64,
    /// Tier lookups that failed and were treated as misses.
    pub tier_errors: u64,
    /// Background writes that completed.
    pub persist_successes: u64,
    /// Background writes that failed.
    pub persist_failures: u64,
}

impl TierStatsSnapshot {
    /// Fraction of reads served without a network call.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.persistent_hits;
        let total = hits + self.remote_fetches;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}
