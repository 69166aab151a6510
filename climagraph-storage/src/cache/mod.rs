//! Tiered read cache for time series.
//!
//! A read walks an ordered list of tiers and stops at the first hit:
//!
//! ```text
//! get(kind, range)
//!   ├─ MemoryTier      full series per kind, filtered on read
//!   ├─ PersistentTier  range query against the PersistentStore
//!   └─ remote          full fetch, persisted in the background,
//!                      seeds memory only for full-range requests
//! ```
//!
//! Every result is a [`SeriesRead`], which records which tier answered and,
//! for remote reads, carries a [`PersistHandle`] for the background write.
//!
//! # Example
//!
//! ```ignore
//! let cache = TieredCache::new(store, remote, CacheConfig::default());
//!
//! let read = cache.get(SeriesKind::Temperature, DateRange::full()).await?;
//! if !read.from_cache() {
//!     // First load: wait for the write-back if the caller cares.
//!     if let Some(pending) = read.pending_persist() { /* ... */ }
//! }
//! ```

pub mod read;
pub mod stats;
pub mod tier;
pub mod tiered;

pub use read::{PersistHandle, ReadSource, SeriesRead};
pub use stats::{TierStats, TierStatsSnapshot};
pub use tier::{MemoryTier, PersistentTier, ReadTier, TierLookup};
pub use tiered::{CacheConfig, TieredCache};
