//! climagraph Storage - Persistent Series Store and Tiered Cache
//!
//! Defines the [`PersistentStore`] abstraction for durable, month-partitioned
//! series storage, its LMDB and in-memory implementations, and the
//! [`TieredCache`] that answers range queries from memory, then the store,
//! then the network.

pub mod cache;
pub mod chunk;
pub mod lmdb_backend;
pub mod memory;
pub mod traits;

pub use cache::{
    CacheConfig, MemoryTier, PersistHandle, PersistentTier, ReadSource, ReadTier, SeriesRead,
    TierLookup, TierStats, TierStatsSnapshot, TieredCache,
};
pub use chunk::{partition_by_month, ChunkError, ChunkKey, PersistedChunk};
pub use lmdb_backend::{LmdbSeriesStore, LmdbStoreError};
pub use memory::{DisabledStore, InMemorySeriesStore};
pub use traits::PersistentStore;
