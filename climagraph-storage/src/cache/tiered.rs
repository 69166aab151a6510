//! The tiered cache.
//!
//! This module implements the core read logic: walk the local tiers in
//! order, fall back to a full remote fetch, write the fetched series back to
//! the persistent store in the background, and seed memory when the request
//! covered the whole series.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use climagraph_core::{
    filter, ClimagraphResult, DateRange, RemoteError, Series, SeriesKind, StorageError,
};
use climagraph_remote::RemoteFetcher;
use futures_util::future::{BoxFuture, FutureExt, Shared};

use super::read::{PersistHandle, SeriesRead};
use super::stats::{TierStats, TierStatsSnapshot};
use super::tier::{MemoryTier, PersistentTier, ReadTier, TierLookup};
use crate::traits::PersistentStore;

/// Configuration for the tiered cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Share one remote fetch between concurrent misses for the same kind.
    pub single_flight: bool,
    /// Write remotely fetched series back to the persistent store.
    pub write_back: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            single_flight: true,
            write_back: true,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable single-flight remote fetches.
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    /// Enable or disable background write-back.
    pub fn with_write_back(mut self, enabled: bool) -> Self {
        self.write_back = enabled;
        self
    }
}

/// Result of one remote fetch, shared by every caller that waited on it.
#[derive(Clone)]
struct Fetched {
    series: Arc<Series>,
    /// Write-back launched by the fetch; the first caller to claim it owns it.
    persist: Arc<Mutex<Option<PersistHandle>>>,
}

impl Fetched {
    fn take_persist(&self) -> Option<PersistHandle> {
        self.persist.lock().ok().and_then(|mut slot| slot.take())
    }
}

type SharedFetch = Shared<BoxFuture<'static, ClimagraphResult<Fetched>>>;

/// A remote fetch other callers can join.
struct Flight {
    id: u64,
    fetch: SharedFetch,
}

type Inflight = Arc<Mutex<HashMap<SeriesKind, Flight>>>;

/// Drop the in-flight entry for `kind` unless a newer flight replaced it.
fn clear_flight(inflight: &Mutex<HashMap<SeriesKind, Flight>>, kind: SeriesKind, id: u64) {
    if let Ok(mut inflight) = inflight.lock() {
        if inflight.get(&kind).is_some_and(|f| f.id == id) {
            inflight.remove(&kind);
        }
    }
}

/// Memory, persistent store and network behind a single `get`.
///
/// # Type Parameters
///
/// - `S`: the persistent store (may be `dyn PersistentStore`)
/// - `R`: the remote fetcher (may be `dyn RemoteFetcher`)
///
/// # Guarantees
///
/// - Tiers are consulted in order: memory, store, remote.
/// - A remote fetch always retrieves the full series, whatever the range.
/// - The background write-back never delays or fails `get`.
/// - Every completed remote fetch launches a write-back, even if all of its
///   callers were dropped.
/// - Only a full-range request reaching the network populates memory.
pub struct TieredCache<S: ?Sized, R: ?Sized> {
    memory: Arc<MemoryTier>,
    tiers: Vec<Arc<dyn ReadTier>>,
    store: Arc<S>,
    remote: Arc<R>,
    config: CacheConfig,
    stats: Arc<TierStats>,
    inflight: Inflight,
    next_flight: AtomicU64,
}

impl<S, R> TieredCache<S, R>
where
    S: PersistentStore + ?Sized + 'static,
    R: RemoteFetcher + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, remote: Arc<R>, config: CacheConfig) -> Self {
        let memory = Arc::new(MemoryTier::new());
        let tiers: Vec<Arc<dyn ReadTier>> = vec![
            memory.clone(),
            Arc::new(PersistentTier::new(Arc::clone(&store))),
        ];
        Self {
            memory,
            tiers,
            store,
            remote,
            config,
            stats: Arc::new(TierStats::default()),
            inflight: Arc::new(Mutex::new(HashMap::new())),
            next_flight: AtomicU64::new(0),
        }
    }

    /// Create a new cache with default configuration.
    pub fn with_defaults(store: Arc<S>, remote: Arc<R>) -> Self {
        Self::new(store, remote, CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stats(&self) -> TierStatsSnapshot {
        self.stats.snapshot()
    }

    /// Whether a full series for `kind` is held in memory.
    pub fn has_memory_entry(&self, kind: SeriesKind) -> bool {
        self.memory.contains(kind)
    }

    /// Read `range` of `kind` from the first tier that has it.
    ///
    /// # Errors
    ///
    /// Only a failed remote fetch is returned as an error. Local tier
    /// failures are logged and treated as misses.
    pub async fn get(&self, kind: SeriesKind, range: DateRange) -> ClimagraphResult<SeriesRead> {
        for tier in &self.tiers {
            let source = tier.source();
            match tier.lookup(kind, &range).await {
                Ok(TierLookup::Hit(data)) => {
                    self.stats.record_hit(source);
                    tracing::debug!(
                        kind = %kind,
                        range = %range,
                        source = %source,
                        samples = data.len(),
                        "Tier hit"
                    );
                    return Ok(SeriesRead::from_tier(data, source));
                }
                Ok(TierLookup::Miss) => {
                    tracing::debug!(kind = %kind, range = %range, source = %source, "Tier miss");
                }
                Err(e) => {
                    self.stats.record_tier_error();
                    tracing::warn!(
                        kind = %kind,
                        source = %source,
                        error = %e,
                        "Tier lookup failed, treating as miss"
                    );
                }
            }
        }

        let fetched = self.fetch_full(kind).await?;
        let pending_persist = fetched.take_persist();

        if range.is_full() {
            if let Err(e) = self.memory.replace(kind, Arc::clone(&fetched.series)) {
                tracing::warn!(kind = %kind, error = %e, "Failed to seed memory tier");
            }
        }

        Ok(SeriesRead::from_remote(
            filter(&fetched.series, &range),
            pending_persist,
        ))
    }

    /// Fetch the complete series for `kind`, joining a fetch already in
    /// flight when single-flight is enabled.
    async fn fetch_full(&self, kind: SeriesKind) -> ClimagraphResult<Fetched> {
        if !self.config.single_flight {
            return self.spawn_fetch(kind, None).await;
        }

        let fetch = {
            let mut inflight = self
                .inflight
                .lock()
                .map_err(|_| StorageError::LockPoisoned)?;
            match inflight.get(&kind) {
                Some(flight) => {
                    tracing::debug!(kind = %kind, flight = flight.id, "Joined in-flight remote fetch");
                    flight.fetch.clone()
                }
                None => {
                    let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
                    let fetch = self.spawn_fetch(kind, Some(id)).shared();
                    inflight.insert(
                        kind,
                        Flight {
                            id,
                            fetch: fetch.clone(),
                        },
                    );
                    fetch
                }
            }
        };

        fetch.await
    }

    /// Run the fetch and its write-back on a task of their own, so neither
    /// depends on any caller staying alive.
    ///
    /// `flight` is the in-flight entry to clear once the fetch settles.
    fn spawn_fetch(
        &self,
        kind: SeriesKind,
        flight: Option<u64>,
    ) -> BoxFuture<'static, ClimagraphResult<Fetched>> {
        let remote = Arc::clone(&self.remote);
        let store = Arc::clone(&self.store);
        let stats = Arc::clone(&self.stats);
        let inflight = Arc::clone(&self.inflight);
        let write_back = self.config.write_back;

        let task = tokio::spawn(async move {
            let fetched = Self::fetch_and_persist(remote, store, stats, kind, write_back).await;
            if let Some(id) = flight {
                clear_flight(&inflight, kind, id);
            }
            fetched
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(join_err) => Err(RemoteError::FetchAborted {
                    kind,
                    reason: join_err.to_string(),
                }
                .into()),
            }
        }
        .boxed()
    }

    async fn fetch_and_persist(
        remote: Arc<R>,
        store: Arc<S>,
        stats: Arc<TierStats>,
        kind: SeriesKind,
        write_back: bool,
    ) -> ClimagraphResult<Fetched> {
        stats.record_remote_fetch();
        let series = Arc::new(remote.fetch_full(kind).await?);
        tracing::info!(kind = %kind, samples = series.len(), "Fetched series from remote");

        let persist = (write_back && store.is_available())
            .then(|| Self::spawn_persist(store, stats, kind, Arc::clone(&series)));
        Ok(Fetched {
            series,
            persist: Arc::new(Mutex::new(persist)),
        })
    }

    fn spawn_persist(
        store: Arc<S>,
        stats: Arc<TierStats>,
        kind: SeriesKind,
        series: Arc<Series>,
    ) -> PersistHandle {
        let handle = tokio::spawn(async move {
            let result = store.bulk_insert(kind, &series).await;
            stats.record_persist(result.is_ok());
            match &result {
                Ok(()) => {
                    tracing::info!(kind = %kind, samples = series.len(), "Persisted series")
                }
                Err(e) => tracing::warn!(kind = %kind, error = %e, "Write-back failed"),
            }
            result
        });

        PersistHandle::new(kind, handle)
    }
}
