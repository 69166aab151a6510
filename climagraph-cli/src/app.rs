//! Command implementations.
//!
//! Every command returns a serializable report; `main` prints it as JSON.

use std::sync::Arc;

use climagraph_core::{to_day_key, DateRange, Sample, SeriesKind};
use climagraph_remote::{HttpRemoteFetcher, RemoteFetcher};
use climagraph_render::{RenderSurface, ValueRange};
use climagraph_storage::{
    DisabledStore, InMemorySeriesStore, LmdbSeriesStore, PersistentStore, ReadSource,
    TierStatsSnapshot, TieredCache,
};
use serde::Serialize;

use crate::config::{AppConfig, StoreBackend, StoreConfig};
use crate::error::{CliError, CliResult};

// ============================================================================
// REPORTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRow {
    pub t: String,
    pub v: f64,
}

impl From<&Sample> for SampleRow {
    fn from(sample: &Sample) -> Self {
        Self {
            t: to_day_key(sample.t),
            v: sample.v,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GetReport {
    pub kind: SeriesKind,
    pub range: String,
    pub source: ReadSource,
    pub from_cache: bool,
    /// Outcome of the write-back, when one was launched.
    pub persisted: Option<bool>,
    pub samples: Vec<SampleRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketRow {
    pub x: usize,
    pub mean: f64,
    pub first_day: String,
    pub last_day: String,
    pub samples: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderReport {
    pub kind: SeriesKind,
    pub source: ReadSource,
    pub pixel_width: usize,
    pub generation: u64,
    pub value_range: Option<ValueRange>,
    pub observed: Option<ValueRange>,
    pub collapsed_columns: usize,
    pub buckets: Vec<BucketRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WarmedKind {
    pub kind: SeriesKind,
    pub source: ReadSource,
    pub samples: usize,
    pub persisted: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WarmReport {
    pub kinds: Vec<WarmedKind>,
    pub stats: TierStatsSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct KindSummary {
    pub kind: SeriesKind,
    pub samples: usize,
    pub first_day: Option<String>,
    pub last_day: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreReport {
    pub backend: &'static str,
    pub available: bool,
    pub kinds: Vec<KindSummary>,
}

// ============================================================================
// APP
// ============================================================================

/// Open the configured store. An LMDB store that cannot be opened degrades to
/// an always-empty tier instead of failing the command.
pub fn open_store(config: &StoreConfig) -> Arc<dyn PersistentStore> {
    match config.backend {
        StoreBackend::Lmdb => match LmdbSeriesStore::open(&config.path, config.max_size_mb) {
            Ok(store) => {
                tracing::info!(path = %config.path.display(), "Opened LMDB store");
                Arc::new(store)
            }
            Err(e) => {
                tracing::warn!(
                    path = %config.path.display(),
                    error = %e,
                    "Failed to open LMDB store, continuing without persistence"
                );
                Arc::new(DisabledStore::new(e.to_string()))
            }
        },
        StoreBackend::Memory => Arc::new(InMemorySeriesStore::new()),
        StoreBackend::Disabled => Arc::new(DisabledStore::new("disabled by configuration")),
    }
}

pub struct App {
    backend: StoreBackend,
    pixel_width: usize,
    store: Arc<dyn PersistentStore>,
    cache: TieredCache<dyn PersistentStore, dyn RemoteFetcher>,
}

impl App {
    pub fn build(config: &AppConfig) -> CliResult<Self> {
        let remote = HttpRemoteFetcher::new(config.remote.clone())
            .map_err(climagraph_core::ClimagraphError::from)?;
        Ok(Self::with_parts(config, open_store(&config.store), Arc::new(remote)))
    }

    /// Assemble from an already opened store and fetcher.
    pub fn with_parts(
        config: &AppConfig,
        store: Arc<dyn PersistentStore>,
        remote: Arc<dyn RemoteFetcher>,
    ) -> Self {
        let cache = TieredCache::new(Arc::clone(&store), remote, config.cache_config());
        Self {
            backend: config.store.backend,
            pixel_width: config.render.pixel_width,
            store,
            cache,
        }
    }

    pub fn cache(&self) -> &TieredCache<dyn PersistentStore, dyn RemoteFetcher> {
        &self.cache
    }

    /// Read a range and wait for any write-back to settle.
    pub async fn get(&self, kind: SeriesKind, range: DateRange) -> CliResult<GetReport> {
        let read = self.cache.get(kind, range).await?;
        let (data, source, pending) = read.into_parts();
        let persisted = match pending {
            Some(handle) => Some(handle.wait().await.is_ok()),
            None => None,
        };

        Ok(GetReport {
            kind,
            range: range.to_string(),
            source,
            from_cache: source.is_cache(),
            persisted,
            samples: data.iter().map(SampleRow::from).collect(),
        })
    }

    /// Read a range and reduce it to `pixel_width` columns (the configured
    /// width when `None`).
    pub async fn render(
        &self,
        kind: SeriesKind,
        range: DateRange,
        pixel_width: Option<usize>,
    ) -> CliResult<RenderReport> {
        let pixel_width = pixel_width.unwrap_or(self.pixel_width);
        if pixel_width == 0 {
            return Err(CliError::InvalidArgument {
                arg: "--width",
                reason: "must be > 0".to_string(),
            });
        }

        let read = self.cache.get(kind, range).await?;
        let (data, source, pending) = read.into_parts();

        let surface = RenderSurface::new(pixel_width);
        let ticket = surface.set_data(Arc::new(data));
        let generation = ticket.generation();
        let applied = ticket.applied().await;
        if let Some(handle) = pending {
            if let Err(e) = handle.wait().await {
                tracing::debug!(kind = %kind, error = %e, "Write-back did not complete");
            }
        }

        let frame = surface
            .latest()
            .filter(|_| applied)
            .ok_or_else(|| CliError::Render(format!("generation {} was not published", generation)))?;
        let reduction = &frame.reduction;

        Ok(RenderReport {
            kind,
            source,
            pixel_width,
            generation,
            value_range: reduction.value_range,
            observed: reduction.observed,
            collapsed_columns: reduction.collapsed_columns(),
            buckets: reduction
                .buckets
                .iter()
                .map(|b| BucketRow {
                    x: b.pixel_x,
                    mean: b.mean_value,
                    first_day: b.source_timestamps.first().map(|t| to_day_key(*t)).unwrap_or_default(),
                    last_day: b.source_timestamps.last().map(|t| to_day_key(*t)).unwrap_or_default(),
                    samples: b.source_timestamps.len(),
                })
                .collect(),
        })
    }

    /// Pull the full series of each kind through the cache.
    pub async fn warm(&self, kinds: &[SeriesKind]) -> CliResult<WarmReport> {
        let mut warmed = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            let report = self.get(kind, DateRange::full()).await?;
            tracing::info!(
                kind = %kind,
                source = %report.source,
                samples = report.samples.len(),
                "Warmed series"
            );
            warmed.push(WarmedKind {
                kind,
                source: report.source,
                samples: report.samples.len(),
                persisted: report.persisted,
            });
        }
        Ok(WarmReport {
            kinds: warmed,
            stats: self.cache.stats(),
        })
    }

    /// Summarize what the persistent store holds.
    pub async fn store_stats(&self) -> CliResult<StoreReport> {
        let mut kinds = Vec::with_capacity(SeriesKind::ALL.len());
        for kind in SeriesKind::ALL {
            let series = self.store.query_range(kind, &DateRange::full()).await?;
            kinds.push(KindSummary {
                kind,
                samples: series.len(),
                first_day: series.first().map(|s| to_day_key(s.t)),
                last_day: series.last().map(|s| to_day_key(s.t)),
            });
        }
        Ok(StoreReport {
            backend: self.backend.as_str(),
            available: self.store.is_available(),
            kinds,
        })
    }
}
