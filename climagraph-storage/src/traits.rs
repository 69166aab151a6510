//! Persistent store trait.

use async_trait::async_trait;
use climagraph_core::{ClimagraphResult, DateRange, Sample, Series, SeriesKind};

/// Durable, partitioned range-query store for series samples.
///
/// Each [`SeriesKind`] lives in its own partition. Samples are grouped into
/// month chunks keyed by their first timestamp, so key order matches time
/// order and a range query is a single ordered scan.
///
/// # Contract
///
/// - `bulk_insert` is idempotent per day: inserting the same samples twice
///   leaves the store in the same state as inserting them once.
/// - `query_range` uses the half-open `[from, to)` convention and returns
///   samples in ascending time order.
/// - A store that reports `is_available() == false` behaves as an
///   always-empty tier. Callers never treat that as an error.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Whether the backing storage could be opened.
    fn is_available(&self) -> bool;

    /// Write `samples` to the partition for `kind`, merging with any chunks
    /// already present for the same months.
    async fn bulk_insert(&self, kind: SeriesKind, samples: &[Sample]) -> ClimagraphResult<()>;

    /// Read every stored sample of `kind` inside `range`.
    async fn query_range(&self, kind: SeriesKind, range: &DateRange) -> ClimagraphResult<Series>;
}
