//! climagraph Test Utilities
//!
//! Shared test infrastructure for the climagraph workspace:
//! - Proptest generators for samples and series
//! - Mock remote fetcher and recording store
//! - Fixtures for common scenarios

pub use climagraph_core::{
    ClimagraphError, ClimagraphResult, DateRange, RemoteError, Sample, Series, SeriesKind,
    StorageError, Timestamp,
};
pub use climagraph_storage::{InMemorySeriesStore, PersistentStore};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use climagraph_remote::RemoteFetcher;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// MOCK REMOTE FETCHER
// ============================================================================

/// In-process remote that serves fixed series and counts calls.
#[derive(Debug, Default)]
pub struct MockRemoteFetcher {
    series: HashMap<SeriesKind, Series>,
    calls: AtomicUsize,
    delay: Option<std::time::Duration>,
    fail: AtomicBool,
}

impl MockRemoteFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `series` for `kind`. Kinds without a series serve an empty one.
    pub fn with_series(mut self, kind: SeriesKind, series: Series) -> Self {
        self.series.insert(kind, series);
        self
    }

    /// Sleep this long inside every fetch. Used to widen race windows.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of `fetch_full` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteFetcher for MockRemoteFetcher {
    async fn fetch_full(&self, kind: SeriesKind) -> ClimagraphResult<Series> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(RemoteError::RequestFailed {
                kind,
                url: format!("mock://{}", kind),
                reason: "mock failure".to_string(),
            }
            .into());
        }
        Ok(self.series.get(&kind).cloned().unwrap_or_default())
    }
}

// ============================================================================
// RECORDING STORE
// ============================================================================

/// Store wrapper that records every insert and can be told to fail.
#[derive(Debug)]
pub struct RecordingStore {
    inner: InMemorySeriesStore,
    inserts: Mutex<Vec<(SeriesKind, Series)>>,
    available: bool,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl Default for RecordingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            inner: InMemorySeriesStore::new(),
            inserts: Mutex::new(Vec::new()),
            available: true,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// A store that reports itself unavailable.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Every insert call so far, in order.
    pub fn inserts(&self) -> Vec<(SeriesKind, Series)> {
        self.inserts
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn insert_count(&self) -> usize {
        self.inserts.lock().map(|calls| calls.len()).unwrap_or(0)
    }

    pub fn chunk_count(&self, kind: SeriesKind) -> usize {
        self.inner.chunk_count(kind)
    }
}

#[async_trait]
impl PersistentStore for RecordingStore {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn bulk_insert(&self, kind: SeriesKind, samples: &[Sample]) -> ClimagraphResult<()> {
        if let Ok(mut calls) = self.inserts.lock() {
            calls.push((kind, samples.to_vec()));
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::InsertFailed {
                kind,
                reason: "mock write failure".to_string(),
            }
            .into());
        }
        self.inner.bulk_insert(kind, samples).await
    }

    async fn query_range(&self, kind: SeriesKind, range: &DateRange) -> ClimagraphResult<Series> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::QueryFailed {
                kind,
                reason: "mock read failure".to_string(),
            }
            .into());
        }
        self.inner.query_range(kind, range).await
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built series for common scenarios.

    use super::*;

    /// Midnight UTC on the given date. Panics on an invalid date.
    pub fn day(year: i32, month: u32, d: u32) -> Timestamp {
        Utc.with_ymd_and_hms(year, month, d, 0, 0, 0)
            .single()
            .unwrap_or_else(|| panic!("invalid fixture date {year}-{month}-{d}"))
    }

    /// Consecutive daily samples starting at `start`.
    pub fn daily(start: Timestamp, values: &[f64]) -> Series {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| Sample::new(start + Duration::days(i as i64), v))
            .collect()
    }

    /// The three-sample series used by the end-to-end scenario.
    pub fn three_days() -> Series {
        daily(day(2006, 12, 28), &[5.0, 7.0, 3.0])
    }

    /// `days` daily samples from 1900-01-01 with a smooth seasonal shape.
    pub fn long_series(days: usize) -> Series {
        let start = day(1900, 1, 1);
        (0..days)
            .map(|i| {
                let phase = (i % 365) as f64 / 365.0 * std::f64::consts::TAU;
                Sample::new(start + Duration::days(i as i64), 10.0 + 12.0 * phase.sin())
            })
            .collect()
    }

    /// A fetcher serving `series` for both kinds.
    pub fn remote_with(series: Series) -> Arc<MockRemoteFetcher> {
        Arc::new(
            MockRemoteFetcher::new()
                .with_series(SeriesKind::Temperature, series.clone())
                .with_series(SeriesKind::Precipitation, series),
        )
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for samples and series.

    use super::*;
    use proptest::prelude::*;

    /// A series kind.
    pub fn arb_kind() -> impl Strategy<Value = SeriesKind> {
        prop_oneof![Just(SeriesKind::Temperature), Just(SeriesKind::Precipitation)]
    }

    /// A finite reading.
    pub fn arb_value() -> impl Strategy<Value = f64> {
        -1_000.0f64..1_000.0
    }

    /// Daily series of up to `max_len` samples with random gaps, starting
    /// somewhere between 1850 and 2050.
    pub fn arb_daily_series(max_len: usize) -> impl Strategy<Value = Series> {
        (
            -43_800i64..29_200,
            prop::collection::vec((1i64..40, arb_value()), 0..max_len),
        )
            .prop_map(|(start_day, steps)| {
                let epoch = fixtures::day(1970, 1, 1);
                let mut offset = start_day;
                steps
                    .into_iter()
                    .map(|(gap, v)| {
                        offset += gap;
                        Sample::new(epoch + Duration::days(offset), v)
                    })
                    .collect()
            })
    }

    /// A date range whose bounds may be absent, within the span of
    /// [`arb_daily_series`].
    pub fn arb_range() -> impl Strategy<Value = DateRange> {
        let bound = prop::option::of(-43_800i64..31_000);
        (bound.clone(), bound).prop_map(|(from, to)| {
            let epoch = fixtures::day(1970, 1, 1);
            DateRange::new(
                from.map(|d| epoch + Duration::days(d)),
                to.map(|d| epoch + Duration::days(d)),
            )
        })
    }
}
