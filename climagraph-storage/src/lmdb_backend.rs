//! LMDB-backed series store.
//!
//! Uses the heed crate (Rust bindings for LMDB) for a memory-mapped,
//! transactional key-value store. One environment holds one named database
//! per [`SeriesKind`]; each database maps [`ChunkKey`] bytes to an encoded
//! [`PersistedChunk`].
//!
//! # Write Path
//!
//! `bulk_insert` runs in a single write transaction. For every month chunk of
//! the incoming samples, any chunk already stored for that month is read,
//! merged (incoming values win per day), deleted, and the merged chunk is
//! written back under its own first-sample key. Chunks of a kind therefore
//! never overlap and repeated inserts are idempotent.
//!
//! # Read Path
//!
//! `query_range` scans keys from the start of `from`'s month up to `to` and
//! filters the decoded samples to the exact half-open range.

use std::ops::Bound;
use std::path::Path;

use async_trait::async_trait;
use climagraph_core::{
    month_start, ClimagraphResult, DateRange, Sample, Series, SeriesKind, StorageError,
};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};

use crate::chunk::{partition_by_month, ChunkError, ChunkKey, PersistedChunk};
use crate::traits::PersistentStore;

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open a named database within the environment.
    #[error("Failed to open database {name}: {reason}")]
    DbOpen { name: &'static str, reason: String },

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A stored chunk could not be decoded.
    #[error("Corrupt chunk {key} in {kind}: {source}")]
    Corrupt {
        kind: SeriesKind,
        key: String,
        source: ChunkError,
    },

    /// A chunk could not be encoded.
    #[error("Failed to encode chunk for {kind}: {source}")]
    Encode { kind: SeriesKind, source: ChunkError },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convert LmdbStoreError to ClimagraphError.
impl From<LmdbStoreError> for climagraph_core::ClimagraphError {
    fn from(e: LmdbStoreError) -> Self {
        let storage = match e {
            LmdbStoreError::Corrupt { kind, key, source } => StorageError::CorruptChunk {
                kind,
                key,
                reason: source.to_string(),
            },
            LmdbStoreError::Encode { kind, source } => StorageError::InsertFailed {
                kind,
                reason: source.to_string(),
            },
            LmdbStoreError::EnvOpen(reason) => StorageError::Unavailable { reason },
            other => StorageError::TransactionFailed {
                reason: other.to_string(),
            },
        };
        climagraph_core::ClimagraphError::Storage(storage)
    }
}

fn txn_err(e: heed::Error) -> LmdbStoreError {
    LmdbStoreError::Transaction(e.to_string())
}

fn as_slice_bound(bound: &Bound<[u8; ChunkKey::LEN]>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(key) => Bound::Included(key.as_slice()),
        Bound::Excluded(key) => Bound::Excluded(key.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

fn create_kind_db(
    env: &Env,
    wtxn: &mut RwTxn<'_>,
    kind: SeriesKind,
) -> Result<Database<Bytes, Bytes>, LmdbStoreError> {
    env.create_database(wtxn, Some(kind.as_str()))
        .map_err(|e| LmdbStoreError::DbOpen {
            name: kind.as_str(),
            reason: e.to_string(),
        })
}

/// LMDB-backed store with one named database per series kind.
///
/// # Example
///
/// ```ignore
/// use climagraph_storage::{LmdbSeriesStore, PersistentStore};
/// use climagraph_core::{DateRange, SeriesKind};
///
/// let store = LmdbSeriesStore::open("/var/lib/climagraph", 256)?;
/// store.bulk_insert(SeriesKind::Temperature, &samples).await?;
/// let december = store.query_range(SeriesKind::Temperature, &range).await?;
/// ```
///
/// Clones share the same environment.
#[derive(Clone)]
pub struct LmdbSeriesStore {
    env: Env,
    temperature: Database<Bytes, Bytes>,
    precipitation: Database<Bytes, Bytes>,
}

impl LmdbSeriesStore {
    /// Open (or create) a store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the environment in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - LMDB environment cannot be opened
    /// - A per-kind database cannot be created
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(SeriesKind::ALL.len() as u32)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_err)?;
        let temperature = create_kind_db(&env, &mut wtxn, SeriesKind::Temperature)?;
        let precipitation = create_kind_db(&env, &mut wtxn, SeriesKind::Precipitation)?;

        wtxn.commit().map_err(txn_err)?;

        Ok(Self {
            env,
            temperature,
            precipitation,
        })
    }

    fn db(&self, kind: SeriesKind) -> Database<Bytes, Bytes> {
        match kind {
            SeriesKind::Temperature => self.temperature,
            SeriesKind::Precipitation => self.precipitation,
        }
    }

    /// Decode every chunk in `[lower, upper)` of the key space.
    fn scan(
        &self,
        txn: &RoTxn<'_>,
        kind: SeriesKind,
        lower: Bound<[u8; ChunkKey::LEN]>,
        upper: Bound<[u8; ChunkKey::LEN]>,
    ) -> Result<Vec<(ChunkKey, PersistedChunk)>, LmdbStoreError> {
        let bounds: (Bound<&[u8]>, Bound<&[u8]>) = (as_slice_bound(&lower), as_slice_bound(&upper));

        let mut chunks = Vec::new();
        for entry in self.db(kind).range(txn, &bounds).map_err(txn_err)? {
            let (key, value) = entry.map_err(txn_err)?;
            let corrupt = |source| LmdbStoreError::Corrupt {
                kind,
                key: format!("{:02x?}", key),
                source,
            };
            let key = ChunkKey::decode(key).map_err(corrupt)?;
            let chunk = PersistedChunk::decode(value).map_err(corrupt)?;
            chunks.push((key, chunk));
        }
        Ok(chunks)
    }

    /// Merge `samples` into the database for `kind` in one write transaction.
    pub fn insert_sync(&self, kind: SeriesKind, samples: &[Sample]) -> Result<(), LmdbStoreError> {
        let incoming = partition_by_month(samples);
        if incoming.is_empty() {
            return Ok(());
        }

        let db = self.db(kind);
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;

        for chunk in incoming {
            let month = chunk.month();
            let lower = month
                .start()
                .map_or(Bound::Unbounded, |t| Bound::Included(ChunkKey::from_timestamp(t).encode()));
            let upper = month
                .next()
                .start()
                .map_or(Bound::Unbounded, |t| Bound::Excluded(ChunkKey::from_timestamp(t).encode()));

            let existing = self.scan(&wtxn, kind, lower, upper)?;

            let mut merged = chunk;
            for (key, stored) in existing {
                merged = stored.merge(&merged);
                db.delete(&mut wtxn, &key.encode()).map_err(txn_err)?;
            }

            let value = merged
                .encode()
                .map_err(|source| LmdbStoreError::Encode { kind, source })?;
            db.put(&mut wtxn, &merged.key().encode(), &value)
                .map_err(txn_err)?;
        }

        wtxn.commit().map_err(txn_err)
    }

    /// Read the samples of `kind` inside `range`.
    pub fn query_sync(&self, kind: SeriesKind, range: &DateRange) -> Result<Series, LmdbStoreError> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;

        let lower = range.from.map_or(Bound::Unbounded, |from| {
            Bound::Included(ChunkKey::from_timestamp(month_start(from)).encode())
        });
        let upper = range.to.map_or(Bound::Unbounded, |to| {
            Bound::Excluded(ChunkKey::from_timestamp(to).encode())
        });

        let series = self
            .scan(&rtxn, kind, lower, upper)?
            .into_iter()
            .flat_map(|(_, chunk)| chunk.into_samples())
            .filter(|sample| range.contains(sample.t))
            .collect();
        Ok(series)
    }

    /// Number of month chunks stored for `kind`.
    pub fn chunk_count(&self, kind: SeriesKind) -> Result<u64, LmdbStoreError> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        self.db(kind).len(&rtxn).map_err(txn_err)
    }
}

#[async_trait]
impl PersistentStore for LmdbSeriesStore {
    fn is_available(&self) -> bool {
        true
    }

    async fn bulk_insert(&self, kind: SeriesKind, samples: &[Sample]) -> ClimagraphResult<()> {
        // Chunk encoding and the write transaction run on the blocking pool.
        let store = self.clone();
        let samples = samples.to_vec();
        let count = samples.len();
        let inserted = tokio::task::spawn_blocking(move || store.insert_sync(kind, &samples))
            .await
            .map_err(|e| StorageError::InsertFailed {
                kind,
                reason: e.to_string(),
            })?;
        inserted?;
        tracing::debug!(kind = %kind, samples = count, "Inserted samples into LMDB");
        Ok(())
    }

    async fn query_range(&self, kind: SeriesKind, range: &DateRange) -> ClimagraphResult<Series> {
        Ok(self.query_sync(kind, range)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use climagraph_core::{filter, Timestamp};
    use tempfile::TempDir;

    fn create_test_store() -> (LmdbSeriesStore, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let store = LmdbSeriesStore::open(temp_dir.path(), 10).expect("store creation should succeed");
        (store, temp_dir)
    }

    fn day(y: i32, m: u32, d: u32) -> Timestamp {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0)
            .single()
            .expect("valid date")
    }

    fn winter() -> Series {
        vec![
            Sample::new(day(2006, 11, 29), -1.0),
            Sample::new(day(2006, 11, 30), -2.5),
            Sample::new(day(2006, 12, 1), -4.0),
            Sample::new(day(2006, 12, 15), -6.0),
            Sample::new(day(2007, 1, 2), -3.0),
        ]
    }

    #[tokio::test]
    async fn test_empty_store_returns_nothing() {
        let (store, _dir) = create_test_store();
        assert!(store.is_available());
        let got = store
            .query_range(SeriesKind::Temperature, &DateRange::full())
            .await
            .expect("query should succeed");
        assert!(got.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_inserts_of_both_kinds() {
        let (store, _dir) = create_test_store();
        let temperature_records = winter();
        let precipitation_records = winter();
        let (temperature, precipitation) = tokio::join!(
            store.bulk_insert(SeriesKind::Temperature, &temperature_records),
            store.bulk_insert(SeriesKind::Precipitation, &precipitation_records[..2]),
        );
        temperature.expect("temperature insert should succeed");
        precipitation.expect("precipitation insert should succeed");

        assert_eq!(store.chunk_count(SeriesKind::Temperature).unwrap(), 3);
        assert_eq!(store.chunk_count(SeriesKind::Precipitation).unwrap(), 1);
        let got = store
            .clone()
            .query_range(SeriesKind::Precipitation, &DateRange::full())
            .await
            .expect("query should succeed");
        assert_eq!(got, winter()[..2].to_vec());
    }

    #[tokio::test]
    async fn test_insert_then_full_query() {
        let (store, _dir) = create_test_store();
        store
            .bulk_insert(SeriesKind::Temperature, &winter())
            .await
            .expect("insert should succeed");

        let got = store
            .query_range(SeriesKind::Temperature, &DateRange::full())
            .await
            .expect("query should succeed");
        assert_eq!(got, winter());
        assert_eq!(store.chunk_count(SeriesKind::Temperature).unwrap(), 3);
    }

    #[tokio::test]
    async fn test_range_query_matches_filter() {
        let (store, _dir) = create_test_store();
        store.insert_sync(SeriesKind::Temperature, &winter()).unwrap();

        let ranges = [
            DateRange::between(day(2006, 11, 30), day(2006, 12, 15)),
            DateRange::since(day(2006, 12, 10)),
            DateRange::until(day(2006, 12, 1)),
            DateRange::between(day(2006, 12, 2), day(2006, 12, 3)),
            DateRange::between(day(2007, 1, 2), day(2006, 11, 1)),
        ];
        for range in ranges {
            let got = store.query_sync(SeriesKind::Temperature, &range).unwrap();
            assert_eq!(got, filter(&winter(), &range), "range {range}");
        }
    }

    #[tokio::test]
    async fn test_bulk_insert_is_idempotent() {
        let (store, _dir) = create_test_store();
        store.insert_sync(SeriesKind::Temperature, &winter()).unwrap();
        let once = store.query_sync(SeriesKind::Temperature, &DateRange::full()).unwrap();
        let chunks_once = store.chunk_count(SeriesKind::Temperature).unwrap();

        store.insert_sync(SeriesKind::Temperature, &winter()).unwrap();
        let twice = store.query_sync(SeriesKind::Temperature, &DateRange::full()).unwrap();

        assert_eq!(once, twice);
        assert_eq!(store.chunk_count(SeriesKind::Temperature).unwrap(), chunks_once);
    }

    #[tokio::test]
    async fn test_overlapping_insert_merges_month() {
        let (store, _dir) = create_test_store();
        store.insert_sync(SeriesKind::Temperature, &winter()).unwrap();

        // Earlier day in an existing month moves the chunk key.
        store
            .insert_sync(
                SeriesKind::Temperature,
                &[
                    Sample::new(day(2006, 12, 1), 10.0),
                    Sample::new(day(2006, 12, 20), 11.0),
                ],
            )
            .unwrap();
        store
            .insert_sync(SeriesKind::Temperature, &[Sample::new(day(2006, 11, 2), 12.0)])
            .unwrap();

        let december = store
            .query_sync(
                SeriesKind::Temperature,
                &DateRange::between(day(2006, 12, 1), day(2007, 1, 1)),
            )
            .unwrap();
        let values: Vec<f64> = december.iter().map(|s| s.v).collect();
        assert_eq!(values, vec![10.0, -6.0, 11.0]);

        let november = store
            .query_sync(
                SeriesKind::Temperature,
                &DateRange::between(day(2006, 11, 1), day(2006, 12, 1)),
            )
            .unwrap();
        assert_eq!(november.first().map(|s| s.t), Some(day(2006, 11, 2)));
        assert_eq!(november.len(), 3);
        assert_eq!(store.chunk_count(SeriesKind::Temperature).unwrap(), 3);
    }

    #[tokio::test]
    async fn test_kinds_are_isolated() {
        let (store, _dir) = create_test_store();
        store.insert_sync(SeriesKind::Temperature, &winter()).unwrap();

        let precipitation = store
            .query_sync(SeriesKind::Precipitation, &DateRange::full())
            .unwrap();
        assert!(precipitation.is_empty());
        assert_eq!(store.chunk_count(SeriesKind::Precipitation).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pre_epoch_samples_sort_first() {
        let (store, _dir) = create_test_store();
        let samples = vec![
            Sample::new(day(1881, 1, 1), 1.0),
            Sample::new(day(1969, 12, 31), 2.0),
            Sample::new(day(1970, 1, 1), 3.0),
        ];
        store.insert_sync(SeriesKind::Precipitation, &samples).unwrap();
        let got = store
            .query_sync(SeriesKind::Precipitation, &DateRange::full())
            .unwrap();
        assert_eq!(got, samples);
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        {
            let store = LmdbSeriesStore::open(temp_dir.path(), 10).unwrap();
            store.insert_sync(SeriesKind::Temperature, &winter()).unwrap();
        }
        let store = LmdbSeriesStore::open(temp_dir.path(), 10).unwrap();
        assert_eq!(
            store.query_sync(SeriesKind::Temperature, &DateRange::full()).unwrap(),
            winter()
        );
    }

    #[test]
    fn test_corrupt_error_maps_to_storage_error() {
        let err = LmdbStoreError::Corrupt {
            kind: SeriesKind::Temperature,
            key: "00".to_string(),
            source: ChunkError::Empty {
                month: "2006-12".to_string(),
            },
        };
        let core: climagraph_core::ClimagraphError = err.into();
        assert!(matches!(
            core,
            climagraph_core::ClimagraphError::Storage(StorageError::CorruptChunk { .. })
        ));
    }
}
