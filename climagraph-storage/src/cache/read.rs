//! Read results and background write-back handles.

use std::fmt;

use climagraph_core::{ClimagraphResult, Series, SeriesKind, StorageError};
use serde::Serialize;
use tokio::task::JoinHandle;

/// Tier that answered a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadSource {
    Memory,
    Persistent,
    Remote,
}

impl ReadSource {
    /// Local tiers count as cache hits; the network does not.
    pub fn is_cache(&self) -> bool {
        !matches!(self, ReadSource::Remote)
    }
}

impl fmt::Display for ReadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReadSource::Memory => "memory",
            ReadSource::Persistent => "persistent",
            ReadSource::Remote => "remote",
        })
    }
}

/// Handle to a background write-back of a freshly fetched series.
///
/// Dropping the handle does not cancel the write.
#[derive(Debug)]
pub struct PersistHandle {
    kind: SeriesKind,
    handle: JoinHandle<ClimagraphResult<()>>,
}

impl PersistHandle {
    pub(crate) fn new(kind: SeriesKind, handle: JoinHandle<ClimagraphResult<()>>) -> Self {
        Self { kind, handle }
    }

    pub fn kind(&self) -> SeriesKind {
        self.kind
    }

    /// True once the write has completed, successfully or not.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the write to finish and return its outcome.
    pub async fn wait(self) -> ClimagraphResult<()> {
        match self.handle.await {
            Ok(result) => result,
            Err(join_err) => Err(StorageError::WriteBackAborted {
                kind: self.kind,
                reason: join_err.to_string(),
            }
            .into()),
        }
    }
}

/// Result of a tiered read.
///
/// The data is always an owned copy; mutating it never affects a cached
/// entry.
#[derive(Debug)]
pub struct SeriesRead {
    data: Series,
    source: ReadSource,
    pending_persist: Option<PersistHandle>,
}

impl SeriesRead {
    /// A read served by a local tier.
    pub fn from_tier(data: Series, source: ReadSource) -> Self {
        Self {
            data,
            source,
            pending_persist: None,
        }
    }

    /// A read served by the network.
    pub fn from_remote(data: Series, pending_persist: Option<PersistHandle>) -> Self {
        Self {
            data,
            source: ReadSource::Remote,
            pending_persist,
        }
    }

    pub fn data(&self) -> &Series {
        &self.data
    }

    pub fn into_data(self) -> Series {
        self.data
    }

    pub fn source(&self) -> ReadSource {
        self.source
    }

    /// True when no network call was needed.
    pub fn from_cache(&self) -> bool {
        self.source.is_cache()
    }

    pub fn pending_persist(&self) -> Option<&PersistHandle> {
        self.pending_persist.as_ref()
    }

    /// Detach the write-back handle, leaving `None` behind.
    pub fn take_pending_persist(&mut self) -> Option<PersistHandle> {
        self.pending_persist.take()
    }

    pub fn into_parts(self) -> (Series, ReadSource, Option<PersistHandle>) {
        (self.data, self.source, self.pending_persist)
    }
}
