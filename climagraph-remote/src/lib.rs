//! climagraph Remote - Series Fetcher
//!
//! Retrieves complete named series from an HTTP endpoint and decodes them into
//! [`Series`] values. Range filtering, when wanted, happens after the full
//! series has been fetched.

pub mod config;
pub mod decode;
pub mod http;

pub use config::RemoteConfig;
pub use decode::decode_records;
pub use http::{HttpFetchError, HttpRemoteFetcher};

use async_trait::async_trait;
use climagraph_core::{filter, ClimagraphResult, DateRange, Series, SeriesKind};

/// Source of complete series over the network.
///
/// Implementations fetch the whole series for a kind. Any malformed record
/// fails the entire fetch.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// Fetch every sample of `kind`, in ascending time order.
    async fn fetch_full(&self, kind: SeriesKind) -> ClimagraphResult<Series>;

    /// Fetch the full series and keep only the samples inside `range`.
    async fn fetch(&self, kind: SeriesKind, range: &DateRange) -> ClimagraphResult<Series> {
        let full = self.fetch_full(kind).await?;
        if range.is_full() {
            return Ok(full);
        }
        Ok(filter(&full, range))
    }
}
