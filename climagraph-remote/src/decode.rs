//! Feed decoding.
//!
//! A feed is a JSON array of `{"t": "YYYY-MM-DD", "v": number}` records.

use climagraph_core::{from_day_key, RemoteError, Sample, Series, SeriesKind};
use serde::Deserialize;

#[derive(Deserialize)]
struct Record {
    t: String,
    v: f64,
}

/// Decode a feed body into a series.
///
/// The first bad record aborts the decode with its index; a partially
/// decoded series is never returned.
pub fn decode_records(kind: SeriesKind, body: &[u8]) -> Result<Series, RemoteError> {
    let records: Vec<serde_json::Value> =
        serde_json::from_slice(body).map_err(|e| RemoteError::MalformedFeed {
            kind,
            reason: e.to_string(),
        })?;

    records
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            let malformed = |reason: String| RemoteError::MalformedRecord {
                kind,
                index,
                reason,
            };
            let record: Record = serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;
            let t = from_day_key(&record.t).map_err(|e| malformed(e.to_string()))?;
            Ok(Sample::new(t, record.v))
        })
        .collect()
}
