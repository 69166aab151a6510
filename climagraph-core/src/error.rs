//! Error types for climagraph operations

use crate::SeriesKind;
use thiserror::Error;

/// Persistent store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Insert failed for {kind}: {reason}")]
    InsertFailed { kind: SeriesKind, reason: String },

    #[error("Query failed for {kind}: {reason}")]
    QueryFailed { kind: SeriesKind, reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Corrupt chunk for {kind} at key {key}: {reason}")]
    CorruptChunk {
        kind: SeriesKind,
        key: String,
        reason: String,
    },

    #[error("Write-back for {kind} did not complete: {reason}")]
    WriteBackAborted { kind: SeriesKind, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Remote fetch errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Request for {kind} to {url} failed: {reason}")]
    RequestFailed {
        kind: SeriesKind,
        url: String,
        reason: String,
    },

    #[error("Endpoint {url} returned status {status}: {body}")]
    BadStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Malformed record {index} in {kind} feed: {reason}")]
    MalformedRecord {
        kind: SeriesKind,
        index: usize,
        reason: String,
    },

    #[error("Malformed {kind} feed: {reason}")]
    MalformedFeed { kind: SeriesKind, reason: String },

    #[error("Fetch for {kind} did not complete: {reason}")]
    FetchAborted { kind: SeriesKind, reason: String },
}

/// Date key encoding/decoding errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid day key {key:?}: expected YYYY-MM-DD")]
    InvalidDayKey { key: String },

    #[error("Invalid month key {key:?}: expected YYYY-MM")]
    InvalidMonthKey { key: String },

    #[error("Timestamp out of range for {what}")]
    OutOfRange { what: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Master error type for all climagraph errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClimagraphError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for climagraph operations.
pub type ClimagraphResult<T> = Result<T, ClimagraphError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_insert_failed() {
        let err = StorageError::InsertFailed {
            kind: SeriesKind::Temperature,
            reason: "disk full".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Insert failed"));
        assert!(msg.contains("temperature"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn test_remote_error_display_malformed_record() {
        let err = RemoteError::MalformedRecord {
            kind: SeriesKind::Precipitation,
            index: 17,
            reason: "missing field `v`".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("record 17"));
        assert!(msg.contains("precipitation"));
        assert!(msg.contains("missing field"));
    }

    #[test]
    fn test_remote_error_display_bad_status() {
        let err = RemoteError::BadStatus {
            url: "http://localhost/data/temperature.json".to_string(),
            status: 404,
            body: "not found".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("404"));
        assert!(msg.contains("temperature.json"));
    }

    #[test]
    fn test_codec_error_display_invalid_day_key() {
        let err = CodecError::InvalidDayKey {
            key: "2020-13-01".to_string(),
        };
        assert!(format!("{}", err).contains("2020-13-01"));
    }

    #[test]
    fn test_climagraph_error_from_variants() {
        let storage = ClimagraphError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, ClimagraphError::Storage(_)));

        let remote = ClimagraphError::from(RemoteError::MalformedFeed {
            kind: SeriesKind::Temperature,
            reason: "expected array".to_string(),
        });
        assert!(matches!(remote, ClimagraphError::Remote(_)));

        let codec = ClimagraphError::from(CodecError::InvalidMonthKey {
            key: "x".to_string(),
        });
        assert!(matches!(codec, ClimagraphError::Codec(_)));

        let config = ClimagraphError::from(ConfigError::MissingRequired {
            field: "remote.base_url".to_string(),
        });
        assert!(matches!(config, ClimagraphError::Config(_)));
    }

    #[test]
    fn test_errors_are_cloneable_for_shared_waiters() {
        let err = ClimagraphError::from(RemoteError::RequestFailed {
            kind: SeriesKind::Temperature,
            url: "http://example.invalid".to_string(),
            reason: "timeout".to_string(),
        });
        assert_eq!(err.clone(), err);
    }
}
