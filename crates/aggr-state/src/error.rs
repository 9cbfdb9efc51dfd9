//! Error types for the aggregation persistence layer.

use thiserror::Error;

use crate::cascade::DeleteStep;

/// Result type alias for persistence operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Backend cause carried by infrastructure errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur during persistence operations.
///
/// Every variant names the table/key (or index) it concerns; backend
/// failures also name the operation and keep the backend error as their
/// source. None of them carry secret material.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no data with key {key} found in {table}")]
    NotFound { table: String, key: String },

    #[error("key {key} already exists in {table}")]
    KeyAlreadyExists { table: String, key: String },

    #[error("store {target} unavailable: {source}")]
    ConnectionFailed {
        /// Database path, or `in-memory`.
        target: String,
        #[source]
        source: BoxError,
    },

    #[error("{op} {table}/{key}: transaction error: {source}")]
    Transaction {
        op: &'static str,
        table: String,
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("{op} {table}/{key}: read error: {source}")]
    Read {
        op: &'static str,
        table: String,
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("{op} {table}/{key}: write error: {source}")]
    Write {
        op: &'static str,
        table: String,
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("serialization error for {table}: {reason}")]
    Serialize { table: String, reason: String },

    #[error("malformed {table} record {key}: {reason}")]
    DeserializationFailed {
        table: String,
        key: String,
        reason: String,
    },

    #[error("{table} {key}: credential decryption failed: {reason}")]
    DecryptionFailed {
        table: String,
        key: String,
        reason: String,
    },

    #[error("{table} {key}: credential encryption failed: {reason}")]
    EncryptionFailed {
        table: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    SchemaLoadFailed(#[from] aggr_core::SchemaError),

    #[error("failed to write index {index}: {reason}")]
    IndexWriteFailed { index: String, reason: String },

    #[error("invalid key pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("delete of {key} aborted at {step:?}: {source}")]
    CascadeAborted {
        step: DeleteStep,
        key: String,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    pub fn not_found(table: &str, key: &str) -> Self {
        StoreError::NotFound {
            table: table.to_string(),
            key: key.to_string(),
        }
    }

    pub fn already_exists(table: &str, key: &str) -> Self {
        StoreError::KeyAlreadyExists {
            table: table.to_string(),
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::KeyAlreadyExists { .. })
    }
}
