//! The key-value store seam.
//!
//! Everything above this trait is backend-agnostic: the resource store,
//! index engine, cascade coordinator, and vault only ever talk to a
//! `dyn KeyValueStore`. `RedbStore` is the shipped implementation; tests
//! substitute their own per tier.

use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::pattern::KeyPattern;

/// One secondary-index entry: an indexed value and the key of the record it
/// was derived from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexEntry {
    pub value: String,
    pub key: String,
}

impl IndexEntry {
    pub fn new(value: impl Into<String>, key: impl Into<String>) -> Self {
        IndexEntry {
            value: value.into(),
            key: key.into(),
        }
    }
}

/// A record removed by a pattern delete.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId {
    pub table: String,
    pub key: String,
}

impl RecordId {
    pub fn new(table: impl Into<String>, key: impl Into<String>) -> Self {
        RecordId {
            table: table.into(),
            key: key.into(),
        }
    }

    /// `{table}:{key}`, the form patterns are matched against.
    pub fn address(&self) -> String {
        record_address(&self.table, &self.key)
    }
}

/// Address of a record as seen by pattern operations: `{table}:{key}`.
pub fn record_address(table: &str, key: &str) -> String {
    format!("{table}:{key}")
}

/// Primitive operations of one storage tier.
///
/// Single-key operations are atomic. Multi-key operations
/// (`delete_by_pattern`, `index_remove`) are not atomic with respect to
/// concurrent readers.
pub trait KeyValueStore: Send + Sync {
    /// Insert a new record. Fails with `KeyAlreadyExists` if present.
    fn create(&self, table: &str, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Fetch a record's payload. Fails with `NotFound` if absent.
    fn read(&self, table: &str, key: &str) -> StoreResult<Vec<u8>>;

    /// Replace an existing record. Fails with `NotFound` if absent.
    fn update(&self, table: &str, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Insert or replace.
    fn upsert(&self, table: &str, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Remove a record. Fails with `NotFound` if absent.
    fn delete(&self, table: &str, key: &str) -> StoreResult<()>;

    fn exists(&self, table: &str, key: &str) -> StoreResult<bool>;

    /// All keys of a table, in no particular order.
    fn list_keys(&self, table: &str) -> StoreResult<Vec<String>>;

    /// Payload of the first record under `key` in any table.
    fn find_by_key(&self, key: &str) -> StoreResult<Vec<u8>>;

    /// Remove every record whose address (`{table}:{key}`) matches.
    /// Returns the records removed.
    fn delete_by_pattern(&self, pattern: &KeyPattern) -> StoreResult<Vec<RecordId>>;

    /// Add entries to an index. Re-adding an existing entry is a no-op.
    fn index_add(&self, index: &str, entries: &[IndexEntry]) -> StoreResult<()>;

    /// Remove every entry of `index` that references `key`. Returns the
    /// number removed; zero is not an error at this level.
    fn index_remove(&self, index: &str, key: &str) -> StoreResult<usize>;

    /// Entries of `index` whose value matches `pattern`.
    fn index_scan(&self, index: &str, pattern: &KeyPattern) -> StoreResult<Vec<IndexEntry>>;
}
