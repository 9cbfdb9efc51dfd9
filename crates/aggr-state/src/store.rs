//! RedbStore — redb-backed implementation of a storage tier.
//!
//! A tier is one redb database holding every logical table plus the
//! secondary-index entries. Each single-key operation runs in its own write
//! transaction, so existence checks and writes are atomic. The store supports
//! both on-disk and in-memory backends; the latter serves the volatile tier
//! and tests.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::kv::{IndexEntry, KeyValueStore, RecordId, record_address};
use crate::pattern::KeyPattern;
use crate::tables::{INDEX_ENTRIES, RECORDS};

/// Convert a backend error into a `StoreError` variant naming the operation
/// and the table/key it was running against.
macro_rules! map_err {
    ($variant:ident, $op:expr, $table:expr, $key:expr) => {
        |e| StoreError::$variant {
            op: $op,
            table: $table.to_string(),
            key: $key.to_string(),
            source: e.into(),
        }
    };
}

type RecordTable<'txn> = redb::Table<'txn, (&'static str, &'static str), &'static [u8]>;
type IndexTable<'txn> = redb::Table<'txn, (&'static str, &'static str, &'static str), ()>;

/// Table/key placeholder for operations that span a whole table or tier.
const ANY: &str = "*";

/// Thread-safe storage tier backed by redb.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(|e| StoreError::ConnectionFailed {
            target: path.display().to_string(),
            source: e.into(),
        })?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store.
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(|e| StoreError::ConnectionFailed {
                target: "in-memory".to_string(),
                source: e.into(),
            })?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StoreResult<()> {
        let op = "open";
        let txn = self.db.begin_write().map_err(map_err!(Transaction, op, ANY, ANY))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(RECORDS)
            .map_err(map_err!(Write, op, "records", ANY))?;
        txn.open_table(INDEX_ENTRIES)
            .map_err(map_err!(Write, op, "index_entries", ANY))?;
        txn.commit().map_err(map_err!(Transaction, op, ANY, ANY))?;
        Ok(())
    }

    /// Run `f` against the records table inside one write transaction.
    fn write_records<T>(
        &self,
        op: &'static str,
        table: &str,
        key: &str,
        f: impl FnOnce(&mut RecordTable<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction, op, table, key))?;
        let result = {
            let mut records = txn.open_table(RECORDS).map_err(map_err!(Write, op, table, key))?;
            f(&mut records)?
        };
        txn.commit().map_err(map_err!(Transaction, op, table, key))?;
        Ok(result)
    }

    /// Run `f` against the index table inside one write transaction.
    fn write_index<T>(
        &self,
        op: &'static str,
        index: &str,
        key: &str,
        f: impl FnOnce(&mut IndexTable<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction, op, index, key))?;
        let result = {
            let mut entries = txn
                .open_table(INDEX_ENTRIES)
                .map_err(map_err!(Write, op, index, key))?;
            f(&mut entries)?
        };
        txn.commit().map_err(map_err!(Transaction, op, index, key))?;
        Ok(result)
    }

    /// Entries of one index, in `(value, key)` order.
    fn index_entries(&self, op: &'static str, index: &str) -> StoreResult<Vec<IndexEntry>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction, op, index, ANY))?;
        let table = txn.open_table(INDEX_ENTRIES).map_err(map_err!(Read, op, index, ANY))?;
        let mut entries = Vec::new();
        for item in table
            .range((index, "", "")..)
            .map_err(map_err!(Read, op, index, ANY))?
        {
            let (k, _) = item.map_err(map_err!(Read, op, index, ANY))?;
            let (idx, value, key) = k.value();
            if idx != index {
                break;
            }
            entries.push(IndexEntry::new(value, key));
        }
        Ok(entries)
    }
}

impl KeyValueStore for RedbStore {
    fn create(&self, table: &str, key: &str, value: &[u8]) -> StoreResult<()> {
        let op = "create";
        self.write_records(op, table, key, |records| {
            if records
                .get((table, key))
                .map_err(map_err!(Read, op, table, key))?
                .is_some()
            {
                return Err(StoreError::already_exists(table, key));
            }
            records
                .insert((table, key), value)
                .map_err(map_err!(Write, op, table, key))?;
            Ok(())
        })?;
        debug!(%table, %key, "record created");
        Ok(())
    }

    fn read(&self, table: &str, key: &str) -> StoreResult<Vec<u8>> {
        let op = "read";
        let txn = self.db.begin_read().map_err(map_err!(Transaction, op, table, key))?;
        let records = txn.open_table(RECORDS).map_err(map_err!(Read, op, table, key))?;
        match records
            .get((table, key))
            .map_err(map_err!(Read, op, table, key))?
        {
            Some(guard) => Ok(guard.value().to_vec()),
            None => Err(StoreError::not_found(table, key)),
        }
    }

    fn update(&self, table: &str, key: &str, value: &[u8]) -> StoreResult<()> {
        let op = "update";
        self.write_records(op, table, key, |records| {
            if records
                .get((table, key))
                .map_err(map_err!(Read, op, table, key))?
                .is_none()
            {
                return Err(StoreError::not_found(table, key));
            }
            records
                .insert((table, key), value)
                .map_err(map_err!(Write, op, table, key))?;
            Ok(())
        })?;
        debug!(%table, %key, "record updated");
        Ok(())
    }

    fn upsert(&self, table: &str, key: &str, value: &[u8]) -> StoreResult<()> {
        let op = "upsert";
        self.write_records(op, table, key, |records| {
            records
                .insert((table, key), value)
                .map_err(map_err!(Write, op, table, key))?;
            Ok(())
        })?;
        debug!(%table, %key, "record stored");
        Ok(())
    }

    fn delete(&self, table: &str, key: &str) -> StoreResult<()> {
        let op = "delete";
        self.write_records(op, table, key, |records| {
            match records
                .remove((table, key))
                .map_err(map_err!(Write, op, table, key))?
            {
                Some(_) => Ok(()),
                None => Err(StoreError::not_found(table, key)),
            }
        })?;
        debug!(%table, %key, "record deleted");
        Ok(())
    }

    fn exists(&self, table: &str, key: &str) -> StoreResult<bool> {
        let op = "exists";
        let txn = self.db.begin_read().map_err(map_err!(Transaction, op, table, key))?;
        let records = txn.open_table(RECORDS).map_err(map_err!(Read, op, table, key))?;
        Ok(records
            .get((table, key))
            .map_err(map_err!(Read, op, table, key))?
            .is_some())
    }

    fn list_keys(&self, table: &str) -> StoreResult<Vec<String>> {
        let op = "list_keys";
        let txn = self.db.begin_read().map_err(map_err!(Transaction, op, table, ANY))?;
        let records = txn.open_table(RECORDS).map_err(map_err!(Read, op, table, ANY))?;
        let mut keys = Vec::new();
        for item in records
            .range((table, "")..)
            .map_err(map_err!(Read, op, table, ANY))?
        {
            let (k, _) = item.map_err(map_err!(Read, op, table, ANY))?;
            let (t, key) = k.value();
            if t != table {
                break;
            }
            keys.push(key.to_string());
        }
        Ok(keys)
    }

    fn find_by_key(&self, key: &str) -> StoreResult<Vec<u8>> {
        let op = "find_by_key";
        let txn = self.db.begin_read().map_err(map_err!(Transaction, op, ANY, key))?;
        let records = txn.open_table(RECORDS).map_err(map_err!(Read, op, ANY, key))?;
        for item in records.iter().map_err(map_err!(Read, op, ANY, key))? {
            let (k, v) = item.map_err(map_err!(Read, op, ANY, key))?;
            if k.value().1 == key {
                return Ok(v.value().to_vec());
            }
        }
        Err(StoreError::not_found(ANY, key))
    }

    fn delete_by_pattern(&self, pattern: &KeyPattern) -> StoreResult<Vec<RecordId>> {
        let op = "delete_by_pattern";
        let glob = pattern.as_str();
        let removed = self.write_records(op, ANY, glob, |records| {
            let mut doomed = Vec::new();
            for item in records.iter().map_err(map_err!(Read, op, ANY, glob))? {
                let (k, _) = item.map_err(map_err!(Read, op, ANY, glob))?;
                let (table, key) = k.value();
                if pattern.matches(&record_address(table, key)) {
                    doomed.push(RecordId::new(table, key));
                }
            }
            for record in &doomed {
                records
                    .remove((record.table.as_str(), record.key.as_str()))
                    .map_err(map_err!(Write, op, record.table, record.key))?;
            }
            Ok(doomed)
        })?;
        debug!(pattern = glob, removed = removed.len(), "records deleted by pattern");
        Ok(removed)
    }

    fn index_add(&self, index: &str, entries: &[IndexEntry]) -> StoreResult<()> {
        self.write_index("index_add", index, ANY, |table| {
            for entry in entries {
                table
                    .insert((index, entry.value.as_str(), entry.key.as_str()), ())
                    .map_err(|e| StoreError::IndexWriteFailed {
                        index: index.to_string(),
                        reason: e.to_string(),
                    })?;
            }
            Ok(())
        })
    }

    fn index_remove(&self, index: &str, key: &str) -> StoreResult<usize> {
        let op = "index_remove";
        let doomed: Vec<IndexEntry> = self
            .index_entries(op, index)?
            .into_iter()
            .filter(|entry| entry.key == key)
            .collect();
        if doomed.is_empty() {
            return Ok(0);
        }
        self.write_index(op, index, key, |table| {
            for entry in &doomed {
                table
                    .remove((index, entry.value.as_str(), entry.key.as_str()))
                    .map_err(map_err!(Write, op, index, key))?;
            }
            Ok(())
        })?;
        Ok(doomed.len())
    }

    fn index_scan(&self, index: &str, pattern: &KeyPattern) -> StoreResult<Vec<IndexEntry>> {
        Ok(self
            .index_entries("index_scan", index)?
            .into_iter()
            .filter(|entry| pattern.matches(&entry.value))
            .collect())
    }
}
