//! ResourceStore — typed CRUD over one storage tier.
//!
//! The same API works against either tier; which one is fixed when the
//! store is obtained from [`Tiers::connection`](crate::tier::Tiers::connection).
//! Values are JSON-encoded through [`codec`](crate::codec).

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::codec;
use crate::error::StoreResult;
use crate::kv::{KeyValueStore, RecordId};
use crate::pattern::KeyPattern;
use crate::tier::Tier;

#[derive(Clone)]
pub struct ResourceStore {
    tier: Tier,
    kv: Arc<dyn KeyValueStore>,
}

impl ResourceStore {
    pub fn new(tier: Tier, kv: Arc<dyn KeyValueStore>) -> Self {
        Self { tier, kv }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// The underlying primitive store.
    pub fn kv(&self) -> &dyn KeyValueStore {
        self.kv.as_ref()
    }

    /// Persist a new record. Fails with `KeyAlreadyExists` if present.
    pub fn create<T: Serialize + ?Sized>(&self, table: &str, key: &str, value: &T) -> StoreResult<()> {
        self.kv.create(table, key, &codec::encode(table, value)?)
    }

    /// Fetch and decode a record. Fails with `NotFound` if absent.
    pub fn read<T: DeserializeOwned>(&self, table: &str, key: &str) -> StoreResult<T> {
        let bytes = self.kv.read(table, key)?;
        codec::decode(table, key, &bytes)
    }

    /// Fetch a record's payload without decoding it.
    pub fn read_raw(&self, table: &str, key: &str) -> StoreResult<Vec<u8>> {
        self.kv.read(table, key)
    }

    /// Replace an existing record. Fails with `NotFound` if absent.
    pub fn update<T: Serialize + ?Sized>(&self, table: &str, key: &str, value: &T) -> StoreResult<()> {
        self.kv.update(table, key, &codec::encode(table, value)?)
    }

    /// Insert or replace a record.
    pub fn upsert<T: Serialize + ?Sized>(&self, table: &str, key: &str, value: &T) -> StoreResult<()> {
        self.kv.upsert(table, key, &codec::encode(table, value)?)
    }

    /// Remove a record. Fails with `NotFound` if absent.
    pub fn delete(&self, table: &str, key: &str) -> StoreResult<()> {
        self.kv.delete(table, key)
    }

    pub fn exists(&self, table: &str, key: &str) -> StoreResult<bool> {
        self.kv.exists(table, key)
    }

    pub fn list_keys(&self, table: &str) -> StoreResult<HashSet<String>> {
        Ok(self.kv.list_keys(table)?.into_iter().collect())
    }

    /// Decode the first record stored under `key` in any table.
    pub fn find_by_key<T: DeserializeOwned>(&self, key: &str) -> StoreResult<T> {
        let bytes = self.kv.find_by_key(key)?;
        codec::decode("*", key, &bytes)
    }

    /// Delete every record of this tier whose `{table}:{key}` address
    /// matches `pattern`, returning what was removed. Not transactional
    /// across keys; an over-broad pattern removes unrelated records.
    pub fn delete_by_pattern(&self, pattern: &str) -> StoreResult<Vec<RecordId>> {
        let pattern = KeyPattern::new(pattern)?;
        let removed = self.kv.delete_by_pattern(&pattern)?;
        debug!(tier = %self.tier, pattern = pattern.as_str(), removed = removed.len(), "bulk delete");
        Ok(removed)
    }
}
