//! Schema-driven secondary indexes.
//!
//! A caller hands over the searchable fields of a record together with the
//! record's key and UUID. The engine keeps only the fields the search schema
//! names (plus the well-known `UUID` / `PowerState` indexes), and writes one
//! `value → key` entry per scalar value. Queries match indexed values against
//! a glob pattern and return the referencing keys.
//!
//! Index entries always live on the volatile tier.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use aggr_core::{IndexFields, SchemaDescriptor, SchemaSource};
use serde_json::Value;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::kv::IndexEntry;
use crate::pattern::KeyPattern;
use crate::resource::ResourceStore;
use crate::tables::{UUID_INDEX, WELL_KNOWN_INDEXES};

#[derive(Clone)]
pub struct SecondaryIndex {
    store: ResourceStore,
    schema: Arc<SchemaSource>,
}

impl SecondaryIndex {
    pub fn new(store: ResourceStore, schema: Arc<SchemaSource>) -> Self {
        Self { store, schema }
    }

    pub fn schema(&self) -> StoreResult<Arc<SchemaDescriptor>> {
        Ok(self.schema.get()?)
    }

    /// Index `key` under every searchable field in `fields`. The `UUID`
    /// field is always set to `uuid` first.
    pub fn create_index(&self, fields: &IndexFields, key: &str, uuid: &str) -> StoreResult<()> {
        let projected = self.project(fields, key, uuid)?;
        for (index, entries) in &projected {
            self.store
                .kv()
                .index_add(index, entries)
                .map_err(|e| index_write_failed(index, e))?;
        }
        debug!(%key, indexes = projected.len(), "index created");
        Ok(())
    }

    /// Like [`create_index`](Self::create_index), but first drops the
    /// entries `key` already has in each index being written.
    pub fn update_index(&self, fields: &IndexFields, key: &str, uuid: &str) -> StoreResult<()> {
        let projected = self.project(fields, key, uuid)?;
        let kv = self.store.kv();
        for (index, entries) in &projected {
            kv.index_remove(index, key)
                .and_then(|_| kv.index_add(index, entries))
                .map_err(|e| index_write_failed(index, e))?;
        }
        debug!(%key, indexes = projected.len(), "index updated");
        Ok(())
    }

    /// Keys whose value in `index` matches the glob `pattern`.
    /// No match yields an empty set.
    pub fn query(&self, index: &str, pattern: &str) -> StoreResult<BTreeSet<String>> {
        let pattern = KeyPattern::new(pattern)?;
        let keys = self
            .store
            .kv()
            .index_scan(index, &pattern)?
            .into_iter()
            .map(|entry| entry.key)
            .collect();
        Ok(keys)
    }

    /// Keys whose value in `index` contains `needle` (`*needle*`).
    pub fn search(&self, index: &str, needle: &str) -> StoreResult<BTreeSet<String>> {
        self.query(index, &format!("*{needle}*"))
    }

    /// Drop every entry of `index` referencing `key`. Fails with `NotFound`
    /// when there was none.
    pub fn remove(&self, index: &str, key: &str) -> StoreResult<()> {
        match self.store.kv().index_remove(index, key)? {
            0 => Err(StoreError::not_found(index, key)),
            removed => {
                debug!(%index, %key, removed, "index entries removed");
                Ok(())
            }
        }
    }

    fn project(
        &self,
        fields: &IndexFields,
        key: &str,
        uuid: &str,
    ) -> StoreResult<BTreeMap<String, Vec<IndexEntry>>> {
        let schema = self.schema()?;
        let uuid_field = UUID_INDEX.to_string();
        let uuid = Value::String(uuid.to_string());
        let fields = fields
            .iter()
            .filter(|(name, _)| name.as_str() != UUID_INDEX)
            .chain(std::iter::once((&uuid_field, &uuid)));

        let mut projected = BTreeMap::new();
        for (name, value) in fields {
            if !schema.is_indexed(name) && !WELL_KNOWN_INDEXES.contains(&name.as_str()) {
                debug!(field = %name, "field not in search schema, skipped");
                continue;
            }
            let entries: Vec<IndexEntry> = scalar_values(value)
                .into_iter()
                .map(|v| IndexEntry::new(v, key))
                .collect();
            if !entries.is_empty() {
                projected.insert(name.clone(), entries);
            }
        }
        Ok(projected)
    }
}

/// Text form of every scalar in `value`. Arrays contribute each element;
/// objects and nulls contribute nothing.
fn scalar_values(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Number(n) => vec![n.to_string()],
        Value::Bool(b) => vec![b.to_string()],
        Value::Array(items) => items.iter().flat_map(scalar_values).collect(),
        Value::Null | Value::Object(_) => Vec::new(),
    }
}

fn index_write_failed(index: &str, err: StoreError) -> StoreError {
    match err {
        StoreError::IndexWriteFailed { .. } => err,
        other => StoreError::IndexWriteFailed {
            index: index.to_string(),
            reason: other.to_string(),
        },
    }
}
