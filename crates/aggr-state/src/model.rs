//! AggregationStore — the persistence API used by aggregation logic.
//!
//! Each method knows which tier its table lives in: live inventory
//! (systems, chassis, managers, in-flight operations, indexes) goes to the
//! volatile tier; credentials and registry files go to the durable tier.

use std::collections::BTreeSet;
use std::sync::Arc;

use aggr_core::{AggrConfig, Chassis, ComputerSystem, IndexFields, SchemaSource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::cascade::{CascadeDelete, DeleteReport};
use crate::error::{StoreError, StoreResult};
use crate::index::SecondaryIndex;
use crate::pattern::KeyPattern;
use crate::resource::ResourceStore;
use crate::tables::*;
use crate::tier::{Tier, Tiers};
use crate::types::{AggregationSource, Plugin, SystemOperation, SystemReset, Target};
use crate::vault::{CredentialCipher, CredentialVault};

#[derive(Clone)]
pub struct AggregationStore {
    tiers: Tiers,
    index: SecondaryIndex,
    cascade: CascadeDelete,
    vault: CredentialVault,
}

impl AggregationStore {
    pub fn new(tiers: Tiers, schema: Arc<SchemaSource>, cipher: Arc<dyn CredentialCipher>) -> Self {
        let live = tiers.connection(Tier::InMemory);
        let index = SecondaryIndex::new(live.clone(), schema);
        let cascade = CascadeDelete::new(live, index.clone());
        let vault = CredentialVault::new(tiers.connection(Tier::OnDisk), cipher);
        Self {
            tiers,
            index,
            cascade,
            vault,
        }
    }

    /// Open the tiers named in `config`; the search schema is read lazily
    /// from `config.search.schema_path`.
    pub fn open(config: &AggrConfig, cipher: Arc<dyn CredentialCipher>) -> StoreResult<Self> {
        let tiers = Tiers::open(&config.storage)?;
        let schema = Arc::new(SchemaSource::new(&config.search.schema_path));
        Ok(Self::new(tiers, schema, cipher))
    }

    pub fn connection(&self, tier: Tier) -> ResourceStore {
        self.tiers.connection(tier)
    }

    pub fn index(&self) -> &SecondaryIndex {
        &self.index
    }

    pub fn vault(&self) -> &CredentialVault {
        &self.vault
    }

    fn live(&self) -> ResourceStore {
        self.tiers.connection(Tier::InMemory)
    }

    fn durable(&self) -> ResourceStore {
        self.tiers.connection(Tier::OnDisk)
    }

    // ── Generic resources (volatile) ───────────────────────────────

    /// Fetch a resource document stored by [`generic_save`](Self::generic_save).
    pub fn get_resource(&self, table: &str, key: &str) -> StoreResult<String> {
        self.live().read(table, key)
    }

    /// Store (or overwrite) a resource document as-is.
    pub fn generic_save(&self, body: &str, table: &str, key: &str) -> StoreResult<()> {
        self.live().upsert(table, key, body)
    }

    /// Fetch a resource document by key without knowing its table.
    pub fn get_resource_details(&self, key: &str) -> StoreResult<String> {
        self.live().find_by_key(key)
    }

    // ── Compute systems and chassis (volatile) ─────────────────────

    pub fn get_compute_system(&self, key: &str) -> StoreResult<ComputerSystem> {
        self.live().read(COMPUTER_SYSTEM, key)
    }

    pub fn save_compute_system(&self, system: &ComputerSystem, key: &str) -> StoreResult<()> {
        debug!(%key, "saving compute system");
        self.live().upsert(COMPUTER_SYSTEM, key, system)
    }

    /// Replace an existing compute system document. Fails with `NotFound`
    /// if the system was never saved.
    pub fn update_compute_system<T: Serialize + ?Sized>(&self, key: &str, data: &T) -> StoreResult<()> {
        self.live().update(COMPUTER_SYSTEM, key, data)
    }

    pub fn save_chassis(&self, chassis: &Chassis, key: &str) -> StoreResult<()> {
        debug!(%key, "saving chassis");
        self.live().upsert(CHASSIS, key, chassis)
    }

    pub fn delete_managers_data(&self, key: &str) -> StoreResult<()> {
        self.live().delete(MANAGERS, key)
    }

    /// Cascading delete of a compute system: the system, every live record
    /// sharing its identifier, and all of its index entries.
    pub fn delete_compute_system(&self, key: &str) -> StoreResult<DeleteReport> {
        self.cascade.delete(COMPUTER_SYSTEM, key)
    }

    // ── Search indexes (volatile) ──────────────────────────────────

    pub fn save_index(&self, fields: &IndexFields, key: &str, uuid: &str) -> StoreResult<()> {
        self.index.create_index(fields, key, uuid)
    }

    pub fn update_index(&self, fields: &IndexFields, key: &str, uuid: &str) -> StoreResult<()> {
        self.index.update_index(fields, key, uuid)
    }

    /// Keys whose `index` value contains `needle`.
    pub fn get_string(&self, index: &str, needle: &str) -> StoreResult<BTreeSet<String>> {
        self.index.search(index, needle)
    }

    // ── System operation / reset bookkeeping (volatile) ────────────

    pub fn add_system_operation_info(&self, system_uri: &str, op: &SystemOperation) -> StoreResult<()> {
        self.live().upsert(SYSTEM_OPERATION, system_uri, op)
    }

    pub fn get_system_operation_info(&self, system_uri: &str) -> StoreResult<SystemOperation> {
        self.live().read(SYSTEM_OPERATION, system_uri)
    }

    pub fn delete_system_operation_info(&self, system_uri: &str) -> StoreResult<()> {
        self.live().delete(SYSTEM_OPERATION, system_uri)
    }

    pub fn add_system_reset_info(&self, system_uri: &str, reset_type: &str) -> StoreResult<()> {
        let reset = SystemReset {
            reset_type: reset_type.to_string(),
        };
        self.live().upsert(SYSTEM_RESET, system_uri, &reset)
    }

    pub fn get_system_reset_info(&self, system_uri: &str) -> StoreResult<SystemReset> {
        self.live().read(SYSTEM_RESET, system_uri)
    }

    pub fn delete_system_reset_info(&self, system_uri: &str) -> StoreResult<()> {
        self.live().delete(SYSTEM_RESET, system_uri)
    }

    // ── Registry files (durable) ───────────────────────────────────

    /// Save a message-registry document. Registries are shared reference
    /// data loaded by every instance, so an existing key is skipped rather
    /// than treated as an error.
    pub fn save_registry_file(&self, body: &str, table: &str, key: &str) -> StoreResult<()> {
        match self.durable().create(table, key, body) {
            Err(e) if e.is_already_exists() => {
                warn!(%table, %key, "skipped saving of duplicate registry data");
                Ok(())
            }
            other => other,
        }
    }

    pub fn get_registry_file(&self, table: &str, key: &str) -> StoreResult<String> {
        self.durable().read(table, key)
    }

    // ── Device credentials (durable) ───────────────────────────────

    pub fn save_system(&self, system_id: &str, target: &Target) -> StoreResult<()> {
        self.vault.save_target(system_id, target)
    }

    pub fn get_target(&self, device_uuid: &str) -> StoreResult<Target> {
        self.vault.get_target(device_uuid)
    }

    pub fn get_all_systems(&self) -> StoreResult<Vec<Target>> {
        self.vault.get_all_targets()
    }

    /// Remove a device's credentials from the durable tier.
    pub fn delete_system(&self, key: &str) -> StoreResult<()> {
        let durable = self.durable();
        if !durable.exists(SYSTEM, key)? {
            return Err(StoreError::not_found(SYSTEM, key));
        }
        let pattern = format!("{SYSTEM}:{}", KeyPattern::escape(key));
        durable.delete_by_pattern(&pattern)?;
        Ok(())
    }

    // ── Plugins and aggregation sources (durable) ──────────────────

    pub fn save_plugin_data(&self, plugin: &Plugin) -> StoreResult<()> {
        self.vault.save_plugin(plugin)
    }

    pub fn get_plugin_data(&self, plugin_id: &str) -> StoreResult<Plugin> {
        self.vault.get_plugin(plugin_id)
    }

    pub fn delete_plugin_data(&self, plugin_id: &str) -> StoreResult<()> {
        self.vault.delete_plugin(plugin_id)
    }

    pub fn add_aggregation_source(&self, uri: &str, source: &AggregationSource) -> StoreResult<()> {
        self.vault.add_aggregation_source(uri, source)
    }

    pub fn get_aggregation_source_info(&self, uri: &str) -> StoreResult<AggregationSource> {
        self.vault.get_aggregation_source(uri)
    }

    /// Decode every record of `table` in `tier`.
    pub fn list_all<T: DeserializeOwned>(&self, tier: Tier, table: &str) -> StoreResult<Vec<T>> {
        let store = self.tiers.connection(tier);
        store
            .list_keys(table)?
            .into_iter()
            .map(|key| store.read(table, &key))
            .collect()
    }
}
