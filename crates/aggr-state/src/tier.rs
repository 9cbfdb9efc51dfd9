//! Storage tier selection.

use std::fmt;
use std::sync::Arc;

use aggr_core::config::{BackendKind, StorageConfig, TierConfig};
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::kv::KeyValueStore;
use crate::resource::ResourceStore;
use crate::store::RedbStore;

/// Which backend a call goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Live inventory and state. May be volatile.
    InMemory,
    /// Configuration and credentials.
    OnDisk,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::InMemory => f.write_str("in-memory"),
            Tier::OnDisk => f.write_str("on-disk"),
        }
    }
}

/// Connection handles for both tiers.
#[derive(Clone)]
pub struct Tiers {
    in_memory: Arc<dyn KeyValueStore>,
    on_disk: Arc<dyn KeyValueStore>,
}

impl Tiers {
    pub fn new(in_memory: Arc<dyn KeyValueStore>, on_disk: Arc<dyn KeyValueStore>) -> Self {
        Self { in_memory, on_disk }
    }

    /// Open both tiers as configured.
    pub fn open(config: &StorageConfig) -> StoreResult<Self> {
        let in_memory = open_tier(Tier::InMemory, &config.in_memory)?;
        let on_disk = open_tier(Tier::OnDisk, &config.on_disk)?;
        Ok(Self::new(in_memory, on_disk))
    }

    /// Two fresh in-memory tiers.
    pub fn ephemeral() -> StoreResult<Self> {
        Ok(Self::new(
            Arc::new(RedbStore::open_in_memory()?),
            Arc::new(RedbStore::open_in_memory()?),
        ))
    }

    /// Resource store bound to `tier`.
    pub fn connection(&self, tier: Tier) -> ResourceStore {
        let kv = match tier {
            Tier::InMemory => Arc::clone(&self.in_memory),
            Tier::OnDisk => Arc::clone(&self.on_disk),
        };
        ResourceStore::new(tier, kv)
    }
}

fn open_tier(tier: Tier, config: &TierConfig) -> StoreResult<Arc<dyn KeyValueStore>> {
    let store = match (config.backend, config.path.as_deref()) {
        (BackendKind::Memory, _) => RedbStore::open_in_memory()?,
        (BackendKind::File, Some(path)) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::ConnectionFailed {
                    target: parent.display().to_string(),
                    source: e.into(),
                })?;
            }
            RedbStore::open(path)?
        }
        (BackendKind::File, None) => {
            return Err(StoreError::ConnectionFailed {
                target: format!("{tier} tier"),
                source: "file backend configured without a path".into(),
            });
        }
    };
    info!(%tier, backend = ?config.backend, "storage tier ready");
    Ok(Arc::new(store))
}
