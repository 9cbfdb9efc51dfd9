//! aggr.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggrConfig {
    pub storage: StorageConfig,
    pub search: SearchConfig,
}

/// Backends for the two storage tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Live inventory and state. May be volatile.
    pub in_memory: TierConfig,
    /// Long-lived configuration and credentials.
    pub on_disk: TierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    pub backend: BackendKind,
    /// Database file. Required for the `file` backend, ignored otherwise.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Memory,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Location of the search/filter schema JSON.
    pub schema_path: PathBuf,
}

impl TierConfig {
    pub fn memory() -> Self {
        TierConfig {
            backend: BackendKind::Memory,
            path: None,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        TierConfig {
            backend: BackendKind::File,
            path: Some(path.into()),
        }
    }
}

impl AggrConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AggrConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for (name, tier) in [
            ("storage.in_memory", &self.storage.in_memory),
            ("storage.on_disk", &self.storage.on_disk),
        ] {
            if tier.backend == BackendKind::File && tier.path.is_none() {
                anyhow::bail!("{name}: the file backend needs a path");
            }
        }
        Ok(())
    }

    /// Scaffold a config rooted at `data_dir`. Both tiers are file-backed so
    /// that separate processes (the service, `aggrctl`) see the same records.
    pub fn scaffold(data_dir: &Path, schema_path: &Path) -> Self {
        AggrConfig {
            storage: StorageConfig {
                in_memory: TierConfig::file(data_dir.join("live.redb")),
                on_disk: TierConfig::file(data_dir.join("ondisk.redb")),
            },
            search: SearchConfig {
                schema_path: schema_path.to_path_buf(),
            },
        }
    }
}
