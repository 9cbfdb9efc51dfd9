pub mod delete;
pub mod init;
pub mod inspect;

use std::path::Path;
use std::sync::Arc;

use aggr_core::AggrConfig;
use aggr_core::config::BackendKind;
use aggr_state::{AggregationStore, CipherError, CredentialCipher};
use anyhow::Context;
use tracing::warn;

/// aggrctl never holds the credential key. Credential rows can be listed and
/// dumped as stored, but not decrypted or re-sealed.
struct NoCredentialKey;

impl CredentialCipher for NoCredentialKey {
    fn encrypt(&self, _plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        Err(CipherError("aggrctl has no credential key".into()))
    }

    fn decrypt(&self, _ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        warn!("refusing to decrypt a stored credential");
        Err(CipherError("aggrctl has no credential key".into()))
    }
}

pub(crate) fn open_store(config_path: &str) -> anyhow::Result<AggregationStore> {
    let config = AggrConfig::from_file(Path::new(config_path))
        .with_context(|| format!("loading {config_path}"))?;
    if config.storage.in_memory.backend == BackendKind::Memory {
        warn!(
            config = %config_path,
            "live tier uses the memory backend; it starts empty on every aggrctl run"
        );
    }
    let store = AggregationStore::open(&config, Arc::new(NoCredentialKey))?;
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggr_core::ComputerSystem;

    const SYSTEM: &str = "/redfish/v1/Systems/u1.1";

    /// A scaffolded config in a scratch directory, with an empty schema.
    fn scaffolded(dir: &Path) -> String {
        let schema = dir.join("schema.json");
        std::fs::write(&schema, r#"{"searchKeys": []}"#).unwrap();
        let config = dir.join("aggr.toml");
        let config = config.to_str().unwrap().to_string();
        init::init_config(&config, dir.join("data").to_str().unwrap(), schema.to_str().unwrap())
            .unwrap();
        config
    }

    #[test]
    fn live_tier_survives_between_runs() {
        let dir = tempfile::tempdir().unwrap();
        let config = scaffolded(dir.path());

        {
            let store = open_store(&config).unwrap();
            store
                .save_compute_system(&ComputerSystem::default(), SYSTEM)
                .unwrap();
        }

        let store = open_store(&config).unwrap();
        assert!(store.get_compute_system(SYSTEM).is_ok());
    }

    #[test]
    fn delete_system_sees_records_from_earlier_runs() {
        let dir = tempfile::tempdir().unwrap();
        let config = scaffolded(dir.path());
        open_store(&config)
            .unwrap()
            .save_compute_system(&ComputerSystem::default(), SYSTEM)
            .unwrap();

        delete::delete_system(&config, SYSTEM).unwrap();

        let store = open_store(&config).unwrap();
        assert!(store.get_compute_system(SYSTEM).unwrap_err().is_not_found());
        assert!(delete::delete_system(&config, SYSTEM).is_err());
    }

    #[test]
    fn credentials_are_never_decrypted() {
        assert!(NoCredentialKey.decrypt(b"sealed").is_err());
        assert!(NoCredentialKey.encrypt(b"plain").is_err());
    }
}
