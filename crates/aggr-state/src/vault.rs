//! Credential vault on the durable tier.
//!
//! Plugin, target, and aggregation-source rows carry a password. The vault
//! encrypts it with the configured [`CredentialCipher`] before a row is
//! written and decrypts it after a row is read; the tier only ever sees
//! ciphertext. Plaintext lives in [`Secret`] values for the duration of a
//! call and is never logged.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::resource::ResourceStore;
use crate::tables::{AGGREGATION_SOURCE, PLUGIN, SYSTEM};
use crate::types::{AggregationSource, Plugin, Secret, Target};

#[derive(Debug, Error)]
#[error("{0}")]
pub struct CipherError(pub String);

/// Encryption primitive for stored credentials.
///
/// `decrypt` must fail rather than return wrong plaintext when given
/// tampered or foreign ciphertext.
pub trait CredentialCipher: Send + Sync {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError>;
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError>;
}

#[derive(Clone)]
pub struct CredentialVault {
    store: ResourceStore,
    cipher: Arc<dyn CredentialCipher>,
}

impl CredentialVault {
    /// `store` should be bound to the durable tier.
    pub fn new(store: ResourceStore, cipher: Arc<dyn CredentialCipher>) -> Self {
        Self { store, cipher }
    }

    // ── Plugins ────────────────────────────────────────────────────

    pub fn save_plugin(&self, plugin: &Plugin) -> StoreResult<()> {
        let row = PluginRow {
            ip: plugin.ip.clone(),
            port: plugin.port.clone(),
            username: plugin.username.clone(),
            password: self.seal(PLUGIN, &plugin.id, &plugin.password)?,
            id: plugin.id.clone(),
            plugin_type: plugin.plugin_type.clone(),
            preferred_auth_type: plugin.preferred_auth_type.clone(),
        };
        self.store.create(PLUGIN, &plugin.id, &row)?;
        debug!(plugin = %plugin.id, "plugin saved");
        Ok(())
    }

    pub fn get_plugin(&self, id: &str) -> StoreResult<Plugin> {
        let row: PluginRow = self.store.read(PLUGIN, id)?;
        Ok(Plugin {
            password: self.open(PLUGIN, id, &row.password)?,
            id: row.id,
            ip: row.ip,
            port: row.port,
            username: row.username,
            plugin_type: row.plugin_type,
            preferred_auth_type: row.preferred_auth_type,
        })
    }

    pub fn delete_plugin(&self, id: &str) -> StoreResult<()> {
        self.store.delete(PLUGIN, id)
    }

    // ── Device targets ─────────────────────────────────────────────

    /// Store credentials for a managed device under `system_id`.
    pub fn save_target(&self, system_id: &str, target: &Target) -> StoreResult<()> {
        let row = TargetRow {
            manager_address: target.manager_address.clone(),
            password: self.seal(SYSTEM, system_id, &target.password)?,
            user_name: target.user_name.clone(),
            post_body: target.post_body.clone(),
            device_uuid: target.device_uuid.clone(),
            plugin_id: target.plugin_id.clone(),
        };
        self.store.create(SYSTEM, system_id, &row)?;
        debug!(system = %system_id, "target saved");
        Ok(())
    }

    pub fn get_target(&self, system_id: &str) -> StoreResult<Target> {
        let row: TargetRow = self.store.read(SYSTEM, system_id)?;
        self.open_target(system_id, row)
    }

    /// Every stored target, in no particular order.
    pub fn get_all_targets(&self) -> StoreResult<Vec<Target>> {
        self.store
            .list_keys(SYSTEM)?
            .into_iter()
            .map(|key| self.get_target(&key))
            .collect()
    }

    fn open_target(&self, system_id: &str, row: TargetRow) -> StoreResult<Target> {
        Ok(Target {
            password: self.open(SYSTEM, system_id, &row.password)?,
            manager_address: row.manager_address,
            user_name: row.user_name,
            device_uuid: row.device_uuid,
            plugin_id: row.plugin_id,
            post_body: row.post_body,
        })
    }

    // ── Aggregation sources ────────────────────────────────────────

    pub fn add_aggregation_source(&self, uri: &str, source: &AggregationSource) -> StoreResult<()> {
        let row = AggregationSourceRow {
            host_name: source.host_name.clone(),
            user_name: source.user_name.clone(),
            password: self.seal(AGGREGATION_SOURCE, uri, &source.password)?,
            links: source.links.clone(),
        };
        self.store.create(AGGREGATION_SOURCE, uri, &row)?;
        debug!(%uri, "aggregation source saved");
        Ok(())
    }

    pub fn get_aggregation_source(&self, uri: &str) -> StoreResult<AggregationSource> {
        let row: AggregationSourceRow = self.store.read(AGGREGATION_SOURCE, uri)?;
        Ok(AggregationSource {
            password: self.open(AGGREGATION_SOURCE, uri, &row.password)?,
            host_name: row.host_name,
            user_name: row.user_name,
            links: row.links,
        })
    }

    // ── Cipher plumbing ────────────────────────────────────────────

    fn seal(&self, table: &str, key: &str, secret: &Secret) -> StoreResult<Vec<u8>> {
        self.cipher
            .encrypt(secret.expose())
            .map_err(|e| StoreError::EncryptionFailed {
                table: table.to_string(),
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    fn open(&self, table: &str, key: &str, ciphertext: &[u8]) -> StoreResult<Secret> {
        self.cipher
            .decrypt(ciphertext)
            .map(Secret::new)
            .map_err(|e| StoreError::DecryptionFailed {
                table: table.to_string(),
                key: key.to_string(),
                reason: e.to_string(),
            })
    }
}

// ── Stored rows ────────────────────────────────────────────────────
//
// Field names follow the documents other aggregation services already read
// from these tables. Byte fields are standard base64 with padding, and a
// `null` byte field reads as empty.

#[derive(Serialize, Deserialize)]
struct PluginRow {
    #[serde(rename = "IP")]
    ip: String,
    #[serde(rename = "Port")]
    port: String,
    #[serde(rename = "Username")]
    username: String,
    #[serde(rename = "Password", with = "base64_bytes")]
    password: Vec<u8>,
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "PluginType")]
    plugin_type: String,
    #[serde(rename = "PreferredAuthType", default)]
    preferred_auth_type: String,
}

#[derive(Serialize, Deserialize)]
struct TargetRow {
    #[serde(rename = "ManagerAddress")]
    manager_address: String,
    #[serde(rename = "Password", with = "base64_bytes")]
    password: Vec<u8>,
    #[serde(rename = "UserName")]
    user_name: String,
    #[serde(rename = "PostBody", with = "base64_bytes", default)]
    post_body: Vec<u8>,
    #[serde(rename = "DeviceUUID")]
    device_uuid: String,
    #[serde(rename = "PluginID")]
    plugin_id: String,
}

#[derive(Serialize, Deserialize)]
struct AggregationSourceRow {
    #[serde(rename = "HostName")]
    host_name: String,
    #[serde(rename = "UserName")]
    user_name: String,
    #[serde(rename = "Password", with = "base64_bytes")]
    password: Vec<u8>,
    #[serde(rename = "Links", default)]
    links: serde_json::Value,
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(s) => STANDARD.decode(s).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use sha2::{Digest, Sha256};

    use super::{CipherError, CredentialCipher};

    const TAG_LEN: usize = 8;

    /// XOR keystream plus a SHA-256 tag; enough to exercise the vault's
    /// round trip and tamper detection.
    pub struct TestCipher {
        pub key: u8,
    }

    impl CredentialCipher for TestCipher {
        fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
            let mut out = Sha256::digest(plaintext)[..TAG_LEN].to_vec();
            out.extend(plaintext.iter().map(|b| b ^ self.key));
            Ok(out)
        }

        fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
            if ciphertext.len() < TAG_LEN {
                return Err(CipherError("ciphertext too short".into()));
            }
            let (tag, body) = ciphertext.split_at(TAG_LEN);
            let plaintext: Vec<u8> = body.iter().map(|b| b ^ self.key).collect();
            if Sha256::digest(&plaintext)[..TAG_LEN] != *tag {
                return Err(CipherError("authentication tag mismatch".into()));
            }
            Ok(plaintext)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::TestCipher;
    use super::*;
    use crate::tier::{Tier, Tiers};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    fn vault() -> (CredentialVault, ResourceStore) {
        let tiers = Tiers::ephemeral().unwrap();
        let durable = tiers.connection(Tier::OnDisk);
        let vault = CredentialVault::new(durable.clone(), Arc::new(TestCipher { key: 0x5a }));
        (vault, durable)
    }

    fn plugin(id: &str, password: &str) -> Plugin {
        Plugin {
            id: id.into(),
            ip: "10.0.0.5".into(),
            port: "45001".into(),
            username: "admin".into(),
            password: Secret::from(password),
            plugin_type: "Compute".into(),
            preferred_auth_type: "BasicAuth".into(),
        }
    }

    fn target(uuid: &str) -> Target {
        Target {
            manager_address: "10.0.0.9".into(),
            user_name: "root".into(),
            password: Secret::from("calvin"),
            device_uuid: uuid.into(),
            plugin_id: "GRF".into(),
            post_body: Vec::new(),
        }
    }

    #[test]
    fn plugin_password_round_trips() {
        let (vault, _) = vault();
        vault.save_plugin(&plugin("GRF", "Plugin123")).unwrap();

        let read = vault.get_plugin("GRF").unwrap();
        assert_eq!(read.password.expose(), b"Plugin123");
        assert_eq!(read, plugin("GRF", "Plugin123"));
    }

    #[test]
    fn plaintext_never_reaches_the_tier() {
        let (vault, durable) = vault();
        vault.save_plugin(&plugin("GRF", "Plugin123")).unwrap();

        let raw = durable.read_raw(PLUGIN, "GRF").unwrap();
        let raw = String::from_utf8(raw).unwrap();
        assert!(!raw.contains("Plugin123"));
        assert!(!raw.contains(&STANDARD.encode("Plugin123")));
        assert!(raw.contains("\"PluginType\":\"Compute\""));
    }

    #[test]
    fn corrupted_ciphertext_is_decryption_failure() {
        let (vault, durable) = vault();
        vault.save_plugin(&plugin("GRF", "Plugin123")).unwrap();

        let mut row: serde_json::Value =
            serde_json::from_slice(&durable.read_raw(PLUGIN, "GRF").unwrap()).unwrap();
        let mut cipher = STANDARD.decode(row["Password"].as_str().unwrap()).unwrap();
        let last = cipher.len() - 1;
        cipher[last] ^= 0xff;
        row["Password"] = serde_json::Value::String(STANDARD.encode(cipher));
        durable.update(PLUGIN, "GRF", &row).unwrap();

        let err = vault.get_plugin("GRF").unwrap_err();
        assert!(matches!(err, StoreError::DecryptionFailed { .. }));
        assert!(!err.to_string().contains("Plugin123"));
    }

    #[test]
    fn missing_and_malformed_rows_are_distinct_errors() {
        let (vault, durable) = vault();
        assert!(vault.get_plugin("GRF").unwrap_err().is_not_found());

        durable.create(PLUGIN, "GRF", &serde_json::json!({ "ID": 7 })).unwrap();
        assert!(matches!(
            vault.get_plugin("GRF").unwrap_err(),
            StoreError::DeserializationFailed { .. }
        ));
    }

    #[test]
    fn duplicate_plugin_is_rejected() {
        let (vault, _) = vault();
        vault.save_plugin(&plugin("GRF", "a")).unwrap();
        assert!(vault.save_plugin(&plugin("GRF", "b")).unwrap_err().is_already_exists());
        assert_eq!(vault.get_plugin("GRF").unwrap().password.expose(), b"a");

        vault.delete_plugin("GRF").unwrap();
        assert!(vault.delete_plugin("GRF").unwrap_err().is_not_found());
    }

    #[test]
    fn targets_round_trip_and_list() {
        let (vault, _) = vault();
        vault.save_target("u1", &target("u1")).unwrap();
        vault.save_target("u2", &target("u2")).unwrap();

        assert_eq!(vault.get_target("u1").unwrap(), target("u1"));
        let mut uuids: Vec<_> = vault
            .get_all_targets()
            .unwrap()
            .into_iter()
            .map(|t| t.device_uuid)
            .collect();
        uuids.sort();
        assert_eq!(uuids, vec!["u1", "u2"]);
    }

    #[test]
    fn aggregation_source_round_trips() {
        let (vault, _) = vault();
        let uri = "/redfish/v1/AggregationService/AggregationSources/a1";
        let source = AggregationSource {
            host_name: "10.0.0.9".into(),
            user_name: "admin".into(),
            password: Secret::from("bmc-pass"),
            links: serde_json::json!({ "Oem": { "PluginID": "GRF" } }),
        };
        vault.add_aggregation_source(uri, &source).unwrap();
        assert_eq!(vault.get_aggregation_source(uri).unwrap(), source);
    }

    #[test]
    fn reads_rows_written_by_other_services() {
        let (vault, durable) = vault();
        let sealed = TestCipher { key: 0x5a }.encrypt(b"calvin").unwrap();
        durable
            .create(
                SYSTEM,
                "u1",
                &serde_json::json!({
                    "ManagerAddress": "10.0.0.9",
                    "Password": STANDARD.encode(&sealed),
                    "UserName": "root",
                    "PostBody": null,
                    "DeviceUUID": "u1",
                    "PluginID": "GRF"
                }),
            )
            .unwrap();

        let target = vault.get_target("u1").unwrap();
        assert_eq!(target.password.expose(), b"calvin");
        assert!(target.post_body.is_empty());
    }

    #[test]
    fn byte_fields_are_stored_as_base64() {
        let (vault, durable) = vault();
        let mut t = target("u1");
        t.post_body = b"{\"Action\":\"Reset\"}".to_vec();
        vault.save_target("u1", &t).unwrap();

        let row: serde_json::Value =
            serde_json::from_slice(&durable.read_raw(SYSTEM, "u1").unwrap()).unwrap();
        assert_eq!(row["PostBody"], STANDARD.encode(&t.post_body));
        let sealed = STANDARD.decode(row["Password"].as_str().unwrap()).unwrap();
        assert_eq!(TestCipher { key: 0x5a }.decrypt(&sealed).unwrap(), b"calvin");
    }
}
