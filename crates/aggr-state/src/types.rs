//! Domain types for the aggregation store.
//!
//! These are the shapes callers work with. Credential-bearing types hold
//! their password as a [`Secret`] in plaintext; they are never serialized
//! directly. The vault converts them to ciphertext rows before anything
//! reaches a tier.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Plaintext credential. Wiped on drop and redacted from `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Zeroizing<Vec<u8>>);

impl Secret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(bytes.into()))
    }

    pub fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

// ── Durable tier ───────────────────────────────────────────────────

/// A southbound plugin the aggregator talks to.
#[derive(Debug, Clone, PartialEq)]
pub struct Plugin {
    pub id: String,
    pub ip: String,
    pub port: String,
    pub username: String,
    pub password: Secret,
    pub plugin_type: String,
    /// `BasicAuth` or `XAuthToken`.
    pub preferred_auth_type: String,
}

/// Credentials and routing for one managed device.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub manager_address: String,
    pub user_name: String,
    pub password: Secret,
    pub device_uuid: String,
    pub plugin_id: String,
    /// Request body to forward southbound, if any.
    pub post_body: Vec<u8>,
}

/// A registered aggregation source (a BMC or a plugin endpoint).
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationSource {
    pub host_name: String,
    pub user_name: String,
    pub password: Secret,
    /// Links block as submitted, kept opaque.
    pub links: serde_json::Value,
}

// ── Volatile tier ──────────────────────────────────────────────────

/// Operation currently running against a system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemOperation {
    /// `InventoryRediscovery` or `Delete`.
    #[serde(rename = "Operation")]
    pub operation: String,
}

/// Last reset applied to a system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemReset {
    #[serde(rename = "ResetType")]
    pub reset_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_debug_is_redacted() {
        let plugin = Plugin {
            id: "GRF".into(),
            ip: "10.0.0.5".into(),
            port: "45001".into(),
            username: "admin".into(),
            password: Secret::from("hunter2"),
            plugin_type: "Compute".into(),
            preferred_auth_type: "BasicAuth".into(),
        };
        let rendered = format!("{plugin:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn system_reset_wire_shape() {
        let reset = SystemReset {
            reset_type: "ForceRestart".into(),
        };
        assert_eq!(
            serde_json::to_string(&reset).unwrap(),
            r#"{"ResetType":"ForceRestart"}"#
        );
    }
}
