//! Record payload encoding.
//!
//! Records are stored as JSON. Record structs declare `#[serde(default)]`
//! on fields added after the first release so older payloads still decode.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{StoreError, StoreResult};

pub fn encode<T: Serialize + ?Sized>(table: &str, value: &T) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StoreError::Serialize {
        table: table.to_string(),
        reason: e.to_string(),
    })
}

pub fn decode<T: DeserializeOwned>(table: &str, key: &str, bytes: &[u8]) -> StoreResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::DeserializationFailed {
        table: table.to_string(),
        key: key.to_string(),
        reason: e.to_string(),
    })
}
