//! Search/filter schema descriptor.
//!
//! The descriptor lists which record fields are searchable and the index
//! table each one is written to. It is data, not code: adding a searchable
//! field is a descriptor change. A process loads it once and treats it as
//! read-only afterwards.
//!
//! ```json
//! {
//!   "searchKeys": [
//!     { "SystemType": { "type": "string" } },
//!     { "ProcessorSummary/Model": { "type": "string" } }
//!   ],
//!   "conditionKeys": ["eq", "ne", "gt"],
//!   "queryKeys": ["filter"]
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Field values to index, keyed by index table name.
pub type IndexFields = BTreeMap<String, Value>;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read search schema {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed search schema {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    /// One single-entry map per searchable field: index name to attributes.
    #[serde(rename = "searchKeys", default)]
    pub search_keys: Vec<BTreeMap<String, BTreeMap<String, String>>>,
    #[serde(rename = "conditionKeys", default)]
    pub condition_keys: Vec<String>,
    #[serde(rename = "queryKeys", default)]
    pub query_keys: Vec<String>,
}

impl SchemaDescriptor {
    pub fn from_file(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path).map_err(|source| SchemaError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SchemaError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Every index table named by the descriptor, deduplicated.
    pub fn index_names(&self) -> BTreeSet<&str> {
        self.search_keys
            .iter()
            .flat_map(|entry| entry.keys().map(String::as_str))
            .collect()
    }

    pub fn is_indexed(&self, name: &str) -> bool {
        self.search_keys.iter().any(|entry| entry.contains_key(name))
    }

    /// Declared value type of an index (`"string"`, `"float"`, ...), if any.
    pub fn value_type(&self, name: &str) -> Option<&str> {
        self.search_keys
            .iter()
            .find_map(|entry| entry.get(name))
            .and_then(|attrs| attrs.get("type"))
            .map(String::as_str)
    }

    /// Pull the searchable fields out of a serialized record.
    ///
    /// Index names are slash-separated paths into the record
    /// (`ProcessorSummary/Model`). Missing paths and `null` leaves are skipped.
    pub fn project(&self, record: &Value) -> IndexFields {
        let mut fields = IndexFields::new();
        for name in self.index_names() {
            let found = name
                .split('/')
                .try_fold(record, |node, segment| node.get(segment));
            if let Some(value) = found.filter(|v| !v.is_null()) {
                fields.insert(name.to_string(), value.clone());
            }
        }
        fields
    }
}

/// Lazily loaded, process-wide schema descriptor.
///
/// The file is read on first use. A successful load is cached for the
/// lifetime of the source; a failed load is reported to the caller and
/// retried on the next call.
#[derive(Debug)]
pub struct SchemaSource {
    path: PathBuf,
    loaded: OnceLock<Arc<SchemaDescriptor>>,
}

impl SchemaSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SchemaSource {
            path: path.into(),
            loaded: OnceLock::new(),
        }
    }

    /// A source that is already loaded; used when the descriptor comes
    /// from somewhere other than a file.
    pub fn preloaded(descriptor: SchemaDescriptor) -> Self {
        let loaded = OnceLock::new();
        let _ = loaded.set(Arc::new(descriptor));
        SchemaSource {
            path: PathBuf::new(),
            loaded,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> Result<Arc<SchemaDescriptor>, SchemaError> {
        if let Some(schema) = self.loaded.get() {
            return Ok(Arc::clone(schema));
        }
        let schema = Arc::new(SchemaDescriptor::from_file(&self.path)?);
        Ok(Arc::clone(self.loaded.get_or_init(|| schema)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SCHEMA: &str = r#"{
        "searchKeys": [
            {"SystemType": {"type": "string"}},
            {"ProcessorSummary/Model": {"type": "string"}},
            {"ProcessorSummary/Count": {"type": "float"}},
            {"SystemType": {"type": "string"}}
        ],
        "conditionKeys": ["eq", "gt"],
        "queryKeys": ["filter"]
    }"#;

    #[test]
    fn index_names_are_deduplicated() {
        let schema = SchemaDescriptor::from_json(SCHEMA).unwrap();
        let names: Vec<_> = schema.index_names().into_iter().collect();
        assert_eq!(
            names,
            vec!["ProcessorSummary/Count", "ProcessorSummary/Model", "SystemType"]
        );
        assert_eq!(schema.value_type("ProcessorSummary/Count"), Some("float"));
        assert!(schema.is_indexed("SystemType"));
        assert!(!schema.is_indexed("Model"));
    }

    #[test]
    fn project_walks_nested_paths() {
        let schema = SchemaDescriptor::from_json(SCHEMA).unwrap();
        let record = json!({
            "Id": "1",
            "SystemType": "Physical",
            "ProcessorSummary": { "Model": "Xeon", "Count": 2 },
            "Name": "not indexed"
        });

        let fields = schema.project(&record);
        assert_eq!(fields.len(), 3);
        assert_eq!(fields["ProcessorSummary/Model"], json!("Xeon"));
        assert_eq!(fields["ProcessorSummary/Count"], json!(2));
        assert!(!fields.contains_key("Name"));
    }

    #[test]
    fn project_skips_missing_and_null() {
        let schema = SchemaDescriptor::from_json(SCHEMA).unwrap();
        let record = json!({ "SystemType": null, "ProcessorSummary": "flat" });
        assert!(schema.project(&record).is_empty());
    }

    #[test]
    fn source_reports_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, "{ not json").unwrap();

        let source = SchemaSource::new(&path);
        assert!(matches!(source.get(), Err(SchemaError::Parse { .. })));

        // Fixing the file lets the next call succeed.
        std::fs::write(&path, SCHEMA).unwrap();
        let schema = source.get().unwrap();
        assert!(schema.is_indexed("SystemType"));
    }

    #[test]
    fn source_reports_missing_file() {
        let source = SchemaSource::new("/nonexistent/schema.json");
        assert!(matches!(source.get(), Err(SchemaError::Read { .. })));
    }
}
