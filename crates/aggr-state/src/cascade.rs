//! Cascading delete of a live record and everything indexed from it.
//!
//! A delete runs these steps in order:
//!
//! 1. `VerifyPrimaryExists`: `NotFound` before any side effect. The search
//!    schema is loaded here too; a schema error leaves everything in place.
//! 2. `DeletePrimaryAndRelatedKeys`: bulk delete of every record in the
//!    tier whose address contains the key's last path segment.
//! 3. `DeleteSchemaIndexEntries`: remove the key from every schema index,
//!    along with any other record of the same table the bulk delete caught
//!    (`u1.1` also matches `u1.10`).
//! 4. `DeleteWellKnownIndexEntries`: same for `UUID` and `PowerState`.
//! 5. `Done`.
//!
//! Index entries that are already gone count as removed. Any other failure
//! aborts the remaining steps; finished steps are not rolled back, so a
//! failed delete can leave some index entries behind.

use std::collections::BTreeSet;
use std::sync::Arc;

use aggr_core::SchemaDescriptor;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::index::SecondaryIndex;
use crate::kv::RecordId;
use crate::pattern::KeyPattern;
use crate::resource::ResourceStore;
use crate::tables::WELL_KNOWN_INDEXES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStep {
    VerifyPrimaryExists,
    DeletePrimaryAndRelatedKeys,
    DeleteSchemaIndexEntries,
    DeleteWellKnownIndexEntries,
    Done,
}

/// What a finished delete removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// Every record the bulk delete removed, the requested one included.
    pub removed: Vec<RecordId>,
    /// Primary keys whose index entries were dropped.
    pub unindexed: Vec<String>,
}

#[derive(Clone)]
pub struct CascadeDelete {
    store: ResourceStore,
    index: SecondaryIndex,
}

/// State carried between steps of one delete.
struct Run<'a> {
    table: &'a str,
    key: &'a str,
    schema: Arc<SchemaDescriptor>,
    pattern: String,
    report: DeleteReport,
}

impl CascadeDelete {
    /// `store` must be the tier the index engine writes to.
    pub fn new(store: ResourceStore, index: SecondaryIndex) -> Self {
        Self { store, index }
    }

    /// Delete `table`/`key`, its same-tier relatives, and the index entries
    /// of every `table` record the bulk delete took with it.
    pub fn delete(&self, table: &str, key: &str) -> StoreResult<DeleteReport> {
        let mut run = Run {
            table,
            key,
            schema: Arc::default(),
            pattern: String::new(),
            report: DeleteReport::default(),
        };

        let mut step = DeleteStep::VerifyPrimaryExists;
        while step != DeleteStep::Done {
            let current = step;
            step = self.advance(current, &mut run).map_err(move |source| match source {
                e @ StoreError::NotFound { .. } if current == DeleteStep::VerifyPrimaryExists => e,
                source => StoreError::CascadeAborted {
                    step: current,
                    key: key.to_string(),
                    source: Box::new(source),
                },
            })?;
        }

        info!(%table, %key, removed = run.report.removed.len(), "cascading delete finished");
        Ok(run.report)
    }

    /// Run `step` and name the one after it.
    fn advance(&self, step: DeleteStep, run: &mut Run<'_>) -> StoreResult<DeleteStep> {
        match step {
            DeleteStep::VerifyPrimaryExists => {
                if !self.store.exists(run.table, run.key)? {
                    return Err(StoreError::not_found(run.table, run.key));
                }
                run.schema = self.index.schema()?;
                run.pattern = related_keys_pattern(run.key)?;
                Ok(DeleteStep::DeletePrimaryAndRelatedKeys)
            }
            DeleteStep::DeletePrimaryAndRelatedKeys => {
                run.report.removed = self.store.delete_by_pattern(&run.pattern)?;
                run.report.unindexed = primary_keys(run.table, run.key, &run.report.removed);
                if run.report.unindexed.len() > 1 {
                    warn!(
                        key = %run.key,
                        pattern = %run.pattern,
                        others = ?run.report.unindexed,
                        "bulk delete also removed other primary records"
                    );
                }
                debug!(key = %run.key, removed = run.report.removed.len(), "primary and related records deleted");
                Ok(DeleteStep::DeleteSchemaIndexEntries)
            }
            DeleteStep::DeleteSchemaIndexEntries => {
                for key in &run.report.unindexed {
                    for index in run.schema.index_names() {
                        self.remove_index_entries(index, key)?;
                    }
                }
                Ok(DeleteStep::DeleteWellKnownIndexEntries)
            }
            DeleteStep::DeleteWellKnownIndexEntries => {
                for key in &run.report.unindexed {
                    for index in WELL_KNOWN_INDEXES {
                        self.remove_index_entries(index, key)?;
                    }
                }
                Ok(DeleteStep::Done)
            }
            DeleteStep::Done => Ok(DeleteStep::Done),
        }
    }

    fn remove_index_entries(&self, index: &str, key: &str) -> StoreResult<()> {
        match self.index.remove(index, key) {
            Err(e) if e.is_not_found() => {
                debug!(%index, %key, "no index entries to remove");
                Ok(())
            }
            other => other,
        }
    }
}

/// The requested key first, then every other removed record of `table`.
fn primary_keys(table: &str, key: &str, removed: &[RecordId]) -> Vec<String> {
    let others: BTreeSet<&str> = removed
        .iter()
        .filter(|r| r.table == table && r.key != key)
        .map(|r| r.key.as_str())
        .collect();
    std::iter::once(key)
        .chain(others)
        .map(str::to_string)
        .collect()
}

/// `*{segment}*` where `segment` is the last non-empty path segment of `key`,
/// escaped so it matches literally.
fn related_keys_pattern(key: &str) -> StoreResult<String> {
    let segment = key
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    if segment.is_empty() {
        return Err(StoreError::InvalidPattern {
            pattern: key.to_string(),
            reason: "key has no segment to scope a bulk delete".to_string(),
        });
    }
    Ok(format!("*{}*", KeyPattern::escape(segment)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_uses_last_segment() {
        assert_eq!(
            related_keys_pattern("/redfish/v1/Systems/6d4a0a66-7efa-578e-83cf-44dc68d2874e.1")
                .unwrap(),
            "*6d4a0a66-7efa-578e-83cf-44dc68d2874e.1*"
        );
        assert_eq!(related_keys_pattern("abc.1").unwrap(), "*abc.1*");
        assert_eq!(related_keys_pattern("/redfish/v1/Systems/abc/").unwrap(), "*abc*");
    }

    #[test]
    fn pattern_refuses_to_match_everything() {
        assert!(related_keys_pattern("").is_err());
        assert!(related_keys_pattern("///").is_err());
    }

    #[test]
    fn primary_keys_cover_collateral_records_of_same_table() {
        let removed = vec![
            RecordId::new("Chassis", "/redfish/v1/Chassis/u1.1"),
            RecordId::new("ComputerSystem", "/redfish/v1/Systems/u1.10"),
            RecordId::new("ComputerSystem", "/redfish/v1/Systems/u1.1"),
        ];
        assert_eq!(
            primary_keys("ComputerSystem", "/redfish/v1/Systems/u1.1", &removed),
            vec!["/redfish/v1/Systems/u1.1", "/redfish/v1/Systems/u1.10"]
        );
    }

    #[test]
    fn pattern_escapes_metacharacters() {
        assert_eq!(related_keys_pattern("/s/a*b").unwrap(), r"*a\*b*");
    }
}
