//! Table names and redb table definitions.
//!
//! Logical tables (`System`, `Plugin`, ...) are namespaces inside one redb
//! table keyed by `(table, key)`. Index entries live in a separate redb table
//! keyed by `(index, value, record_key)`, so pattern deletes over record
//! addresses never touch them.

use redb::TableDefinition;

/// Records keyed by `(logical table, key)`; values are JSON payloads.
pub const RECORDS: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("records");

/// Secondary-index entries keyed by `(index, value, record key)`.
pub const INDEX_ENTRIES: TableDefinition<(&str, &str, &str), ()> =
    TableDefinition::new("index_entries");

// ── Volatile tier ──────────────────────────────────────────────────

/// Compute systems keyed by their resource URI.
pub const COMPUTER_SYSTEM: &str = "ComputerSystem";
pub const CHASSIS: &str = "Chassis";
pub const MANAGERS: &str = "Managers";
/// In-flight operation per system URI (`InventoryRediscovery`, `Delete`).
pub const SYSTEM_OPERATION: &str = "SystemOperation";
/// Last reset type applied per system URI.
pub const SYSTEM_RESET: &str = "SystemReset";

// ── Durable tier ───────────────────────────────────────────────────

/// Device target credentials keyed by device UUID.
pub const SYSTEM: &str = "System";
pub const PLUGIN: &str = "Plugin";
/// Aggregation sources keyed by their URI.
pub const AGGREGATION_SOURCE: &str = "AggregationSource";

// ── Well-known indexes ─────────────────────────────────────────────

/// Written for every indexed record; value is the record's UUID.
pub const UUID_INDEX: &str = "UUID";
/// Power state of indexed systems. Not listed in the search schema.
pub const POWER_STATE_INDEX: &str = "PowerState";

/// Indexes that exist outside the search schema.
pub const WELL_KNOWN_INDEXES: [&str; 2] = [UUID_INDEX, POWER_STATE_INDEX];
