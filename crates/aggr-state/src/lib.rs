//! aggr-state — resource persistence for the aggregation service.
//!
//! Records live in one of two tiers: a volatile tier for live inventory
//! (compute systems, chassis, managers, search indexes) and a durable tier
//! for configuration and credentials (device targets, plugins, aggregation
//! sources, registries). Both are redb databases behind the
//! [`KeyValueStore`] seam.
//!
//! # Architecture
//!
//! - [`Tiers`] routes a [`Tier`] to a [`ResourceStore`], the typed CRUD API.
//! - [`SecondaryIndex`] projects record fields named by the search schema
//!   into `value → key` index entries and answers glob queries over them.
//! - [`CascadeDelete`] removes a live record, its same-identifier relatives,
//!   and every index entry that references it.
//! - [`CredentialVault`] encrypts passwords on write and decrypts on read.
//! - [`AggregationStore`] bundles the above into the API aggregation logic
//!   calls.
//!
//! Everything is synchronous and stateless between calls apart from the
//! cached search schema. Handles are `Clone + Send + Sync`.

pub mod cascade;
pub mod codec;
pub mod error;
pub mod index;
pub mod kv;
pub mod model;
pub mod pattern;
pub mod resource;
pub mod store;
pub mod tables;
pub mod tier;
pub mod types;
pub mod vault;

pub use cascade::{CascadeDelete, DeleteReport, DeleteStep};
pub use error::{StoreError, StoreResult};
pub use index::SecondaryIndex;
pub use kv::{IndexEntry, KeyValueStore, RecordId};
pub use model::AggregationStore;
pub use pattern::KeyPattern;
pub use resource::ResourceStore;
pub use store::RedbStore;
pub use tier::{Tier, Tiers};
pub use types::*;
pub use vault::{CipherError, CredentialCipher, CredentialVault};
