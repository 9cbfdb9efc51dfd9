pub mod config;
pub mod schema;
pub mod types;

pub use config::AggrConfig;
pub use schema::{IndexFields, SchemaDescriptor, SchemaError, SchemaSource};
pub use types::*;
