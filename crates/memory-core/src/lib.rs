//! # memory-core
//!
//! Foundation crate for the memory service. Defines the memory and
//! relationship data model, the adapter traits every store implementation
//! satisfies, configuration, the error taxonomy, and small shared utilities
//! (content hashing, path validation) used across the workspace.

pub mod config;
pub mod constants;
pub mod errors;
pub mod hashing;
pub mod memory;
pub mod path_validation;
pub mod similarity;
pub mod traits;

pub use config::MemoryConfig;
pub use errors::{CortexError, CortexResult};
pub use memory::{BaseMemory, MemoryType, Relationship, RelationshipType, SyncStatus, TypedContent};
