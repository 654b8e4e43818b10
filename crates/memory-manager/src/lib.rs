//! # memory-manager
//!
//! C6: the memory manager. Write-path orchestration — content
//! normalisation, embedding with caching (via C2), near-duplicate and
//! conflict detection (via C3), and two-phase persistence (via C5).

pub mod conflict;
pub mod manager;

pub use conflict::Conflict;
pub use manager::{BulkAddError, MemoryManager, MemoryUpdate};
