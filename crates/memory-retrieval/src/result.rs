//! Result shapes returned by the query engine's strategies.

use memory_core::memory::BaseMemory;

/// One scored memory, produced by every search strategy. `score` is always
/// in `[0, ~1.2]` — cosine/lexical blends stay in `[0, 1]`; the hybrid
/// strategy's edge-weighted neighbours can exceed 1.0 slightly since edge
/// weight is an independent signal from cosine similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub memory: BaseMemory,
    pub score: f64,
}

/// How `find_duplicates` resolves the memory it is comparing against the
/// rest of the variant: by existing id, or by a fresh piece of content.
#[derive(Debug, Clone)]
pub enum DuplicateReference {
    ById(String),
    ByContent(String),
}
