//! Adapter traits every store/provider implementation satisfies. Grounded
//! on `cortex-core::traits::{storage, embedding}`, made native `async fn`
//! per the convention `cortex-temporal::engine::TemporalEngine` uses for
//! I/O-bound engine traits: every store/provider call is a suspension
//! point.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::CortexResult;
use crate::memory::{MemoryType, Relationship, RelationshipType};

/// A single filter term pushed down to the vector store's payload filter:
/// equality, set membership, boolean, and numeric range.
#[derive(Debug, Clone)]
pub enum PayloadFilter {
    Eq(String, Value),
    In(String, Vec<Value>),
    Bool(String, bool),
    Range { field: String, min: Option<f64>, max: Option<f64> },
}

/// One hit from a vector store nearest-neighbour search.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub score: f64,
    pub payload: HashMap<String, Value>,
}

/// C3: vector-store adapter. One collection per memory variant.
#[async_trait]
pub trait IVectorStore: Send + Sync {
    /// Create the collection for `variant` if it does not already exist,
    /// with a D-dimensional cosine-metric HNSW-class index.
    async fn ensure_collection(&self, variant: MemoryType) -> CortexResult<()>;

    /// Upsert a point. `id` is the memory id; the adapter never rewrites it.
    async fn upsert(
        &self,
        variant: MemoryType,
        id: &str,
        vector: &[f32],
        payload: HashMap<String, Value>,
    ) -> CortexResult<()>;

    /// Nearest-neighbour search with payload filters, a similarity floor,
    /// and a result limit. Scores are cosine similarity on L2-normalised
    /// vectors, strictly decreasing, in [0, 1].
    async fn search(
        &self,
        variant: MemoryType,
        query_vector: &[f32],
        filters: &[PayloadFilter],
        min_similarity: f64,
        limit: usize,
    ) -> CortexResult<Vec<VectorHit>>;

    /// Update a point's payload without touching its vector.
    async fn update_payload(
        &self,
        variant: MemoryType,
        id: &str,
        payload: HashMap<String, Value>,
    ) -> CortexResult<()>;

    /// Count points matching `filters` (empty filters count every point).
    async fn count(&self, variant: MemoryType, filters: &[PayloadFilter]) -> CortexResult<usize>;

    /// Delete a point by id. Absence is not an error.
    async fn delete(&self, variant: MemoryType, id: &str) -> CortexResult<()>;

    /// Fetch a stored vector by id, for reference-by-id duplicate search.
    async fn get_vector(&self, variant: MemoryType, id: &str) -> CortexResult<Option<Vec<f32>>>;

    /// Fetch a stored point's payload by id, without its vector
    /// (`memory-manager::get`/`update` rehydrate a memory from this).
    async fn get_payload(&self, variant: MemoryType, id: &str) -> CortexResult<Option<HashMap<String, Value>>>;

    /// Stream every point in a variant's collection: `(id, vector, payload)`.
    /// Used by the normaliser's snapshot/validation/deduplication phases,
    /// which need full-collection iteration rather than a similarity search.
    async fn scan(&self, variant: MemoryType) -> CortexResult<Vec<(String, Vec<f32>, HashMap<String, Value>)>>;

    async fn health(&self) -> CortexResult<bool>;
}

/// Traversal direction for `IGraphStore::traverse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Out,
    In,
    Both,
}

/// One node reached during a graph traversal, with the chain of edges that
/// led to it from the seed.
#[derive(Debug, Clone)]
pub struct TraversalHit {
    pub node_id: String,
    pub label: String,
    pub properties: HashMap<String, Value>,
    pub depth: usize,
    pub edge_chain: Vec<Relationship>,
}

/// C4: graph-store adapter. One node label per memory variant.
#[async_trait]
pub trait IGraphStore: Send + Sync {
    /// Upsert a node identified by `(label, id)` with the given properties.
    /// Complex values (nested maps, heterogeneous arrays) are JSON-encoded
    /// by the caller before reaching this trait.
    async fn upsert_node(
        &self,
        label: &str,
        id: &str,
        properties: HashMap<String, Value>,
    ) -> CortexResult<()>;

    /// Upsert an edge. Idempotent on `(source, target, type)`.
    async fn upsert_edge(&self, edge: &Relationship) -> CortexResult<()>;

    /// Remove an edge by `(source, target, type)`.
    async fn remove_edge(
        &self,
        source_id: &str,
        target_id: &str,
        relationship_type: RelationshipType,
    ) -> CortexResult<()>;

    /// Traverse from `seed_id` up to `depth` hops in `direction`, optionally
    /// restricted to `edge_types`.
    async fn traverse(
        &self,
        seed_id: &str,
        direction: Direction,
        depth: usize,
        edge_types: Option<&[RelationshipType]>,
        limit: usize,
    ) -> CortexResult<Vec<TraversalHit>>;

    /// Parameterised read/write query for advanced callers
    /// (`IGraphStore` is allowed to be a thin pass-through here; the engine
    /// choosing SQL/Cypher/whatever is an adapter concern).
    async fn query(&self, statement: &str, params: &HashMap<String, Value>) -> CortexResult<Vec<HashMap<String, Value>>>;

    async fn node_count(&self, label: &str) -> CortexResult<usize>;

    /// Delete a node and cascade its edges.
    async fn delete_node(&self, label: &str, id: &str) -> CortexResult<()>;

    async fn node_exists(&self, label: &str, id: &str) -> CortexResult<bool>;

    /// List every node id under `label`. Used by the normaliser's snapshot
    /// phase (per-variant counts/checksums) and validation phase (node
    /// existence checks paired against the vector store's ids).
    async fn list_node_ids(&self, label: &str) -> CortexResult<Vec<String>>;

    /// List every edge in the graph, regardless of label. Used by the
    /// normaliser's cleanup phase to find relationships whose endpoint was
    /// hard-deleted.
    async fn all_edges(&self) -> CortexResult<Vec<Relationship>>;

    async fn health(&self) -> CortexResult<bool>;
}

/// C2: embedding generation provider.
#[async_trait]
pub trait IEmbeddingProvider: Send + Sync {
    /// Embed a single text. `from_cache` reports whether the vector was
    /// served from the embedding cache.
    async fn embed(&self, text: &str, input_type: InputType) -> CortexResult<(Vec<f32>, bool)>;

    /// Embed a batch of texts, preserving input order.
    async fn embed_batch(
        &self,
        texts: &[String],
        input_type: InputType,
    ) -> CortexResult<Vec<(Vec<f32>, bool)>>;

    fn dimensions(&self) -> usize;
}

/// Hint passed to the embedding provider distinguishing indexed documents
/// from search queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    Document,
    Query,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Document => "document",
            InputType::Query => "query",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_type_strings() {
        assert_eq!(InputType::Document.as_str(), "document");
        assert_eq!(InputType::Query.as_str(), "query");
    }
}
