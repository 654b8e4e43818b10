//! Query engine (C7): the read path. Grounded on
//! `cortex-retrieval/src/engine.rs`'s staged pipeline shape (search →
//! score → sort → truncate), narrowed to six search strategies and
//! without an intent classifier or token-budget packing, neither of
//! which has a counterpart in this read path.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use memory_core::config::MemoryConfig;
use memory_core::errors::{CortexResult, RetrievalError};
use memory_core::memory::{reconstruct_memory, MemoryType, RelationshipType};
use memory_core::traits::{
    Direction, IEmbeddingProvider, IGraphStore, IVectorStore, InputType, PayloadFilter, TraversalHit,
    VectorHit,
};

use crate::result::{DuplicateReference, SearchResult};
use crate::scoring::{blend, lexical_match, sort_and_truncate};

/// Variants `code_search` restricts itself to.
const CODE_VARIANTS: [MemoryType; 3] =
    [MemoryType::Function, MemoryType::Component, MemoryType::CodePattern];

/// Number of top semantic hits the hybrid strategy expands into the graph
/// (K≤10).
const HYBRID_EXPANSION_K: usize = 10;

/// `IGraphStore` node labels are namespaced as `"{project_id}__{variant}"`
/// (`memory-storage::graph::SqliteGraphStore::label_for`); strip the
/// prefix before matching against `MemoryType::as_str()`.
fn memory_type_from_label(label: &str, project_id: &str) -> Option<MemoryType> {
    let unnamespaced = label.strip_prefix(project_id)?.strip_prefix("__")?;
    MemoryType::ALL.iter().find(|v| v.as_str() == unnamespaced).copied()
}

fn hit_to_result(hit: VectorHit) -> CortexResult<SearchResult> {
    let memory = reconstruct_memory(&hit.id, &hit.payload)?;
    Ok(SearchResult { memory, score: hit.score })
}

fn not_deleted_filter() -> PayloadFilter {
    PayloadFilter::Bool("deleted".to_string(), false)
}

fn with_deleted_filter(filters: &[PayloadFilter], include_deleted: bool) -> Vec<PayloadFilter> {
    let mut out = filters.to_vec();
    if !include_deleted {
        out.push(not_deleted_filter());
    }
    out
}

/// The read path over C2/C3/C4: semantic/code/graph/hybrid search,
/// duplicate lookup, and graph traversal.
pub struct QueryEngine {
    vector_store: Arc<dyn IVectorStore>,
    graph_store: Arc<dyn IGraphStore>,
    embedding: Arc<dyn IEmbeddingProvider>,
    config: MemoryConfig,
}

impl QueryEngine {
    pub fn new(
        vector_store: Arc<dyn IVectorStore>,
        graph_store: Arc<dyn IGraphStore>,
        embedding: Arc<dyn IEmbeddingProvider>,
        config: MemoryConfig,
    ) -> Self {
        Self { vector_store, graph_store, embedding, config }
    }

    fn check_limit(&self, limit: usize) -> CortexResult<()> {
        if limit > self.config.search_max_limit {
            return Err(RetrievalError::LimitExceeded {
                requested: limit,
                max: self.config.search_max_limit,
            }
            .into());
        }
        Ok(())
    }

    /// Embed `text` and search the vector store. `variants` of `None`
    /// searches every memory variant.
    pub async fn semantic_search(
        &self,
        text: &str,
        variants: Option<&[MemoryType]>,
        filters: &[PayloadFilter],
        limit: usize,
        min_similarity: f64,
        include_deleted: bool,
    ) -> CortexResult<Vec<SearchResult>> {
        self.check_limit(limit)?;
        let (query_vector, _) = self.embedding.embed(text, InputType::Query).await?;
        let filters = with_deleted_filter(filters, include_deleted);
        let variants = variants.unwrap_or(&MemoryType::ALL);

        let mut results = Vec::new();
        for &variant in variants {
            let hits = self
                .vector_store
                .search(variant, &query_vector, &filters, min_similarity, limit)
                .await?;
            for hit in hits {
                results.push(hit_to_result(hit)?);
            }
        }

        debug!(text_len = text.len(), hits = results.len(), "semantic_search complete");
        Ok(sort_and_truncate(results, limit))
    }

    /// Code-biased search: restricted to {function, component,
    /// code_pattern}, biased toward exact name/signature substring matches.
    pub async fn code_search(
        &self,
        text: &str,
        language: Option<&str>,
        limit: usize,
        min_similarity: f64,
        include_deleted: bool,
    ) -> CortexResult<Vec<SearchResult>> {
        self.check_limit(limit)?;
        let (query_vector, _) = self.embedding.embed(text, InputType::Query).await?;

        let mut filters = Vec::new();
        if let Some(language) = language {
            filters.push(PayloadFilter::Eq("language".to_string(), Value::from(language)));
        }
        let filters = with_deleted_filter(&filters, include_deleted);

        let alpha = self.config.code_search_lexical_alpha;
        let mut results = Vec::new();
        for &variant in &CODE_VARIANTS {
            let hits = self
                .vector_store
                .search(variant, &query_vector, &filters, min_similarity, limit)
                .await?;
            for hit in hits {
                let name = hit.payload.get("name").and_then(Value::as_str);
                let signature = hit.payload.get("signature").and_then(Value::as_str);
                let lexical = lexical_match(text, name, signature);
                let cosine = hit.score;
                let score = blend(alpha, cosine, lexical);
                let memory = reconstruct_memory(&hit.id, &hit.payload)?;
                results.push(SearchResult { memory, score });
            }
        }

        debug!(text, hits = results.len(), "code_search complete");
        Ok(sort_and_truncate(results, limit))
    }

    /// Direct pass-through to C4 for advanced graph queries.
    pub async fn graph_query(
        &self,
        statement: &str,
        params: &HashMap<String, Value>,
    ) -> CortexResult<Vec<HashMap<String, Value>>> {
        self.graph_store.query(statement, params).await
    }

    /// Find memories similar to a reference memory or piece of content.
    pub async fn find_duplicates(
        &self,
        reference: DuplicateReference,
        variant: MemoryType,
        threshold: f64,
        limit: usize,
    ) -> CortexResult<Vec<SearchResult>> {
        self.check_limit(limit)?;
        let (reference_id, vector) = match reference {
            DuplicateReference::ById(id) => {
                let vector = self.vector_store.get_vector(variant, &id).await?.ok_or_else(|| {
                    RetrievalError::SearchFailed {
                        reason: format!("reference memory {id} has no stored vector"),
                    }
                })?;
                (Some(id), vector)
            }
            DuplicateReference::ByContent(content) => {
                let (vector, _) = self.embedding.embed(&content, InputType::Query).await?;
                (None, vector)
            }
        };

        let filters = with_deleted_filter(&[], false);
        // Over-fetch by one in case the reference point itself is returned.
        let hits = self
            .vector_store
            .search(variant, &vector, &filters, threshold, limit + 1)
            .await?;

        let mut results = Vec::new();
        for hit in hits {
            if reference_id.as_deref() == Some(hit.id.as_str()) {
                continue;
            }
            results.push(hit_to_result(hit)?);
            if results.len() >= limit {
                break;
            }
        }
        Ok(results)
    }

    /// Delegates to C4 traversal, enforcing `depth ≤ graph_max_depth` and
    /// `limit ≤ search_max_limit`.
    pub async fn get_related(
        &self,
        id: &str,
        depth: usize,
        direction: Direction,
        edge_types: Option<&[RelationshipType]>,
        limit: usize,
    ) -> CortexResult<Vec<TraversalHit>> {
        if depth > self.config.graph_max_depth {
            return Err(RetrievalError::DepthExceeded {
                requested: depth,
                max: self.config.graph_max_depth,
            }
            .into());
        }
        self.check_limit(limit)?;
        self.graph_store.traverse(id, direction, depth, edge_types, limit).await
    }

    /// Hybrid strategy: semantic search, then 1-hop graph
    /// expansion of the top-K direct hits, scored by
    /// `β·semantic_score(parent) + (1-β)·edge_weight` and unioned with the
    /// direct hits (duplicates keep the higher score).
    pub async fn hybrid_search(
        &self,
        text: &str,
        variants: Option<&[MemoryType]>,
        limit: usize,
        min_similarity: f64,
    ) -> CortexResult<Vec<SearchResult>> {
        self.check_limit(limit)?;
        let fetch_limit = limit.max(HYBRID_EXPANSION_K).min(self.config.search_max_limit);
        let direct = self
            .semantic_search(text, variants, &[], fetch_limit, min_similarity, false)
            .await?;

        let beta = self.config.hybrid_semantic_beta;
        let mut merged: HashMap<String, SearchResult> = HashMap::new();
        for result in &direct {
            merged.insert(result.memory.id.clone(), result.clone());
        }

        let top_k = direct.iter().take(HYBRID_EXPANSION_K);
        for parent in top_k {
            let neighbours = self
                .graph_store
                .traverse(&parent.memory.id, Direction::Both, 1, None, limit)
                .await?;
            for hit in neighbours {
                let Some(variant) = memory_type_from_label(&hit.label, &self.config.project_id) else {
                    continue;
                };
                let Some(edge) = hit.edge_chain.last() else { continue };
                let score = beta * parent.score + (1.0 - beta) * edge.weight;

                let entry = merged.entry(hit.node_id.clone());
                match entry {
                    std::collections::hash_map::Entry::Occupied(mut occupied) => {
                        if score > occupied.get().score {
                            occupied.get_mut().score = score;
                        }
                    }
                    std::collections::hash_map::Entry::Vacant(vacant) => {
                        let Some(payload) = self.vector_store.get_payload(variant, &hit.node_id).await?
                        else {
                            continue;
                        };
                        if payload.get("deleted").and_then(Value::as_bool).unwrap_or(false) {
                            continue;
                        }
                        let memory = reconstruct_memory(&hit.node_id, &payload)?;
                        vacant.insert(SearchResult { memory, score });
                    }
                }
            }
        }

        let results: Vec<SearchResult> = merged.into_values().collect();
        debug!(text, hits = results.len(), "hybrid_search complete");
        Ok(sort_and_truncate(results, limit))
    }
}
