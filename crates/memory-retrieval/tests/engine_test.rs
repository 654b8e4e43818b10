//! Integration tests for the query engine, seeded through `memory-manager`
//! so every strategy exercises the same write path a real caller would
//! use rather than poking the stores directly.

use std::sync::Arc;

use async_trait::async_trait;

use memory_core::config::MemoryConfig;
use memory_core::errors::CortexResult;
use memory_core::memory::{
    CodePatternContent, FunctionContent, MemoryType, PatternType, Priority, Relationship,
    RequirementContent, RequirementStatus, TypedContent,
};
use memory_core::traits::{Direction, IEmbeddingProvider, IGraphStore, IVectorStore, InputType};
use memory_manager::MemoryManager;
use memory_retrieval::{DuplicateReference, QueryEngine};
use memory_storage::{SqliteGraphStore, SqliteVectorStore};
use memory_sync::{RetryLog, SyncCoordinator};

const VOCAB: [&str; 6] = ["parse", "config", "format", "output", "duplicate", "add"];

/// A toy bag-of-keywords embedder: cosine similarity tracks shared
/// vocabulary words rather than anything semantic, which is all these
/// tests need.
struct KeywordEmbedder;

fn embed_text(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let mut vector: Vec<f32> = VOCAB.iter().map(|w| if lower.contains(w) { 1.0 } else { 0.0 }).collect();
    vector.push(0.1); // keeps the vector non-zero when no keyword matches.
    vector
}

#[async_trait]
impl IEmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str, _input_type: InputType) -> CortexResult<(Vec<f32>, bool)> {
        Ok((embed_text(text), false))
    }
    async fn embed_batch(
        &self,
        texts: &[String],
        input_type: InputType,
    ) -> CortexResult<Vec<(Vec<f32>, bool)>> {
        let mut out = Vec::new();
        for t in texts {
            out.push(self.embed(t, input_type).await?);
        }
        Ok(out)
    }
    fn dimensions(&self) -> usize {
        VOCAB.len() + 1
    }
}

struct Fixture {
    manager: MemoryManager,
    engine: QueryEngine,
    graph_store: Arc<dyn IGraphStore>,
}

fn fixture() -> Fixture {
    let vector_store: Arc<dyn IVectorStore> = Arc::new(SqliteVectorStore::open_in_memory("proj").unwrap());
    let graph_store: Arc<dyn IGraphStore> = Arc::new(SqliteGraphStore::open_in_memory("proj").unwrap());
    let retry_log = RetryLog::open_in_memory().unwrap();
    let embedding: Arc<dyn IEmbeddingProvider> = Arc::new(KeywordEmbedder);

    let sync = Arc::new(SyncCoordinator::new(
        vector_store.clone(),
        graph_store.clone(),
        retry_log,
        3,
        60,
    ));
    let config = MemoryConfig { project_id: "proj".to_string(), ..MemoryConfig::default() };
    let manager = MemoryManager::new(embedding.clone(), sync, config.clone());
    let engine = QueryEngine::new(vector_store, graph_store.clone(), embedding, config);
    Fixture { manager, engine, graph_store }
}

fn function_memory(name: &str, signature: &str, content: &str) -> memory_core::memory::BaseMemory {
    memory_core::memory::BaseMemory::new(
        content.to_string(),
        TypedContent::Function(FunctionContent {
            name: name.to_string(),
            signature: signature.to_string(),
            file_path: "lib.py".into(),
            start_line: 1,
            end_line: 3,
            language: "python".into(),
            docstring: None,
            containing_class: None,
        }),
    )
    .unwrap()
}

fn pattern_memory(name: &str, content: &str) -> memory_core::memory::BaseMemory {
    memory_core::memory::BaseMemory::new(
        content.to_string(),
        TypedContent::CodePattern(CodePatternContent {
            name: name.to_string(),
            pattern_type: PatternType::Behavioral,
            language: "python".into(),
            code_template: content.to_string(),
            usage_context: "parsing".into(),
        }),
    )
    .unwrap()
}

#[tokio::test]
async fn semantic_search_ranks_closer_match_first() {
    let f = fixture();
    f.manager.add(function_memory("parse_config", "parse_config(s) -> dict", "parses config text"), false).await.unwrap();
    f.manager.add(function_memory("format_output", "format_output(d) -> str", "formats output text"), false).await.unwrap();

    let results = f
        .engine
        .semantic_search("parse config", None, &[], 10, 0.0, false)
        .await
        .unwrap();

    assert!(!results.is_empty());
    assert_eq!(results[0].memory.content, "parses config text");
}

#[tokio::test]
async fn semantic_search_excludes_soft_deleted_by_default() {
    let f = fixture();
    let (id, _) = f.manager.add(function_memory("parse_config", "parse_config(s)", "parses config text"), false).await.unwrap();
    f.manager.delete(&id, MemoryType::Function, false).await.unwrap();

    let results = f.engine.semantic_search("parse config", None, &[], 10, 0.0, false).await.unwrap();
    assert!(results.iter().all(|r| r.memory.id != id));

    let with_deleted = f.engine.semantic_search("parse config", None, &[], 10, 0.0, true).await.unwrap();
    assert!(with_deleted.iter().any(|r| r.memory.id == id));
}

#[tokio::test]
async fn code_search_biases_toward_name_match() {
    let f = fixture();
    f.manager.add(function_memory("add_numbers", "add_numbers(a, b) -> int", "adds two numbers together"), false).await.unwrap();
    f.manager.add(function_memory("format_output", "format_output(d) -> str", "adds formatting to output"), false).await.unwrap();

    let results = f.engine.code_search("add_numbers", None, 10, 0.0, false).await.unwrap();
    assert_eq!(results[0].memory.content, "adds two numbers together");
}

#[tokio::test]
async fn code_search_restricts_to_code_variants() {
    let f = fixture();
    f.manager.add(function_memory("parse_config", "parse_config(s)", "parses config text"), false).await.unwrap();
    f.manager.add(pattern_memory("retry_pattern", "duplicate retry wrapper pattern"), false).await.unwrap();
    let (requirement_id, _) = f
        .manager
        .add(
            memory_core::memory::BaseMemory::new(
                "parse config files on startup".to_string(),
                TypedContent::Requirements(RequirementContent {
                    requirement_id: "REQ-1".into(),
                    title: "parse config".into(),
                    description: "parse config files on startup".into(),
                    priority: Priority::Medium,
                    status: RequirementStatus::Draft,
                    source_document: None,
                }),
            )
            .unwrap(),
            false,
        )
        .await
        .unwrap();

    let results = f.engine.code_search("parse", None, 10, 0.0, false).await.unwrap();
    assert!(results.iter().all(|r| r.memory.id != requirement_id));
    assert!(results.iter().all(|r| r.memory.memory_type != MemoryType::Requirements));
}

#[tokio::test]
async fn find_duplicates_excludes_reference_id() {
    let f = fixture();
    let (id_a, _) = f.manager.add(function_memory("parse_config", "parse_config(s)", "duplicate config parsing logic"), false).await.unwrap();
    let (id_b, _) = f.manager.add(function_memory("parse_config_v2", "parse_config_v2(s)", "duplicate config parsing logic"), false).await.unwrap();

    let results = f
        .engine
        .find_duplicates(DuplicateReference::ById(id_a.clone()), MemoryType::Function, 0.5, 10)
        .await
        .unwrap();

    assert!(results.iter().all(|r| r.memory.id != id_a));
    assert!(results.iter().any(|r| r.memory.id == id_b));
}

#[tokio::test]
async fn get_related_rejects_depth_beyond_configured_max() {
    let f = fixture();
    let err = f
        .engine
        .get_related("seed", MemoryConfig::default().graph_max_depth + 1, Direction::Out, None, 10)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("depth"));
}

#[tokio::test]
async fn get_related_traverses_linked_nodes() {
    let f = fixture();
    let (id_a, _) = f.manager.add(function_memory("caller", "caller()", "calls into the callee"), false).await.unwrap();
    let (id_b, _) = f.manager.add(function_memory("callee", "callee()", "does the work"), false).await.unwrap();

    f.graph_store
        .upsert_edge(&Relationship::new(memory_core::memory::RelationshipType::Calls, &id_a, &id_b))
        .await
        .unwrap();

    let related = f.engine.get_related(&id_a, 1, Direction::Out, None, 10).await.unwrap();
    assert!(related.iter().any(|hit| hit.node_id == id_b));
}

#[tokio::test]
async fn hybrid_search_includes_graph_neighbours() {
    let f = fixture();
    let (id_a, _) = f.manager.add(function_memory("parse_config", "parse_config(s)", "parses config text"), false).await.unwrap();
    let (id_b, _) = f.manager.add(function_memory("unrelated_helper", "unrelated_helper()", "totally unrelated helper text"), false).await.unwrap();

    f.graph_store
        .upsert_edge(&Relationship::new(memory_core::memory::RelationshipType::Calls, &id_a, &id_b).with_weight(0.9))
        .await
        .unwrap();

    let results = f.engine.hybrid_search("parse config", None, 10, 0.0).await.unwrap();
    assert!(results.iter().any(|r| r.memory.id == id_b));
}
