//! Memory manager (C6): the write path. Applies duplicate/conflict
//! thresholds and per-index bulk errors on top of
//! `cortex-session/src/manager.rs`'s direct-call style — unlike the
//! session manager this holds no mutable in-process state of its own; all
//! state lives in the stores behind `memory-sync`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use memory_core::config::MemoryConfig;
use memory_core::errors::CortexResult;
use memory_core::hashing::normalize_content;
use memory_core::memory::{
    reconstruct_memory, to_graph_properties, to_vector_payload, BaseMemory, MemoryType, TypedContent,
};
use memory_core::path_validation::validate_within_root;
use memory_core::traits::{IEmbeddingProvider, InputType};
use memory_sync::SyncCoordinator;

use crate::conflict::{hit_to_conflict, Conflict};

/// Reject a component/function memory whose `file_path` escapes
/// `config.project_path`. Other variants carry no file path and pass
/// through untouched.
fn validate_file_path(config: &MemoryConfig, typed_content: &TypedContent) -> CortexResult<()> {
    let file_path = match typed_content {
        TypedContent::Component(c) => Some(c.file_path.as_str()),
        TypedContent::Function(f) => Some(f.file_path.as_str()),
        _ => None,
    };
    if let Some(file_path) = file_path {
        validate_within_root(std::path::Path::new(&config.project_path), std::path::Path::new(file_path))?;
    }
    Ok(())
}

/// Partial fields for `update`: if `content` changes, re-embed and re-run
/// duplicate/conflict checks unless suppressed.
#[derive(Debug, Clone, Default)]
pub struct MemoryUpdate {
    pub content: Option<String>,
    pub typed_content: Option<TypedContent>,
    pub importance_score: Option<f64>,
}

/// One failed item from `bulk_add`, keyed by its position in the input.
#[derive(Debug, Clone)]
pub struct BulkAddError {
    pub index: usize,
    pub error: String,
}

fn graph_label(variant: MemoryType) -> &'static str {
    variant.as_str()
}

/// The write-path orchestrator: normalise, embed, duplicate/conflict
/// check, persist via the sync coordinator.
pub struct MemoryManager {
    embedding: Arc<dyn IEmbeddingProvider>,
    sync: Arc<SyncCoordinator>,
    config: MemoryConfig,
}

impl MemoryManager {
    pub fn new(embedding: Arc<dyn IEmbeddingProvider>, sync: Arc<SyncCoordinator>, config: MemoryConfig) -> Self {
        Self { embedding, sync, config }
    }

    /// Embed, check for duplicates/conflicts, and write through to both
    /// stores.
    pub async fn add(
        &self,
        mut memory: BaseMemory,
        check_conflicts: bool,
    ) -> CortexResult<(String, Vec<Conflict>)> {
        memory.validate_invariants()?;
        memory.typed_content.validate_required_fields()?;
        validate_file_path(&self.config, &memory.typed_content)?;
        let variant = memory.memory_type;

        let normalized = normalize_content(&memory.content);
        let (vector, from_cache) = self.embedding.embed(&normalized, InputType::Document).await?;
        memory.set_embedding(vector.clone())?;

        self.log_near_duplicates(variant, &vector, &memory.id).await;

        let conflicts = if check_conflicts {
            self.find_conflicts(variant, &vector, &memory.id).await?
        } else {
            Vec::new()
        };

        let vector_payload = to_vector_payload(&memory);
        let graph_properties = to_graph_properties(&memory);

        let status = self
            .sync
            .write_through(
                variant,
                &memory.id,
                &vector,
                vector_payload,
                graph_label(variant),
                graph_properties,
                &[],
            )
            .await?;

        info!(
            id = %memory.id,
            variant = variant.as_str(),
            from_cache,
            sync_status = ?status,
            conflicts = conflicts.len(),
            "memory added"
        );
        Ok((memory.id, conflicts))
    }

    /// Apply a partial update, re-embedding and re-checking conflicts only
    /// when `content` changed.
    pub async fn update(
        &self,
        id: &str,
        variant: MemoryType,
        fields: MemoryUpdate,
        check_conflicts: bool,
    ) -> CortexResult<bool> {
        let Some(payload) = self.sync.vector_store().get_payload(variant, id).await? else {
            return Ok(false);
        };
        let Some(vector) = self.sync.vector_store().get_vector(variant, id).await? else {
            return Ok(false);
        };

        let mut memory = reconstruct_memory(id, &payload)?;
        memory.embedding = vector;

        let content_changed = fields.content.is_some();
        if let Some(content) = fields.content {
            memory.set_content(content);
        } else {
            memory.updated_at = Utc::now();
        }
        if let Some(typed_content) = fields.typed_content {
            typed_content.validate_required_fields()?;
            validate_file_path(&self.config, &typed_content)?;
            memory.typed_content = typed_content;
        }
        if let Some(importance_score) = fields.importance_score {
            memory.importance_score = importance_score;
        }

        let vector = if content_changed {
            let normalized = normalize_content(&memory.content);
            let (vector, _) = self.embedding.embed(&normalized, InputType::Document).await?;
            memory.set_embedding(vector.clone())?;
            vector
        } else {
            memory.embedding.clone()
        };

        if check_conflicts && content_changed {
            let conflicts = self.find_conflicts(variant, &vector, id).await?;
            if !conflicts.is_empty() {
                warn!(id, conflicts = conflicts.len(), "update introduced new conflicts");
            }
        }

        let vector_payload = to_vector_payload(&memory);
        let graph_properties = to_graph_properties(&memory);
        self.sync
            .write_through(variant, id, &vector, vector_payload, graph_label(variant), graph_properties, &[])
            .await?;
        Ok(true)
    }

    /// Delete a memory. Soft delete goes through the sync
    /// coordinator's two-phase discipline; hard delete removes from both
    /// stores directly and is reserved for the normaliser's cleanup phase
    /// in the common case, but exposed here for direct callers too.
    pub async fn delete(&self, id: &str, variant: MemoryType, hard: bool) -> CortexResult<bool> {
        if !self.sync.vector_store().get_payload(variant, id).await?.is_some() {
            return Ok(false);
        }

        if hard {
            self.sync.graph_store().delete_node(graph_label(variant), id).await?;
            self.sync.vector_store().delete(variant, id).await?;
            return Ok(true);
        }

        let payload = self.sync.vector_store().get_payload(variant, id).await?.unwrap_or_default();
        self.sync
            .soft_delete(variant, id, graph_label(variant), payload)
            .await?;
        Ok(true)
    }

    /// Fetch a memory by id. Increments `access_count` and stamps
    /// `last_accessed_at` at most once per call.
    pub async fn get(&self, id: &str, variant: MemoryType, include_embedding: bool) -> CortexResult<Option<BaseMemory>> {
        let Some(payload) = self.sync.vector_store().get_payload(variant, id).await? else {
            return Ok(None);
        };
        let mut memory = reconstruct_memory(id, &payload)?;
        if include_embedding {
            memory.embedding = self.sync.vector_store().get_vector(variant, id).await?.unwrap_or_default();
        }

        memory.record_access();
        let mut accessed_payload = payload;
        accessed_payload.insert("access_count".to_string(), Value::from(memory.access_count));
        accessed_payload.insert(
            "last_accessed_at".to_string(),
            Value::from(memory.last_accessed_at.unwrap().to_rfc3339()),
        );
        self.sync.vector_store().update_payload(variant, id, accessed_payload).await?;

        Ok(Some(memory))
    }

    /// Batch-add memories, batching embeddings, returning partial
    /// success — a failure on one item never aborts the others.
    pub async fn bulk_add(
        &self,
        memories: Vec<BaseMemory>,
    ) -> CortexResult<(Vec<String>, Vec<BulkAddError>)> {
        let mut added_ids = Vec::new();
        let mut errors = Vec::new();

        let texts: Vec<String> = memories.iter().map(|m| normalize_content(&m.content)).collect();
        let embed_result = self.embedding.embed_batch(&texts, InputType::Document).await;

        let embeddings = match embed_result {
            Ok(embeddings) => embeddings,
            Err(e) => {
                for (index, _) in memories.iter().enumerate() {
                    errors.push(BulkAddError { index, error: e.to_string() });
                }
                return Ok((added_ids, errors));
            }
        };

        for (index, (mut memory, (vector, _))) in memories.into_iter().zip(embeddings).enumerate() {
            let result: CortexResult<()> = async {
                memory.validate_invariants()?;
                memory.typed_content.validate_required_fields()?;
                validate_file_path(&self.config, &memory.typed_content)?;
                memory.set_embedding(vector.clone())?;
                let variant = memory.memory_type;
                let vector_payload = to_vector_payload(&memory);
                let graph_properties = to_graph_properties(&memory);
                self.sync
                    .write_through(
                        variant,
                        &memory.id,
                        &vector,
                        vector_payload,
                        graph_label(variant),
                        graph_properties,
                        &[],
                    )
                    .await?;
                added_ids.push(memory.id.clone());
                Ok(())
            }
            .await;

            if let Err(e) = result {
                errors.push(BulkAddError { index, error: e.to_string() });
            }
        }

        Ok((added_ids, errors))
    }

    async fn log_near_duplicates(&self, variant: MemoryType, vector: &[f32], self_id: &str) {
        match self
            .sync
            .vector_store()
            .search(variant, vector, &[], self.config.duplicate_threshold, 5)
            .await
        {
            Ok(hits) => {
                let count = hits.iter().filter(|h| h.id != self_id).count();
                if count > 0 {
                    info!(id = self_id, count, "near-duplicate memories found (advisory only)");
                }
            }
            Err(e) => warn!(id = self_id, error = %e, "duplicate check failed, proceeding anyway"),
        }
    }

    async fn find_conflicts(
        &self,
        variant: MemoryType,
        vector: &[f32],
        self_id: &str,
    ) -> CortexResult<Vec<Conflict>> {
        let hits = self
            .sync
            .vector_store()
            .search(variant, vector, &[], self.config.conflict_threshold, 5)
            .await?;
        Ok(hits.iter().filter(|h| h.id != self_id).map(hit_to_conflict).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use memory_core::memory::{
        FunctionContent, Priority, RequirementContent, RequirementStatus, TypedContent,
    };
    use memory_storage::{SqliteGraphStore, SqliteVectorStore};
    use memory_sync::RetryLog;

    struct StubEmbedder;

    #[async_trait]
    impl IEmbeddingProvider for StubEmbedder {
        async fn embed(&self, text: &str, _input_type: InputType) -> CortexResult<(Vec<f32>, bool)> {
            let seed = text.len() as f32;
            Ok((vec![seed, 1.0, 0.0, 0.0], false))
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
            4
        }
    }

    fn function_memory(name: &str, content: &str) -> BaseMemory {
        BaseMemory::new(
            content.to_string(),
            TypedContent::Function(FunctionContent {
                name: name.to_string(),
                signature: format!("{name}()"),
                file_path: "a.py".into(),
                start_line: 1,
                end_line: 2,
                language: "python".into(),
                docstring: None,
                containing_class: None,
            }),
        )
        .unwrap()
    }

    fn manager() -> MemoryManager {
        let vector_store = Arc::new(SqliteVectorStore::open_in_memory("proj").unwrap());
        let graph_store = Arc::new(SqliteGraphStore::open_in_memory("proj").unwrap());
        let retry_log = RetryLog::open_in_memory().unwrap();
        let sync = Arc::new(SyncCoordinator::new(vector_store, graph_store, retry_log, 3, 60));
        MemoryManager::new(Arc::new(StubEmbedder), sync, MemoryConfig::default())
    }

    #[tokio::test]
    async fn add_persists_and_returns_no_conflicts_for_distinct_content() {
        let mgr = manager();
        let (id, conflicts) = mgr.add(function_memory("a", "def a(): pass"), true).await.unwrap();
        assert!(!id.is_empty());
        assert!(conflicts.is_empty());
    }

    #[tokio::test]
    async fn add_reports_conflict_for_near_identical_content() {
        let mgr = manager();
        mgr.add(function_memory("a", "identical content here"), true).await.unwrap();
        let (_, conflicts) = mgr.add(function_memory("a", "identical content here"), true).await.unwrap();
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].similarity >= mgr.config.conflict_threshold);
    }

    #[tokio::test]
    async fn add_rejects_file_path_escaping_project_root() {
        let mgr = manager();
        let escaping = BaseMemory::new(
            "def a(): pass".to_string(),
            TypedContent::Function(FunctionContent {
                name: "a".to_string(),
                signature: "a()".to_string(),
                file_path: "../../etc/passwd".into(),
                start_line: 1,
                end_line: 2,
                language: "python".into(),
                docstring: None,
                containing_class: None,
            }),
        )
        .unwrap();
        assert!(mgr.add(escaping, true).await.is_err());
    }

    #[tokio::test]
    async fn get_increments_access_count() {
        let mgr = manager();
        let (id, _) = mgr.add(function_memory("a", "def a(): pass"), true).await.unwrap();
        let first = mgr.get(&id, MemoryType::Function, false).await.unwrap().unwrap();
        assert_eq!(first.access_count, 1);
        let second = mgr.get(&id, MemoryType::Function, false).await.unwrap().unwrap();
        assert_eq!(second.access_count, 2);
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let mgr = manager();
        assert!(mgr.get("nope", MemoryType::Function, false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_changes_content_and_reembeds() {
        let mgr = manager();
        let (id, _) = mgr.add(function_memory("a", "def a(): pass"), true).await.unwrap();
        let updated = mgr
            .update(
                &id,
                MemoryType::Function,
                MemoryUpdate { content: Some("def a(): return 1".to_string()), ..Default::default() },
                false,
            )
            .await
            .unwrap();
        assert!(updated);
        let memory = mgr.get(&id, MemoryType::Function, false).await.unwrap().unwrap();
        assert_eq!(memory.content, "def a(): return 1");
    }

    #[tokio::test]
    async fn update_missing_returns_false() {
        let mgr = manager();
        let updated = mgr
            .update("nope", MemoryType::Function, MemoryUpdate::default(), false)
            .await
            .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn soft_delete_marks_deleted_without_removing_point() {
        let mgr = manager();
        let (id, _) = mgr.add(function_memory("a", "def a(): pass"), true).await.unwrap();
        let deleted = mgr.delete(&id, MemoryType::Function, false).await.unwrap();
        assert!(deleted);
        let memory = mgr.get(&id, MemoryType::Function, false).await.unwrap().unwrap();
        assert!(memory.deleted);
    }

    #[tokio::test]
    async fn hard_delete_removes_point_entirely() {
        let mgr = manager();
        let (id, _) = mgr.add(function_memory("a", "def a(): pass"), true).await.unwrap();
        let deleted = mgr.delete(&id, MemoryType::Function, true).await.unwrap();
        assert!(deleted);
        assert!(mgr.get(&id, MemoryType::Function, false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bulk_add_reports_partial_success() {
        let mgr = manager();
        let memories = vec![function_memory("a", "def a(): pass"), function_memory("b", "def b(): pass")];
        let (added, errors) = mgr.bulk_add(memories).await.unwrap();
        assert_eq!(added.len(), 2);
        assert!(errors.is_empty());
    }

    fn requirement_memory(requirement_id: &str, title: &str) -> BaseMemory {
        BaseMemory::new(
            format!("requirement {requirement_id}"),
            TypedContent::Requirements(RequirementContent {
                requirement_id: requirement_id.to_string(),
                title: title.to_string(),
                description: "desc".into(),
                priority: Priority::Low,
                status: RequirementStatus::Draft,
                source_document: None,
            }),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn add_rejects_missing_required_field() {
        let mgr = manager();
        let result = mgr.add(requirement_memory("REQ-1", ""), true).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("title required"));
    }

    #[tokio::test]
    async fn bulk_add_reports_error_for_missing_required_field_without_aborting_batch() {
        let mgr = manager();
        let memories = vec![
            requirement_memory("REQ-1", "first"),
            requirement_memory("REQ-2", ""),
            requirement_memory("REQ-3", "third"),
        ];
        let (added, errors) = mgr.bulk_add(memories).await.unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].index, 1);
        assert!(errors[0].error.contains("title required"));
    }
}
