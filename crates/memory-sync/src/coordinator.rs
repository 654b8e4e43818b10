//! Two-phase write coordinator. Every create/update/delete passes
//! through here so the vector and graph stores never diverge without a
//! durable record of the gap.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};

use memory_core::errors::CortexResult;
use memory_core::memory::{MemoryType, Relationship, SyncStatus};
use memory_core::traits::{IGraphStore, IVectorStore};

use crate::locks::KeyedLocks;
use crate::retry_log::{RetryLog, RetryPayload};

const MAX_BACKOFF_SECS: u64 = 3600;

fn backoff_delay_secs(base_secs: u64, attempt: u32) -> u64 {
    base_secs.saturating_mul(1u64 << attempt.min(10)).min(MAX_BACKOFF_SECS)
}

fn sync_status_str(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::Synced => "synced",
        SyncStatus::Pending => "pending",
        SyncStatus::Failed => "failed",
    }
}

/// Coordinates two-phase writes across the vector and graph stores and
/// owns the durable retry log and per-id lock table.
pub struct SyncCoordinator {
    vector_store: Arc<dyn IVectorStore>,
    graph_store: Arc<dyn IGraphStore>,
    retry_log: RetryLog,
    locks: KeyedLocks,
    max_retries: u32,
    base_retry_delay_secs: u64,
}

impl SyncCoordinator {
    pub fn new(
        vector_store: Arc<dyn IVectorStore>,
        graph_store: Arc<dyn IGraphStore>,
        retry_log: RetryLog,
        max_retries: u32,
        base_retry_delay_secs: u64,
    ) -> Self {
        Self {
            vector_store,
            graph_store,
            retry_log,
            locks: KeyedLocks::new(),
            max_retries,
            base_retry_delay_secs,
        }
    }

    pub fn graph_store(&self) -> &Arc<dyn IGraphStore> {
        &self.graph_store
    }

    pub fn vector_store(&self) -> &Arc<dyn IVectorStore> {
        &self.vector_store
    }

    pub fn retry_log(&self) -> &RetryLog {
        &self.retry_log
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn base_retry_delay_secs(&self) -> u64 {
        self.base_retry_delay_secs
    }

    /// Protocol on create/update: mark pending, write the vector store,
    /// then attempt the graph store; on graph-store failure queue a
    /// retry-log entry and return `Pending` rather than an error — the
    /// write already landed in the vector store.
    pub async fn write_through(
        &self,
        variant: MemoryType,
        memory_id: &str,
        vector: &[f32],
        mut vector_payload: HashMap<String, Value>,
        node_label: &str,
        node_properties: HashMap<String, Value>,
        edges: &[Relationship],
    ) -> CortexResult<SyncStatus> {
        let _guard = self.locks.acquire(memory_id).await;

        vector_payload.insert("sync_status".to_string(), Value::from("pending"));
        self.vector_store
            .upsert(variant, memory_id, vector, vector_payload.clone())
            .await?;
        debug!(memory_id, "vector store write complete, attempting graph write");

        let graph_result = self
            .write_graph(node_label, memory_id, node_properties.clone(), edges)
            .await;

        match graph_result {
            Ok(()) => {
                vector_payload.insert("sync_status".to_string(), Value::from("synced"));
                self.vector_store.update_payload(variant, memory_id, vector_payload).await?;
                Ok(SyncStatus::Synced)
            }
            Err(e) => {
                warn!(memory_id, error = %e, "graph write failed, queuing retry");
                let payload = RetryPayload::GraphUpsert {
                    variant,
                    node_label: node_label.to_string(),
                    node_properties,
                    edges: edges.to_vec(),
                };
                let next_attempt_at = chrono::Utc::now().timestamp()
                    + backoff_delay_secs(self.base_retry_delay_secs, 0) as i64;
                self.retry_log.enqueue(memory_id, &payload, &e.to_string(), next_attempt_at)?;
                Ok(SyncStatus::Pending)
            }
        }
    }

    /// Protocol on soft delete: mark `deleted=true` in both stores under
    /// the same two-phase discipline.
    pub async fn soft_delete(
        &self,
        variant: MemoryType,
        memory_id: &str,
        label: &str,
        mut vector_payload: HashMap<String, Value>,
    ) -> CortexResult<SyncStatus> {
        let _guard = self.locks.acquire(memory_id).await;

        vector_payload.insert("deleted".to_string(), Value::from(true));
        vector_payload.insert("deleted_at".to_string(), Value::from(chrono::Utc::now().to_rfc3339()));
        vector_payload.insert("sync_status".to_string(), Value::from("pending"));
        self.vector_store.update_payload(variant, memory_id, vector_payload.clone()).await?;

        match self.graph_store.delete_node(label, memory_id).await {
            Ok(()) => {
                vector_payload.insert("sync_status".to_string(), Value::from("synced"));
                self.vector_store.update_payload(variant, memory_id, vector_payload).await?;
                Ok(SyncStatus::Synced)
            }
            Err(e) => {
                warn!(memory_id, error = %e, "graph delete failed, queuing retry");
                let payload = RetryPayload::GraphDeleteNode { variant, label: label.to_string() };
                let next_attempt_at = chrono::Utc::now().timestamp()
                    + backoff_delay_secs(self.base_retry_delay_secs, 0) as i64;
                self.retry_log.enqueue(memory_id, &payload, &e.to_string(), next_attempt_at)?;
                Ok(SyncStatus::Pending)
            }
        }
    }

    async fn write_graph(
        &self,
        label: &str,
        id: &str,
        properties: HashMap<String, Value>,
        edges: &[Relationship],
    ) -> CortexResult<()> {
        self.graph_store.upsert_node(label, id, properties).await?;
        for edge in edges {
            self.graph_store.upsert_edge(edge).await?;
        }
        Ok(())
    }

    /// Replay a retry-log entry's intended graph write for `memory_id`,
    /// called by the background reconciler.
    pub(crate) async fn replay(&self, memory_id: &str, payload: &RetryPayload) -> CortexResult<()> {
        match payload {
            RetryPayload::GraphUpsert { node_label, node_properties, edges, .. } => {
                self.graph_store.upsert_node(node_label, memory_id, node_properties.clone()).await?;
                for edge in edges {
                    self.graph_store.upsert_edge(edge).await?;
                }
                Ok(())
            }
            RetryPayload::GraphDeleteNode { label, .. } => {
                self.graph_store.delete_node(label, memory_id).await
            }
        }
    }

    /// Mark a memory `synced` or `failed` in the vector store after the
    /// reconciler resolves its retry-log entry. A vanished point (deleted
    /// outright in the meantime) is not surfaced as an error. Reads the
    /// existing payload first — `update_payload` is a full replace, and
    /// writing a bare `{"sync_status": ...}` map would wipe `content`,
    /// `typed_content`, and every other stored field.
    pub(crate) async fn finalize_sync_status(
        &self,
        variant: MemoryType,
        memory_id: &str,
        status: SyncStatus,
    ) {
        let existing = match self.vector_store.get_payload(variant, memory_id).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return,
            Err(e) => {
                error!(memory_id, error = %e, "failed to read payload before finalizing sync status");
                return;
            }
        };
        let mut payload = existing;
        payload.insert("sync_status".to_string(), Value::from(sync_status_str(status)));
        if let Err(e) = self.vector_store.update_payload(variant, memory_id, payload).await {
            error!(memory_id, error = %e, "failed to finalize sync status");
        }
    }
}
