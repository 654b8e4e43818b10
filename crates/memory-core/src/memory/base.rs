//! The universal memory record. Every stored item is a `BaseMemory`,
//! discriminated and specialised by its `content`. Grounded on
//! `cortex-core::memory::base::BaseMemory`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::EMBEDDING_DIMENSIONS;
use crate::errors::{CortexError, CortexResult};
use crate::hashing::content_hash;

use super::types::{MemoryType, TypedContent};

/// Cross-store synchronization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Synced,
    Pending,
    Failed,
}

/// The universal memory struct shared by all eight variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseMemory {
    /// 128-bit random identifier (UUID v4), globally unique.
    pub id: String,
    pub memory_type: MemoryType,
    /// Primary textual content used to derive the embedding vector.
    pub content: String,
    /// Variant-specific attribute bag.
    pub typed_content: TypedContent,
    /// Dense embedding, always empty or exactly `EMBEDDING_DIMENSIONS` long.
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub access_count: u64,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub importance_score: f64,
    pub sync_status: SyncStatus,
    /// Handle into the graph store, once a node has been created for this
    /// memory.
    pub graph_node_id: Option<String>,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    /// SHA-256 hash of the normalised content; identity signal for dedup and
    /// the embedding cache.
    pub content_hash: String,
}

impl BaseMemory {
    /// Construct a new memory with generated id, current timestamps, and a
    /// freshly computed content hash. The embedding is left empty —
    /// `memory-manager` fills it in during the write path.
    pub fn new(content: String, typed_content: TypedContent) -> CortexResult<Self> {
        if content.trim().is_empty() {
            return Err(CortexError::Validation {
                message: "content must not be empty".to_string(),
            });
        }
        let now = Utc::now();
        let hash = content_hash(&content, true);
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            memory_type: typed_content.memory_type(),
            content,
            typed_content,
            embedding: Vec::new(),
            created_at: now,
            updated_at: now,
            access_count: 0,
            last_accessed_at: None,
            importance_score: 0.5,
            sync_status: SyncStatus::Synced,
            graph_node_id: None,
            deleted: false,
            deleted_at: None,
            content_hash: hash,
        })
    }

    /// Validate the invariants every stored memory must hold.
    pub fn validate_invariants(&self) -> CortexResult<()> {
        if !(self.embedding.is_empty() || self.embedding.len() == EMBEDDING_DIMENSIONS) {
            return Err(CortexError::Internal {
                message: format!(
                    "embedding has {} components, expected 0 or {EMBEDDING_DIMENSIONS}",
                    self.embedding.len()
                ),
            });
        }
        if self.deleted && self.deleted_at.is_none() {
            return Err(CortexError::Internal {
                message: "deleted=true requires deleted_at to be set".to_string(),
            });
        }
        if self.created_at > self.updated_at {
            return Err(CortexError::Internal {
                message: "created_at must not be after updated_at".to_string(),
            });
        }
        Ok(())
    }

    pub fn set_content(&mut self, content: String) {
        self.content_hash = content_hash(&content, true);
        self.content = content;
        self.updated_at = Utc::now();
    }

    pub fn set_embedding(&mut self, embedding: Vec<f32>) -> CortexResult<()> {
        if !embedding.is_empty() && embedding.len() != EMBEDDING_DIMENSIONS {
            return Err(CortexError::Internal {
                message: format!(
                    "embedding has {} components, expected {EMBEDDING_DIMENSIONS}",
                    embedding.len()
                ),
            });
        }
        self.embedding = embedding;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn record_access(&mut self) {
        self.access_count += 1;
        self.last_accessed_at = Some(Utc::now());
    }

    pub fn mark_deleted(&mut self) {
        self.deleted = true;
        self.deleted_at = Some(Utc::now());
    }

    pub fn mark_sync_pending(&mut self) {
        self.sync_status = SyncStatus::Pending;
    }

    pub fn mark_sync_failed(&mut self) {
        self.sync_status = SyncStatus::Failed;
    }

    pub fn mark_synced(&mut self, graph_node_id: Option<String>) {
        self.sync_status = SyncStatus::Synced;
        if graph_node_id.is_some() {
            self.graph_node_id = graph_node_id;
        }
    }
}

impl PartialEq for BaseMemory {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
