//! Process-wide configuration, constructed once and injected into every
//! component. Hot-reload is out of scope; a `MemoryConfig` is an immutable
//! value for the life of the process.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{
    CONFLICT_THRESHOLD_MAX, CONFLICT_THRESHOLD_MIN, DUPLICATE_THRESHOLD_MAX,
    DUPLICATE_THRESHOLD_MIN,
};
use crate::errors::{CortexError, CortexResult};

/// Root configuration for the memory service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    // Vector store (Qdrant-shaped; see memory-storage for the adapter that
    // consumes these).
    pub qdrant_host: String,
    pub qdrant_port: u16,
    pub qdrant_api_key: Option<String>,

    // Graph store (Neo4j-shaped; memory-storage's graph adapter uses these
    // only as namespace/identity metadata — the backing engine is a local
    // petgraph + SQLite store, see DESIGN.md for why).
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub neo4j_database: String,
    pub neo4j_max_connection_pool_size: usize,

    // Embedding provider.
    pub voyage_api_key: String,
    pub voyage_model: String,
    pub voyage_batch_size: usize,

    // Embedding cache.
    pub embedding_cache_path: String,
    pub embedding_cache_size: u64,
    pub embedding_cache_ttl_days: i64,

    // Duplicate / conflict detection.
    pub duplicate_threshold: f64,
    pub conflict_threshold: f64,

    // Logging.
    pub log_level: String,
    pub log_format: LogFormat,
    pub log_file: Option<String>,

    // Metrics (in-process counters only; HTTP exposition is out of scope).
    pub metrics_enabled: bool,

    // Project.
    pub project_path: String,
    pub project_id: String,

    // Sync.
    pub sync_interval_seconds: u64,
    pub sync_max_retries: u32,
    pub sync_retry_delay_seconds: u64,

    // Normalisation.
    pub normalization_batch_size: usize,
    pub soft_delete_retention_days: i64,

    // Search / retrieval.
    pub search_default_limit: usize,
    pub search_max_limit: usize,
    pub graph_max_depth: usize,

    // Ranking constants.
    pub code_search_lexical_alpha: f64,
    pub hybrid_semantic_beta: f64,

    // Parser orchestrator (C9): gitignore-aware directory walk.
    pub parser_extra_ignores: Vec<String>,
    pub parser_allowed_extensions: Vec<String>,

    // Local SQLite-backed storage directory (see memory-storage's adapters
    // for why this substitutes for the Qdrant/Neo4j wire clients the
    // fields above are shaped after).
    pub data_dir: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Console,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            qdrant_host: "localhost".to_string(),
            qdrant_port: 6333,
            qdrant_api_key: None,

            neo4j_uri: "bolt://localhost:7687".to_string(),
            neo4j_user: "neo4j".to_string(),
            neo4j_password: String::new(),
            neo4j_database: "neo4j".to_string(),
            neo4j_max_connection_pool_size: 50,

            voyage_api_key: String::new(),
            voyage_model: "voyage-code-3".to_string(),
            voyage_batch_size: 128,

            embedding_cache_path: ".cache/embeddings.db".to_string(),
            embedding_cache_size: 10_000,
            embedding_cache_ttl_days: 30,

            duplicate_threshold: 0.85,
            conflict_threshold: 0.95,

            log_level: "INFO".to_string(),
            log_format: LogFormat::Json,
            log_file: None,

            metrics_enabled: true,

            project_path: "/project".to_string(),
            project_id: "default".to_string(),

            sync_interval_seconds: 300,
            sync_max_retries: 3,
            sync_retry_delay_seconds: 60,

            normalization_batch_size: 1000,
            soft_delete_retention_days: 30,

            search_default_limit: 10,
            search_max_limit: 100,
            graph_max_depth: 5,

            code_search_lexical_alpha: 0.7,
            hybrid_semantic_beta: 0.6,

            parser_extra_ignores: Vec::new(),
            parser_allowed_extensions: Vec::new(),

            data_dir: ".memory-service".to_string(),
        }
    }
}

impl MemoryConfig {
    /// Load configuration from an optional TOML file, falling back to
    /// defaults for any field the file omits, then validate bounds.
    pub fn load(path: Option<&Path>) -> CortexResult<Self> {
        let config = match path {
            Some(p) if p.exists() => {
                let text = std::fs::read_to_string(p).map_err(|e| CortexError::Validation {
                    message: format!("failed to read config file {}: {e}", p.display()),
                })?;
                toml::from_str(&text).map_err(|e| CortexError::Validation {
                    message: format!("invalid config file {}: {e}", p.display()),
                })?
            }
            _ => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field bounds not expressible via `serde(default)`
    /// alone. Clamps thresholds rather than rejecting them outright is
    /// deliberately NOT done here: an out-of-bounds threshold is a
    /// configuration mistake the operator should be told about, not one we
    /// should silently paper over.
    pub fn validate(&self) -> CortexResult<()> {
        if !(DUPLICATE_THRESHOLD_MIN..=DUPLICATE_THRESHOLD_MAX).contains(&self.duplicate_threshold)
        {
            return Err(CortexError::Validation {
                message: format!(
                    "duplicate_threshold {} outside bounds [{DUPLICATE_THRESHOLD_MIN}, {DUPLICATE_THRESHOLD_MAX}]",
                    self.duplicate_threshold
                ),
            });
        }
        if !(CONFLICT_THRESHOLD_MIN..=CONFLICT_THRESHOLD_MAX).contains(&self.conflict_threshold) {
            return Err(CortexError::Validation {
                message: format!(
                    "conflict_threshold {} outside bounds [{CONFLICT_THRESHOLD_MIN}, {CONFLICT_THRESHOLD_MAX}]",
                    self.conflict_threshold
                ),
            });
        }
        if self.search_default_limit > self.search_max_limit {
            return Err(CortexError::Validation {
                message: "search_default_limit exceeds search_max_limit".to_string(),
            });
        }
        Ok(())
    }

    /// Project-scoped prefix applied to vector collections and graph labels.
    pub fn namespaced(&self, name: &str) -> String {
        format!("{}__{}", self.project_id, name)
    }

    /// Path to this project's vector-store database file under `data_dir`.
    pub fn vector_db_path(&self) -> std::path::PathBuf {
        Path::new(&self.data_dir).join(format!("{}_vectors.db", self.project_id))
    }

    /// Path to this project's graph-store database file under `data_dir`.
    pub fn graph_db_path(&self) -> std::path::PathBuf {
        Path::new(&self.data_dir).join(format!("{}_graph.db", self.project_id))
    }

    /// Path to the sync coordinator's durable retry log under `data_dir`.
    pub fn retry_log_path(&self) -> std::path::PathBuf {
        Path::new(&self.data_dir).join(format!("{}_retry_log.db", self.project_id))
    }
}
