//! # memory-normalizer
//!
//! C8: the normaliser. A batch worker running four phases over the vector
//! and graph stores — snapshot, validation, deduplication, cleanup — any of
//! which may be invoked alone, and any run of which may be a dry-run that
//! reports the delta without mutating either store.
//!
//! Grounded on `cortex-consolidation::pipeline::run_pipeline`'s
//! phase-orchestration shape (one module per phase, a single entry point
//! that runs them in order and logs per-phase counts) and
//! `cortex-decay::engine`'s threshold-evaluation style for the cleanup
//! phase's retention check.

pub mod cleanup;
pub mod deduplication;
pub mod report;
pub mod snapshot;
pub mod validation;

use std::sync::Arc;

use tracing::info;

use memory_core::errors::CortexResult;
use memory_core::traits::{IGraphStore, IVectorStore};

pub use report::{
    CleanupReport, DeduplicationReport, DuplicateCluster, NormalizeReport, Phase, RepairReason,
    RepairTask, SnapshotReport, ValidationReport, VariantSnapshot,
};

/// Which phases to run and whether to mutate the stores or only report.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub phases: Vec<Phase>,
    pub dry_run: bool,
}

impl NormalizeOptions {
    /// Run every phase, mutating the stores.
    pub fn full() -> Self {
        Self { phases: Phase::ALL.to_vec(), dry_run: false }
    }

    /// Run every phase without mutating the stores.
    pub fn dry_run() -> Self {
        Self { phases: Phase::ALL.to_vec(), dry_run: true }
    }

    /// Run a single phase.
    pub fn single(phase: Phase, dry_run: bool) -> Self {
        Self { phases: vec![phase], dry_run }
    }

    fn includes(&self, phase: Phase) -> bool {
        self.phases.contains(&phase)
    }
}

/// C8: orchestrates the four phases over a vector/graph store pair.
pub struct Normalizer {
    vector_store: Arc<dyn IVectorStore>,
    graph_store: Arc<dyn IGraphStore>,
    expected_dimension: usize,
    duplicate_threshold: f64,
    soft_delete_retention_days: i64,
}

impl Normalizer {
    pub fn new(
        vector_store: Arc<dyn IVectorStore>,
        graph_store: Arc<dyn IGraphStore>,
        expected_dimension: usize,
        duplicate_threshold: f64,
        soft_delete_retention_days: i64,
    ) -> Self {
        Self { vector_store, graph_store, expected_dimension, duplicate_threshold, soft_delete_retention_days }
    }

    /// Run the requested phases in their canonical order
    /// (snapshot → validation → deduplication → cleanup), independent of
    /// the order they were listed in `options.phases`, and produce one
    /// aggregate report. Any phase may be invoked alone.
    pub async fn run(&self, options: &NormalizeOptions) -> CortexResult<NormalizeReport> {
        let mut report = NormalizeReport { dry_run: options.dry_run, ..Default::default() };

        if options.includes(Phase::Snapshot) {
            let snapshot = snapshot::run_snapshot(&self.vector_store, &self.graph_store).await?;
            info!(variants = snapshot.variants.len(), "normalizer: snapshot phase complete");
            report.snapshot = Some(snapshot);
        }

        if options.includes(Phase::Validation) {
            let validation = validation::run_validation(
                &self.vector_store,
                &self.graph_store,
                self.expected_dimension,
                options.dry_run,
            )
            .await?;
            info!(
                checked = validation.checked,
                repairs = validation.repair_tasks.len(),
                auto_repaired = validation.auto_repaired,
                "normalizer: validation phase complete"
            );
            report.validation = Some(validation);
        }

        if options.includes(Phase::Deduplication) {
            let deduplication = deduplication::run_deduplication(
                &self.vector_store,
                &self.graph_store,
                self.duplicate_threshold,
                options.dry_run,
            )
            .await?;
            info!(
                scanned = deduplication.scanned,
                clusters = deduplication.clusters.len(),
                merged = deduplication.merged_count(),
                "normalizer: deduplication phase complete"
            );
            report.deduplication = Some(deduplication);
        }

        if options.includes(Phase::Cleanup) {
            let cleanup = cleanup::run_cleanup(
                &self.vector_store,
                &self.graph_store,
                self.soft_delete_retention_days,
                options.dry_run,
            )
            .await?;
            info!(
                hard_deleted = cleanup.hard_deleted_ids.len(),
                orphaned_edges_removed = cleanup.orphaned_edges_removed,
                "normalizer: cleanup phase complete"
            );
            report.cleanup = Some(cleanup);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::memory::{to_graph_properties, to_vector_payload, BaseMemory, FunctionContent, TypedContent};
    use memory_core::traits::IVectorStore;
    use memory_storage::{SqliteGraphStore, SqliteVectorStore};

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

    async fn stores() -> (Arc<dyn IVectorStore>, Arc<dyn IGraphStore>) {
        let vector_store: Arc<dyn IVectorStore> = Arc::new(SqliteVectorStore::open_in_memory("proj").unwrap());
        let graph_store: Arc<dyn IGraphStore> = Arc::new(SqliteGraphStore::open_in_memory("proj").unwrap());
        (vector_store, graph_store)
    }

    #[tokio::test]
    async fn full_run_on_empty_stores_is_an_empty_delta() {
        let (vector_store, graph_store) = stores().await;
        let normalizer = Normalizer::new(vector_store, graph_store, 4, 0.85, 30);
        let report = normalizer.run(&NormalizeOptions::full()).await.unwrap();
        assert!(report.is_empty_delta());
    }

    #[tokio::test]
    async fn second_run_on_identical_state_is_idempotent() {
        let (vector_store, graph_store) = stores().await;
        let mut memory = function_memory("a", "def a(): pass");
        memory.set_embedding(vec![1.0, 0.0, 0.0, 0.0]).unwrap();
        vector_store
            .upsert(memory.memory_type, &memory.id, &memory.embedding, to_vector_payload(&memory))
            .await
            .unwrap();
        graph_store
            .upsert_node(memory.memory_type.as_str(), &memory.id, to_graph_properties(&memory))
            .await
            .unwrap();

        let normalizer = Normalizer::new(vector_store, graph_store, 4, 0.85, 30);
        let first = normalizer.run(&NormalizeOptions::full()).await.unwrap();
        assert!(first.is_empty_delta());
        let second = normalizer.run(&NormalizeOptions::full()).await.unwrap();
        assert!(second.is_empty_delta());
    }

    #[tokio::test]
    async fn single_phase_run_only_populates_that_phase() {
        let (vector_store, graph_store) = stores().await;
        let normalizer = Normalizer::new(vector_store, graph_store, 4, 0.85, 30);
        let report = normalizer.run(&NormalizeOptions::single(Phase::Snapshot, true)).await.unwrap();
        assert!(report.snapshot.is_some());
        assert!(report.validation.is_none());
        assert!(report.deduplication.is_none());
        assert!(report.cleanup.is_none());
    }
}
