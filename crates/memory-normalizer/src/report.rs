//! Report shapes for each normaliser phase. Every phase returns a report
//! describing what it found/changed rather than mutating silently, so a
//! dry-run and a live run produce the same shape of output.

use memory_core::memory::MemoryType;

/// Which phases a single normaliser run executed, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Snapshot,
    Validation,
    Deduplication,
    Cleanup,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Snapshot, Phase::Validation, Phase::Deduplication, Phase::Cleanup];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Snapshot => "snapshot",
            Phase::Validation => "validation",
            Phase::Deduplication => "deduplication",
            Phase::Cleanup => "cleanup",
        }
    }
}

/// Per-variant counts and checksum produced by the snapshot phase: diffs
/// between stores identify missing records.
#[derive(Debug, Clone)]
pub struct VariantSnapshot {
    pub variant: MemoryType,
    pub vector_count: usize,
    pub graph_count: usize,
    /// XOR of a stable hash of every id in the vector store's collection.
    pub checksum: u64,
    /// Ids present in the vector store with no matching graph node.
    pub missing_in_graph: Vec<String>,
    /// Ids present as graph nodes with no matching vector-store point.
    pub missing_in_vector: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotReport {
    pub variants: Vec<VariantSnapshot>,
}

/// Why a record failed one of validation's four checks.
#[derive(Debug, Clone, PartialEq)]
pub enum RepairReason {
    DimensionMismatch { expected: usize, actual: usize },
    TimestampsNotMonotone,
    EmptyRequiredField { field: &'static str },
    MissingGraphNode,
}

#[derive(Debug, Clone)]
pub struct RepairTask {
    pub memory_id: String,
    pub variant: MemoryType,
    pub reason: RepairReason,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub checked: usize,
    pub repair_tasks: Vec<RepairTask>,
    /// `MissingGraphNode` tasks the phase was able to auto-heal by
    /// re-upserting the node from the vector-store payload (only performed
    /// when the run is not a dry-run).
    pub auto_repaired: usize,
}

/// One cluster of near-duplicate memories found by the deduplication phase.
#[derive(Debug, Clone)]
pub struct DuplicateCluster {
    pub variant: MemoryType,
    pub survivor_id: String,
    /// Losers, in the order they were merged into the survivor.
    pub merged_ids: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DeduplicationReport {
    pub scanned: usize,
    pub clusters: Vec<DuplicateCluster>,
}

impl DeduplicationReport {
    pub fn merged_count(&self) -> usize {
        self.clusters.iter().map(|c| c.merged_ids.len()).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    pub hard_deleted_ids: Vec<String>,
    pub orphaned_edges_removed: usize,
}

/// Aggregate result of a normaliser run, one entry per phase actually
/// executed. Any phase may be invoked alone.
#[derive(Debug, Clone, Default)]
pub struct NormalizeReport {
    pub dry_run: bool,
    pub snapshot: Option<SnapshotReport>,
    pub validation: Option<ValidationReport>,
    pub deduplication: Option<DeduplicationReport>,
    pub cleanup: Option<CleanupReport>,
}

impl NormalizeReport {
    /// True when every executed phase found nothing to change — the
    /// idempotency a second run on identical state must have.
    pub fn is_empty_delta(&self) -> bool {
        let snapshot_clean = self
            .snapshot
            .as_ref()
            .map(|s| s.variants.iter().all(|v| v.missing_in_graph.is_empty() && v.missing_in_vector.is_empty()))
            .unwrap_or(true);
        let validation_clean = self.validation.as_ref().map(|v| v.repair_tasks.is_empty()).unwrap_or(true);
        let dedup_clean = self.deduplication.as_ref().map(|d| d.clusters.is_empty()).unwrap_or(true);
        let cleanup_clean = self
            .cleanup
            .as_ref()
            .map(|c| c.hard_deleted_ids.is_empty() && c.orphaned_edges_removed == 0)
            .unwrap_or(true);
        snapshot_clean && validation_clean && dedup_clean && cleanup_clean
    }
}
