//! Cleanup phase: hard-deletes records whose `deleted_at` is older than
//! `soft_delete_retention_days`, and removes relationships left orphaned
//! by any hard delete (this phase's own, or an earlier one).

use std::sync::Arc;

use chrono::{DateTime, Utc};

use memory_core::errors::CortexResult;
use memory_core::memory::{reconstruct_memory, MemoryType};
use memory_core::traits::{IGraphStore, IVectorStore};

use crate::report::CleanupReport;

fn is_past_retention(deleted_at: DateTime<Utc>, retention_days: i64, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(deleted_at) > chrono::Duration::days(retention_days)
}

pub async fn run_cleanup(
    vector_store: &Arc<dyn IVectorStore>,
    graph_store: &Arc<dyn IGraphStore>,
    retention_days: i64,
    dry_run: bool,
) -> CortexResult<CleanupReport> {
    let now = Utc::now();
    let mut hard_deleted_ids = Vec::new();

    for &variant in &MemoryType::ALL {
        let points = vector_store.scan(variant).await?;
        for (id, _vector, payload) in points {
            let Ok(memory) = reconstruct_memory(&id, &payload) else { continue };
            let Some(deleted_at) = memory.deleted_at else { continue };
            if !memory.deleted || !is_past_retention(deleted_at, retention_days, now) {
                continue;
            }

            if !dry_run {
                graph_store.delete_node(variant.as_str(), &id).await?;
                vector_store.delete(variant, &id).await?;
            }
            hard_deleted_ids.push(id);
        }
    }

    // Any edge whose endpoint no longer has a graph node is orphaned,
    // whether this run's own hard deletes caused it or an earlier one did.
    let mut orphaned_edges_removed = 0usize;
    for edge in graph_store.all_edges().await? {
        let source_exists = node_exists_any_label(graph_store, &edge.source_id).await?;
        let target_exists = node_exists_any_label(graph_store, &edge.target_id).await?;
        if source_exists && target_exists {
            continue;
        }
        orphaned_edges_removed += 1;
        if !dry_run {
            graph_store.remove_edge(&edge.source_id, &edge.target_id, edge.relationship_type).await?;
        }
    }

    Ok(CleanupReport { hard_deleted_ids, orphaned_edges_removed })
}

/// An edge endpoint's label isn't carried on `Relationship`, so existence is
/// checked across every variant label (one label per variant; an id is
/// unique within its own variant's label).
async fn node_exists_any_label(graph_store: &Arc<dyn IGraphStore>, id: &str) -> CortexResult<bool> {
    for &variant in &MemoryType::ALL {
        if graph_store.node_exists(variant.as_str(), id).await? {
            return Ok(true);
        }
    }
    Ok(false)
}
