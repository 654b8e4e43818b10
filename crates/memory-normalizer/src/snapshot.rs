//! Snapshot phase: per-variant counts and a checksum, plus the diff
//! between what the vector store and the graph store each think exists.
//! Read-only — this phase never mutates either store.

use std::collections::HashSet;
use std::sync::Arc;

use memory_core::errors::CortexResult;
use memory_core::hashing::content_hash;
use memory_core::memory::MemoryType;
use memory_core::traits::{IGraphStore, IVectorStore};

use crate::report::{SnapshotReport, VariantSnapshot};

/// Stable per-id hash folded into the variant's checksum via XOR, so the
/// checksum is order-independent.
fn id_hash(id: &str) -> u64 {
    let hex = content_hash(id, false);
    u64::from_str_radix(&hex[..16], 16).unwrap_or(0)
}

fn checksum(ids: impl Iterator<Item = impl AsRef<str>>) -> u64 {
    ids.fold(0u64, |acc, id| acc ^ id_hash(id.as_ref()))
}

pub async fn run_snapshot(
    vector_store: &Arc<dyn IVectorStore>,
    graph_store: &Arc<dyn IGraphStore>,
) -> CortexResult<SnapshotReport> {
    let mut variants = Vec::new();

    for &variant in &MemoryType::ALL {
        let points = vector_store.scan(variant).await?;
        let vector_ids: HashSet<String> = points.iter().map(|(id, _, _)| id.clone()).collect();

        let graph_ids = graph_store.list_node_ids(variant.as_str()).await?;
        let graph_id_set: HashSet<String> = graph_ids.iter().cloned().collect();

        let missing_in_graph: Vec<String> =
            vector_ids.iter().filter(|id| !graph_id_set.contains(*id)).cloned().collect();
        let missing_in_vector: Vec<String> =
            graph_id_set.iter().filter(|id| !vector_ids.contains(*id)).cloned().collect();

        variants.push(VariantSnapshot {
            variant,
            vector_count: vector_ids.len(),
            graph_count: graph_id_set.len(),
            checksum: checksum(vector_ids.iter()),
            missing_in_graph,
            missing_in_vector,
        });
    }

    Ok(SnapshotReport { variants })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_order_independent() {
        let a = checksum(["one", "two", "three"].iter());
        let b = checksum(["three", "one", "two"].iter());
        assert_eq!(a, b);
    }

    #[test]
    fn checksum_changes_when_ids_differ() {
        let a = checksum(["one", "two"].iter());
        let b = checksum(["one", "three"].iter());
        assert_ne!(a, b);
    }
}
