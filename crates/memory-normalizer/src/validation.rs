//! Validation phase: per-record checks on vector dimension,
//! timestamp monotonicity, required-field non-emptiness, and graph node
//! presence. Failures are enqueued as repair tasks rather than corrected
//! in place, except `MissingGraphNode`, which the phase can safely
//! self-heal by re-upserting the node from the vector payload.

use std::sync::Arc;

use memory_core::errors::CortexResult;
use memory_core::memory::payload::to_graph_properties;
use memory_core::memory::{reconstruct_memory, MemoryType};
use memory_core::traits::{IGraphStore, IVectorStore};

use crate::report::{RepairReason, RepairTask, ValidationReport};

pub async fn run_validation(
    vector_store: &Arc<dyn IVectorStore>,
    graph_store: &Arc<dyn IGraphStore>,
    expected_dimension: usize,
    dry_run: bool,
) -> CortexResult<ValidationReport> {
    let mut checked = 0usize;
    let mut repair_tasks = Vec::new();
    let mut auto_repaired = 0usize;

    for &variant in &MemoryType::ALL {
        let points = vector_store.scan(variant).await?;
        for (id, vector, payload) in points {
            checked += 1;

            if vector.len() != expected_dimension {
                repair_tasks.push(RepairTask {
                    memory_id: id.clone(),
                    variant,
                    reason: RepairReason::DimensionMismatch { expected: expected_dimension, actual: vector.len() },
                });
            }

            let Ok(memory) = reconstruct_memory(&id, &payload) else {
                continue;
            };

            let timestamps_ok = memory.created_at <= memory.updated_at
                && memory.deleted_at.map(|deleted_at| deleted_at >= memory.updated_at).unwrap_or(true);
            if !timestamps_ok {
                repair_tasks.push(RepairTask { memory_id: id.clone(), variant, reason: RepairReason::TimestampsNotMonotone });
            }

            if let Some(field) = memory.typed_content.first_empty_required_field() {
                repair_tasks.push(RepairTask {
                    memory_id: id.clone(),
                    variant,
                    reason: RepairReason::EmptyRequiredField { field },
                });
            }

            if !graph_store.node_exists(variant.as_str(), &id).await? {
                repair_tasks.push(RepairTask { memory_id: id.clone(), variant, reason: RepairReason::MissingGraphNode });
                if !dry_run {
                    let properties = to_graph_properties(&memory);
                    if graph_store.upsert_node(variant.as_str(), &id, properties).await.is_ok() {
                        auto_repaired += 1;
                    }
                }
            }
        }
    }

    Ok(ValidationReport { checked, repair_tasks, auto_repaired })
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::memory::{FunctionContent, RequirementContent, RequirementStatus, Priority, TypedContent};

    #[test]
    fn detects_empty_required_field() {
        let content = TypedContent::Function(FunctionContent {
            name: String::new(),
            signature: "f()".into(),
            file_path: "a.py".into(),
            start_line: 1,
            end_line: 2,
            language: "python".into(),
            docstring: None,
            containing_class: None,
        });
        assert_eq!(content.first_empty_required_field(), Some("name"));
    }

    #[test]
    fn passes_when_all_required_fields_present() {
        let content = TypedContent::Requirements(RequirementContent {
            requirement_id: "REQ-1".into(),
            title: "title".into(),
            description: "desc".into(),
            priority: Priority::Low,
            status: RequirementStatus::Draft,
            source_document: None,
        });
        assert_eq!(content.first_empty_required_field(), None);
    }
}
