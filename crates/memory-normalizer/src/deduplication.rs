//! Deduplication phase: streams each variant's points in content-hash
//! order, clusters within `duplicate_threshold`, keeps the
//! highest-`importance_score` member as survivor (ties broken by earliest
//! `created_at`), and merges the rest into it — re-pointing their graph
//! edges and soft-deleting the losers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use memory_core::errors::CortexResult;
use memory_core::memory::{reconstruct_memory, MemoryType};
use memory_core::similarity::cosine_similarity;
use memory_core::traits::{IGraphStore, IVectorStore};

use crate::report::{DeduplicationReport, DuplicateCluster};

struct Candidate {
    id: String,
    vector: Vec<f32>,
    content_hash: String,
    importance_score: f64,
    created_at: DateTime<Utc>,
}

struct OpenCluster {
    representative: Vec<f32>,
    members: Vec<Candidate>,
}

/// Single pass, online clustering: each candidate joins the first existing
/// cluster whose representative (its first member) it is similar enough
/// to, else starts a new cluster.
fn cluster(candidates: Vec<Candidate>, threshold: f64) -> Vec<OpenCluster> {
    let mut clusters: Vec<OpenCluster> = Vec::new();
    for candidate in candidates {
        let joined = clusters
            .iter_mut()
            .find(|c| cosine_similarity(&c.representative, &candidate.vector) >= threshold);
        match joined {
            Some(cluster) => cluster.members.push(candidate),
            None => clusters.push(OpenCluster { representative: candidate.vector.clone(), members: vec![candidate] }),
        }
    }
    clusters
}

/// Survivor: highest `importance_score`, ties broken by earliest
/// `created_at`.
fn pick_survivor_index(members: &[Candidate]) -> usize {
    let mut best = 0;
    for (i, candidate) in members.iter().enumerate().skip(1) {
        let current = &members[best];
        let better = candidate.importance_score > current.importance_score
            || (candidate.importance_score == current.importance_score && candidate.created_at < current.created_at);
        if better {
            best = i;
        }
    }
    best
}

async fn repoint_edges(graph_store: &Arc<dyn IGraphStore>, loser_id: &str, survivor_id: &str) -> CortexResult<()> {
    for edge in graph_store.all_edges().await? {
        if edge.source_id == loser_id && edge.target_id != survivor_id {
            graph_store.remove_edge(&edge.source_id, &edge.target_id, edge.relationship_type).await?;
            let mut repointed = edge.clone();
            repointed.source_id = survivor_id.to_string();
            graph_store.upsert_edge(&repointed).await?;
        } else if edge.target_id == loser_id && edge.source_id != survivor_id {
            graph_store.remove_edge(&edge.source_id, &edge.target_id, edge.relationship_type).await?;
            let mut repointed = edge.clone();
            repointed.target_id = survivor_id.to_string();
            graph_store.upsert_edge(&repointed).await?;
        } else if edge.source_id == loser_id || edge.target_id == loser_id {
            // Would become a self-loop against the survivor; drop it.
            graph_store.remove_edge(&edge.source_id, &edge.target_id, edge.relationship_type).await?;
        }
    }
    Ok(())
}

async fn soft_delete_loser(
    vector_store: &Arc<dyn IVectorStore>,
    variant: MemoryType,
    loser_id: &str,
) -> CortexResult<()> {
    let Some(mut payload) = vector_store.get_payload(variant, loser_id).await? else {
        return Ok(());
    };
    payload.insert("deleted".to_string(), Value::from(true));
    payload.insert("deleted_at".to_string(), Value::from(Utc::now().to_rfc3339()));
    vector_store.update_payload(variant, loser_id, payload).await
}

pub async fn run_deduplication(
    vector_store: &Arc<dyn IVectorStore>,
    graph_store: &Arc<dyn IGraphStore>,
    duplicate_threshold: f64,
    dry_run: bool,
) -> CortexResult<DeduplicationReport> {
    let mut scanned = 0usize;
    let mut clusters_report = Vec::new();

    for &variant in &MemoryType::ALL {
        let points = vector_store.scan(variant).await?;
        let mut candidates: Vec<Candidate> = Vec::new();
        for (id, vector, payload) in points {
            let Ok(memory) = reconstruct_memory(&id, &payload) else { continue };
            if memory.deleted {
                continue;
            }
            candidates.push(Candidate {
                id,
                vector,
                content_hash: memory.content_hash,
                importance_score: memory.importance_score,
                created_at: memory.created_at,
            });
        }
        scanned += candidates.len();

        // Stream in content-hash order so adjacent near-duplicates cluster.
        candidates.sort_by(|a, b| a.content_hash.cmp(&b.content_hash));

        for open_cluster in cluster(candidates, duplicate_threshold) {
            if open_cluster.members.len() < 2 {
                continue;
            }
            let survivor_index = pick_survivor_index(&open_cluster.members);
            let survivor_id = open_cluster.members[survivor_index].id.clone();
            let mut merged_ids = Vec::new();

            for (i, member) in open_cluster.members.iter().enumerate() {
                if i == survivor_index {
                    continue;
                }
                if !dry_run {
                    repoint_edges(graph_store, &member.id, &survivor_id).await?;
                    soft_delete_loser(vector_store, variant, &member.id).await?;
                }
                merged_ids.push(member.id.clone());
            }

            clusters_report.push(DuplicateCluster { variant, survivor_id, merged_ids });
        }
    }

    Ok(DeduplicationReport { scanned, clusters: clusters_report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candidate(id: &str, vector: Vec<f32>, importance: f64) -> Candidate {
        Candidate { id: id.to_string(), vector, content_hash: id.to_string(), importance_score: importance, created_at: Utc::now() }
    }

    #[test]
    fn cluster_groups_similar_vectors() {
        let candidates = vec![
            candidate("a", vec![1.0, 0.0], 0.5),
            candidate("b", vec![0.99, 0.01], 0.5),
            candidate("c", vec![0.0, 1.0], 0.5),
        ];
        let clusters = cluster(candidates, 0.9);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members.len(), 2);
    }

    #[test]
    fn survivor_prefers_higher_importance() {
        let members = vec![candidate("a", vec![1.0], 0.4), candidate("b", vec![1.0], 0.9)];
        assert_eq!(pick_survivor_index(&members), 1);
    }

    #[test]
    fn survivor_tie_break_prefers_earlier_created_at() {
        let mut members = vec![candidate("a", vec![1.0], 0.5), candidate("b", vec![1.0], 0.5)];
        members[0].created_at = Utc::now();
        members[1].created_at = members[0].created_at - chrono::Duration::days(1);
        assert_eq!(pick_survivor_index(&members), 1);
    }
}
