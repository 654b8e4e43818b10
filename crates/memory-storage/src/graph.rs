//! Graph-store adapter. Grounded on
//! `cortex-causal::graph::sync` (persist-then-link, rebuild-on-open) and
//! `cortex-causal::traversal::neighbors` (petgraph `StableDiGraph` walk).
//! An in-memory `petgraph::StableDiGraph` is the traversal engine; every
//! mutation is persisted to SQLite `nodes`/`edges` tables and the graph is
//! rebuilt from them on open. As with the vector adapter, no Neo4j/graph-DB
//! wire client exists anywhere in the retrieved pack, so `petgraph` +
//! `rusqlite` substitute for it (see DESIGN.md).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction as PetDirection;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use memory_core::errors::{CortexResult, StorageError};
use memory_core::memory::{Relationship, RelationshipType};
use memory_core::traits::{Direction, IGraphStore, TraversalHit};
use memory_core::CortexError;

#[derive(Debug, Clone)]
struct NodeData {
    id: String,
    label: String,
    properties: HashMap<String, Value>,
}

#[derive(Debug, Clone)]
struct EdgeData {
    relationship: Relationship,
}

struct Inner {
    conn: Connection,
    graph: StableDiGraph<NodeData, EdgeData>,
    index: HashMap<String, NodeIndex>,
}

/// SQLite + petgraph backed implementation of `IGraphStore`.
pub struct SqliteGraphStore {
    inner: Mutex<Inner>,
    project_id: String,
}

fn sqlite_err(message: String) -> CortexError {
    CortexError::StoreUnavailable(StorageError::Sqlite { message })
}

impl SqliteGraphStore {
    pub fn open(path: &std::path::Path, project_id: impl Into<String>) -> CortexResult<Self> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path).map_err(|e| sqlite_err(e.to_string()))?;
        Self::from_connection(conn, project_id)
    }

    pub fn open_in_memory(project_id: impl Into<String>) -> CortexResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| sqlite_err(e.to_string()))?;
        Self::from_connection(conn, project_id)
    }

    fn from_connection(conn: Connection, project_id: impl Into<String>) -> CortexResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS graph_nodes (
                id TEXT PRIMARY KEY,
                label TEXT NOT NULL,
                properties TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS graph_edges (
                id TEXT PRIMARY KEY,
                source_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                rel_type TEXT NOT NULL,
                weight REAL NOT NULL,
                properties TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(source_id, target_id, rel_type)
             );
             PRAGMA journal_mode = WAL;",
        )
        .map_err(|e| sqlite_err(e.to_string()))?;

        let mut graph = StableDiGraph::new();
        let mut index = HashMap::new();

        {
            let mut stmt = conn
                .prepare("SELECT id, label, properties FROM graph_nodes")
                .map_err(|e| sqlite_err(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| {
                    let id: String = row.get(0)?;
                    let label: String = row.get(1)?;
                    let properties_json: String = row.get(2)?;
                    Ok((id, label, properties_json))
                })
                .map_err(|e| sqlite_err(e.to_string()))?;
            for row in rows {
                let (id, label, properties_json) = row.map_err(|e| sqlite_err(e.to_string()))?;
                let properties = serde_json::from_str(&properties_json).unwrap_or_default();
                let idx = graph.add_node(NodeData { id: id.clone(), label, properties });
                index.insert(id, idx);
            }
        }

        {
            let mut stmt = conn
                .prepare(
                    "SELECT id, source_id, target_id, rel_type, weight, properties, created_at FROM graph_edges",
                )
                .map_err(|e| sqlite_err(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| {
                    let id: String = row.get(0)?;
                    let source_id: String = row.get(1)?;
                    let target_id: String = row.get(2)?;
                    let rel_type: String = row.get(3)?;
                    let weight: f64 = row.get(4)?;
                    let properties_json: String = row.get(5)?;
                    let created_at: String = row.get(6)?;
                    Ok((id, source_id, target_id, rel_type, weight, properties_json, created_at))
                })
                .map_err(|e| sqlite_err(e.to_string()))?;
            for row in rows {
                let (id, source_id, target_id, rel_type, weight, properties_json, created_at) =
                    row.map_err(|e| sqlite_err(e.to_string()))?;
                let Some(relationship_type) = relationship_type_from_str(&rel_type) else {
                    continue;
                };
                let properties = serde_json::from_str(&properties_json).unwrap_or_default();
                let created_at = created_at.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now());
                let src_idx = ensure_index(&mut graph, &mut index, &source_id);
                let tgt_idx = ensure_index(&mut graph, &mut index, &target_id);
                let relationship = Relationship {
                    id,
                    relationship_type,
                    source_id,
                    target_id,
                    created_at,
                    weight,
                    properties,
                };
                graph.add_edge(src_idx, tgt_idx, EdgeData { relationship });
            }
        }

        Ok(Self {
            inner: Mutex::new(Inner { conn, graph, index }),
            project_id: project_id.into(),
        })
    }

    fn label_for(&self, label: &str) -> String {
        format!("{}__{}", self.project_id, label)
    }
}

fn ensure_index(
    graph: &mut StableDiGraph<NodeData, EdgeData>,
    index: &mut HashMap<String, NodeIndex>,
    id: &str,
) -> NodeIndex {
    if let Some(&idx) = index.get(id) {
        return idx;
    }
    let idx = graph.add_node(NodeData {
        id: id.to_string(),
        label: String::new(),
        properties: HashMap::new(),
    });
    index.insert(id.to_string(), idx);
    idx
}

fn relationship_type_from_str(s: &str) -> Option<RelationshipType> {
    use RelationshipType::*;
    Some(match s {
        "CALLS" => Calls,
        "IMPORTS" => Imports,
        "EXTENDS" => Extends,
        "IMPLEMENTS" => Implements,
        "DEPENDS_ON" => DependsOn,
        "CONTAINS" => Contains,
        "USES" => Uses,
        "DERIVED_FROM" => DerivedFrom,
        "SATISFIED_BY" => SatisfiedBy,
        "TESTED_BY" => TestedBy,
        "ADDRESSES" => Addresses,
        "AFFECTS" => Affects,
        "SUPERSEDES" => Supersedes,
        "FOLLOWS_PATTERN" => FollowsPattern,
        "DEVIATES_FROM" => DeviatesFrom,
        "CREATED_IN" => CreatedIn,
        "MODIFIED_IN" => ModifiedIn,
        "RELATED_TO" => RelatedTo,
        "SIMILAR_TO" => SimilarTo,
        _ => return None,
    })
}

fn value_to_sql(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as SqlValue;
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::Real(f)
            } else {
                SqlValue::Null
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn sql_to_value(value_ref: rusqlite::types::ValueRef) -> Value {
    use rusqlite::types::ValueRef;
    match value_ref {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).to_string()),
        ValueRef::Blob(_) => Value::Null,
    }
}

#[async_trait]
impl IGraphStore for SqliteGraphStore {
    async fn upsert_node(
        &self,
        label: &str,
        id: &str,
        properties: HashMap<String, Value>,
    ) -> CortexResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let namespaced_label = self.label_for(label);
        let properties_json = serde_json::to_string(&properties).map_err(|e| sqlite_err(e.to_string()))?;

        inner
            .conn
            .execute(
                "INSERT INTO graph_nodes (id, label, properties) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET label = excluded.label, properties = excluded.properties",
                params![id, namespaced_label, properties_json],
            )
            .map_err(|e| sqlite_err(e.to_string()))?;

        let idx = ensure_index(&mut inner.graph, &mut inner.index, id);
        if let Some(node) = inner.graph.node_weight_mut(idx) {
            node.label = namespaced_label;
            node.properties = properties;
        }
        Ok(())
    }

    async fn upsert_edge(&self, edge: &Relationship) -> CortexResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let properties_json =
            serde_json::to_string(&edge.properties).map_err(|e| sqlite_err(e.to_string()))?;

        inner
            .conn
            .execute(
                "INSERT INTO graph_edges (id, source_id, target_id, rel_type, weight, properties, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(source_id, target_id, rel_type) DO UPDATE SET
                    weight = excluded.weight, properties = excluded.properties",
                params![
                    edge.id,
                    edge.source_id,
                    edge.target_id,
                    edge.relationship_type.as_str(),
                    edge.weight,
                    properties_json,
                    edge.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| sqlite_err(e.to_string()))?;

        let src_idx = ensure_index(&mut inner.graph, &mut inner.index, &edge.source_id);
        let tgt_idx = ensure_index(&mut inner.graph, &mut inner.index, &edge.target_id);

        let existing = inner
            .graph
            .edges_connecting(src_idx, tgt_idx)
            .find(|e| e.weight().relationship.relationship_type == edge.relationship_type)
            .map(|e| e.id());

        if let Some(edge_idx) = existing {
            if let Some(weight) = inner.graph.edge_weight_mut(edge_idx) {
                weight.relationship = edge.clone();
            }
        } else {
            inner.graph.add_edge(src_idx, tgt_idx, EdgeData { relationship: edge.clone() });
        }
        Ok(())
    }

    async fn remove_edge(
        &self,
        source_id: &str,
        target_id: &str,
        relationship_type: RelationshipType,
    ) -> CortexResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .conn
            .execute(
                "DELETE FROM graph_edges WHERE source_id = ?1 AND target_id = ?2 AND rel_type = ?3",
                params![source_id, target_id, relationship_type.as_str()],
            )
            .map_err(|e| sqlite_err(e.to_string()))?;

        if let (Some(&src_idx), Some(&tgt_idx)) =
            (inner.index.get(source_id), inner.index.get(target_id))
        {
            let to_remove = inner
                .graph
                .edges_connecting(src_idx, tgt_idx)
                .find(|e| e.weight().relationship.relationship_type == relationship_type)
                .map(|e| e.id());
            if let Some(edge_idx) = to_remove {
                inner.graph.remove_edge(edge_idx);
            }
        }
        Ok(())
    }

    async fn traverse(
        &self,
        seed_id: &str,
        direction: Direction,
        depth: usize,
        edge_types: Option<&[RelationshipType]>,
        limit: usize,
    ) -> CortexResult<Vec<TraversalHit>> {
        let inner = self.inner.lock().unwrap();
        let Some(&seed_idx) = inner.index.get(seed_id) else {
            return Ok(Vec::new());
        };

        let mut results = Vec::new();
        let mut visited: HashSet<NodeIndex> = HashSet::from([seed_idx]);
        let mut queue: VecDeque<(NodeIndex, usize, Vec<Relationship>)> =
            VecDeque::from([(seed_idx, 0, Vec::new())]);

        while let Some((node_idx, current_depth, chain)) = queue.pop_front() {
            if current_depth >= depth || results.len() >= limit {
                continue;
            }

            let pet_directions: &[PetDirection] = match direction {
                Direction::Out => &[PetDirection::Outgoing],
                Direction::In => &[PetDirection::Incoming],
                Direction::Both => &[PetDirection::Outgoing, PetDirection::Incoming],
            };

            for &pet_dir in pet_directions {
                let neighbors: Vec<(NodeIndex, EdgeData)> = inner
                    .graph
                    .edges_directed(node_idx, pet_dir)
                    .filter(|e| {
                        edge_types
                            .map(|types| types.contains(&e.weight().relationship.relationship_type))
                            .unwrap_or(true)
                    })
                    .map(|e| {
                        let other = if pet_dir == PetDirection::Outgoing {
                            e.target()
                        } else {
                            e.source()
                        };
                        (other, e.weight().clone())
                    })
                    .collect();

                for (neighbor_idx, edge_data) in neighbors {
                    if results.len() >= limit {
                        break;
                    }
                    let mut next_chain = chain.clone();
                    next_chain.push(edge_data.relationship.clone());

                    if visited.insert(neighbor_idx) {
                        if let Some(node) = inner.graph.node_weight(neighbor_idx) {
                            results.push(TraversalHit {
                                node_id: node.id.clone(),
                                label: node.label.clone(),
                                properties: node.properties.clone(),
                                depth: current_depth + 1,
                                edge_chain: next_chain.clone(),
                            });
                        }
                        queue.push_back((neighbor_idx, current_depth + 1, next_chain));
                    }
                }
            }
        }

        Ok(results)
    }

    async fn query(
        &self,
        statement: &str,
        params_map: &HashMap<String, Value>,
    ) -> CortexResult<Vec<HashMap<String, Value>>> {
        let inner = self.inner.lock().unwrap();
        let mut stmt = inner.conn.prepare(statement).map_err(|e| sqlite_err(e.to_string()))?;

        for (key, value) in params_map {
            let placeholder = format!(":{key}");
            if let Some(idx) = stmt
                .parameter_index(&placeholder)
                .map_err(|e| sqlite_err(e.to_string()))?
            {
                stmt.raw_bind_parameter(idx, value_to_sql(value))
                    .map_err(|e| sqlite_err(e.to_string()))?;
            }
        }

        let column_names: Vec<String> =
            stmt.column_names().iter().map(|s| s.to_string()).collect();

        let mut rows = stmt.raw_query();
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|e| sqlite_err(e.to_string()))? {
            let mut record = HashMap::new();
            for (i, name) in column_names.iter().enumerate() {
                let value_ref = row.get_ref(i).map_err(|e| sqlite_err(e.to_string()))?;
                record.insert(name.clone(), sql_to_value(value_ref));
            }
            out.push(record);
        }
        Ok(out)
    }

    async fn node_count(&self, label: &str) -> CortexResult<usize> {
        let inner = self.inner.lock().unwrap();
        let namespaced = self.label_for(label);
        let count: i64 = inner
            .conn
            .query_row(
                "SELECT COUNT(*) FROM graph_nodes WHERE label = ?1",
                params![namespaced],
                |row| row.get(0),
            )
            .map_err(|e| sqlite_err(e.to_string()))?;
        Ok(count as usize)
    }

    async fn delete_node(&self, _label: &str, id: &str) -> CortexResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .conn
            .execute(
                "DELETE FROM graph_edges WHERE source_id = ?1 OR target_id = ?1",
                params![id],
            )
            .map_err(|e| sqlite_err(e.to_string()))?;
        inner
            .conn
            .execute("DELETE FROM graph_nodes WHERE id = ?1", params![id])
            .map_err(|e| sqlite_err(e.to_string()))?;

        if let Some(idx) = inner.index.remove(id) {
            inner.graph.remove_node(idx);
        }
        Ok(())
    }

    async fn node_exists(&self, label: &str, id: &str) -> CortexResult<bool> {
        let inner = self.inner.lock().unwrap();
        let namespaced = self.label_for(label);
        let exists: bool = inner
            .conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM graph_nodes WHERE id = ?1 AND label = ?2)",
                params![id, namespaced],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| sqlite_err(e.to_string()))?
            .unwrap_or(false);
        Ok(exists)
    }

    async fn list_node_ids(&self, label: &str) -> CortexResult<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        let namespaced = self.label_for(label);
        let mut stmt = inner
            .conn
            .prepare("SELECT id FROM graph_nodes WHERE label = ?1")
            .map_err(|e| sqlite_err(e.to_string()))?;
        let rows = stmt
            .query_map(params![namespaced], |row| row.get::<_, String>(0))
            .map_err(|e| sqlite_err(e.to_string()))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| sqlite_err(e.to_string()))?);
        }
        Ok(out)
    }

    async fn all_edges(&self) -> CortexResult<Vec<Relationship>> {
        let inner = self.inner.lock().unwrap();
        let mut stmt = inner
            .conn
            .prepare(
                "SELECT id, source_id, target_id, rel_type, weight, properties, created_at FROM graph_edges",
            )
            .map_err(|e| sqlite_err(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let source_id: String = row.get(1)?;
                let target_id: String = row.get(2)?;
                let rel_type: String = row.get(3)?;
                let weight: f64 = row.get(4)?;
                let properties_json: String = row.get(5)?;
                let created_at: String = row.get(6)?;
                Ok((id, source_id, target_id, rel_type, weight, properties_json, created_at))
            })
            .map_err(|e| sqlite_err(e.to_string()))?;

        let mut out = Vec::new();
        for row in rows {
            let (id, source_id, target_id, rel_type, weight, properties_json, created_at) =
                row.map_err(|e| sqlite_err(e.to_string()))?;
            let Some(relationship_type) = relationship_type_from_str(&rel_type) else {
                continue;
            };
            let properties = serde_json::from_str(&properties_json).unwrap_or_default();
            let created_at = created_at.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now());
            out.push(Relationship {
                id,
                relationship_type,
                source_id,
                target_id,
                created_at,
                weight,
                properties,
            });
        }
        Ok(out)
    }

    async fn health(&self) -> CortexResult<bool> {
        let inner = self.inner.lock().unwrap();
        inner
            .conn
            .query_row("SELECT 1", [], |_| Ok(()))
            .map_err(|e| sqlite_err(e.to_string()))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteGraphStore {
        SqliteGraphStore::open_in_memory("proj").unwrap()
    }

    #[tokio::test]
    async fn upsert_node_then_exists() {
        let store = store();
        store.upsert_node("component", "svc-a", HashMap::new()).await.unwrap();
        assert!(store.node_exists("component", "svc-a").await.unwrap());
        assert_eq!(store.node_count("component").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn upsert_edge_is_idempotent() {
        let store = store();
        store.upsert_node("component", "a", HashMap::new()).await.unwrap();
        store.upsert_node("component", "b", HashMap::new()).await.unwrap();
        let edge = Relationship::new(RelationshipType::Extends, "a", "b");
        store.upsert_edge(&edge).await.unwrap();
        store.upsert_edge(&edge).await.unwrap();

        let hits = store
            .traverse("a", Direction::Out, 1, None, 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].node_id, "b");
    }

    #[tokio::test]
    async fn traverse_respects_edge_type_filter() {
        let store = store();
        store.upsert_node("component", "a", HashMap::new()).await.unwrap();
        store.upsert_node("component", "b", HashMap::new()).await.unwrap();
        store.upsert_node("component", "c", HashMap::new()).await.unwrap();
        store
            .upsert_edge(&Relationship::new(RelationshipType::Extends, "a", "b"))
            .await
            .unwrap();
        store
            .upsert_edge(&Relationship::new(RelationshipType::Calls, "a", "c"))
            .await
            .unwrap();

        let hits = store
            .traverse("a", Direction::Out, 1, Some(&[RelationshipType::Extends]), 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].node_id, "b");
    }

    #[tokio::test]
    async fn traverse_depth_two_follows_chain() {
        let store = store();
        for id in ["a", "b", "c"] {
            store.upsert_node("component", id, HashMap::new()).await.unwrap();
        }
        store
            .upsert_edge(&Relationship::new(RelationshipType::Calls, "a", "b"))
            .await
            .unwrap();
        store
            .upsert_edge(&Relationship::new(RelationshipType::Calls, "b", "c"))
            .await
            .unwrap();

        let hits = store.traverse("a", Direction::Out, 2, None, 10).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.node_id.as_str()).collect();
        assert!(ids.contains(&"b"));
        assert!(ids.contains(&"c"));
        let c_hit = hits.iter().find(|h| h.node_id == "c").unwrap();
        assert_eq!(c_hit.depth, 2);
        assert_eq!(c_hit.edge_chain.len(), 2);
    }

    #[tokio::test]
    async fn delete_node_cascades_edges() {
        let store = store();
        store.upsert_node("component", "a", HashMap::new()).await.unwrap();
        store.upsert_node("component", "b", HashMap::new()).await.unwrap();
        store
            .upsert_edge(&Relationship::new(RelationshipType::Extends, "a", "b"))
            .await
            .unwrap();
        store.delete_node("component", "a").await.unwrap();
        assert!(!store.node_exists("component", "a").await.unwrap());
        let hits = store.traverse("b", Direction::In, 1, None, 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn list_node_ids_filters_by_label() {
        let store = store();
        store.upsert_node("component", "a", HashMap::new()).await.unwrap();
        store.upsert_node("function", "b", HashMap::new()).await.unwrap();
        let ids = store.list_node_ids("component").await.unwrap();
        assert_eq!(ids, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn all_edges_returns_every_relationship() {
        let store = store();
        store.upsert_node("component", "a", HashMap::new()).await.unwrap();
        store.upsert_node("component", "b", HashMap::new()).await.unwrap();
        store.upsert_edge(&Relationship::new(RelationshipType::Extends, "a", "b")).await.unwrap();
        let edges = store.all_edges().await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source_id, "a");
    }

    #[tokio::test]
    async fn survives_reopen_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.db");
        {
            let store = SqliteGraphStore::open(&path, "proj").unwrap();
            store.upsert_node("component", "a", HashMap::new()).await.unwrap();
            store.upsert_node("component", "b", HashMap::new()).await.unwrap();
            store
                .upsert_edge(&Relationship::new(RelationshipType::Extends, "a", "b"))
                .await
                .unwrap();
        }
        {
            let store = SqliteGraphStore::open(&path, "proj").unwrap();
            let hits = store.traverse("a", Direction::Out, 1, None, 10).await.unwrap();
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].node_id, "b");
        }
    }
}
