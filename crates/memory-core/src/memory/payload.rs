//! Canonical mapping from `BaseMemory` to the store-facing payload/property
//! bags (the vector-store payload and the graph node properties). Shared
//! between `memory-manager` (which writes these) and `memory-retrieval`
//! (which reads `name`/`signature`/`language` back out for code-search
//! lexical scoring), so the field names stay in exactly one place.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::base::{BaseMemory, SyncStatus};
use super::types::TypedContent;
use crate::errors::{CortexError, CortexResult};
use crate::hashing::content_hash;

/// Lexical fields extracted from variant-specific content, used by
/// `code_search`'s substring-match scoring.
pub struct LexicalFields {
    pub name: Option<String>,
    pub signature: Option<String>,
    pub language: Option<String>,
}

pub fn lexical_fields(content: &TypedContent) -> LexicalFields {
    match content {
        TypedContent::Function(f) => LexicalFields {
            name: Some(f.name.clone()),
            signature: Some(f.signature.clone()),
            language: Some(f.language.clone()),
        },
        TypedContent::Component(c) => {
            LexicalFields { name: Some(c.name.clone()), signature: None, language: None }
        }
        TypedContent::CodePattern(p) => LexicalFields {
            name: Some(p.name.clone()),
            signature: None,
            language: Some(p.language.clone()),
        },
        _ => LexicalFields { name: None, signature: None, language: None },
    }
}

/// The vector-store payload for a memory: everything `semantic_search`,
/// `code_search`, and duplicate/conflict checks need without a round trip
/// to the graph store.
pub fn to_vector_payload(memory: &BaseMemory) -> HashMap<String, Value> {
    let mut payload = HashMap::new();
    payload.insert("memory_type".to_string(), Value::from(memory.memory_type.as_str()));
    payload.insert("content".to_string(), Value::from(memory.content.as_str()));
    payload.insert("content_hash".to_string(), Value::from(memory.content_hash.as_str()));
    payload.insert("importance_score".to_string(), Value::from(memory.importance_score));
    payload.insert("created_at".to_string(), Value::from(memory.created_at.to_rfc3339()));
    payload.insert("updated_at".to_string(), Value::from(memory.updated_at.to_rfc3339()));
    payload.insert("access_count".to_string(), Value::from(memory.access_count));
    payload.insert("deleted".to_string(), Value::from(memory.deleted));
    if let Some(deleted_at) = memory.deleted_at {
        payload.insert("deleted_at".to_string(), Value::from(deleted_at.to_rfc3339()));
    }
    if let Some(last_accessed_at) = memory.last_accessed_at {
        payload.insert("last_accessed_at".to_string(), Value::from(last_accessed_at.to_rfc3339()));
    }
    payload.insert(
        "typed_content".to_string(),
        serde_json::to_value(&memory.typed_content).unwrap_or(Value::Null),
    );

    let lexical = lexical_fields(&memory.typed_content);
    if let Some(name) = lexical.name {
        payload.insert("name".to_string(), Value::from(name));
    }
    if let Some(signature) = lexical.signature {
        payload.insert("signature".to_string(), Value::from(signature));
    }
    if let Some(language) = lexical.language {
        payload.insert("language".to_string(), Value::from(language));
    }
    payload
}

/// The graph node property bag for a memory: identity and ranking metadata
/// only, not the full content (the vector payload is the source of truth
/// for content; the graph tracks relationships).
pub fn to_graph_properties(memory: &BaseMemory) -> HashMap<String, Value> {
    let mut properties = HashMap::new();
    properties.insert("memory_type".to_string(), Value::from(memory.memory_type.as_str()));
    properties.insert("content_hash".to_string(), Value::from(memory.content_hash.as_str()));
    properties.insert("importance_score".to_string(), Value::from(memory.importance_score));
    if let Some(name) = lexical_fields(&memory.typed_content).name {
        properties.insert("name".to_string(), Value::from(name));
    }
    properties
}

fn parse_timestamp(payload: &HashMap<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    payload.get(key).and_then(Value::as_str).and_then(|s| s.parse::<DateTime<Utc>>().ok())
}

/// Rehydrate a `BaseMemory` from its stored vector-store payload
/// (`to_vector_payload` is the inverse). Shared by `memory-manager`
/// (`get`/`update`) and `memory-retrieval` (candidate materialisation).
pub fn reconstruct_memory(id: &str, payload: &HashMap<String, Value>) -> CortexResult<BaseMemory> {
    let typed_content: TypedContent = payload
        .get("typed_content")
        .cloned()
        .ok_or_else(|| CortexError::Internal { message: format!("memory {id} missing typed_content") })
        .and_then(|v| {
            serde_json::from_value(v).map_err(|e| CortexError::Internal {
                message: format!("memory {id} has malformed typed_content: {e}"),
            })
        })?;

    let content = payload.get("content").and_then(Value::as_str).unwrap_or_default().to_string();
    let content_hash_value = payload
        .get("content_hash")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| content_hash(&content, true));
    let importance_score = payload.get("importance_score").and_then(Value::as_f64).unwrap_or(0.5);
    let access_count = payload.get("access_count").and_then(Value::as_u64).unwrap_or(0);
    let deleted = payload.get("deleted").and_then(Value::as_bool).unwrap_or(false);
    let deleted_at = parse_timestamp(payload, "deleted_at");
    let last_accessed_at = parse_timestamp(payload, "last_accessed_at");
    let created_at = parse_timestamp(payload, "created_at").unwrap_or_else(Utc::now);
    let updated_at = parse_timestamp(payload, "updated_at").unwrap_or(created_at);
    let sync_status = match payload.get("sync_status").and_then(Value::as_str) {
        Some("pending") => SyncStatus::Pending,
        Some("failed") => SyncStatus::Failed,
        _ => SyncStatus::Synced,
    };

    Ok(BaseMemory {
        id: id.to_string(),
        memory_type: typed_content.memory_type(),
        content,
        typed_content,
        embedding: Vec::new(),
        created_at,
        updated_at,
        access_count,
        last_accessed_at,
        importance_score,
        sync_status,
        graph_node_id: Some(id.to_string()),
        deleted,
        deleted_at,
        content_hash: content_hash_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::FunctionContent;

    fn function_memory() -> BaseMemory {
        BaseMemory::new(
            "def f(): pass".to_string(),
            TypedContent::Function(FunctionContent {
                name: "f".into(),
                signature: "f() -> None".into(),
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

    #[test]
    fn vector_payload_carries_lexical_fields_for_functions() {
        let payload = to_vector_payload(&function_memory());
        assert_eq!(payload.get("name").unwrap(), &Value::from("f"));
        assert_eq!(payload.get("language").unwrap(), &Value::from("python"));
    }

    #[test]
    fn graph_properties_omit_full_content() {
        let properties = to_graph_properties(&function_memory());
        assert!(!properties.contains_key("content"));
        assert_eq!(properties.get("name").unwrap(), &Value::from("f"));
    }
}
