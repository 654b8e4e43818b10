//! Duplicate/conflict reporting: the near-duplicate check and conflict
//! check return the new id alongside a (possibly empty) list of
//! conflicts, each carrying the existing id, similarity score, and a
//! summary.

use serde_json::Value;

use memory_core::traits::VectorHit;

const SUMMARY_MAX_CHARS: usize = 120;

/// A pre-existing memory whose content is similar enough to be reported
/// back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub existing_id: String,
    pub similarity: f64,
    pub summary: String,
}

pub fn hit_to_conflict(hit: &VectorHit) -> Conflict {
    let summary = hit
        .payload
        .get("content")
        .and_then(Value::as_str)
        .map(|content| truncate(content, SUMMARY_MAX_CHARS))
        .unwrap_or_default();
    Conflict { existing_id: hit.id.clone(), similarity: hit.score, summary }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push('…');
    truncated
}
