//! Content hashing utilities for change detection and embedding cache keys.
//! Uses SHA-256 via `sha2` rather than `blake3` so the cache key format
//! matches the documented "SHA-256 of `model || ':' || normalised content`"
//! construction exactly.

use sha2::{Digest, Sha256};

/// Normalise content for consistent hashing: collapse runs of spaces/tabs to
/// a single space, collapse blank-line runs to a single newline, normalise
/// line endings, and trim whitespace per-line and overall.
///
/// `normalise(normalise(s)) == normalise(s)` for all `s` (idempotent).
pub fn normalize_content(content: &str) -> String {
    let unified = content.replace("\r\n", "\n").replace('\r', "\n");

    let mut collapsed_spaces = String::with_capacity(unified.len());
    let mut last_was_space = false;
    for ch in unified.chars() {
        if ch == ' ' || ch == '\t' {
            if !last_was_space {
                collapsed_spaces.push(' ');
            }
            last_was_space = true;
        } else {
            collapsed_spaces.push(ch);
            last_was_space = false;
        }
    }

    let lines: Vec<&str> = collapsed_spaces.split('\n').map(|l| l.trim()).collect();

    let mut result = String::with_capacity(collapsed_spaces.len());
    let mut last_was_blank = false;
    for (i, line) in lines.iter().enumerate() {
        let is_blank = line.is_empty();
        if is_blank && last_was_blank {
            continue;
        }
        if i > 0 && !(is_blank && last_was_blank) {
            result.push('\n');
        }
        result.push_str(line);
        last_was_blank = is_blank;
    }

    result.trim().to_string()
}

/// SHA-256 hash of (normalised) content, hex-encoded.
pub fn content_hash(content: &str, normalize: bool) -> String {
    let normalized;
    let target = if normalize {
        normalized = normalize_content(content);
        normalized.as_str()
    } else {
        content
    };
    hex_sha256(target.as_bytes())
}

/// Cache key for an embedding: `SHA-256(model || ':' || normalised content)`.
pub fn embedding_cache_key(content: &str, model: &str) -> String {
    let normalized = normalize_content(content);
    let combined = format!("{model}:{normalized}");
    hex_sha256(combined.as_bytes())
}

/// Hash for a file's content, including its path so identical content in
/// different locations hashes distinctly.
pub fn file_content_hash(file_path: &str, content: &str) -> String {
    let normalized = normalize_content(content);
    let combined = format!("{file_path}:{normalized}");
    hex_sha256(combined.as_bytes())
}

/// Hash of a JSON-serializable value with sorted keys, used by the
/// normaliser's per-variant snapshot checksum.
pub fn dict_hash(value: &serde_json::Value) -> String {
    let sorted = sort_json_keys(value);
    let serialized = serde_json::to_string(&sorted).unwrap_or_default();
    hex_sha256(serialized.as_bytes())
}

fn sort_json_keys(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for k in keys {
                sorted.insert(k.clone(), sort_json_keys(&map[k]));
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(sort_json_keys).collect())
        }
        other => other.clone(),
    }
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
