//! C1: embedding cache. Content-hashed persistent cache of fixed-dimension
//! vectors, size-bounded (LRU) and TTL-bounded; entries older than the
//! configured retention are treated as misses and reaped lazily. Grounded
//! on `cortex-embeddings::cache::{l1_memory, l2_sqlite}`: an in-memory
//! `moka` tier backed by a `rusqlite` persistent tier.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use moka::sync::Cache as MokaCache;
use rusqlite::{params, Connection};
use tracing::debug;

use memory_core::errors::{CortexError, CortexResult};
use memory_core::hashing::embedding_cache_key;

/// Content-hashed cache mapping `key -> (vector, inserted_at)`. The key is
/// `SHA-256(model || ':' || normalised-content)`.
pub struct EmbeddingCache {
    l1: MokaCache<String, Vec<f32>>,
    conn: Option<Mutex<Connection>>,
    ttl_seconds: i64,
}

impl EmbeddingCache {
    /// Open a cache backed by a SQLite file at `path`, bounded to `size`
    /// entries in the in-memory tier and `ttl_days` days of retention.
    pub fn open(path: &Path, size: u64, ttl_days: i64) -> CortexResult<Self> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path).map_err(|e| CortexError::Internal {
            message: format!("failed to open embedding cache {}: {e}", path.display()),
        })?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS embedding_cache (
                key TEXT PRIMARY KEY,
                vector BLOB NOT NULL,
                created_at INTEGER NOT NULL
             );
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| CortexError::Internal {
            message: format!("failed to initialize embedding cache schema: {e}"),
        })?;

        Ok(Self {
            l1: MokaCache::new(size),
            conn: Some(Mutex::new(conn)),
            ttl_seconds: ttl_days * 86_400,
        })
    }

    /// An in-memory-only cache with no persistence, for tests and
    /// ephemeral use.
    pub fn in_memory(size: u64, ttl_days: i64) -> Self {
        Self {
            l1: MokaCache::new(size),
            conn: None,
            ttl_seconds: ttl_days * 86_400,
        }
    }

    /// Cache key for `content` embedded with `model`.
    pub fn key(content: &str, model: &str) -> String {
        embedding_cache_key(content, model)
    }

    /// Look up a vector by cache key. Entries older than the configured
    /// TTL are treated as misses (and lazily reaped from the persistent
    /// tier).
    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        if let Some(vector) = self.l1.get(key) {
            return Some(vector);
        }

        let conn_mutex = self.conn.as_ref()?;
        let conn = conn_mutex.lock().ok()?;
        let row: Option<(Vec<u8>, i64)> = conn
            .query_row(
                "SELECT vector, created_at FROM embedding_cache WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .ok();

        let (blob, created_at) = row?;
        if Utc::now().timestamp() - created_at > self.ttl_seconds {
            let _ = conn.execute("DELETE FROM embedding_cache WHERE key = ?1", params![key]);
            debug!(key = %key, "embedding cache entry expired, reaped");
            return None;
        }

        let vector = bytes_to_f32(&blob);
        drop(conn);
        self.l1.insert(key.to_string(), vector.clone());
        Some(vector)
    }

    /// Insert a vector under `key`, writing through to both tiers.
    pub fn put(&self, key: String, vector: &[f32]) {
        self.l1.insert(key.clone(), vector.to_vec());
        if let Some(conn_mutex) = &self.conn {
            if let Ok(conn) = conn_mutex.lock() {
                let blob = f32_to_bytes(vector);
                let _ = conn.execute(
                    "INSERT INTO embedding_cache (key, vector, created_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET vector = excluded.vector, created_at = excluded.created_at",
                    params![key, blob, Utc::now().timestamp()],
                );
            }
        }
    }

    /// Reap every persistent entry older than the configured TTL. Returns
    /// the number of entries removed.
    pub fn reap_expired(&self) -> usize {
        let Some(conn_mutex) = &self.conn else {
            return 0;
        };
        let Ok(conn) = conn_mutex.lock() else {
            return 0;
        };
        let cutoff = Utc::now().timestamp() - self.ttl_seconds;
        conn.execute(
            "DELETE FROM embedding_cache WHERE created_at < ?1",
            params![cutoff],
        )
        .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.conn
            .as_ref()
            .and_then(|c| c.lock().ok())
            .and_then(|conn| {
                conn.query_row("SELECT COUNT(*) FROM embedding_cache", [], |r| r.get(0))
                    .ok()
            })
            .unwrap_or(self.l1.entry_count() as i64) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn f32_to_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn bytes_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_in_memory() {
        let cache = EmbeddingCache::in_memory(100, 30);
        let key = EmbeddingCache::key("hello world", "voyage-code-3");
        assert!(cache.get(&key).is_none());
        cache.put(key.clone(), &[1.0, 2.0, 3.0]);
        assert_eq!(cache.get(&key), Some(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn key_differs_per_model() {
        let a = EmbeddingCache::key("same", "model-a");
        let b = EmbeddingCache::key("same", "model-b");
        assert_ne!(a, b);
    }

    #[test]
    fn sqlite_backed_roundtrip_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        {
            let cache = EmbeddingCache::open(&path, 10, 30).unwrap();
            cache.put("k1".to_string(), &[1.0, 2.0]);
        }
        {
            let cache = EmbeddingCache::open(&path, 10, 30).unwrap();
            assert_eq!(cache.get("k1"), Some(vec![1.0, 2.0]));
        }
    }

    #[test]
    fn expired_entry_is_reaped_as_miss() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let cache = EmbeddingCache::open(&path, 10, 30).unwrap();
        {
            let conn_mutex = cache.conn.as_ref().unwrap();
            let conn = conn_mutex.lock().unwrap();
            conn.execute(
                "INSERT INTO embedding_cache (key, vector, created_at) VALUES (?1, ?2, ?3)",
                params!["stale", f32_to_bytes(&[9.0]), Utc::now().timestamp() - 31 * 86_400],
            )
            .unwrap();
        }
        assert!(cache.get("stale").is_none());
    }

    #[test]
    fn reap_expired_removes_old_entries() {
        let cache = EmbeddingCache::in_memory(10, 30);
        // in-memory-only cache has no persistent tier to reap.
        assert_eq!(cache.reap_expired(), 0);
    }
}
