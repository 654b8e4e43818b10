//! Durable retry log, with columns `(memory_id, op, payload, attempts,
//! next_attempt_at, last_error)`. One outstanding graph-side operation
//! per memory id — a later failure for the same id replaces the earlier
//! intended operation rather than queuing a second one, since only the
//! most recent desired graph state matters on eventual replay.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;

use memory_core::errors::{CortexResult, StorageError};
use memory_core::memory::{MemoryType, Relationship};
use memory_core::CortexError;

/// The graph-side operation a retry-log entry will replay once the store
/// is reachable again.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum RetryPayload {
    GraphUpsert {
        variant: MemoryType,
        node_label: String,
        node_properties: HashMap<String, Value>,
        edges: Vec<Relationship>,
    },
    GraphDeleteNode {
        variant: MemoryType,
        label: String,
    },
}

impl RetryPayload {
    fn op_name(&self) -> &'static str {
        match self {
            RetryPayload::GraphUpsert { .. } => "graph_upsert",
            RetryPayload::GraphDeleteNode { .. } => "graph_delete_node",
        }
    }

    pub fn variant(&self) -> MemoryType {
        match self {
            RetryPayload::GraphUpsert { variant, .. } => *variant,
            RetryPayload::GraphDeleteNode { variant, .. } => *variant,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryEntry {
    pub memory_id: String,
    pub payload: RetryPayload,
    pub attempts: u32,
    pub next_attempt_at: i64,
    pub last_error: Option<String>,
}

fn sqlite_err(message: String) -> CortexError {
    CortexError::StoreUnavailable(StorageError::Sqlite { message })
}

/// SQLite-backed durable queue of pending graph-store writes.
pub struct RetryLog {
    conn: Mutex<Connection>,
}

impl RetryLog {
    pub fn open(path: &std::path::Path) -> CortexResult<Self> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path).map_err(|e| sqlite_err(e.to_string()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> CortexResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| sqlite_err(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> CortexResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sync_retry_log (
                memory_id TEXT PRIMARY KEY,
                op TEXT NOT NULL,
                payload TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                next_attempt_at INTEGER NOT NULL,
                last_error TEXT
             );",
        )
        .map_err(|e| sqlite_err(e.to_string()))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Queue (or replace) the intended graph write for `memory_id`.
    pub fn enqueue(
        &self,
        memory_id: &str,
        payload: &RetryPayload,
        error: &str,
        next_attempt_at: i64,
    ) -> CortexResult<()> {
        let payload_json = serde_json::to_string(payload).map_err(|e| sqlite_err(e.to_string()))?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sync_retry_log (memory_id, op, payload, attempts, next_attempt_at, last_error)
             VALUES (?1, ?2, ?3, 0, ?4, ?5)
             ON CONFLICT(memory_id) DO UPDATE SET
                op = excluded.op, payload = excluded.payload,
                next_attempt_at = excluded.next_attempt_at, last_error = excluded.last_error",
            params![memory_id, payload.op_name(), payload_json, next_attempt_at, error],
        )
        .map_err(|e| sqlite_err(e.to_string()))?;
        Ok(())
    }

    /// Entries whose `next_attempt_at` has elapsed, oldest first.
    pub fn due_entries(&self, now: i64, limit: usize) -> CortexResult<Vec<RetryEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT memory_id, payload, attempts, next_attempt_at, last_error
                 FROM sync_retry_log WHERE next_attempt_at <= ?1
                 ORDER BY next_attempt_at ASC LIMIT ?2",
            )
            .map_err(|e| sqlite_err(e.to_string()))?;
        let rows = stmt
            .query_map(params![now, limit as i64], |row| {
                let memory_id: String = row.get(0)?;
                let payload_json: String = row.get(1)?;
                let attempts: i64 = row.get(2)?;
                let next_attempt_at: i64 = row.get(3)?;
                let last_error: Option<String> = row.get(4)?;
                Ok((memory_id, payload_json, attempts, next_attempt_at, last_error))
            })
            .map_err(|e| sqlite_err(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            let (memory_id, payload_json, attempts, next_attempt_at, last_error) =
                row.map_err(|e| sqlite_err(e.to_string()))?;
            let payload: RetryPayload =
                serde_json::from_str(&payload_json).map_err(|e| sqlite_err(e.to_string()))?;
            entries.push(RetryEntry {
                memory_id,
                payload,
                attempts: attempts as u32,
                next_attempt_at,
                last_error,
            });
        }
        Ok(entries)
    }

    /// Record a failed replay attempt and reschedule.
    pub fn mark_attempt_failed(
        &self,
        memory_id: &str,
        error: &str,
        next_attempt_at: i64,
    ) -> CortexResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE sync_retry_log SET attempts = attempts + 1, last_error = ?2, next_attempt_at = ?3
             WHERE memory_id = ?1",
            params![memory_id, error, next_attempt_at],
        )
        .map_err(|e| sqlite_err(e.to_string()))?;
        Ok(())
    }

    /// Remove an entry — either because it replayed successfully or because
    /// it exceeded `sync_max_retries` and transitioned to `failed`.
    pub fn remove(&self, memory_id: &str) -> CortexResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM sync_retry_log WHERE memory_id = ?1", params![memory_id])
            .map_err(|e| sqlite_err(e.to_string()))?;
        Ok(())
    }

    pub fn get(&self, memory_id: &str) -> CortexResult<Option<RetryEntry>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT memory_id, payload, attempts, next_attempt_at, last_error
                 FROM sync_retry_log WHERE memory_id = ?1",
                params![memory_id],
                |row| {
                    let memory_id: String = row.get(0)?;
                    let payload_json: String = row.get(1)?;
                    let attempts: i64 = row.get(2)?;
                    let next_attempt_at: i64 = row.get(3)?;
                    let last_error: Option<String> = row.get(4)?;
                    Ok((memory_id, payload_json, attempts, next_attempt_at, last_error))
                },
            )
            .optional()
            .map_err(|e| sqlite_err(e.to_string()))?;

        let Some((memory_id, payload_json, attempts, next_attempt_at, last_error)) = row else {
            return Ok(None);
        };
        let payload: RetryPayload =
            serde_json::from_str(&payload_json).map_err(|e| sqlite_err(e.to_string()))?;
        Ok(Some(RetryEntry {
            memory_id,
            payload,
            attempts: attempts as u32,
            next_attempt_at,
            last_error,
        }))
    }

    pub fn len(&self) -> CortexResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sync_retry_log", [], |r| r.get(0))
            .map_err(|e| sqlite_err(e.to_string()))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> CortexResult<bool> {
        Ok(self.len()? == 0)
    }
}
