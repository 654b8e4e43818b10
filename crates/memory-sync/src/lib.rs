//! # memory-sync
//!
//! The sync coordinator. Two-phase writes across the vector and graph
//! stores, a durable SQLite retry log for the graph side, a per-memory-id
//! lock table for ordering, and a background reconciler that drains the
//! retry log.

pub mod coordinator;
pub mod locks;
pub mod reconciler;
pub mod retry_log;

pub use coordinator::SyncCoordinator;
pub use locks::KeyedLocks;
pub use reconciler::{reconcile_once, spawn_background, ReconcileReport};
pub use retry_log::{RetryEntry, RetryLog, RetryPayload};
