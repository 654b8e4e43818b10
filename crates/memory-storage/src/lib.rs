//! # memory-storage
//!
//! C3 (vector-store adapter) and C4 (graph-store adapter): SQLite-backed
//! implementations of `memory_core::traits::{IVectorStore, IGraphStore}`.

pub mod graph;
pub mod vector;

pub use graph::SqliteGraphStore;
pub use vector::SqliteVectorStore;
