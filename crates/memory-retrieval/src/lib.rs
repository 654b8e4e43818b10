//! # memory-retrieval
//!
//! C7: the query engine. Semantic, code, graph, duplicate, related, and
//! hybrid search strategies over the vector and graph stores.

pub mod engine;
pub mod result;
pub mod scoring;

pub use engine::QueryEngine;
pub use result::{DuplicateReference, SearchResult};
