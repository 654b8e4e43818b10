//! # memory-embeddings
//!
//! C1 (embedding cache) and C2 (embedding service): content-hashed
//! persistent vector caching and a retrying, rate-limit-aware provider
//! client, composed behind `memory_core::traits::IEmbeddingProvider`.

pub mod cache;
pub mod engine;
pub mod provider;

pub use cache::EmbeddingCache;
pub use engine::EmbeddingService;
pub use provider::{InputType, RawEmbeddingClient, VoyageClient};
