//! EmbeddingService (C2) — ties the embedding cache (C1) to a raw provider
//! transport, implementing `memory_core::traits::IEmbeddingProvider`.
//! Grounded on `cortex-embeddings::engine::EmbeddingEngine`'s
//! cache-then-provider shape.

use async_trait::async_trait;
use tracing::{debug, info};

use memory_core::errors::{CortexError, CortexResult, EmbeddingError};
use memory_core::hashing::normalize_content;
use memory_core::traits::{IEmbeddingProvider, InputType as CoreInputType};

use crate::cache::EmbeddingCache;
use crate::provider::{InputType as RawInputType, RawEmbeddingClient};

fn to_raw_input_type(t: CoreInputType) -> RawInputType {
    match t {
        CoreInputType::Document => RawInputType::Document,
        CoreInputType::Query => RawInputType::Query,
    }
}

/// The embedding service: normalises input, consults the cache, and falls
/// through to the provider for misses, batching up to `batch_size` items
/// per request.
pub struct EmbeddingService<C: RawEmbeddingClient> {
    client: C,
    cache: EmbeddingCache,
    model: String,
    batch_size: usize,
    dimensions: usize,
}

impl<C: RawEmbeddingClient> EmbeddingService<C> {
    pub fn new(client: C, cache: EmbeddingCache, model: String, batch_size: usize) -> Self {
        let dimensions = client.dimensions();
        info!(model = %model, dimensions, batch_size, "embedding service initialized");
        Self {
            client,
            cache,
            model,
            batch_size,
            dimensions,
        }
    }
}

#[async_trait]
impl<C: RawEmbeddingClient> IEmbeddingProvider for EmbeddingService<C> {
    async fn embed(&self, text: &str, input_type: CoreInputType) -> CortexResult<(Vec<f32>, bool)> {
        let normalized = normalize_content(text);
        let key = EmbeddingCache::key(&normalized, &self.model);

        if let Some(vector) = self.cache.get(&key) {
            debug!(key = %key, "embedding cache hit");
            return Ok((vector, true));
        }

        let vectors = self
            .client
            .embed_raw(&[normalized], to_raw_input_type(input_type))
            .await?;
        let vector = vectors.into_iter().next().ok_or_else(|| {
            CortexError::EmbeddingExhausted(EmbeddingError::ProviderError {
                reason: "provider returned no vectors".to_string(),
            })
        })?;
        validate_dimensions(&vector, self.dimensions)?;

        self.cache.put(key, &vector);
        Ok((vector, false))
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        input_type: CoreInputType,
    ) -> CortexResult<Vec<(Vec<f32>, bool)>> {
        let normalized: Vec<String> = texts.iter().map(|t| normalize_content(t)).collect();
        let keys: Vec<String> = normalized
            .iter()
            .map(|t| EmbeddingCache::key(t, &self.model))
            .collect();

        let mut results: Vec<Option<(Vec<f32>, bool)>> = vec![None; texts.len()];
        let mut miss_indices = Vec::new();

        for (i, key) in keys.iter().enumerate() {
            if let Some(vector) = self.cache.get(key) {
                results[i] = Some((vector, true));
            } else {
                miss_indices.push(i);
            }
        }

        for chunk in miss_indices.chunks(self.batch_size) {
            let chunk_texts: Vec<String> = chunk.iter().map(|&i| normalized[i].clone()).collect();
            let vectors = self
                .client
                .embed_raw(&chunk_texts, to_raw_input_type(input_type))
                .await?;

            if vectors.len() != chunk_texts.len() {
                return Err(CortexError::EmbeddingExhausted(EmbeddingError::ProviderError {
                    reason: format!(
                        "provider returned {} vectors for {} inputs",
                        vectors.len(),
                        chunk_texts.len()
                    ),
                }));
            }

            for (&idx, vector) in chunk.iter().zip(vectors.into_iter()) {
                validate_dimensions(&vector, self.dimensions)?;
                self.cache.put(keys[idx].clone(), &vector);
                results[idx] = Some((vector, false));
            }
        }

        Ok(results.into_iter().map(|r| r.expect("every index filled")).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn validate_dimensions(vector: &[f32], expected: usize) -> CortexResult<()> {
    if vector.len() != expected {
        return Err(CortexError::EmbeddingExhausted(EmbeddingError::DimensionMismatch {
            expected,
            actual: vector.len(),
        }));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStub {
        dims: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RawEmbeddingClient for CountingStub {
        async fn embed_raw(
            &self,
            texts: &[String],
            _input_type: RawInputType,
        ) -> CortexResult<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32; self.dims]).collect())
        }

        fn dimensions(&self) -> usize {
            self.dims
        }
    }

    fn service() -> EmbeddingService<CountingStub> {
        EmbeddingService::new(
            CountingStub { dims: 8, calls: AtomicUsize::new(0) },
            EmbeddingCache::in_memory(1000, 30),
            "test-model".to_string(),
            128,
        )
    }

    #[tokio::test]
    async fn embed_returns_correct_dimensions() {
        let svc = service();
        let (vector, from_cache) = svc.embed("hello world", CoreInputType::Document).await.unwrap();
        assert_eq!(vector.len(), 8);
        assert!(!from_cache);
    }

    #[tokio::test]
    async fn repeated_embed_hits_cache() {
        let svc = service();
        let (_, first_cached) = svc.embed("same text", CoreInputType::Document).await.unwrap();
        let (_, second_cached) = svc.embed("same text", CoreInputType::Document).await.unwrap();
        assert!(!first_cached);
        assert!(second_cached);
    }

    #[tokio::test]
    async fn embed_batch_preserves_order_and_mixes_cache_hits() {
        let svc = service();
        svc.embed("warm", CoreInputType::Document).await.unwrap();

        let texts = vec!["warm".to_string(), "cold".to_string()];
        let results = svc.embed_batch(&texts, CoreInputType::Document).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].1, "first text was pre-warmed and should be a cache hit");
        assert!(!results[1].1);
    }

    #[tokio::test]
    async fn embed_batch_chunks_misses_by_batch_size() {
        let svc = EmbeddingService::new(
            CountingStub { dims: 4, calls: AtomicUsize::new(0) },
            EmbeddingCache::in_memory(1000, 30),
            "test-model".to_string(),
            2,
        );
        let texts: Vec<String> = (0..5).map(|i| format!("text-{i}")).collect();
        let results = svc.embed_batch(&texts, CoreInputType::Document).await.unwrap();
        assert_eq!(results.len(), 5);
        assert_eq!(svc.client.calls.load(Ordering::SeqCst), 3); // chunks of 2,2,1
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        struct WrongDims;
        #[async_trait]
        impl RawEmbeddingClient for WrongDims {
            async fn embed_raw(
                &self,
                texts: &[String],
                _input_type: RawInputType,
            ) -> CortexResult<Vec<Vec<f32>>> {
                Ok(texts.iter().map(|_| vec![0.0; 3]).collect())
            }
            fn dimensions(&self) -> usize {
                8
            }
        }
        let svc = EmbeddingService::new(
            WrongDims,
            EmbeddingCache::in_memory(10, 30),
            "m".to_string(),
            10,
        );
        let result = svc.embed("x", CoreInputType::Document).await;
        assert!(result.is_err());
    }
}
