//! C2: embedding provider client. Batches requests and retries transient
//! failures with backoff, expressed with `reqwest`'s async client and
//! `tokio::time::sleep`, following the use of `reqwest` + `tokio`
//! throughout `cortex-embeddings`/`cortex-causal`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use memory_core::errors::{CortexError, CortexResult, EmbeddingError};

/// Hint distinguishing indexed documents from search queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    Document,
    Query,
}

impl InputType {
    fn as_str(&self) -> &'static str {
        match self {
            InputType::Document => "document",
            InputType::Query => "query",
        }
    }
}

/// A raw batch-embedding transport, abstracted so the engine can be tested
/// without a live provider.
#[async_trait]
pub trait RawEmbeddingClient: Send + Sync {
    async fn embed_raw(
        &self,
        texts: &[String],
        input_type: InputType,
    ) -> CortexResult<Vec<Vec<f32>>>;

    fn dimensions(&self) -> usize;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    input_type: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDatum>,
}

#[derive(Deserialize)]
struct EmbedDatum {
    embedding: Vec<f32>,
}

/// Client for an external embedding provider speaking a
/// `{model, input, input_type}` → `{data: [{embedding}]}` request/response
/// shape. Named for Voyage AI (`voyage-code-3`), but the transport is
/// provider-agnostic.
pub struct VoyageClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    max_retries: u32,
    base_retry_secs: f64,
    max_retry_secs: f64,
}

impl VoyageClient {
    pub fn new(api_key: String, model: String, dimensions: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: "https://api.voyageai.com/v1/embeddings".to_string(),
            api_key,
            model,
            dimensions,
            max_retries: memory_core::constants::EMBEDDING_MAX_RETRIES,
            base_retry_secs: memory_core::constants::EMBEDDING_BASE_RETRY_SECS,
            max_retry_secs: memory_core::constants::EMBEDDING_MAX_RETRY_SECS,
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    async fn send_once(
        &self,
        texts: &[String],
        input_type: InputType,
    ) -> Result<Vec<Vec<f32>>, Attempt> {
        let body = EmbedRequest {
            model: &self.model,
            input: texts,
            input_type: input_type.as_str(),
        };

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Attempt::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(self.base_retry_secs);
            return Err(Attempt::RateLimited(retry_after));
        }
        if status.is_server_error() {
            return Err(Attempt::Transient(format!("server error: {status}")));
        }
        if status.is_client_error() {
            let text = response.text().await.unwrap_or_default();
            return Err(Attempt::Fatal(format!("{status}: {text}")));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Attempt::Fatal(format!("invalid response body: {e}")))?;

        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        for v in &vectors {
            if v.len() != self.dimensions {
                return Err(Attempt::Fatal(format!(
                    "provider returned {} dimensions, expected {}",
                    v.len(),
                    self.dimensions
                )));
            }
        }
        Ok(vectors)
    }
}

enum Attempt {
    /// Transport-level failure (connection reset, timeout, DNS, ...).
    Transport(String),
    /// 5xx: retryable.
    Transient(String),
    /// 429 with a server-provided delay.
    RateLimited(f64),
    /// 4xx other than rate-limit, or a malformed response: not retryable.
    Fatal(String),
}

#[async_trait]
impl RawEmbeddingClient for VoyageClient {
    async fn embed_raw(
        &self,
        texts: &[String],
        input_type: InputType,
    ) -> CortexResult<Vec<Vec<f32>>> {
        let mut last_error = String::new();
        let mut attempts = 0;

        loop {
            match self.send_once(texts, input_type).await {
                Ok(vectors) => return Ok(vectors),
                Err(Attempt::Fatal(reason)) => {
                    return Err(CortexError::EmbeddingExhausted(EmbeddingError::ProviderError {
                        reason,
                    }));
                }
                Err(Attempt::RateLimited(retry_after)) => {
                    attempts += 1;
                    last_error = format!("rate limited, retry after {retry_after}s");
                    if attempts > self.max_retries {
                        break;
                    }
                    warn!(attempt = attempts, retry_after, "embedding provider rate limited");
                    tokio::time::sleep(Duration::from_secs_f64(retry_after)).await;
                }
                Err(Attempt::Transient(reason)) | Err(Attempt::Transport(reason)) => {
                    attempts += 1;
                    last_error = reason.clone();
                    if attempts > self.max_retries {
                        break;
                    }
                    let backoff = (self.base_retry_secs * 2f64.powi(attempts as i32 - 1))
                        .min(self.max_retry_secs);
                    debug!(attempt = attempts, backoff, reason = %reason, "retrying embedding request");
                    tokio::time::sleep(Duration::from_secs_f64(backoff)).await;
                }
            }
        }

        Err(CortexError::EmbeddingExhausted(EmbeddingError::RetriesExhausted {
            attempts,
            last_error,
        }))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubClient {
        dims: usize,
    }

    #[async_trait]
    impl RawEmbeddingClient for StubClient {
        async fn embed_raw(
            &self,
            texts: &[String],
            _input_type: InputType,
        ) -> CortexResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.1; self.dims]).collect())
        }

        fn dimensions(&self) -> usize {
            self.dims
        }
    }

    #[tokio::test]
    async fn stub_client_preserves_order_and_dims() {
        let client = StubClient { dims: 4 };
        let texts = vec!["a".to_string(), "b".to_string()];
        let out = client.embed_raw(&texts, InputType::Document).await.unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|v| v.len() == 4));
    }

    #[tokio::test]
    async fn unreachable_host_exhausts_retries_as_embedding_exhausted() {
        let client = VoyageClient::new("key".into(), "voyage-code-3".into(), 4)
            .with_base_url("http://127.0.0.1:1/embeddings".to_string());
        let mut client = client;
        client.max_retries = 1;
        client.base_retry_secs = 0.01;
        client.max_retry_secs = 0.02;

        let texts = vec!["hello".to_string()];
        let result = client.embed_raw(&texts, InputType::Query).await;
        assert!(matches!(result, Err(CortexError::EmbeddingExhausted(_))));
    }
}
