//! OpenAI-compatible HTTP embedding provider.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::retry::{with_retry, RetryPolicy};
use crate::telemetry::RetrievalTelemetry;

use super::{EmbeddingError, EmbeddingProvider};

#[derive(Debug, Clone, Deserialize)]
pub struct HttpEmbeddingConfig {
    /// Full URL of the embeddings endpoint, e.g.
    /// `https://host/v1/embeddings`.
    pub endpoint: String,
    pub model: String,
    /// Expected output dimensionality; responses with any other size are
    /// rejected rather than truncated.
    pub dimension: usize,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_cache_size() -> usize {
    1024
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

/// Caches query embeddings in an LRU keyed by text hash; repeated queries
/// skip the network entirely.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    config: HttpEmbeddingConfig,
    retry: RetryPolicy,
    cache: Mutex<LruCache<u64, Vec<f32>>>,
    telemetry: Option<Arc<RetrievalTelemetry>>,
}

impl HttpEmbeddingProvider {
    pub fn new(config: HttpEmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| EmbeddingError::Permanent(format!("building http client: {err}")))?;
        let cache_size = NonZeroUsize::new(config.cache_size)
            .unwrap_or(NonZeroUsize::new(default_cache_size()).unwrap());
        Ok(Self {
            client,
            config,
            retry: RetryPolicy::default(),
            cache: Mutex::new(LruCache::new(cache_size)),
            telemetry: None,
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<RetrievalTelemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    async fn request_embeddings(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = EmbeddingsRequest {
            model: &self.config.model,
            input: inputs,
        };
        let mut request = self.client.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &detail));
        }
        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|err| EmbeddingError::Permanent(format!("decoding embeddings response: {err}")))?;
        if parsed.data.len() != inputs.len() {
            return Err(EmbeddingError::Permanent(format!(
                "endpoint returned {} embeddings for {} inputs",
                parsed.data.len(),
                inputs.len()
            )));
        }
        let mut rows = parsed.data;
        rows.sort_by_key(|row| row.index);
        let mut vectors = Vec::with_capacity(rows.len());
        for row in rows {
            if row.embedding.len() != self.config.dimension {
                return Err(EmbeddingError::Permanent(format!(
                    "expected {}-dimensional embedding, got {}",
                    self.config.dimension,
                    row.embedding.len()
                )));
            }
            vectors.push(row.embedding);
        }
        Ok(vectors)
    }

    fn record_cache_event(&self, hit: bool) {
        if let Some(telemetry) = &self.telemetry {
            if hit {
                telemetry.record_cache_hit();
            } else {
                telemetry.record_cache_miss();
            }
        }
    }
}

fn classify_transport(err: reqwest::Error) -> EmbeddingError {
    if err.is_builder() || err.is_decode() {
        EmbeddingError::Permanent(format!("embedding request failed: {err}"))
    } else {
        EmbeddingError::Transient(format!("embedding request failed: {err}"))
    }
}

fn classify_status(status: StatusCode, detail: &str) -> EmbeddingError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        EmbeddingError::Transient(format!("embedding endpoint returned {status}: {detail}"))
    } else {
        EmbeddingError::Permanent(format!("embedding endpoint returned {status}: {detail}"))
    }
}

fn text_key(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let key = text_key(text);
        {
            let mut cache = self.cache.lock();
            if let Some(hit) = cache.get(&key).cloned() {
                self.record_cache_event(true);
                return Ok(hit);
            }
        }
        self.record_cache_event(false);
        let inputs = vec![text.to_string()];
        let vectors = with_retry(
            &self.retry,
            "embed",
            EmbeddingError::is_retryable,
            || self.request_embeddings(&inputs),
        )
        .await?;
        let vector = vectors.into_iter().next().ok_or_else(|| {
            EmbeddingError::Permanent("embedding endpoint returned no vectors".to_string())
        })?;
        self.cache.lock().put(key, vector.clone());
        debug!(chars = text.len(), "embedded query text");
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        with_retry(
            &self.retry,
            "embed_batch",
            EmbeddingError::is_retryable,
            || self.request_embeddings(texts),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_for(endpoint: String) -> HttpEmbeddingProvider {
        HttpEmbeddingProvider::new(HttpEmbeddingConfig {
            endpoint,
            model: "test-embedder".to_string(),
            dimension: 3,
            api_key: None,
            cache_size: 16,
            timeout_secs: 5,
        })
        .unwrap()
        .with_retry_policy(RetryPolicy::none())
    }

    #[test]
    fn status_classification_separates_transient_from_permanent() {
        assert!(classify_status(StatusCode::BAD_GATEWAY, "").is_retryable());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(!classify_status(StatusCode::BAD_REQUEST, "").is_retryable());
        assert!(!classify_status(StatusCode::UNAUTHORIZED, "").is_retryable());
    }

    #[tokio::test]
    async fn embeds_and_caches_single_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[{"index":0,"embedding":[0.1,0.2,0.3]}]}"#)
            .expect(1)
            .create_async()
            .await;

        let provider = provider_for(format!("{}/v1/embeddings", server.url()));
        let first = provider.embed("what is lift").await.unwrap();
        assert_eq!(first, vec![0.1, 0.2, 0.3]);
        // Second call must come from the cache; the mock allows one hit only.
        let second = provider.embed("what is lift").await.unwrap();
        assert_eq!(first, second);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn batch_preserves_input_order() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"data":[{"index":1,"embedding":[0.0,1.0,0.0]},{"index":0,"embedding":[1.0,0.0,0.0]}]}"#,
            )
            .create_async()
            .await;

        let provider = provider_for(format!("{}/v1/embeddings", server.url()));
        let texts = vec!["first".to_string(), "second".to_string()];
        let vectors = provider.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors[0], vec![1.0, 0.0, 0.0]);
        assert_eq!(vectors[1], vec![0.0, 1.0, 0.0]);
    }

    #[tokio::test]
    async fn wrong_dimension_is_permanent() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[{"index":0,"embedding":[0.1,0.2]}]}"#)
            .create_async()
            .await;

        let provider = provider_for(format!("{}/v1/embeddings", server.url()));
        let err = provider.embed("short vector").await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/embeddings")
            .with_status(503)
            .create_async()
            .await;

        let provider = provider_for(format!("{}/v1/embeddings", server.url()));
        let err = provider.embed("unavailable").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
