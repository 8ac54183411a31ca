use crate::error::EmbeddingError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_EMBEDDING_ENDPOINT: &str = "http://localhost:8000/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "intfloat/e5-small";
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 128;

/// Batch text-to-vector function. One vector per input, same order; a count
/// mismatch is a consistency error, never silently truncated.
#[async_trait]
pub trait Embedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

#[async_trait]
impl<T: Embedder + Send + Sync + ?Sized> Embedder for &T {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        (**self).embed(texts).await
    }
}

#[async_trait]
impl<T: Embedder + Send + Sync + ?Sized> Embedder for Box<T> {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        (**self).embed(texts).await
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint (vLLM serving
/// `intfloat/e5-small` in the default deployment).
pub struct EmbeddingClient {
    endpoint: String,
    model: String,
    client: reqwest::Client,
}

impl EmbeddingClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, EmbeddingError> {
        let endpoint = endpoint.into();
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()?,
        })
    }

    /// Reads `EMBEDDING_ENDPOINT` and `EMBEDDING_MODEL`, falling back to the
    /// local vLLM defaults.
    pub fn from_env() -> Result<Self, EmbeddingError> {
        let endpoint = std::env::var("EMBEDDING_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_ENDPOINT.to_string());
        let model = std::env::var("EMBEDDING_MODEL")
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string());
        Self::new(endpoint, model)
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let payload = EmbeddingRequest {
            input: texts,
            model: &self.model,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.endpoint))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbeddingError::Service {
                status: status.as_u16(),
                details: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: EmbeddingResponse = response.json().await?;
        if parsed.data.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: parsed.data.len(),
            });
        }

        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }
}

/// Deterministic character-trigram hashing embedder for offline runs and
/// tests. No service dependency, stable across processes.
#[derive(Debug, Clone, Copy)]
pub struct HashedNgramEmbedder {
    pub dimensions: usize,
}

impl Default for HashedNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl HashedNgramEmbedder {
    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for HashedNgramEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}
