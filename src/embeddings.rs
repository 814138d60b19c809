//! Embedding service seam: provider trait, HTTP client, and the degrading
//! gateway used by ingestion and query paths.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::json;
use tracing::warn;

use crate::types::RagError;

/// Vector width of the default sentence-transformer model.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Inputs are truncated to this many characters before being sent, matching
/// the practical input limit of the embedding model.
pub const MAX_EMBED_CHARS: usize = 500;

/// A service that turns one text into a fixed-dimension vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Dimension of every vector this provider returns. Fallback zero
    /// vectors use the same dimension.
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;
}

/// HTTP client for a feature-extraction endpoint (Hugging Face style):
/// `POST { "inputs": text }` returning a vector, optionally nested one
/// level.
#[derive(Clone)]
pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    dimension: usize,
}

impl HttpEmbeddingClient {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            dimension: DEFAULT_EMBEDDING_DIM,
        }
    }

    /// Overrides the expected vector dimension for non-default models.
    #[must_use]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingClient {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut request = self.client.post(&self.endpoint).json(&json!({ "inputs": text }));
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request
            .send()
            .await
            .map_err(|err| RagError::Embedding(err.to_string()))?
            .error_for_status()
            .map_err(|err| RagError::Embedding(err.to_string()))?;
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|err| RagError::Embedding(err.to_string()))?;
        parse_vector(value)
    }
}

/// The endpoint returns either `[f32; dim]` or `[[f32; dim]]` depending on
/// the pipeline wrapper; accept both.
fn parse_vector(value: serde_json::Value) -> Result<Vec<f32>, RagError> {
    let flat: Result<Vec<f32>, _> = serde_json::from_value(value.clone());
    if let Ok(vector) = flat {
        return Ok(vector);
    }
    let nested: Vec<Vec<f32>> = serde_json::from_value(value)
        .map_err(|err| RagError::Embedding(format!("unexpected embedding payload: {err}")))?;
    nested
        .into_iter()
        .next()
        .ok_or_else(|| RagError::Embedding("empty embedding payload".to_string()))
}

/// Deterministic provider for tests: vectors are derived from a rolling hash
/// of the input, so identical texts embed identically and different texts
/// diverge.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dimension: usize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self {
            dimension: DEFAULT_EMBEDDING_DIM,
        }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut state: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in text.bytes() {
            state ^= u64::from(byte);
            state = state.wrapping_mul(0x0000_0100_0000_01b3);
        }
        let mut vector = Vec::with_capacity(self.dimension);
        for _ in 0..self.dimension {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            vector.push(((state >> 33) as f32 / u32::MAX as f32) - 0.5);
        }
        Ok(vector)
    }
}

/// Batches embedding requests against a provider with a degrade-not-fail
/// policy: any per-text failure becomes a zero vector of the provider
/// dimension, so one bad chunk can never block an ingestion run or a query.
#[derive(Clone)]
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
}

impl EmbeddingGateway {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    /// Embeds one text, truncated to [`MAX_EMBED_CHARS`]. Never fails.
    pub async fn embed_one(&self, text: &str) -> Vec<f32> {
        let input = truncate_chars(text, MAX_EMBED_CHARS);
        match self.provider.embed(input).await {
            Ok(vector) if vector.len() == self.provider.dimension() => vector,
            Ok(vector) => {
                warn!(
                    got = vector.len(),
                    expected = self.provider.dimension(),
                    "embedding dimension mismatch, substituting zero vector"
                );
                vec![0.0; self.provider.dimension()]
            }
            Err(err) => {
                warn!(error = %err, "embedding failed, substituting zero vector");
                vec![0.0; self.provider.dimension()]
            }
        }
    }

    /// Embeds a batch concurrently; per-text failures degrade in isolation.
    pub async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        join_all(texts.iter().map(|text| self.embed_one(text))).await
    }
}

/// Cuts `text` at a char boundary after at most `max_chars` characters.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
