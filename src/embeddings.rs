//! Embedding providers: the capability contract plus an HTTP client and a
//! deterministic mock for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::PipelineError;

/// Capability: text in, fixed-length vector out.
///
/// Vector dimensionality is fixed per deployment; ingestion and query calls
/// must go through the same provider or nearest-neighbor distances are
/// meaningless.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError>;

    /// Embeds a batch sequentially. Implementations backed by batch-capable
    /// services may override this.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Short provider name for log lines.
    fn name(&self) -> &str {
        "unknown"
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// HTTP embedding client.
///
/// Speaks the internal embedding endpoint contract: `POST` with
/// `{"text": …}`, expecting `{"embedding": [f32, …]}` back. Transport
/// failures and non-success statuses surface as [`PipelineError::Embedding`].
#[derive(Clone, Debug)]
pub struct HttpEmbeddingClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpEmbeddingClient {
    pub fn new(endpoint: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }

    /// Reuses an existing client, e.g. to share connection pools across
    /// collaborator clients.
    pub fn with_client(http: reqwest::Client, endpoint: Url) -> Self {
        Self { http, endpoint }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&EmbeddingRequest { text })
            .send()
            .await
            .map_err(|err| PipelineError::Embedding(err.to_string()))?;

        if !response.status().is_success() {
            return Err(PipelineError::Embedding(format!(
                "endpoint returned {}",
                response.status()
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|err| PipelineError::Embedding(format!("invalid response body: {err}")))?;
        Ok(body.embedding)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Deterministic, dependency-free embedding provider for tests.
///
/// Hashes the input text into a seed and expands it into a unit-length
/// vector, so identical texts always map to identical vectors and distinct
/// texts almost always differ.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dims: usize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self { dims: 16 }
    }

    pub fn with_dims(dims: usize) -> Self {
        Self { dims }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        // FNV-1a over the bytes, then a splitmix-style expansion per lane.
        let mut seed: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in text.bytes() {
            seed ^= u64::from(byte);
            seed = seed.wrapping_mul(0x0000_0100_0000_01b3);
        }

        let mut values = Vec::with_capacity(self.dims);
        let mut state = seed;
        for _ in 0..self.dims {
            state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
            let mut z = state;
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
            z ^= z >> 31;
            // Map to [-1, 1).
            values.push((z as f64 / u64::MAX as f64 * 2.0 - 1.0) as f32);
        }

        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut values {
                *value /= norm;
            }
        }
        values
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        Ok(self.vector_for(text))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
