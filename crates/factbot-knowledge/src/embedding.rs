//! Embedding provider trait and implementations.
//!
//! The store and retriever only see fixed-length unit-normalized vectors;
//! where those vectors come from is behind [`EmbeddingProvider`]. Two
//! implementations ship here: a deterministic local hash embedding for
//! offline use and tests, and an OpenAI-compatible HTTP client.

use std::collections::HashMap;

use async_trait::async_trait;
use factbot_core::{FactbotError, FactbotResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::math::l2_normalize;

/// Default embedding dimension when none is configured.
pub const DEFAULT_DIMENSION: usize = 256;

/// Trait for computing text embeddings (vector representations).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute the embedding vector for a single text.
    ///
    /// The returned vector has exactly [`dimension`](Self::dimension)
    /// components and unit L2 norm. Fails with `Provider` on any upstream
    /// failure, including empty input.
    async fn embed(&self, text: &str) -> FactbotResult<Vec<f32>>;

    /// Dimension of the vectors produced by this provider.
    fn dimension(&self) -> usize;
}

/// Local bag-of-words hash embedding (no external API needed).
///
/// Hashes each token to several vector positions weighted by term
/// frequency, then L2-normalizes. Deterministic, so tests and offline
/// runs behave identically across processes. Replace with a real model
/// provider for production-quality semantics.
pub struct HashEmbedding {
    dimension: usize,
}

impl HashEmbedding {
    /// Create a hash embedding with the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashEmbedding {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedding {
    async fn embed(&self, text: &str) -> FactbotResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(FactbotError::Provider(
                "cannot embed empty text".to_string(),
            ));
        }

        let mut vector = vec![0.0f32; self.dimension];

        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 1)
            .collect();

        let mut freq: HashMap<&str, f32> = HashMap::new();
        for word in &words {
            *freq.entry(word).or_insert(0.0) += 1.0;
        }

        let total = words.len() as f32;
        if total == 0.0 {
            return Err(FactbotError::Provider(
                "no embeddable tokens in input".to_string(),
            ));
        }

        // Spread each token over three hash positions for better
        // distribution at small dimensions.
        for (word, count) in &freq {
            let tf = count / total;
            let h1 = fnv1a(word.as_bytes()) as usize;
            let h2 = fnv1a(&[word.as_bytes(), &[1u8]].concat()) as usize;
            let h3 = fnv1a(&[word.as_bytes(), &[2u8]].concat()) as usize;

            vector[h1 % self.dimension] += tf;
            vector[h2 % self.dimension] += tf * 0.7;
            vector[h3 % self.dimension] += tf * 0.5;
        }

        l2_normalize(&mut vector);
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// FNV-1a hash, the deterministic token hash behind [`HashEmbedding`].
fn fnv1a(data: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for &byte in data {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

/// Default OpenAI-compatible API URL.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Default embedding model.
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";

/// OpenAI-compatible HTTP embedding provider.
///
/// Calls the `/v1/embeddings` endpoint, truncates the returned vector to
/// the configured dimension, and re-normalizes. Truncation keeps storage
/// bounded while preserving most of the model's signal for cosine
/// comparison.
pub struct OpenAiEmbedding {
    base_url: String,
    model: String,
    api_key: String,
    dimension: usize,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    encoding_format: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedding {
    /// Create a provider against the given endpoint and model.
    pub fn new(base_url: &str, model: &str, api_key: &str, dimension: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            dimension,
            client,
        }
    }

    /// Create a provider with default endpoint, model, and dimension.
    pub fn default_provider(api_key: &str) -> Self {
        Self::new(
            DEFAULT_OPENAI_URL,
            DEFAULT_OPENAI_MODEL,
            api_key,
            DEFAULT_DIMENSION,
        )
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> FactbotResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(FactbotError::Provider(
                "cannot embed empty text".to_string(),
            ));
        }

        // The embeddings endpoint treats newlines as token noise.
        let flattened = text.replace('\n', " ");
        let request = EmbeddingRequest {
            model: &self.model,
            input: vec![&flattened],
            encoding_format: "float",
        };

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| FactbotError::Provider(format!("embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FactbotError::Provider(format!(
                "embedding API error ({status}): {body}"
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| FactbotError::Provider(format!("malformed embedding response: {e}")))?;

        let mut vector = result
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| FactbotError::Provider("empty embedding response".to_string()))?;

        if vector.len() < self.dimension {
            return Err(FactbotError::Provider(format!(
                "provider returned {} dimensions, need at least {}",
                vector.len(),
                self.dimension
            )));
        }
        vector.truncate(self.dimension);
        l2_normalize(&mut vector);

        debug!(dim = vector.len(), "Generated embedding");
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
