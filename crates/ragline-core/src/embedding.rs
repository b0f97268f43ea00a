//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, plus pure helpers for similarity computation used by the
//! in-memory vector store.

use async_trait::async_trait;

use crate::error::Result;
use crate::provider::LlmBackend;

/// Whether text is embedded for storage or for searching.
///
/// Backends with asymmetric encoders (Cohere's `search_document` /
/// `search_query`) use different encodings per mode. Index time must use
/// [`EmbedMode::Document`], search time [`EmbedMode::Query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedMode {
    Document,
    Query,
}

/// Trait for embedding providers.
///
/// A provider is constructed unbound; [`select_embedding_model`] must be
/// called before [`embed_text`], which otherwise fails with
/// `RagError::Configuration`. Input longer than the provider's
/// configured maximum is truncated before it is sent.
///
/// [`select_embedding_model`]: EmbeddingProvider::select_embedding_model
/// [`embed_text`]: EmbeddingProvider::embed_text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Backend this provider talks to.
    fn backend(&self) -> LlmBackend;

    /// Bind the model used for all subsequent embeddings.
    fn select_embedding_model(&mut self, model_id: &str, embedding_size: usize);

    /// Dimensionality of the selected model, if one is bound.
    fn embedding_size(&self) -> Option<usize>;

    /// Embed a single text, returning a vector of [`embedding_size`] floats.
    ///
    /// [`embedding_size`]: EmbeddingProvider::embedding_size
    async fn embed_text(&self, text: &str, mode: EmbedMode) -> Result<Vec<f32>>;
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Plain dot product; `0.0` for mismatched lengths.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
