//! Embedding service abstraction.
//!
//! This module provides the [`EmbeddingService`] trait, the seam between the
//! vector store and whatever maps text to dense vectors: a local model, a
//! remote inference API, or a deterministic fake in tests. The store only
//! ever needs two operations, batch document embedding at ingest time and
//! single query embedding at search time.
//!
//! # Thread Safety
//!
//! Implementations must be `Send + Sync`; the store shares one service across
//! concurrent searches without coordination.

use async_trait::async_trait;

use crate::error::Result;

/// Maps text to dense vectors.
///
/// Both operations must preserve order: the vector at position `i` of
/// `embed_documents` corresponds to the text at position `i`.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed a batch of documents, one vector per input text, in order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}
