//! Search-engine collaborator interface.
//!
//! The store never talks to a concrete engine; it goes through the
//! [`SearchEngine`] trait, which models the handful of engine operations the
//! vector-store helpers need: search, bulk multi-document writes, index
//! creation and mapping introspection, per-document delete, ingest-pipeline
//! management, and ML model deployment status. Transport, authentication,
//! and retry/backoff all live behind implementations of this trait.
//!
//! Query and mapping bodies are engine-native JSON (`serde_json::Value`);
//! this crate builds them but never interprets engine internals.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// A search request against one index.
///
/// `body` is the full engine-native query document (it may carry `query`,
/// `knn`, and `rank` clauses side by side); `size` caps the number of hits
/// returned.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    /// Target index name.
    pub index: String,
    /// Engine-native query body, submitted as built.
    pub body: Value,
    /// Maximum number of hits to return.
    pub size: usize,
}

/// One result row, as returned by the engine.
///
/// `source` is the raw `_source` document and is read-only to this crate;
/// callers index into it with the field names they configured on the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Engine-assigned or caller-assigned document id.
    #[serde(rename = "_id")]
    pub id: String,
    /// Relevance score; absent for unscored contexts.
    #[serde(rename = "_score")]
    pub score: Option<f64>,
    /// The stored document source.
    #[serde(rename = "_source")]
    pub source: Value,
}

/// A single document write within a bulk request.
#[derive(Debug, Clone, Serialize)]
pub struct BulkOperation {
    /// Document id.
    pub id: String,
    /// Document source, including text, optional vector, and metadata fields.
    pub document: Value,
}

/// Per-item outcome of a bulk request.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkItemStatus {
    /// Id of the document this status refers to.
    pub id: String,
    /// The engine's failure reason, verbatim, when the item was rejected.
    pub error: Option<String>,
}

impl BulkItemStatus {
    /// Status for a successfully written document.
    pub fn ok(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: None,
        }
    }

    /// Status for a rejected document, carrying the engine's reason.
    pub fn failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: Some(reason.into()),
        }
    }
}

/// Options for bulk ingestion.
#[derive(Debug, Clone)]
pub struct BulkOptions {
    /// Maximum number of documents submitted per bulk call.
    pub chunk_size: usize,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self { chunk_size: 500 }
    }
}

/// The external search-engine collaborator.
///
/// Implementations wrap a concrete client (HTTP transport, auth, retries are
/// their concern, not this crate's). All operations are async I/O; none of
/// them is retried by the caller.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Execute a search and return hits in engine relevance order.
    async fn search(&self, request: SearchRequest) -> Result<Vec<Hit>>;

    /// Submit a multi-document write and return a status per operation, in
    /// operation order.
    async fn bulk(&self, index: &str, operations: Vec<BulkOperation>) -> Result<Vec<BulkItemStatus>>;

    /// Create an index with the given mappings and settings.
    ///
    /// Creation is expected to be idempotent, or at least to fail harmlessly
    /// when the index already exists; the store relies on that for lazy
    /// creation under concurrent first writers.
    async fn create_index(&self, index: &str, mappings: Value, settings: Value) -> Result<()>;

    /// Check whether an index exists.
    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// Fetch the mappings of an existing index.
    async fn get_mapping(&self, index: &str) -> Result<Value>;

    /// Delete one document by id. Returns `false` when the id did not exist;
    /// that is not an error.
    async fn delete_document(&self, index: &str, id: &str) -> Result<bool>;

    /// Create or replace an ingest pipeline.
    async fn put_ingest_pipeline(&self, pipeline_id: &str, processors: Value) -> Result<()>;

    /// Check whether an ML model is deployed and ready for inference.
    async fn model_is_deployed(&self, model_id: &str) -> Result<bool>;
}
