//! The vector store facade.
//!
//! [`VectorStore`] composes a retrieval strategy, an optional embedding
//! service, and a search-engine collaborator into the four operations callers
//! use: `add_texts`, `search`, `max_marginal_relevance_search`, and `delete`.
//!
//! The store holds no mutable state of its own. Index creation is lazy, on
//! the first `add_texts` against a missing index, and relies on the engine's
//! idempotent create for safety under concurrent first writers; every other
//! operation is a pure pipeline from caller inputs to engine calls, so one
//! store can serve concurrent searches without coordination.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::client::{BulkOperation, BulkOptions, Hit, SearchEngine, SearchRequest};
use crate::embedding::EmbeddingService;
use crate::error::{RemoraError, Result};
use crate::mmr::maximal_marginal_relevance;
use crate::strategy::{QueryContext, RetrievalStrategy};

/// A query hook called with the engine-native body and the original query
/// text; its return value is submitted to the engine verbatim.
pub type CustomQuery<'a> = &'a (dyn Fn(Value, Option<&str>) -> Value + Send + Sync);

/// The client identification string advertised by default.
pub fn default_user_agent() -> String {
    format!("remora-vs/{}", crate::VERSION)
}

/// Parameters for a single search call.
pub struct SearchParams<'a> {
    /// Raw query text.
    pub query: Option<&'a str>,
    /// Precomputed query vector; when absent and the strategy needs one, it
    /// is resolved through the store's embedding service.
    pub query_vector: Option<Vec<f32>>,
    /// Number of hits to return.
    pub k: usize,
    /// KNN candidate pool size; defaults to `max(50, k)`.
    pub num_candidates: Option<usize>,
    /// Engine-native predicate fragments, passed through unmodified.
    pub filter: Vec<Value>,
    /// Optional full-override hook for the built query body.
    pub custom_query: Option<CustomQuery<'a>>,
}

impl Default for SearchParams<'_> {
    fn default() -> Self {
        Self {
            query: None,
            query_vector: None,
            k: 4,
            num_candidates: None,
            filter: Vec::new(),
            custom_query: None,
        }
    }
}

impl<'a> SearchParams<'a> {
    /// Search by query text.
    pub fn query(query: &'a str) -> Self {
        Self {
            query: Some(query),
            ..Default::default()
        }
    }

    /// Search by precomputed query vector.
    pub fn vector(query_vector: Vec<f32>) -> Self {
        Self {
            query_vector: Some(query_vector),
            ..Default::default()
        }
    }

    /// Set the number of hits to return.
    pub fn k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Set the KNN candidate pool size.
    pub fn num_candidates(mut self, num_candidates: usize) -> Self {
        self.num_candidates = Some(num_candidates);
        self
    }

    /// Set engine-native filters.
    pub fn filter(mut self, filter: Vec<Value>) -> Self {
        self.filter = filter;
        self
    }

    /// Install a custom-query hook for this call.
    pub fn custom_query(mut self, hook: CustomQuery<'a>) -> Self {
        self.custom_query = Some(hook);
        self
    }
}

/// Parameters for maximal-marginal-relevance search.
#[derive(Debug, Clone)]
pub struct MmrParams {
    /// Number of results to return.
    pub k: usize,
    /// Size of the over-fetched candidate set.
    pub num_candidates: usize,
    /// Relevance/diversity trade-off: 1.0 is pure relevance, 0.0 pure
    /// diversity.
    pub lambda_mult: f32,
    /// Engine-native filters for the candidate fetch.
    pub filter: Vec<Value>,
}

impl Default for MmrParams {
    fn default() -> Self {
        Self {
            k: 4,
            num_candidates: 20,
            lambda_mult: 0.5,
            filter: Vec::new(),
        }
    }
}

/// Options for [`VectorStore::add_texts`].
#[derive(Debug, Clone, Default)]
pub struct AddTextsOptions {
    /// Caller-supplied vectors, one per text; embedded in batch through the
    /// store's embedding service when absent and the strategy needs them.
    pub vectors: Option<Vec<Vec<f32>>>,
    /// Per-document metadata; defaults to an empty mapping per document.
    pub metadatas: Option<Vec<Map<String, Value>>>,
    /// Caller-supplied document ids; UUIDs are generated when absent.
    pub ids: Option<Vec<String>>,
    /// Bulk submission options.
    pub bulk: BulkOptions,
}

impl AddTextsOptions {
    /// Supply precomputed vectors.
    pub fn vectors(mut self, vectors: Vec<Vec<f32>>) -> Self {
        self.vectors = Some(vectors);
        self
    }

    /// Supply per-document metadata.
    pub fn metadatas(mut self, metadatas: Vec<Map<String, Value>>) -> Self {
        self.metadatas = Some(metadatas);
        self
    }

    /// Supply document ids.
    pub fn ids(mut self, ids: Vec<String>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Set bulk submission options.
    pub fn bulk(mut self, bulk: BulkOptions) -> Self {
        self.bulk = bulk;
        self
    }
}

/// Builder for [`VectorStore`].
pub struct VectorStoreBuilder {
    client: Arc<dyn SearchEngine>,
    index: String,
    strategy: RetrievalStrategy,
    embedding_service: Option<Arc<dyn EmbeddingService>>,
    text_field: String,
    vector_field: String,
    num_dimensions: Option<usize>,
    metadata_mappings: Option<Map<String, Value>>,
    user_agent: String,
}

impl VectorStoreBuilder {
    /// Attach an embedding service for client-side vector generation.
    pub fn embedding_service(mut self, service: Arc<dyn EmbeddingService>) -> Self {
        self.embedding_service = Some(service);
        self
    }

    /// Override the indexed text field name (default `"text_field"`).
    pub fn text_field(mut self, text_field: impl Into<String>) -> Self {
        self.text_field = text_field.into();
        self
    }

    /// Override the indexed vector field name (default `"vector_field"`).
    pub fn vector_field(mut self, vector_field: impl Into<String>) -> Self {
        self.vector_field = vector_field.into();
        self
    }

    /// Fix the vector dimensionality; inferred from the embedding service at
    /// index creation when left unset.
    pub fn num_dimensions(mut self, num_dimensions: usize) -> Self {
        self.num_dimensions = Some(num_dimensions);
        self
    }

    /// Explicit mappings for metadata fields, merged into the index mapping
    /// at creation time; these take precedence over strategy defaults.
    pub fn metadata_mappings(mut self, mappings: Map<String, Value>) -> Self {
        self.metadata_mappings = Some(mappings);
        self
    }

    /// Override the client identification string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Finish building the store.
    pub fn build(self) -> VectorStore {
        VectorStore {
            client: self.client,
            index: self.index,
            strategy: self.strategy,
            embedding_service: self.embedding_service,
            text_field: self.text_field,
            vector_field: self.vector_field,
            num_dimensions: self.num_dimensions,
            metadata_mappings: self.metadata_mappings,
            user_agent: self.user_agent,
        }
    }
}

/// A vector store over one index of an external search engine.
pub struct VectorStore {
    client: Arc<dyn SearchEngine>,
    index: String,
    strategy: RetrievalStrategy,
    embedding_service: Option<Arc<dyn EmbeddingService>>,
    text_field: String,
    vector_field: String,
    num_dimensions: Option<usize>,
    metadata_mappings: Option<Map<String, Value>>,
    user_agent: String,
}

impl VectorStore {
    /// Start building a store over `index` with the given strategy.
    pub fn builder(
        client: Arc<dyn SearchEngine>,
        index: impl Into<String>,
        strategy: RetrievalStrategy,
    ) -> VectorStoreBuilder {
        VectorStoreBuilder {
            client,
            index: index.into(),
            strategy,
            embedding_service: None,
            text_field: "text_field".to_string(),
            vector_field: "vector_field".to_string(),
            num_dimensions: None,
            metadata_mappings: None,
            user_agent: default_user_agent(),
        }
    }

    /// The target index name.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// The client identification string transports should advertise.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// The retrieval strategy this store was built with.
    pub fn strategy(&self) -> &RetrievalStrategy {
        &self.strategy
    }

    /// Add texts to the index, returning their ids in input order.
    ///
    /// Vectors, metadata, and ids line up positionally with `texts`. The
    /// index is created on first use with the strategy's mapping merged with
    /// any configured metadata mappings. Writes are submitted in bulk,
    /// chunked by `options.bulk.chunk_size`; any rejected document fails the
    /// whole batch with the engine's first failure reason (the engine may
    /// still have written the accepted rows).
    pub async fn add_texts(
        &self,
        texts: Vec<String>,
        options: AddTextsOptions,
    ) -> Result<Vec<String>> {
        let total = texts.len();

        let vectors = match options.vectors {
            Some(vectors) => {
                if vectors.len() != total {
                    return Err(RemoraError::invalid_argument(format!(
                        "got {} vectors for {} texts",
                        vectors.len(),
                        total
                    )));
                }
                Some(vectors)
            }
            None if self.strategy.needs_client_embedding() => {
                Some(self.embedding_service()?.embed_documents(&texts).await?)
            }
            None => None,
        };

        let metadatas = match options.metadatas {
            Some(metadatas) => {
                if metadatas.len() != total {
                    return Err(RemoraError::invalid_argument(format!(
                        "got {} metadata mappings for {} texts",
                        metadatas.len(),
                        total
                    )));
                }
                metadatas
            }
            None => vec![Map::new(); total],
        };

        let ids = match options.ids {
            Some(ids) => {
                if ids.len() != total {
                    return Err(RemoraError::invalid_argument(format!(
                        "got {} ids for {} texts",
                        ids.len(),
                        total
                    )));
                }
                ids
            }
            None => (0..total).map(|_| Uuid::new_v4().to_string()).collect(),
        };

        self.ensure_index_exists().await?;

        let mut operations = Vec::with_capacity(total);
        for (position, (text, metadata)) in texts.into_iter().zip(metadatas).enumerate() {
            let mut document = Map::new();
            document.insert(self.text_field.clone(), json!(text));
            document.insert("metadata".to_string(), Value::Object(metadata));
            if let Some(vectors) = &vectors {
                document.insert(self.vector_field.clone(), json!(vectors[position]));
            }
            operations.push(BulkOperation {
                id: ids[position].clone(),
                document: Value::Object(document),
            });
        }

        let chunk_size = options.bulk.chunk_size.max(1);
        let mut failed = 0usize;
        let mut first_reason: Option<String> = None;
        for chunk in operations.chunks(chunk_size) {
            let statuses = self.client.bulk(&self.index, chunk.to_vec()).await?;
            for status in statuses {
                if let Some(reason) = status.error {
                    failed += 1;
                    first_reason.get_or_insert(reason);
                }
            }
        }

        if let Some(reason) = first_reason {
            log::error!("First error reason: {reason}");
            return Err(RemoraError::BatchWrite {
                reason,
                failed,
                total,
            });
        }

        Ok(ids)
    }

    /// Execute a search and return hits in engine relevance order.
    ///
    /// The query vector is resolved through the embedding service when the
    /// strategy needs one and none was supplied. When a `custom_query` hook
    /// is set it receives the built engine-native body plus the original
    /// query text, and whatever it returns is submitted unmodified.
    pub async fn search(&self, params: &SearchParams<'_>) -> Result<Vec<Hit>> {
        let mut query_vector = params.query_vector.clone();
        if query_vector.is_none() && self.strategy.needs_client_embedding() {
            let query = params.query.ok_or_else(|| {
                RemoraError::invalid_argument("either query text or a query vector is required")
            })?;
            query_vector = Some(self.embedding_service()?.embed_query(query).await?);
        }

        let ctx = QueryContext {
            query: params.query,
            query_vector: query_vector.as_deref(),
            k: params.k,
            num_candidates: params.num_candidates.unwrap_or_else(|| params.k.max(50)),
            filter: &params.filter,
            text_field: &self.text_field,
            vector_field: &self.vector_field,
        };
        let mut body = self.strategy.build_query(&ctx)?;
        if let Some(hook) = params.custom_query {
            body = hook(body, params.query);
        }

        self.client
            .search(SearchRequest {
                index: self.index.clone(),
                body,
                size: params.k,
            })
            .await
    }

    /// Diversity-aware search: over-fetch `num_candidates` hits, then
    /// greedily re-rank them client-side by maximal marginal relevance.
    ///
    /// Candidate vectors come back with the initial fetch, so no second
    /// engine round-trip happens; the vector field is stripped from the
    /// returned sources again. Fewer candidates than `k` yields a shorter
    /// result, not an error.
    pub async fn max_marginal_relevance_search(
        &self,
        embedding_service: &dyn EmbeddingService,
        query: &str,
        params: &MmrParams,
    ) -> Result<Vec<Hit>> {
        let fetch = SearchParams {
            query: Some(query),
            k: params.num_candidates,
            filter: params.filter.clone(),
            ..Default::default()
        };
        let hits = self.search(&fetch).await?;

        let mut candidates = Vec::with_capacity(hits.len());
        for hit in &hits {
            let vector = hit
                .source
                .get(&self.vector_field)
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    RemoraError::engine(format!(
                        "hit '{}' is missing vector field '{}'",
                        hit.id, self.vector_field
                    ))
                })?;
            candidates.push(
                vector
                    .iter()
                    .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                    .collect::<Vec<f32>>(),
            );
        }

        let query_vector = embedding_service.embed_query(query).await?;
        let selected =
            maximal_marginal_relevance(&query_vector, &candidates, params.k, params.lambda_mult)?;

        let mut reranked = Vec::with_capacity(selected.len());
        for index in selected {
            let mut hit = hits[index].clone();
            if let Some(source) = hit.source.as_object_mut() {
                source.remove(&self.vector_field);
            }
            reranked.push(hit);
        }
        Ok(reranked)
    }

    /// Best-effort bulk delete; returns the number of documents actually
    /// removed. Unknown ids are silently skipped, so the operation is
    /// idempotent.
    pub async fn delete(&self, ids: &[String]) -> Result<usize> {
        let mut deleted = 0;
        for id in ids {
            if self.client.delete_document(&self.index, id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    fn embedding_service(&self) -> Result<&Arc<dyn EmbeddingService>> {
        self.embedding_service.as_ref().ok_or_else(|| {
            RemoraError::invalid_argument(
                "this retrieval strategy requires an embedding service or precomputed vectors",
            )
        })
    }

    /// Lazily create the backing index.
    ///
    /// Also the point where a referenced inference model must exist: a
    /// missing deployment fails here rather than being silently ignored.
    /// Concurrent first writers race harmlessly on the engine's idempotent
    /// create.
    async fn ensure_index_exists(&self) -> Result<()> {
        if self.client.index_exists(&self.index).await? {
            return Ok(());
        }

        if let Some(model_id) = self.strategy.model_id()
            && !self.client.model_is_deployed(model_id).await?
        {
            return Err(RemoraError::not_deployed(model_id));
        }

        if let Some(pipeline) = self.strategy.pipeline_name() {
            let model_id = self.strategy.model_id().unwrap_or_default();
            let mut field_map = Map::new();
            field_map.insert(self.text_field.clone(), json!("text_field"));
            let processors = json!([{
                "inference": {
                    "model_id": model_id,
                    "target_field": self.vector_field,
                    "field_map": field_map,
                    "inference_config": {
                        "text_expansion": {"results_field": "tokens"}
                    },
                }
            }]);
            self.client.put_ingest_pipeline(&pipeline, processors).await?;
        }

        let num_dimensions = match self.num_dimensions {
            Some(dims) => Some(dims),
            None if self.strategy.needs_client_embedding() => match &self.embedding_service {
                Some(service) => Some(service.embed_query("").await?.len()),
                None => None,
            },
            None => None,
        };

        let mut mappings =
            self.strategy
                .index_mapping(&self.text_field, &self.vector_field, num_dimensions)?;
        if let Some(metadata_mappings) = &self.metadata_mappings {
            mappings["properties"]["metadata"] = json!({"properties": metadata_mappings});
        }

        log::debug!("creating index '{}'", self.index);
        self.client
            .create_index(&self.index, mappings, self.strategy.index_settings())
            .await
    }
}
