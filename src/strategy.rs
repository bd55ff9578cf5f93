//! Retrieval strategies and engine-native query construction.
//!
//! A [`RetrievalStrategy`] encapsulates how a user query and an optional
//! dense vector become an engine-native query body, and how the vector/text
//! fields of the backing index must be mapped. The strategy is fixed when a
//! store is constructed; query building itself is a pure function of its
//! inputs, so identical inputs always yield identical bodies and concurrent
//! searches need no coordination.
//!
//! Strategies form a closed set, dispatched by exhaustive match rather than
//! an open class hierarchy:
//! - BM25 lexical match
//! - dense-vector KNN (client-side embedding or in-stack model inference),
//!   optionally hybrid with reciprocal rank fusion
//! - dense-vector script score (precomputed vectors, server-side expression)
//! - sparse vector via an in-engine inference pipeline

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{RemoraError, Result};

/// Distance metrics for dense vector fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DistanceMetric {
    /// Cosine similarity.
    #[default]
    Cosine,
    /// Dot product similarity.
    DotProduct,
    /// Euclidean (L2) distance.
    Euclidean,
    /// Maximum inner product.
    MaxInnerProduct,
}

impl DistanceMetric {
    /// The engine's similarity name for dense vector field mappings.
    pub fn similarity_name(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::DotProduct => "dot_product",
            DistanceMetric::Euclidean => "l2_norm",
            DistanceMetric::MaxInnerProduct => "max_inner_product",
        }
    }

    /// Parse a distance metric from a string.
    pub fn parse_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "dot_product" | "dot" => Ok(DistanceMetric::DotProduct),
            "euclidean" | "l2" | "l2_norm" => Ok(DistanceMetric::Euclidean),
            "max_inner_product" => Ok(DistanceMetric::MaxInnerProduct),
            _ => Err(RemoraError::unsupported_metric(s)),
        }
    }

    /// The server-side scoring expression for script-scored similarity
    /// against `vector_field`.
    pub fn script_source(&self, vector_field: &str) -> String {
        match self {
            DistanceMetric::Cosine => {
                format!("cosineSimilarity(params.query_vector, '{vector_field}') + 1.0")
            }
            DistanceMetric::DotProduct => {
                format!(
                    "\n            double value = dotProduct(params.query_vector, '{vector_field}');\n            return sigmoid(1, Math.E, -value);\n            "
                )
            }
            DistanceMetric::Euclidean => {
                format!("1 / (1 + l2norm(params.query_vector, '{vector_field}'))")
            }
            DistanceMetric::MaxInnerProduct => {
                format!(
                    "\n            double value = dotProduct(params.query_vector, '{vector_field}');\n            if (value < 0) {{\n                return 1 / (1 + -1 * value);\n            }}\n            return value + 1;\n            "
                )
            }
        }
    }
}

/// Reciprocal rank fusion configuration for hybrid dense retrieval.
///
/// The enabled/disabled asymmetry is deliberate: `Enabled` (the default)
/// emits `"rank": {"rrf": {}}` so the engine applies its default fusion,
/// `Disabled` omits the rank clause entirely, and `Custom` passes the given
/// mapping through verbatim. The two non-custom cases are distinct engine
/// behaviors and must not be unified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Rrf {
    /// Engine-default rank fusion (`{"rrf": {}}`).
    #[default]
    Enabled,
    /// No rank clause at all.
    Disabled,
    /// Custom fusion parameters, e.g. `rank_constant` and `window_size`,
    /// emitted unmodified.
    Custom(Map<String, Value>),
}

impl Rrf {
    fn rank_clause(&self) -> Option<Value> {
        match self {
            Rrf::Enabled => Some(json!({"rrf": {}})),
            Rrf::Disabled => None,
            Rrf::Custom(params) => Some(json!({"rrf": params})),
        }
    }
}

/// Inputs to query construction, resolved by the store before dispatch.
#[derive(Debug, Clone, Copy)]
pub struct QueryContext<'a> {
    /// Raw query text, when the caller supplied one.
    pub query: Option<&'a str>,
    /// Dense query vector, when the strategy needs one client-side.
    pub query_vector: Option<&'a [f32]>,
    /// Number of results requested.
    pub k: usize,
    /// KNN candidate pool size.
    pub num_candidates: usize,
    /// Engine-native predicate fragments, merged unmodified into the
    /// strategy-designated filter clause.
    pub filter: &'a [Value],
    /// Name of the indexed text field.
    pub text_field: &'a str,
    /// Name of the indexed vector field.
    pub vector_field: &'a str,
}

/// How a query and optional vector become an engine-native query body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetrievalStrategy {
    /// Lexical BM25 text match. Ignores any vector.
    Bm25 {
        /// Optional BM25 `k1` parameter; set together with `b` to install a
        /// custom similarity on the index.
        k1: Option<f32>,
        /// Optional BM25 `b` parameter.
        b: Option<f32>,
    },
    /// Dense-vector k-nearest-neighbor retrieval.
    DenseVector {
        /// When set, the engine infers the query vector in-stack with this
        /// model instead of the client-side embedding service.
        model_id: Option<String>,
        /// Add a lexical match clause next to the knn clause.
        hybrid: bool,
        /// Rank fusion behavior; only meaningful when `hybrid` is on.
        rrf: Rrf,
        /// Distance metric for the vector field mapping.
        distance: DistanceMetric,
    },
    /// Script-scored similarity over an unindexed dense vector field.
    DenseVectorScriptScore {
        /// Distance metric selecting the scoring expression.
        distance: DistanceMetric,
    },
    /// Sparse retrieval through an in-engine inference pipeline.
    SparseVector {
        /// Id of the deployed sparse-embedding model.
        model_id: String,
    },
}

impl RetrievalStrategy {
    /// Default BM25 strategy.
    pub fn bm25() -> Self {
        RetrievalStrategy::Bm25 { k1: None, b: None }
    }

    /// Dense KNN with client-side embeddings and cosine distance.
    pub fn dense_vector() -> Self {
        RetrievalStrategy::DenseVector {
            model_id: None,
            hybrid: false,
            rrf: Rrf::default(),
            distance: DistanceMetric::default(),
        }
    }

    /// Hybrid dense KNN plus lexical match, fused with the given rank config.
    pub fn dense_vector_hybrid(rrf: Rrf) -> Self {
        RetrievalStrategy::DenseVector {
            model_id: None,
            hybrid: true,
            rrf,
            distance: DistanceMetric::default(),
        }
    }

    /// Dense KNN with in-stack inference through the given model.
    pub fn dense_vector_in_stack(model_id: impl Into<String>) -> Self {
        RetrievalStrategy::DenseVector {
            model_id: Some(model_id.into()),
            hybrid: false,
            rrf: Rrf::default(),
            distance: DistanceMetric::default(),
        }
    }

    /// Script-scored dense similarity with the given metric.
    pub fn dense_vector_script_score(distance: DistanceMetric) -> Self {
        RetrievalStrategy::DenseVectorScriptScore { distance }
    }

    /// Sparse retrieval through the given deployed model.
    pub fn sparse_vector(model_id: impl Into<String>) -> Self {
        RetrievalStrategy::SparseVector {
            model_id: model_id.into(),
        }
    }

    /// Whether this strategy needs a client-side query vector (and therefore
    /// an embedding service when none is supplied by the caller).
    pub fn needs_client_embedding(&self) -> bool {
        match self {
            RetrievalStrategy::Bm25 { .. } => false,
            RetrievalStrategy::DenseVector { model_id, .. } => model_id.is_none(),
            RetrievalStrategy::DenseVectorScriptScore { .. } => true,
            RetrievalStrategy::SparseVector { .. } => false,
        }
    }

    /// The inference model this strategy references, if any.
    pub fn model_id(&self) -> Option<&str> {
        match self {
            RetrievalStrategy::DenseVector { model_id, .. } => model_id.as_deref(),
            RetrievalStrategy::SparseVector { model_id } => Some(model_id),
            _ => None,
        }
    }

    /// Name of the ingest pipeline backing sparse inference, if this
    /// strategy uses one.
    pub fn pipeline_name(&self) -> Option<String> {
        match self {
            RetrievalStrategy::SparseVector { model_id } => {
                Some(format!("{model_id}_sparse_embedding"))
            }
            _ => None,
        }
    }

    /// The knn target field, accounting for in-stack inference output.
    fn knn_field(&self, vector_field: &str) -> String {
        match self {
            RetrievalStrategy::DenseVector {
                model_id: Some(_), ..
            } => format!("{vector_field}.predicted_value"),
            _ => vector_field.to_string(),
        }
    }

    /// Build the engine-native query body.
    ///
    /// Pure: no side effects, no strategy state; identical inputs yield
    /// identical bodies.
    pub fn build_query(&self, ctx: &QueryContext<'_>) -> Result<Value> {
        match self {
            RetrievalStrategy::Bm25 { .. } => {
                let query = require_query(ctx)?;
                Ok(json!({
                    "query": bool_must_match(ctx.text_field, query, ctx.filter),
                }))
            }
            RetrievalStrategy::DenseVector {
                model_id,
                hybrid,
                rrf,
                ..
            } => {
                let mut knn = Map::new();
                knn.insert("field".to_string(), json!(self.knn_field(ctx.vector_field)));
                knn.insert("filter".to_string(), json!(ctx.filter));
                knn.insert("k".to_string(), json!(ctx.k));
                knn.insert("num_candidates".to_string(), json!(ctx.num_candidates));
                match model_id {
                    Some(model_id) => {
                        let query = require_query(ctx)?;
                        knn.insert(
                            "query_vector_builder".to_string(),
                            json!({
                                "text_embedding": {
                                    "model_id": model_id,
                                    "model_text": query,
                                }
                            }),
                        );
                    }
                    None => {
                        let vector = require_vector(ctx)?;
                        knn.insert("query_vector".to_string(), json!(vector));
                    }
                }

                let mut body = Map::new();
                body.insert("knn".to_string(), Value::Object(knn));
                if *hybrid {
                    let query = require_query(ctx)?;
                    body.insert(
                        "query".to_string(),
                        bool_must_match(ctx.text_field, query, ctx.filter),
                    );
                    if let Some(rank) = rrf.rank_clause() {
                        body.insert("rank".to_string(), rank);
                    }
                }
                Ok(Value::Object(body))
            }
            RetrievalStrategy::DenseVectorScriptScore { distance } => {
                let vector = require_vector(ctx)?;
                let base_query = if ctx.filter.is_empty() {
                    json!({"match_all": {}})
                } else {
                    json!({"bool": {"filter": ctx.filter}})
                };
                Ok(json!({
                    "query": {
                        "script_score": {
                            "query": base_query,
                            "script": {
                                "source": distance.script_source(ctx.vector_field),
                                "params": {"query_vector": vector},
                            },
                        }
                    }
                }))
            }
            RetrievalStrategy::SparseVector { model_id } => {
                let query = require_query(ctx)?;
                let mut expansion = Map::new();
                expansion.insert(
                    format!("{}.tokens", ctx.vector_field),
                    json!({"model_id": model_id, "model_text": query}),
                );
                Ok(json!({
                    "query": {
                        "bool": {
                            "must": [{"text_expansion": expansion}],
                            "filter": ctx.filter,
                        }
                    }
                }))
            }
        }
    }

    /// Field mappings the backing index must be created with.
    ///
    /// `num_dimensions` is required for dense vector fields.
    pub fn index_mapping(
        &self,
        text_field: &str,
        vector_field: &str,
        num_dimensions: Option<usize>,
    ) -> Result<Value> {
        let mut properties = Map::new();
        match self {
            RetrievalStrategy::Bm25 { k1, b } => {
                let mut text = Map::new();
                text.insert("type".to_string(), json!("text"));
                if k1.is_some() || b.is_some() {
                    text.insert("similarity".to_string(), json!("custom_bm25"));
                }
                properties.insert(text_field.to_string(), Value::Object(text));
            }
            RetrievalStrategy::DenseVector {
                model_id, distance, ..
            } => {
                let dims = require_dims(num_dimensions)?;
                let dense = json!({
                    "type": "dense_vector",
                    "dims": dims,
                    "index": true,
                    "similarity": distance.similarity_name(),
                });
                let field_mapping = match model_id {
                    // In-stack inference writes under `predicted_value`.
                    Some(_) => json!({"properties": {"predicted_value": dense}}),
                    None => dense,
                };
                properties.insert(vector_field.to_string(), field_mapping);
            }
            RetrievalStrategy::DenseVectorScriptScore { .. } => {
                let dims = require_dims(num_dimensions)?;
                properties.insert(
                    vector_field.to_string(),
                    json!({"type": "dense_vector", "dims": dims, "index": false}),
                );
            }
            RetrievalStrategy::SparseVector { .. } => {
                properties.insert(
                    vector_field.to_string(),
                    json!({"properties": {"tokens": {"type": "rank_features"}}}),
                );
            }
        }
        Ok(json!({"properties": properties}))
    }

    /// Index settings to accompany [`Self::index_mapping`] at creation time.
    pub fn index_settings(&self) -> Value {
        match self {
            RetrievalStrategy::Bm25 { k1, b } if k1.is_some() || b.is_some() => {
                let mut similarity = Map::new();
                similarity.insert("type".to_string(), json!("BM25"));
                if let Some(k1) = k1 {
                    similarity.insert("k1".to_string(), json!(k1));
                }
                if let Some(b) = b {
                    similarity.insert("b".to_string(), json!(b));
                }
                json!({"similarity": {"custom_bm25": similarity}})
            }
            RetrievalStrategy::SparseVector { .. } => {
                // pipeline_name() is always Some for this variant
                json!({"index": {"default_pipeline": self.pipeline_name()}})
            }
            _ => json!({}),
        }
    }
}

fn require_query<'a>(ctx: &QueryContext<'a>) -> Result<&'a str> {
    ctx.query
        .ok_or_else(|| RemoraError::invalid_argument("this strategy requires query text"))
}

fn require_vector<'a>(ctx: &QueryContext<'a>) -> Result<&'a [f32]> {
    ctx.query_vector
        .ok_or_else(|| RemoraError::invalid_argument("this strategy requires a query vector"))
}

fn require_dims(num_dimensions: Option<usize>) -> Result<usize> {
    num_dimensions.ok_or_else(|| {
        RemoraError::invalid_argument("num_dimensions is required for dense vector mappings")
    })
}

fn bool_must_match(text_field: &str, query: &str, filter: &[Value]) -> Value {
    let mut match_target = Map::new();
    match_target.insert(text_field.to_string(), json!({"query": query}));
    json!({
        "bool": {
            "must": [{"match": match_target}],
            "filter": filter,
        }
    })
}
