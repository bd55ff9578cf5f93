//! Remora is a vector store layered on an external search engine.
//!
//! It turns a handful of retrieval strategies into engine-native JSON query
//! bodies and index mappings, orchestrates bulk ingestion with client-side
//! or in-engine embedding, and re-ranks results with maximal marginal
//! relevance, all behind one [`VectorStore`] facade.
//!
//! # Features
//!
//! - **Retrieval strategies**: BM25 full-text, dense KNN (client-side or
//!   in-stack inference, optionally hybrid with reciprocal rank fusion),
//!   brute-force script scoring, and sparse inference, as the closed
//!   [`RetrievalStrategy`] enum.
//! - **Ingestion**: batched embedding, lazy index creation with
//!   strategy-derived mappings, and chunked bulk writes.
//! - **Diversity re-ranking**: client-side [`maximal_marginal_relevance`]
//!   over an over-fetched candidate set.
//!
//! The engine itself stays behind the [`SearchEngine`] trait, so any
//! transport (or an in-memory double in tests) can back a store.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use remora::{RetrievalStrategy, SearchParams, VectorStore};
//!
//! # async fn example(
//! #     client: Arc<dyn remora::SearchEngine>,
//! #     embeddings: Arc<dyn remora::EmbeddingService>,
//! # ) -> remora::Result<()> {
//! let store = VectorStore::builder(client, "articles", RetrievalStrategy::dense_vector())
//!     .embedding_service(embeddings)
//!     .build();
//!
//! store
//!     .add_texts(vec!["hello world".to_string()], Default::default())
//!     .await?;
//! let hits = store.search(&SearchParams::query("hello").k(2)).await?;
//! # let _ = hits;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod embedding;
pub mod error;
pub mod mmr;
pub mod store;
pub mod strategy;

pub use client::{BulkItemStatus, BulkOperation, BulkOptions, Hit, SearchEngine, SearchRequest};
pub use embedding::EmbeddingService;
pub use error::{RemoraError, Result};
pub use mmr::{cosine_similarity, maximal_marginal_relevance};
pub use store::{AddTextsOptions, MmrParams, SearchParams, VectorStore, VectorStoreBuilder};
pub use strategy::{DistanceMetric, QueryContext, RetrievalStrategy, Rrf};

/// The crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
