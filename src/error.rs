//! Error types for the Remora library.
//!
//! All fallible operations return [`Result`], whose error type is the
//! [`RemoraError`] enum. Engine and transport failures coming back from the
//! search-engine collaborator are carried through unmodified except for the
//! diagnostic reason attached to bulk failures; nothing in this crate retries
//! automatically.
//!
//! # Examples
//!
//! ```
//! use remora::error::{RemoraError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(RemoraError::invalid_argument("vectors length must match texts"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use anyhow;
use thiserror::Error;

/// The main error type for Remora operations.
#[derive(Error, Debug)]
pub enum RemoraError {
    /// A referenced inference model is not deployed in the engine.
    #[error("Model not deployed: {0}")]
    NotDeployed(String),

    /// One or more documents in a bulk write were rejected by the engine.
    ///
    /// Reporting is all-or-nothing: the batch is reported failed even when
    /// the engine wrote a subset of the documents, so callers must treat
    /// this as "inspect state", not "nothing was written". The message
    /// carries the engine's first failure reason verbatim.
    #[error("Bulk write failed ({failed} of {total} documents): {reason}")]
    BatchWrite {
        /// The engine's literal reason string for the first failing item.
        reason: String,
        /// Number of rejected documents.
        failed: usize,
        /// Total number of documents in the batch.
        total: usize,
    },

    /// A distance metric has no known script-score expression or mapping.
    #[error("Unsupported distance metric: {0}")]
    UnsupportedMetric(String),

    /// Invalid caller-supplied argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An error reported by the search-engine collaborator.
    #[error("Engine error: {0}")]
    Engine(String),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error (embedding services and other collaborators).
    #[error("Error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with [`RemoraError`].
pub type Result<T> = std::result::Result<T, RemoraError>;

impl RemoraError {
    /// Create a new not-deployed error for an inference model id.
    pub fn not_deployed<S: Into<String>>(model_id: S) -> Self {
        RemoraError::NotDeployed(model_id.into())
    }

    /// Create a new unsupported-metric error.
    pub fn unsupported_metric<S: Into<String>>(metric: S) -> Self {
        RemoraError::UnsupportedMetric(metric.into())
    }

    /// Create a new invalid-argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        RemoraError::InvalidArgument(msg.into())
    }

    /// Create a new engine error.
    pub fn engine<S: Into<String>>(msg: S) -> Self {
        RemoraError::Engine(msg.into())
    }
}
