//! Construction-time errors.
//!
//! Only configuration problems escape the engine. Path failures, malformed
//! distances and reranker failures are absorbed where they happen and show up
//! in `_fusion_info` and the dispatch report instead.

use crate::paths::PathKind;

/// Fatal configuration errors raised while building a [`crate::HybridSearchEngine`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The metric selector is not one of `l2`, `cosine`, `inner_product`.
    #[error("unsupported metric type: {0:?} (expected l2, cosine or inner_product)")]
    UnsupportedMetric(String),

    /// The configured text-search parser is not supported by the text index.
    #[error("unsupported text-search parser: {0:?}")]
    UnsupportedTextParser(String),

    /// `vector_dimension` is absent or zero.
    #[error("vector_dimension is required and must be greater than zero")]
    MissingVectorDimension,

    /// A fusion weight is negative or not finite.
    #[error("invalid {path} weight: {value}")]
    InvalidWeight { path: PathKind, value: f64 },

    /// The RRF constant must be strictly positive.
    #[error("rrf_k must be greater than zero")]
    InvalidRrfK,

    /// Full-text search is enabled but no text index was supplied.
    #[error("full-text search is enabled but no text index was configured")]
    MissingTextIndex,

    /// Sparse search is enabled but no sparse index was supplied.
    #[error("sparse search is enabled but no sparse index was configured")]
    MissingSparseIndex,
}
