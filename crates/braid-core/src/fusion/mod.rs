//! Fusion of the vector, full-text and sparse result lists.
//!
//! Results are merged per document, scored with Reciprocal Rank Fusion
//! (default) or weighted-similarity fusion, reduced to the candidate limit
//! with a bounded top-K, and annotated with `_fusion_score` and
//! `_fusion_info` for explainability.

pub mod hybrid;
pub mod scoring;

pub use hybrid::{FusionEngine, FusionInfo, PathContribution};
pub use scoring::{
    DEFAULT_RRF_K, FusionMethod, FusionWeights, PathRank, adaptive_rrf_score, rrf_term,
    rrf_weighted_sum, weighted_score,
};
