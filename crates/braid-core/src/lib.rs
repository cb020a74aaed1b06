#![forbid(unsafe_code)]
//! braid-core library.
//!
//! Hybrid retrieval fusion: one query fans out to dense-vector, full-text and
//! sparse search paths, and their ranked lists are fused (RRF with adaptive
//! weight renormalization, or weighted similarity), quality-scored and
//! optionally reranked into a single list.
//!
//! Storage and models are collaborators behind [`VectorIndex`],
//! [`TextIndex`], [`SparseIndex`] and [`Reranker`].
//!
//! # Conventions
//!
//! - **Errors**: Construction returns [`ConfigError`]; collaborators return
//!   `anyhow::Result`. Searching never fails.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod filter;
pub mod fusion;
pub mod normalize;
pub mod paths;
pub mod quality;
pub mod record;
pub mod rerank;
pub mod topk;

pub use config::{EngineConfig, load_engine_config};
pub use dispatch::{DispatchOutput, DispatchReport, PathDispatcher, PathQuery};
pub use engine::{EngineBuilder, HybridSearchEngine, SearchRequest, SearchResponse};
pub use error::ConfigError;
pub use filter::Filter;
pub use fusion::{FusionEngine, FusionInfo, FusionMethod, FusionWeights, PathRank};
pub use normalize::{MetricType, SparseScoring, sparse_inner_product_similarity};
pub use paths::{
    PathKind, PathOutput, PathStatus, SparseIndex, SparseVector, TextIndex, VectorIndex,
};
pub use quality::{QualityScorer, quality_score};
pub use record::{DocId, RecordRow, SearchResult};
pub use rerank::{RerankOutcome, Reranker, rerank_candidates, zigzag};
pub use topk::BoundedTopK;
