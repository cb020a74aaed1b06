//! The hybrid search engine: dispatch, fuse, score, rerank.

use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::config::EngineConfig;
use crate::dispatch::{DispatchReport, PathDispatcher, PathQuery};
use crate::error::ConfigError;
use crate::filter::Filter;
use crate::fusion::{FusionEngine, FusionMethod};
use crate::normalize::{MetricType, SparseScoring, sparse_inner_product_similarity};
use crate::paths::{
    FullTextSearchPath, SparseIndex, SparseSearchPath, SparseVector, TextIndex, VectorIndex,
    VectorSearchPath,
};
use crate::quality::QualityScorer;
use crate::record::SearchResult;
use crate::rerank::{Reranker, rerank_candidates};

/// One hybrid query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchRequest {
    /// Query text for full-text search and reranking. Blank skips full text.
    pub text: String,
    /// Dense query embedding. Empty skips the vector path.
    pub vector: Vec<f32>,
    /// Sparse query weights. `None` skips the sparse path.
    pub sparse: Option<SparseVector>,
    pub filter: Filter,
    pub limit: usize,
    /// Drop results whose `_quality_score` is below this, before reranking.
    pub min_quality: Option<f64>,
}

impl SearchRequest {
    #[must_use]
    pub fn new(text: impl Into<String>, vector: Vec<f32>, limit: usize) -> Self {
        Self {
            text: text.into(),
            vector,
            limit,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_sparse(mut self, sparse: SparseVector) -> Self {
        self.sparse = Some(sparse);
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub const fn with_min_quality(mut self, threshold: f64) -> Self {
        self.min_quality = Some(threshold);
        self
    }
}

/// Results capped at the request limit, plus how each path took part.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub report: DispatchReport,
}

/// Collects collaborators and validates an [`EngineConfig`] into a
/// [`HybridSearchEngine`].
pub struct EngineBuilder {
    config: EngineConfig,
    vector_index: Arc<dyn VectorIndex>,
    text_index: Option<Arc<dyn TextIndex>>,
    sparse_index: Option<Arc<dyn SparseIndex>>,
    reranker: Option<Arc<dyn Reranker>>,
    sparse_scoring: SparseScoring,
}

impl EngineBuilder {
    #[must_use]
    pub fn new(config: EngineConfig, vector_index: Arc<dyn VectorIndex>) -> Self {
        Self {
            config,
            vector_index,
            text_index: None,
            sparse_index: None,
            reranker: None,
            sparse_scoring: sparse_inner_product_similarity,
        }
    }

    #[must_use]
    pub fn with_text_index(mut self, index: Arc<dyn TextIndex>) -> Self {
        self.text_index = Some(index);
        self
    }

    #[must_use]
    pub fn with_sparse_index(mut self, index: Arc<dyn SparseIndex>) -> Self {
        self.sparse_index = Some(index);
        self
    }

    #[must_use]
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Replace the sparse similarity mapping.
    #[must_use]
    pub fn sparse_scoring(mut self, scoring: SparseScoring) -> Self {
        self.sparse_scoring = scoring;
        self
    }

    /// Validate the configuration and assemble the engine.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unsupported metric or text parser, a
    /// missing vector dimension, invalid weights or `rrf_k`, or an enabled
    /// path without its index.
    pub fn build(self) -> Result<HybridSearchEngine, ConfigError> {
        let Self {
            config,
            vector_index,
            text_index,
            sparse_index,
            reranker,
            sparse_scoring,
        } = self;

        let metric = MetricType::from_str(&config.metric)?;
        let dimension = match config.vector_dimension {
            Some(d) if d > 0 => d,
            _ => return Err(ConfigError::MissingVectorDimension),
        };
        config.weights.validate()?;
        if config.rrf_k == 0 {
            return Err(ConfigError::InvalidRrfK);
        }

        let full_text = if config.full_text {
            let index = text_index.ok_or(ConfigError::MissingTextIndex)?;
            if let Some(parser) = config.text_parser.as_deref() {
                if !index.supports_parser(parser) {
                    return Err(ConfigError::UnsupportedTextParser(parser.to_string()));
                }
            }
            Some(FullTextSearchPath::new(index, config.text_parser.clone()))
        } else {
            None
        };

        let sparse = if config.sparse {
            let index = sparse_index.ok_or(ConfigError::MissingSparseIndex)?;
            Some(SparseSearchPath::new(index, sparse_scoring))
        } else {
            None
        };

        let method = FusionMethod::from_name(&config.fusion_method);
        info!(
            %metric,
            dimension,
            %method,
            full_text = config.full_text,
            sparse = config.sparse,
            rerank = reranker.is_some(),
            "hybrid search engine ready"
        );

        Ok(HybridSearchEngine {
            dispatcher: PathDispatcher::new(
                VectorSearchPath::new(vector_index, metric, dimension),
                full_text,
                sparse,
            ),
            fusion: FusionEngine::new(method, config.weights, config.rrf_k),
            quality: QualityScorer::new(config.weights),
            reranker,
            rerank_multiplier: config.rerank_candidate_multiplier.max(1),
            max_limit: config.max_limit,
            metric,
        })
    }
}

/// Fuses dense, full-text and sparse retrieval into one ranked list.
///
/// Settings are fixed at construction; [`HybridSearchEngine::search`] takes
/// `&self` and keeps no state between calls, so one engine can serve
/// concurrent queries.
pub struct HybridSearchEngine {
    dispatcher: PathDispatcher,
    fusion: FusionEngine,
    quality: QualityScorer,
    reranker: Option<Arc<dyn Reranker>>,
    rerank_multiplier: usize,
    max_limit: usize,
    metric: MetricType,
}

impl HybridSearchEngine {
    #[must_use]
    pub const fn metric(&self) -> MetricType {
        self.metric
    }

    #[must_use]
    pub const fn fusion(&self) -> &FusionEngine {
        &self.fusion
    }

    /// Per-path result cap for a (capped) request limit.
    #[must_use]
    pub fn candidate_limit(&self, limit: usize) -> usize {
        let limit = limit.min(self.max_limit);
        if self.reranker.is_some() {
            limit.saturating_mul(self.rerank_multiplier)
        } else {
            limit
        }
    }

    /// Run one hybrid query.
    ///
    /// Never fails: a failing path contributes nothing, a failing reranker
    /// leaves the fusion order in place. The response's report (and each
    /// result's `_fusion_info.paths`) shows what actually ran.
    #[must_use]
    #[instrument(skip_all, fields(limit = request.limit))]
    pub fn search(&self, request: &SearchRequest) -> SearchResponse {
        let limit = request.limit.min(self.max_limit);
        if limit == 0 {
            debug!("zero limit, nothing dispatched");
            return SearchResponse {
                results: Vec::new(),
                report: self.dispatcher.idle_report(),
            };
        }

        let candidate_limit = self.candidate_limit(limit);
        let query = PathQuery {
            text: &request.text,
            vector: &request.vector,
            sparse: request.sparse.as_ref(),
            filter: &request.filter,
            limit: candidate_limit,
        };
        let output = self.dispatcher.dispatch(&query);
        let report = output.report();

        let mut fused = self.fusion.fuse(output, candidate_limit);
        self.quality.annotate(&mut fused);
        if let Some(threshold) = request.min_quality {
            let before = fused.len();
            fused.retain(|result| result.quality_score().unwrap_or(0.0) >= threshold);
            debug!(threshold, dropped = before - fused.len(), "quality filter applied");
        }

        let results = match &self.reranker {
            Some(reranker) => {
                rerank_candidates(reranker.as_ref(), &request.text, fused, limit).into_results()
            }
            None => {
                fused.truncate(limit);
                fused
            }
        };

        debug!(
            results = results.len(),
            degraded = report.degraded(),
            "hybrid search complete"
        );
        SearchResponse { results, report }
    }
}
