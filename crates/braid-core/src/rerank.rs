//! Optional reranking of fused candidates by an external relevance model.
//!
//! The model scores the top candidates against the query; results are then
//! sorted by that score and laid out with [`zigzag`], which puts the best
//! two at the two ends of the list and the weakest in the middle. A failing
//! model never fails the query: the fusion ranking is used instead.

use anyhow::{Result, bail};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::record::{FUSION_SCORE_KEY, RERANK_SCORE_KEY, SearchResult};
use crate::topk::best_first;

/// External relevance model.
pub trait Reranker: Send + Sync {
    /// Score `documents` against `query`, returning `(index, score)` pairs for
    /// at most `top_n` of them. Indices refer to positions in `documents`.
    ///
    /// # Errors
    ///
    /// Any model or transport failure.
    fn rerank(&self, query: &str, documents: &[String], top_n: usize) -> Result<Vec<(usize, f64)>>;
}

/// Outcome of the rerank stage.
#[derive(Debug, Clone, PartialEq)]
pub enum RerankOutcome {
    /// Model scores applied and zigzag placement done.
    Reranked(Vec<SearchResult>),
    /// The model failed; fusion order truncated to the limit.
    Fallback(Vec<SearchResult>),
}

impl RerankOutcome {
    #[must_use]
    pub fn into_results(self) -> Vec<SearchResult> {
        match self {
            Self::Reranked(results) | Self::Fallback(results) => results,
        }
    }

    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Alternate front/back placement of a best-first list.
///
/// Position 0 gets the best item, the last position the second best,
/// position 1 the third, the second-to-last the fourth, and so on.
/// `[A, B, C, D, E]` becomes `[A, C, E, D, B]`.
#[must_use]
pub fn zigzag<T>(sorted: Vec<T>) -> Vec<T> {
    let mut front = Vec::with_capacity(sorted.len().div_ceil(2));
    let mut back = Vec::with_capacity(sorted.len() / 2);
    for (idx, item) in sorted.into_iter().enumerate() {
        if idx % 2 == 0 {
            front.push(item);
        } else {
            back.push(item);
        }
    }
    front.extend(back.into_iter().rev());
    front
}

/// Rerank fused `candidates` (best-first) down to `limit` results.
///
/// Only each candidate's primary text is sent to the model. Reranked results
/// keep their fusion score under `_fusion_score`, carry the model score in
/// both `score` and `_rerank_score`, and are placed with [`zigzag`].
#[must_use]
pub fn rerank_candidates(
    reranker: &dyn Reranker,
    query: &str,
    candidates: Vec<SearchResult>,
    limit: usize,
) -> RerankOutcome {
    if candidates.is_empty() || limit == 0 {
        return RerankOutcome::Reranked(Vec::new());
    }

    let documents: Vec<String> = candidates
        .iter()
        .map(|result| result.text().unwrap_or_default().to_string())
        .collect();

    let scores = match reranker
        .rerank(query, &documents, limit)
        .and_then(|pairs| checked_pairs(pairs, candidates.len()))
    {
        Ok(scores) => scores,
        Err(e) => {
            warn!("rerank failed, falling back to fusion ranking: {e:#}");
            let mut fallback = candidates;
            fallback.truncate(limit);
            return RerankOutcome::Fallback(fallback);
        }
    };

    let mut slots: Vec<Option<SearchResult>> = candidates.into_iter().map(Some).collect();
    let mut reranked: Vec<SearchResult> = scores
        .into_iter()
        .filter_map(|(idx, score)| {
            let mut result = slots.get_mut(idx)?.take()?;
            if result.fusion_score().is_none() {
                let fused = result.score;
                result.set_payload_f64(FUSION_SCORE_KEY, fused);
            }
            result.score = score;
            result.set_payload_f64(RERANK_SCORE_KEY, score);
            Some(result)
        })
        .collect();

    reranked.sort_by(rerank_order);
    reranked.truncate(limit);
    debug!(reranked = reranked.len(), "rerank complete");
    RerankOutcome::Reranked(zigzag(reranked))
}

/// Reject model output that does not describe the candidate list.
fn checked_pairs(pairs: Vec<(usize, f64)>, candidates: usize) -> Result<Vec<(usize, f64)>> {
    if pairs.is_empty() {
        bail!("reranker returned no scores for {candidates} candidates");
    }
    let mut seen = BTreeSet::new();
    for &(idx, score) in &pairs {
        if idx >= candidates {
            bail!("reranker returned index {idx} for {candidates} candidates");
        }
        if !seen.insert(idx) {
            bail!("reranker returned index {idx} twice");
        }
        if !score.is_finite() {
            bail!("reranker returned non-finite score for index {idx}");
        }
    }
    Ok(pairs)
}

/// Rerank score descending, then ascending id.
fn rerank_order(a: &SearchResult, b: &SearchResult) -> Ordering {
    best_first((a.score, a.id), (b.score, b.id))
}
