//! Merging of the three path outputs into one fused, explained ranking.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use tracing::debug;

use super::scoring::{
    FusionMethod, FusionWeights, PathRank, adaptive_rrf_score, rrf_term, rrf_weighted_sum,
    weighted_score,
};
use crate::dispatch::{DispatchOutput, DispatchReport};
use crate::paths::{PathKind, PathOutput};
use crate::record::{
    DocId, FTS_SCORE_KEY, FUSION_INFO_KEY, FUSION_SCORE_KEY, SPARSE_SIMILARITY_KEY, SearchResult,
    VECTOR_SIMILARITY_KEY,
};
use crate::topk::BoundedTopK;

/// One path's part in a document's fused score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathContribution {
    pub rank: PathRank,
    /// Configured weight.
    pub weight: f64,
    /// Weight actually applied (renormalized under RRF).
    pub share: f64,
    pub similarity: Option<f64>,
    /// Term added to the fused score.
    pub contribution: f64,
}

/// Explanation stored under `_fusion_info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionInfo {
    pub method: FusionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rrf_k: Option<f64>,
    pub vector: PathContribution,
    pub fts: PathContribution,
    pub sparse: PathContribution,
    /// RRF sum with configured weights, before renormalization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub naive_score: Option<f64>,
    /// Sum of weights of the paths that found the document.
    pub active_weight: f64,
    /// Participation of each path in this query.
    pub paths: DispatchReport,
}

impl FusionInfo {
    #[must_use]
    pub const fn path(&self, kind: PathKind) -> &PathContribution {
        match kind {
            PathKind::Vector => &self.vector,
            PathKind::FullText => &self.fts,
            PathKind::Sparse => &self.sparse,
        }
    }
}

/// A document while paths are being merged.
#[derive(Debug, Clone)]
struct FusionCandidate {
    /// Result from the first path (vector, fts, sparse order) that found it.
    result: SearchResult,
    ranks: [PathRank; 3],
    similarities: [Option<f64>; 3],
    naive_score: Option<f64>,
    score: f64,
}

impl FusionCandidate {
    fn new(result: SearchResult) -> Self {
        Self {
            result,
            ranks: [PathRank::Absent; 3],
            similarities: [None; 3],
            naive_score: None,
            score: 0.0,
        }
    }

    fn active(&self) -> [bool; 3] {
        self.ranks.map(PathRank::is_present)
    }
}

/// Combines path outputs with a fixed method and weights.
#[derive(Debug, Clone, PartialEq)]
pub struct FusionEngine {
    method: FusionMethod,
    weights: FusionWeights,
    rrf_k: f64,
}

impl FusionEngine {
    #[must_use]
    pub fn new(method: FusionMethod, weights: FusionWeights, rrf_k: u32) -> Self {
        Self {
            method,
            weights,
            rrf_k: f64::from(rrf_k),
        }
    }

    #[must_use]
    pub const fn method(&self) -> FusionMethod {
        self.method
    }

    #[must_use]
    pub const fn weights(&self) -> &FusionWeights {
        &self.weights
    }

    /// Fuse the dispatcher's output into at most `candidate_limit` results,
    /// best-first, each annotated with `_fusion_score` and `_fusion_info`.
    ///
    /// Only documents returned by at least one path appear. Equal scores are
    /// ordered by ascending id.
    #[must_use]
    pub fn fuse(&self, output: DispatchOutput, candidate_limit: usize) -> Vec<SearchResult> {
        let report = output.report();
        let mut candidates = BTreeMap::new();
        for (idx, path) in [output.vector, output.full_text, output.sparse]
            .into_iter()
            .enumerate()
        {
            merge_path(&mut candidates, idx, path);
        }

        match self.method {
            FusionMethod::Rrf => {
                for candidate in candidates.values_mut() {
                    candidate.naive_score =
                        Some(rrf_weighted_sum(candidate.ranks, &self.weights, self.rrf_k));
                }
                // Must run after every path is merged and before selection.
                self.renormalize(&mut candidates);
            }
            FusionMethod::Weighted => {
                for candidate in candidates.values_mut() {
                    candidate.score = weighted_score(candidate.similarities, &self.weights);
                }
            }
        }

        let total = candidates.len();
        let mut topk = BoundedTopK::new(candidate_limit);
        for (id, candidate) in candidates {
            topk.push(candidate.score, id, candidate);
        }

        let fused: Vec<SearchResult> = topk
            .into_sorted_vec()
            .into_iter()
            .map(|(_, _, candidate)| self.annotate(candidate, &report))
            .collect();

        debug!(
            method = %self.method,
            candidates = total,
            kept = fused.len(),
            "fusion complete"
        );
        fused
    }

    fn renormalize(&self, candidates: &mut BTreeMap<DocId, FusionCandidate>) {
        for candidate in candidates.values_mut() {
            candidate.score = adaptive_rrf_score(candidate.ranks, &self.weights, self.rrf_k);
        }
    }

    fn annotate(&self, candidate: FusionCandidate, report: &DispatchReport) -> SearchResult {
        let FusionCandidate {
            mut result,
            ranks,
            similarities,
            naive_score,
            score,
        } = candidate;
        let active = ranks.map(PathRank::is_present);
        let shares = match self.method {
            FusionMethod::Rrf => self.weights.active_shares(active),
            FusionMethod::Weighted => PathKind::ALL.map(|kind| self.weights.weight(kind)),
        };

        let contribution = |idx: usize| {
            let kind = PathKind::ALL[idx];
            let share = if ranks[idx].is_present() { shares[idx] } else { 0.0 };
            let term = match self.method {
                FusionMethod::Rrf => share * rrf_term(ranks[idx], self.rrf_k),
                FusionMethod::Weighted => share * similarities[idx].unwrap_or(0.0),
            };
            PathContribution {
                rank: ranks[idx],
                weight: self.weights.weight(kind),
                share,
                similarity: similarities[idx],
                contribution: term,
            }
        };

        let info = FusionInfo {
            method: self.method,
            rrf_k: (self.method == FusionMethod::Rrf).then_some(self.rrf_k),
            vector: contribution(0),
            fts: contribution(1),
            sparse: contribution(2),
            naive_score,
            active_weight: self.weights.active_total(active),
            paths: report.clone(),
        };

        result.score = score;
        result.set_payload_f64(FUSION_SCORE_KEY, score);
        if let Ok(value) = serde_json::to_value(&info) {
            result.payload.insert(FUSION_INFO_KEY.to_string(), value);
        }
        result
    }
}

const SIMILARITY_KEYS: [&str; 3] = [VECTOR_SIMILARITY_KEY, FTS_SCORE_KEY, SPARSE_SIMILARITY_KEY];

fn merge_path(candidates: &mut BTreeMap<DocId, FusionCandidate>, idx: usize, path: PathOutput) {
    let key = SIMILARITY_KEYS[idx];
    for (position, result) in path.results.into_iter().enumerate() {
        let similarity = result.payload_f64(key).unwrap_or(result.score);
        let candidate = match candidates.entry(result.id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(FusionCandidate::new(result)),
        };
        if candidate.ranks[idx].is_present() {
            // Paths already dedupe; keep the better rank if one slipped through.
            continue;
        }
        candidate.ranks[idx] = PathRank::Rank(position + 1);
        candidate.similarities[idx] = Some(similarity);
        candidate.result.set_payload_f64(key, similarity);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::PathStatus;
    use crate::record::RecordRow;

    fn path(kind: PathKind, hits: &[(DocId, f64)]) -> PathOutput {
        let key = SIMILARITY_KEYS[kind as usize];
        let results: Vec<_> = hits
            .iter()
            .map(|&(id, sim)| SearchResult::from_row(RecordRow::new(id, format!("doc {id}"), None), sim, key))
            .collect();
        PathOutput {
            kind,
            status: PathStatus::Completed { hits: results.len() },
            results,
        }
    }

    fn output(vector: &[(DocId, f64)], fts: &[(DocId, f64)], sparse: &[(DocId, f64)]) -> DispatchOutput {
        DispatchOutput {
            vector: path(PathKind::Vector, vector),
            full_text: path(PathKind::FullText, fts),
            sparse: path(PathKind::Sparse, sparse),
        }
    }

    fn ids(results: &[SearchResult]) -> Vec<DocId> {
        results.iter().map(|r| r.id).collect()
    }

    #[test]
    fn empty_paths_fuse_to_nothing() {
        let engine = FusionEngine::new(FusionMethod::Rrf, FusionWeights::default(), 60);
        assert!(engine.fuse(output(&[], &[], &[]), 10).is_empty());
    }

    #[test]
    fn rrf_records_ranks_and_scores() {
        let engine = FusionEngine::new(FusionMethod::Rrf, FusionWeights::new(0.5, 0.5, 0.0), 60);
        let fused = engine.fuse(output(&[(1, 0.9), (2, 0.8)], &[(2, 0.7)], &[]), 10);

        let two = fused.iter().find(|r| r.id == 2).unwrap();
        let info = two.fusion_info().unwrap();
        assert_eq!(info.method, FusionMethod::Rrf);
        assert_eq!(info.vector.rank, PathRank::Rank(2));
        assert_eq!(info.fts.rank, PathRank::Rank(1));
        assert_eq!(info.sparse.rank, PathRank::Absent);
        assert!((info.vector.share - 0.5).abs() < 1e-12);
        assert!((info.active_weight - 1.0).abs() < 1e-12);
        assert_eq!(two.fusion_score(), Some(two.score));
        assert_eq!(two.vector_similarity(), Some(0.8));
        assert_eq!(two.fts_score(), Some(0.7));
        assert!(two.sparse_similarity().is_none());
        assert_eq!(info.paths.sparse, PathStatus::Completed { hits: 0 });
    }

    #[test]
    fn naive_sum_is_kept_beside_the_renormalized_score() {
        let engine = FusionEngine::new(FusionMethod::Rrf, FusionWeights::new(0.5, 0.5, 0.0), 60);
        let fused = engine.fuse(output(&[(1, 0.9)], &[], &[]), 10);
        let info = fused[0].fusion_info().unwrap();
        assert!((info.naive_score.unwrap() - 0.5 / 61.0).abs() < 1e-12);
        assert!((fused[0].score - 1.0 / 61.0).abs() < 1e-12);

        let weighted = FusionEngine::new(FusionMethod::Weighted, FusionWeights::default(), 60);
        let fused = weighted.fuse(output(&[(1, 0.9)], &[], &[]), 10);
        assert!(fused[0].fusion_info().unwrap().naive_score.is_none());
    }

    #[test]
    fn unbounded_candidate_limit_keeps_every_document() {
        let engine = FusionEngine::new(FusionMethod::Rrf, FusionWeights::default(), 60);
        assert!(engine.fuse(output(&[], &[], &[]), usize::MAX).is_empty());
        let fused = engine.fuse(output(&[(1, 0.9), (2, 0.5)], &[(3, 0.4)], &[]), usize::MAX);
        assert_eq!(ids(&fused), vec![1, 3, 2]);
    }

    #[test]
    fn candidate_limit_bounds_output() {
        let engine = FusionEngine::new(FusionMethod::Rrf, FusionWeights::default(), 60);
        let vector: Vec<_> = (1..=20).map(|id| (id, 0.5)).collect();
        let fused = engine.fuse(output(&vector, &[], &[]), 5);
        assert_eq!(ids(&fused), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn equal_scores_order_by_id() {
        let engine = FusionEngine::new(FusionMethod::Rrf, FusionWeights::new(0.5, 0.5, 0.5), 60);
        // Each document is rank 1 on exactly one path.
        let fused = engine.fuse(output(&[(9, 0.4)], &[(3, 0.4)], &[(6, 0.4)]), 10);
        assert_eq!(ids(&fused), vec![3, 6, 9]);
    }

    #[test]
    fn weighted_fusion_uses_similarities_without_renormalizing() {
        let engine = FusionEngine::new(
            FusionMethod::Weighted,
            FusionWeights::new(0.5, 0.3, 0.2),
            60,
        );
        let fused = engine.fuse(output(&[(1, 0.9), (2, 0.4)], &[(2, 1.0)], &[]), 10);

        // 1: 0.5 * 0.9 = 0.45; 2: 0.5 * 0.4 + 0.3 * 1.0 = 0.5
        assert_eq!(ids(&fused), vec![2, 1]);
        assert!((fused[0].score - 0.5).abs() < 1e-12);
        assert!((fused[1].score - 0.45).abs() < 1e-12);
        let info = fused[1].fusion_info().unwrap();
        assert_eq!(info.method, FusionMethod::Weighted);
        assert!(info.rrf_k.is_none());
        assert!((info.vector.share - 0.5).abs() < 1e-12);
    }

    #[test]
    fn first_path_wins_the_record_other_paths_add_similarities() {
        let engine = FusionEngine::new(FusionMethod::Rrf, FusionWeights::default(), 60);
        let mut out = output(&[], &[(5, 0.6)], &[(5, 0.3)]);
        out.sparse.results[0]
            .payload
            .insert("text".into(), serde_json::json!("sparse copy"));
        let fused = engine.fuse(out, 10);
        assert_eq!(fused[0].text(), Some("doc 5"));
        assert_eq!(fused[0].fts_score(), Some(0.6));
        assert_eq!(fused[0].sparse_similarity(), Some(0.3));
    }
}
