//! Absolute, path-agnostic retrieval confidence.
//!
//! The fusion score ranks documents but its scale depends on the method and
//! on `k`; it cannot be compared against a threshold. The quality score can:
//! it is a weight-renormalized mean of the per-path `[0, 1]` similarities of
//! the paths that actually found the document, so a document seen by one path
//! scores exactly that path's similarity.

use crate::fusion::FusionWeights;
use crate::paths::PathKind;
use crate::record::{
    FTS_SCORE_KEY, QUALITY_SCORE_KEY, SPARSE_SIMILARITY_KEY, SearchResult, VECTOR_SIMILARITY_KEY,
};

/// Quality over `similarities` (vector, fts, sparse); `None` marks an absent path.
///
/// Returns 0 when no path is active. Uses the same equal-share rule as RRF
/// when the active weights sum to zero.
#[must_use]
pub fn quality_score(weights: &FusionWeights, similarities: [Option<f64>; 3]) -> f64 {
    let active = similarities.map(|s| s.is_some());
    if !active.contains(&true) {
        return 0.0;
    }
    let shares = weights.active_shares(active);
    let quality: f64 = similarities
        .iter()
        .zip(shares)
        .map(|(sim, share)| sim.map_or(0.0, |s| share * s.clamp(0.0, 1.0)))
        .sum();
    if quality.is_finite() {
        quality.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Writes `_quality_score` onto fused results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityScorer {
    weights: FusionWeights,
}

impl QualityScorer {
    #[must_use]
    pub const fn new(weights: FusionWeights) -> Self {
        Self { weights }
    }

    /// Score one result from the per-path similarities in its payload.
    #[must_use]
    pub fn score(&self, result: &SearchResult) -> f64 {
        let similarities = PathKind::ALL.map(|kind| result.payload_f64(similarity_key(kind)));
        quality_score(&self.weights, similarities)
    }

    pub fn annotate(&self, results: &mut [SearchResult]) {
        for result in results {
            let quality = self.score(result);
            result.set_payload_f64(QUALITY_SCORE_KEY, quality);
        }
    }
}

const fn similarity_key(kind: PathKind) -> &'static str {
    match kind {
        PathKind::Vector => VECTOR_SIMILARITY_KEY,
        PathKind::FullText => FTS_SCORE_KEY,
        PathKind::Sparse => SPARSE_SIMILARITY_KEY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordRow;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn single_path_quality_equals_its_similarity() {
        let weights = FusionWeights::default();
        assert!(close(quality_score(&weights, [Some(0.73), None, None]), 0.73));
        assert!(close(quality_score(&weights, [None, Some(0.2), None]), 0.2));
        assert!(close(quality_score(&weights, [None, None, Some(0.9)]), 0.9));
    }

    #[test]
    fn no_active_path_is_zero() {
        assert!(close(quality_score(&FusionWeights::default(), [None; 3]), 0.0));
    }

    #[test]
    fn active_weights_are_renormalized() {
        let weights = FusionWeights::new(0.5, 0.3, 0.2);
        let q = quality_score(&weights, [Some(1.0), Some(0.0), None]);
        assert!(close(q, 0.5 / 0.8));
    }

    #[test]
    fn zero_weights_fall_back_to_mean() {
        let weights = FusionWeights::new(0.0, 0.0, 0.0);
        let q = quality_score(&weights, [Some(0.2), Some(0.6), None]);
        assert!(close(q, 0.4));
    }

    #[test]
    fn scorer_reads_payload_keys() {
        let scorer = QualityScorer::new(FusionWeights::new(0.5, 0.5, 0.0));
        let mut result = SearchResult::from_row(RecordRow::new(1, "a", None), 0.8, VECTOR_SIMILARITY_KEY);
        result.set_payload_f64(FTS_SCORE_KEY, 0.4);

        let mut results = vec![result];
        scorer.annotate(&mut results);
        assert!(close(results[0].quality_score().unwrap(), 0.6));
    }
}
