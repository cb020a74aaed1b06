#![no_main]

use braid_core::record::{FTS_SCORE_KEY, SPARSE_SIMILARITY_KEY, VECTOR_SIMILARITY_KEY};
use braid_core::{
    DispatchOutput, FusionEngine, FusionMethod, FusionWeights, PathKind, PathOutput, PathStatus,
    QualityScorer, RecordRow, SearchResult,
};
use libfuzzer_sys::fuzz_target;

/// Bytes become (id, similarity) pairs; repeated ids and odd similarities are
/// allowed on purpose.
fn path(kind: PathKind, bytes: &[u8]) -> PathOutput {
    let key = match kind {
        PathKind::Vector => VECTOR_SIMILARITY_KEY,
        PathKind::FullText => FTS_SCORE_KEY,
        PathKind::Sparse => SPARSE_SIMILARITY_KEY,
    };
    let results: Vec<SearchResult> = bytes
        .chunks_exact(2)
        .map(|pair| {
            let id = i64::from(pair[0] % 32);
            let similarity = f64::from(pair[1]) / 200.0;
            SearchResult::from_row(RecordRow::new(id, "", None), similarity, key)
        })
        .collect();
    PathOutput {
        kind,
        status: PathStatus::Completed {
            hits: results.len(),
        },
        results,
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let weights = FusionWeights::new(
        f64::from(data[0]) / 255.0,
        f64::from(data[1]) / 255.0,
        f64::from(data[2]) / 255.0,
    );
    let limit = usize::from(data[3] % 40);
    let rest = &data[4..];
    let third = rest.len() / 3;
    let output = DispatchOutput {
        vector: path(PathKind::Vector, &rest[..third]),
        full_text: path(PathKind::FullText, &rest[third..2 * third]),
        sparse: path(PathKind::Sparse, &rest[2 * third..]),
    };

    let scorer = QualityScorer::new(weights);
    for method in [FusionMethod::Rrf, FusionMethod::Weighted] {
        let mut fused = FusionEngine::new(method, weights, 60).fuse(output.clone(), limit);
        assert!(fused.len() <= limit);
        scorer.annotate(&mut fused);
        for result in &fused {
            let quality = result.quality_score().unwrap_or_default();
            assert!((0.0..=1.0).contains(&quality));
        }
    }
});
