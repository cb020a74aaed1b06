use braid_core::record::{FTS_SCORE_KEY, SPARSE_SIMILARITY_KEY, VECTOR_SIMILARITY_KEY};
use braid_core::{
    DispatchOutput, FusionEngine, FusionMethod, FusionWeights, PathKind, PathOutput, PathStatus,
    QualityScorer, RecordRow, SearchResult,
};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

const TIERS: [usize; 3] = [30, 300, 3_000];

/// Deterministic path output; ids are strided so the three paths overlap
/// partially.
fn synthetic_path(kind: PathKind, hits: usize, stride: i64, offset: i64) -> PathOutput {
    let key = match kind {
        PathKind::Vector => VECTOR_SIMILARITY_KEY,
        PathKind::FullText => FTS_SCORE_KEY,
        PathKind::Sparse => SPARSE_SIMILARITY_KEY,
    };
    let results: Vec<SearchResult> = (0..hits)
        .map(|idx| {
            let id = offset + stride * idx as i64;
            let sim = 1.0 / (1.0 + idx as f64 * 0.01);
            SearchResult::from_row(RecordRow::new(id, format!("synthetic {id}"), None), sim, key)
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

fn synthetic_dispatch(hits: usize) -> DispatchOutput {
    DispatchOutput {
        vector: synthetic_path(PathKind::Vector, hits, 1, 0),
        full_text: synthetic_path(PathKind::FullText, hits, 2, 0),
        sparse: synthetic_path(PathKind::Sparse, hits / 2, 3, 1),
    }
}

fn bench_fusion(c: &mut Criterion) {
    let mut group = c.benchmark_group("fusion.three_paths");
    let weights = FusionWeights::default();

    for hits in TIERS {
        let output = synthetic_dispatch(hits);
        let limit = (hits / 3).max(1);
        group.throughput(Throughput::Elements(hits as u64));

        for method in [FusionMethod::Rrf, FusionMethod::Weighted] {
            let engine = FusionEngine::new(method, weights, 60);
            group.bench_with_input(
                BenchmarkId::new(method.as_str(), hits),
                &output,
                |b, output| b.iter(|| black_box(engine.fuse(output.clone(), limit))),
            );
        }

        let scorer = QualityScorer::new(weights);
        let fused = FusionEngine::new(FusionMethod::Rrf, weights, 60).fuse(output, limit);
        group.bench_with_input(BenchmarkId::new("quality", hits), &fused, |b, fused| {
            b.iter(|| {
                let mut results = fused.clone();
                scorer.annotate(&mut results);
                black_box(results)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fusion);
criterion_main!(benches);
