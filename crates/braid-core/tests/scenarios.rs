//! End-to-end ranking scenarios through `HybridSearchEngine::search`.

#[path = "fixtures.rs"]
mod fixtures;

use braid_core::{
    EngineConfig, Filter, FusionMethod, FusionWeights, PathKind, PathRank, SearchRequest,
    SearchResult,
};
use fixtures::*;
use std::sync::Arc;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn by_id(results: &[SearchResult], id: i64) -> &SearchResult {
    results
        .iter()
        .find(|r| r.id == id)
        .unwrap_or_else(|| panic!("id {id} missing from results"))
}

// ---------------------------------------------------------------------------
// Fusion
// ---------------------------------------------------------------------------

/// Vector returns [1, 2, 3], full text returns [2, 4], equal weights, sparse
/// disabled.
///
/// With per-document renormalization a document seen by one path at rank 1
/// scores `1/61`, while document 2 (ranks 2 and 1) scores
/// `0.5/62 + 0.5/61`; it lands just below document 1 and above 3 and 4.
#[test]
fn single_path_top_hit_edges_out_document_found_by_both_paths() {
    let cfg = EngineConfig {
        weights: FusionWeights::new(0.5, 0.5, 0.0),
        ..config("l2")
    };
    let vectors = Rows(vec![row(1, 0.1), row(2, 0.2), row(3, 0.3)]);
    let texts = Rows(vec![row(2, 0.9), row(4, 0.6)]);
    let engine = builder(cfg, vectors, texts).build().expect("build engine");

    let results = engine
        .search(&SearchRequest::new("tea", query_vector(), 10))
        .results;
    let ids: Vec<i64> = results.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 4, 3]);

    assert!(close(by_id(&results, 1).score, 1.0 / 61.0));
    assert!(close(by_id(&results, 2).score, 0.5 / 62.0 + 0.5 / 61.0));
    assert!(close(by_id(&results, 4).score, 1.0 / 62.0));
    assert!(close(by_id(&results, 3).score, 1.0 / 63.0));

    let info = by_id(&results, 2).fusion_info().expect("fusion info");
    assert_eq!(info.method, FusionMethod::Rrf);
    assert_eq!(info.rrf_k, Some(60.0));
    assert_eq!(info.path(PathKind::Vector).rank, PathRank::Rank(2));
    assert_eq!(info.path(PathKind::FullText).rank, PathRank::Rank(1));
    assert_eq!(info.path(PathKind::Sparse).rank, PathRank::Absent);
    assert!(close(info.path(PathKind::Vector).share, 0.5));
    assert!(close(info.active_weight, 1.0));
}

#[test]
fn fusion_score_is_kept_in_payload() {
    let engine = builder(config("l2"), Rows(vec![row(1, 0.0)]), Rows(vec![row(1, 0.4)]))
        .build()
        .expect("build engine");
    let results = engine
        .search(&SearchRequest::new("tea", query_vector(), 1))
        .results;
    assert_eq!(results[0].fusion_score(), Some(results[0].score));
}

#[test]
fn weighted_fusion_uses_absolute_similarities() {
    let cfg = EngineConfig {
        fusion_method: "weighted".into(),
        ..config("l2")
    };
    // vector similarities 1.0 and 0.5; doc 2 also has fts 1.0
    let vectors = Rows(vec![row(1, 0.0), row(2, 1.0)]);
    let texts = Rows(vec![row(2, 1.0)]);
    let engine = builder(cfg, vectors, texts).build().expect("build engine");

    let results = engine
        .search(&SearchRequest::new("tea", query_vector(), 10))
        .results;
    // doc 1: 0.5 * 1.0 = 0.5, doc 2: 0.5 * 0.5 + 0.3 * 1.0 = 0.55
    let ids: Vec<i64> = results.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![2, 1]);
    assert!(close(results[0].score, 0.55));
    assert!(close(results[1].score, 0.5));
    assert_eq!(
        results[0].fusion_info().expect("fusion info").method,
        FusionMethod::Weighted
    );
}

#[test]
fn repeated_queries_are_byte_identical() {
    let vectors = Rows((1..=20).map(|id| row(id, (id % 4) as f64)).collect());
    let texts = Rows((10..=30).rev().map(|id| row(id, 0.5)).collect());
    let engine = builder(config("l2"), vectors, texts)
        .build()
        .expect("build engine");
    let request = SearchRequest::new("tea", query_vector(), 15);

    let first = serde_json::to_string(&engine.search(&request).results).expect("serialize");
    let second = serde_json::to_string(&engine.search(&request).results).expect("serialize");
    assert_eq!(first, second);
}

#[test]
fn filter_reaches_every_path() {
    let tagged = |id: i64, distance: f64, lang: &str| {
        let metadata = serde_json::json!({ "lang": lang });
        row(id, distance).with_metadata(metadata.as_object().cloned().expect("object"))
    };
    let cfg = EngineConfig {
        sparse: true,
        ..config("l2")
    };
    let vectors = Rows(vec![tagged(1, 0.1, "en"), tagged(2, 0.2, "de")]);
    let texts = Rows(vec![tagged(3, 0.9, "de"), tagged(4, 0.5, "en")]);
    let sparse = Rows(vec![tagged(5, -1.0, "en"), tagged(6, -2.0, "fr")]);
    let engine = builder(cfg, vectors, texts)
        .with_sparse_index(Arc::new(sparse))
        .build()
        .expect("build engine");

    let request = SearchRequest::new("tea", query_vector(), 10)
        .with_sparse([(5, 1.0)].into_iter().collect())
        .with_filter(Filter::new().field_eq("lang", "en"));
    let mut ids: Vec<i64> = engine.search(&request).results.iter().map(|r| r.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 4, 5]);
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

fn vector_similarities(metric: &str, distances: &[f64]) -> Vec<f64> {
    let rows = distances
        .iter()
        .enumerate()
        .map(|(idx, &d)| row(idx as i64 + 1, d))
        .collect();
    let engine = builder(config(metric), Rows(rows), Rows(vec![]))
        .build()
        .expect("build engine");
    let mut results = engine
        .search(&SearchRequest::new("", query_vector(), 10))
        .results;
    results.sort_by_key(|r| r.id);
    results
        .iter()
        .map(|r| r.vector_similarity().expect("vector similarity"))
        .collect()
}

#[test]
fn l2_distances_normalize() {
    let sims = vector_similarities("l2", &[0.0, 1.0]);
    assert!(close(sims[0], 1.0));
    assert!(close(sims[1], 0.5));
}

#[test]
fn cosine_distance_two_is_zero() {
    let sims = vector_similarities("cosine", &[2.0, 0.0]);
    assert!(close(sims[0], 0.0));
    assert!(close(sims[1], 1.0));
}

#[test]
fn negated_inner_product_normalizes() {
    let sims = vector_similarities("inner_product", &[-1.0]);
    assert!(close(sims[0], 1.0));
}

#[test]
fn sparse_inner_products_normalize() {
    let cfg = EngineConfig {
        sparse: true,
        ..config("l2")
    };
    // the primitive reports negated inner products: raw 2.0 and raw -1.0
    let sparse = Rows(vec![row(1, -2.0), row(2, 1.0)]);
    let engine = builder(cfg, Rows(vec![]), Rows(vec![]))
        .with_sparse_index(Arc::new(sparse))
        .build()
        .expect("build engine");

    let request = SearchRequest::new("", Vec::new(), 10).with_sparse([(5, 1.0)].into_iter().collect());
    let results = engine.search(&request).results;
    assert!(close(by_id(&results, 1).sparse_similarity().expect("sim"), 2.0 / 3.0));
    assert!(close(by_id(&results, 2).sparse_similarity().expect("sim"), 0.5));
}

#[test]
fn sparse_scoring_is_replaceable() {
    fn linear(negated: f64) -> f64 {
        -negated / 10.0
    }

    let cfg = EngineConfig {
        sparse: true,
        ..config("l2")
    };
    let engine = builder(cfg, Rows(vec![]), Rows(vec![]))
        .with_sparse_index(Arc::new(Rows(vec![row(1, -4.0)])))
        .sparse_scoring(linear)
        .build()
        .expect("build engine");

    let request = SearchRequest::new("", Vec::new(), 10).with_sparse([(5, 1.0)].into_iter().collect());
    let results = engine.search(&request).results;
    assert!(close(results[0].sparse_similarity().expect("sim"), 0.4));
}

#[test]
fn missing_distance_scores_zero_for_that_row_only() {
    let rows = Rows(vec![
        braid_core::RecordRow::new(1, "no distance", None),
        row(2, 0.0),
    ]);
    let engine = builder(config("l2"), rows, Rows(vec![]))
        .build()
        .expect("build engine");
    let results = engine
        .search(&SearchRequest::new("", query_vector(), 10))
        .results;
    assert_eq!(results.len(), 2);
    assert_eq!(by_id(&results, 1).vector_similarity(), Some(0.0));
    assert_eq!(by_id(&results, 2).vector_similarity(), Some(1.0));
}

// ---------------------------------------------------------------------------
// Quality
// ---------------------------------------------------------------------------

#[test]
fn single_path_quality_equals_path_similarity() {
    let vectors = Rows(vec![row(1, 0.25), row(2, 3.0)]);
    let texts = Rows(vec![row(3, 0.42)]);
    let engine = builder(config("l2"), vectors, texts)
        .build()
        .expect("build engine");
    let results = engine
        .search(&SearchRequest::new("tea", query_vector(), 10))
        .results;

    assert!(close(by_id(&results, 1).quality_score().expect("q"), 0.8));
    assert!(close(by_id(&results, 2).quality_score().expect("q"), 0.25));
    assert!(close(by_id(&results, 3).quality_score().expect("q"), 0.42));
}

#[test]
fn quality_threshold_never_sees_fusion_scores() {
    // every RRF score here is below 0.02; every quality score is 1.0
    let engine = builder(config("l2"), Rows(vec![row(1, 0.0), row(2, 0.0)]), Rows(vec![]))
        .build()
        .expect("build engine");
    let request = SearchRequest::new("", query_vector(), 10).with_min_quality(0.99);
    assert_eq!(engine.search(&request).results.len(), 2);
}
