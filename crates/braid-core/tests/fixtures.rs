//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use anyhow::{Result, bail};
use braid_core::{
    EngineBuilder, EngineConfig, Filter, MetricType, RecordRow, Reranker, SparseIndex, TextIndex,
    VectorIndex,
};
use std::sync::Arc;

pub const DIM: usize = 2;

pub fn query_vector() -> Vec<f32> {
    vec![1.0, 0.0]
}

pub fn row(id: i64, distance: f64) -> RecordRow {
    RecordRow::new(id, format!("document {id}"), Some(distance))
}

/// Returns its rows that pass the filter, in order, up to the limit.
pub struct Rows(pub Vec<RecordRow>);

impl Rows {
    pub fn take(&self, filter: &Filter, limit: usize) -> Vec<RecordRow> {
        self.0
            .iter()
            .filter(|row| filter.matches(&row.metadata))
            .take(limit)
            .cloned()
            .collect()
    }
}

impl VectorIndex for Rows {
    fn ann_search(&self, _: &[f32], _: MetricType, filter: &Filter, limit: usize) -> Result<Vec<RecordRow>> {
        Ok(self.take(filter, limit))
    }
}

impl TextIndex for Rows {
    fn supports_parser(&self, _: &str) -> bool {
        true
    }

    fn relevance_search(&self, _: &str, _: Option<&str>, filter: &Filter, limit: usize) -> Result<Vec<RecordRow>> {
        Ok(self.take(filter, limit))
    }

    fn substring_search(&self, _: &str, filter: &Filter, limit: usize) -> Result<Vec<RecordRow>> {
        Ok(self.take(filter, limit))
    }
}

impl SparseIndex for Rows {
    fn dimension(&self) -> usize {
        64
    }

    fn sparse_search(&self, _: &str, filter: &Filter, limit: usize) -> Result<Vec<RecordRow>> {
        Ok(self.take(filter, limit))
    }
}

/// Every primitive errors.
pub struct Broken;

impl VectorIndex for Broken {
    fn ann_search(&self, _: &[f32], _: MetricType, _: &Filter, _: usize) -> Result<Vec<RecordRow>> {
        bail!("vector index unavailable")
    }
}

impl TextIndex for Broken {
    fn supports_parser(&self, _: &str) -> bool {
        true
    }

    fn relevance_search(&self, _: &str, _: Option<&str>, _: &Filter, _: usize) -> Result<Vec<RecordRow>> {
        bail!("fts index unavailable")
    }

    fn substring_search(&self, _: &str, _: &Filter, _: usize) -> Result<Vec<RecordRow>> {
        bail!("substring scan unavailable")
    }
}

impl SparseIndex for Broken {
    fn dimension(&self) -> usize {
        64
    }

    fn sparse_search(&self, _: &str, _: &Filter, _: usize) -> Result<Vec<RecordRow>> {
        bail!("sparse index unavailable")
    }
}

/// Relevance search fails; substring search returns the rows with no score.
pub struct NoRelevance(pub Vec<i64>);

impl TextIndex for NoRelevance {
    fn supports_parser(&self, _: &str) -> bool {
        true
    }

    fn relevance_search(&self, _: &str, _: Option<&str>, _: &Filter, _: usize) -> Result<Vec<RecordRow>> {
        bail!("no such module: fts5")
    }

    fn substring_search(&self, _: &str, _: &Filter, limit: usize) -> Result<Vec<RecordRow>> {
        Ok(self
            .0
            .iter()
            .take(limit)
            .map(|&id| RecordRow::new(id, format!("document {id}"), None))
            .collect())
    }
}

/// Full-text rows panic.
pub struct Panics;

impl TextIndex for Panics {
    fn supports_parser(&self, _: &str) -> bool {
        true
    }

    fn relevance_search(&self, _: &str, _: Option<&str>, _: &Filter, _: usize) -> Result<Vec<RecordRow>> {
        panic!("tokenizer state corrupted")
    }

    fn substring_search(&self, _: &str, _: &Filter, _: usize) -> Result<Vec<RecordRow>> {
        panic!("tokenizer state corrupted")
    }
}

/// Scores documents by a fixed table keyed on document text.
pub struct ByText(pub Vec<(String, f64)>);

impl Reranker for ByText {
    fn rerank(&self, _: &str, documents: &[String], _: usize) -> Result<Vec<(usize, f64)>> {
        Ok(documents
            .iter()
            .enumerate()
            .map(|(idx, doc)| {
                let score = self
                    .0
                    .iter()
                    .find(|(text, _)| text == doc)
                    .map_or(0.0, |(_, s)| *s);
                (idx, score)
            })
            .collect())
    }
}

pub struct RerankerDown;

impl Reranker for RerankerDown {
    fn rerank(&self, _: &str, _: &[String], _: usize) -> Result<Vec<(usize, f64)>> {
        bail!("rerank endpoint returned 503")
    }
}

pub fn config(metric: &str) -> EngineConfig {
    EngineConfig {
        metric: metric.to_string(),
        ..EngineConfig::with_dimension(DIM)
    }
}

/// Builder with vector and full-text collaborators set.
pub fn builder(
    cfg: EngineConfig,
    vectors: impl VectorIndex + 'static,
    text: impl TextIndex + 'static,
) -> EngineBuilder {
    EngineBuilder::new(cfg, Arc::new(vectors)).with_text_index(Arc::new(text))
}
