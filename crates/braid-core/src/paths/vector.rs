//! Dense vector similarity path.

use anyhow::{Context, Result, bail};
use std::sync::Arc;

use super::{PathKind, VectorIndex, rank_rows};
use crate::filter::Filter;
use crate::normalize::MetricType;
use crate::record::{SearchResult, VECTOR_SIMILARITY_KEY};

/// Issues one ANN query and annotates `_vector_similarity`.
#[derive(Clone)]
pub struct VectorSearchPath {
    index: Arc<dyn VectorIndex>,
    metric: MetricType,
    dimension: usize,
}

impl VectorSearchPath {
    #[must_use]
    pub fn new(index: Arc<dyn VectorIndex>, metric: MetricType, dimension: usize) -> Self {
        Self {
            index,
            metric,
            dimension,
        }
    }

    #[must_use]
    pub const fn metric(&self) -> MetricType {
        self.metric
    }

    /// Run the ANN query.
    ///
    /// # Errors
    ///
    /// Fails if the query vector has the wrong dimension or the index call
    /// fails. Rows with unusable distances do not fail the path.
    pub fn search(&self, query: &[f32], filter: &Filter, limit: usize) -> Result<Vec<SearchResult>> {
        if query.len() != self.dimension {
            bail!(
                "query vector dimension mismatch: expected {}, got {}",
                self.dimension,
                query.len()
            );
        }

        let rows = self
            .index
            .ann_search(query, self.metric, filter, limit)
            .with_context(|| format!("{} ANN query failed", self.metric))?;

        let metric = self.metric;
        Ok(rank_rows(
            PathKind::Vector,
            rows,
            VECTOR_SIMILARITY_KEY,
            |distance| metric.similarity(distance),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordRow;
    use anyhow::anyhow;

    struct Fixed(Vec<RecordRow>);

    impl VectorIndex for Fixed {
        fn ann_search(
            &self,
            _query: &[f32],
            _metric: MetricType,
            _filter: &Filter,
            limit: usize,
        ) -> Result<Vec<RecordRow>> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }
    }

    struct Broken;

    impl VectorIndex for Broken {
        fn ann_search(&self, _: &[f32], _: MetricType, _: &Filter, _: usize) -> Result<Vec<RecordRow>> {
            Err(anyhow!("index offline"))
        }
    }

    #[test]
    fn normalizes_distances_per_metric() {
        let index = Arc::new(Fixed(vec![
            RecordRow::new(1, "a", Some(-1.0)),
            RecordRow::new(2, "b", Some(0.0)),
        ]));
        let path = VectorSearchPath::new(index, MetricType::InnerProduct, 2);
        let results = path.search(&[0.6, 0.8], &Filter::new(), 10).unwrap();

        assert_eq!(results[0].vector_similarity(), Some(1.0));
        assert_eq!(results[1].vector_similarity(), Some(0.5));
        assert!((results[0].score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_wrong_dimension() {
        let path = VectorSearchPath::new(Arc::new(Fixed(vec![])), MetricType::L2, 3);
        let err = path.search(&[1.0], &Filter::new(), 5).unwrap_err();
        assert!(err.to_string().contains("dimension mismatch"));
    }

    #[test]
    fn index_errors_carry_context() {
        let path = VectorSearchPath::new(Arc::new(Broken), MetricType::Cosine, 1);
        let err = path.search(&[1.0], &Filter::new(), 5).unwrap_err();
        assert!(format!("{err:#}").contains("cosine ANN query failed"));
        assert!(format!("{err:#}").contains("index offline"));
    }
}
