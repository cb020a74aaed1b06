//! Sparse (token-weighted) vector path.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use super::{PathKind, SparseIndex, rank_rows};
use crate::filter::Filter;
use crate::normalize::{SparseScoring, sparse_similarity};
use crate::record::{SPARSE_SIMILARITY_KEY, SearchResult};

/// Token id to weight mapping, kept ordered by token id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SparseVector(BTreeMap<u32, f32>);

/// Errors parsing a sparse query literal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SparseLiteralError {
    #[error("sparse literal must look like {{id:weight,...}}/dim")]
    Shape,
    #[error("invalid sparse entry {0:?}")]
    Entry(String),
    #[error("invalid sparse dimension {0:?}")]
    Dimension(String),
}

impl SparseVector {
    #[must_use]
    pub const fn new(weights: BTreeMap<u32, f32>) -> Self {
        Self(weights)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.0.iter().map(|(&k, &v)| (k, v))
    }

    /// Inner product over shared token ids, and whether any id was shared.
    #[must_use]
    pub fn dot(&self, other: &Self) -> (f64, bool) {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        let mut sum = 0.0_f64;
        let mut overlap = false;
        for (token, weight) in small.iter() {
            if let Some(&w) = large.0.get(&token) {
                sum += f64::from(weight) * f64::from(w);
                overlap = true;
            }
        }
        (sum, overlap)
    }

    /// Serialize to the `{id:weight,...}/dim` query literal.
    #[must_use]
    pub fn to_literal(&self, dimension: usize) -> String {
        let mut out = String::from("{");
        for (idx, (token, weight)) in self.iter().enumerate() {
            if idx != 0 {
                out.push(',');
            }
            let _ = write!(out, "{token}:{weight}");
        }
        let _ = write!(out, "}}/{dimension}");
        out
    }

    /// Parse a literal produced by [`SparseVector::to_literal`].
    ///
    /// # Errors
    ///
    /// Returns [`SparseLiteralError`] on malformed input.
    pub fn parse_literal(literal: &str) -> Result<(Self, usize), SparseLiteralError> {
        let body = literal.trim();
        let (entries, dimension) = body.rsplit_once('/').ok_or(SparseLiteralError::Shape)?;
        let dimension = dimension
            .trim()
            .parse::<usize>()
            .map_err(|_| SparseLiteralError::Dimension(dimension.to_string()))?;
        let entries = entries
            .trim()
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or(SparseLiteralError::Shape)?;

        let mut weights = BTreeMap::new();
        for entry in entries.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let parsed = entry.split_once(':').and_then(|(k, v)| {
                Some((k.trim().parse::<u32>().ok()?, v.trim().parse::<f32>().ok()?))
            });
            let Some((token, weight)) = parsed else {
                return Err(SparseLiteralError::Entry(entry.to_string()));
            };
            weights.insert(token, weight);
        }
        Ok((Self(weights), dimension))
    }
}

impl FromIterator<(u32, f32)> for SparseVector {
    fn from_iter<I: IntoIterator<Item = (u32, f32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Issues one sparse inner-product query and annotates `_sparse_similarity`.
#[derive(Clone)]
pub struct SparseSearchPath {
    index: Arc<dyn SparseIndex>,
    scoring: SparseScoring,
}

impl SparseSearchPath {
    #[must_use]
    pub fn new(index: Arc<dyn SparseIndex>, scoring: SparseScoring) -> Self {
        Self { index, scoring }
    }

    /// Run the sparse query.
    ///
    /// # Errors
    ///
    /// Fails if the sparse primitive fails.
    pub fn search(
        &self,
        weights: &SparseVector,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let literal = self.index.encode_query(weights);
        let rows = self
            .index
            .sparse_search(&literal, filter, limit)
            .context("sparse query failed")?;
        let scoring = self.scoring;
        Ok(rank_rows(
            PathKind::Sparse,
            rows,
            SPARSE_SIMILARITY_KEY,
            |distance| sparse_similarity(scoring, distance),
        ))
    }
}
