//! The three retrieval paths and the storage primitives they call.
//!
//! Each path issues exactly one retrieval call (full text may add one
//! fallback call), normalizes the native metric of every row into a `[0, 1]`
//! similarity and returns a best-first list with unique ids. Storage is
//! reached only through the traits in this module.

mod fulltext;
mod sparse;
mod vector;

pub use fulltext::{FullTextSearchPath, TextSearchOutcome};
pub use sparse::{SparseLiteralError, SparseSearchPath, SparseVector};
pub use vector::VectorSearchPath;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

use crate::filter::Filter;
use crate::normalize::MetricType;
use crate::record::{RecordRow, SearchResult};

/// Identifies one of the three retrieval paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PathKind {
    #[serde(rename = "vector")]
    Vector,
    #[serde(rename = "fts")]
    FullText,
    #[serde(rename = "sparse")]
    Sparse,
}

impl PathKind {
    pub const ALL: [Self; 3] = [Self::Vector, Self::FullText, Self::Sparse];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::FullText => "fts",
            Self::Sparse => "sparse",
        }
    }
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dense approximate-nearest-neighbour primitive.
///
/// Returns rows best-first with `distance` in the native convention of
/// `metric` (see [`MetricType`]).
pub trait VectorIndex: Send + Sync {
    fn ann_search(
        &self,
        query: &[f32],
        metric: MetricType,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<RecordRow>>;
}

/// Lexical primitives: relevance-scored matching plus a substring fallback.
pub trait TextIndex: Send + Sync {
    /// Whether `parser` names a text-search parser this index understands.
    fn supports_parser(&self, parser: &str) -> bool;

    /// Relevance-ranked match. `distance` carries the relevance in `[0, 1]`.
    fn relevance_search(
        &self,
        query: &str,
        parser: Option<&str>,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<RecordRow>>;

    /// Plain substring match, used when relevance search is unavailable.
    fn substring_search(&self, query: &str, filter: &Filter, limit: usize)
    -> Result<Vec<RecordRow>>;
}

/// Sparse-vector primitive. Rows carry the negated inner product.
pub trait SparseIndex: Send + Sync {
    /// Vocabulary size used when serializing query literals.
    fn dimension(&self) -> usize;

    /// Serialize query weights into this index's query literal.
    fn encode_query(&self, weights: &SparseVector) -> String {
        weights.to_literal(self.dimension())
    }

    fn sparse_search(&self, literal: &str, filter: &Filter, limit: usize)
    -> Result<Vec<RecordRow>>;
}

/// How a path took part in one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PathStatus {
    /// The primary retrieval call succeeded.
    Completed { hits: usize },
    /// Full text fell back to substring matching; every hit scores 1.0.
    Fallback { hits: usize },
    /// The path raised or panicked and contributes no results.
    Failed { error: String },
    /// Disabled by configuration.
    Disabled,
    /// The caller supplied nothing for this path to search with.
    NoQuery,
}

impl PathStatus {
    /// Whether the path produced a (possibly empty) result list.
    #[must_use]
    pub const fn participated(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Fallback { .. })
    }

    #[must_use]
    pub const fn hits(&self) -> usize {
        match self {
            Self::Completed { hits } | Self::Fallback { hits } => *hits,
            _ => 0,
        }
    }
}

/// Results and status of one path for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct PathOutput {
    pub kind: PathKind,
    pub results: Vec<SearchResult>,
    pub status: PathStatus,
}

impl PathOutput {
    #[must_use]
    pub fn skipped(kind: PathKind, status: PathStatus) -> Self {
        Self {
            kind,
            results: Vec::new(),
            status,
        }
    }
}

/// Turn storage rows into a best-first result list.
///
/// Keeps the collaborator's order, drops repeated ids (first occurrence wins)
/// and stores each row's similarity under `similarity_key`.
pub(crate) fn rank_rows(
    kind: PathKind,
    rows: Vec<RecordRow>,
    similarity_key: &str,
    similarity: impl Fn(Option<f64>) -> f64,
) -> Vec<SearchResult> {
    let mut seen = HashSet::with_capacity(rows.len());
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        if !seen.insert(row.id) {
            debug!(path = %kind, id = row.id, "dropping duplicate id from path output");
            continue;
        }
        if row.distance.is_none_or(|d| !d.is_finite()) {
            debug!(path = %kind, id = row.id, "row has no usable distance; similarity 0.0");
        }
        let score = similarity(row.distance);
        out.push(SearchResult::from_row(row, score, similarity_key));
    }
    out
}
