//! Lexical full-text path with an explicit substring fallback.
//!
//! When the relevance primitive fails (missing index, unsupported syntax) the
//! path retries once with a substring match and gives every hit a constant
//! score of [`SUBSTRING_MATCH_SCORE`]. This loses relevance ordering; the
//! caller sees it as [`TextSearchOutcome::Substring`].

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::warn;

use super::{PathKind, TextIndex, rank_rows};
use crate::filter::Filter;
use crate::normalize::{SUBSTRING_MATCH_SCORE, text_relevance};
use crate::record::{FTS_SCORE_KEY, SearchResult};

/// Which primitive produced the full-text results.
#[derive(Debug, Clone, PartialEq)]
pub enum TextSearchOutcome {
    Ranked(Vec<SearchResult>),
    Substring(Vec<SearchResult>),
}

impl TextSearchOutcome {
    #[must_use]
    pub fn into_results(self) -> Vec<SearchResult> {
        match self {
            Self::Ranked(results) | Self::Substring(results) => results,
        }
    }

    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Substring(_))
    }
}

#[derive(Clone)]
pub struct FullTextSearchPath {
    index: Arc<dyn TextIndex>,
    parser: Option<String>,
}

impl FullTextSearchPath {
    #[must_use]
    pub fn new(index: Arc<dyn TextIndex>, parser: Option<String>) -> Self {
        Self { index, parser }
    }

    /// Run relevance search, falling back to substring matching.
    ///
    /// # Errors
    ///
    /// Fails only when both the relevance and the substring primitive fail.
    pub fn search(&self, query: &str, filter: &Filter, limit: usize) -> Result<TextSearchOutcome> {
        match self
            .index
            .relevance_search(query, self.parser.as_deref(), filter, limit)
        {
            Ok(rows) => Ok(TextSearchOutcome::Ranked(rank_rows(
                PathKind::FullText,
                rows,
                FTS_SCORE_KEY,
                text_relevance,
            ))),
            Err(err) => {
                warn!("full-text relevance search unavailable, falling back to substring match: {err:#}");
                let rows = self
                    .index
                    .substring_search(query, filter, limit)
                    .context("substring fallback failed")?;
                Ok(TextSearchOutcome::Substring(rank_rows(
                    PathKind::FullText,
                    rows,
                    FTS_SCORE_KEY,
                    |_| SUBSTRING_MATCH_SCORE,
                )))
            }
        }
    }
}
