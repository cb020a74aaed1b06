//! Fusion scoring: Reciprocal Rank Fusion with adaptive weight
//! renormalization, and weighted-similarity fusion.
//!
//! # Reciprocal Rank Fusion
//!
//! A document at 1-indexed rank `r` on a path contributes
//!
//! ```text
//! weight_path * 1 / (k + r)
//! ```
//!
//! and contributions from every path that found it are summed.
//!
//! # Adaptive renormalization
//!
//! Path participation is uneven: older records have no sparse vector, full
//! text may be switched off. A plain weighted sum therefore penalizes a
//! document that only one path could see, however well it ranked there. After
//! the per-path sums are accumulated, each document's score is recomputed
//! using only the weights of the paths that ranked it:
//!
//! ```text
//! score = sum over ranked paths of (weight_i / sum of ranked weights) * 1 / (k + rank_i)
//! ```
//!
//! If every ranking path has weight zero, those paths share equally.
//!
//! # Weighted fusion
//!
//! Selected by any `fusion_method` other than `rrf`:
//!
//! ```text
//! score = w_vector * vector_similarity + w_fts * fts_score + w_sparse * sparse_similarity
//! ```
//!
//! An absent path contributes 0 and nothing is renormalized; the terms are
//! already absolute `[0, 1]` similarities.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;
use crate::paths::PathKind;

/// Default RRF constant.
pub const DEFAULT_RRF_K: u32 = 60;

/// How path outputs are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionMethod {
    /// Rank-based Reciprocal Rank Fusion (default).
    Rrf,
    /// Weighted sum of normalized similarities.
    Weighted,
}

impl FusionMethod {
    /// `rrf` (any case) selects RRF; every other name selects weighted fusion.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("rrf") {
            Self::Rrf
        } else {
            Self::Weighted
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rrf => "rrf",
            Self::Weighted => "weighted",
        }
    }
}

impl fmt::Display for FusionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-path fusion weights, fixed for the lifetime of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    #[serde(default = "default_vector_weight")]
    pub vector: f64,
    #[serde(default = "default_fts_weight")]
    pub fts: f64,
    #[serde(default = "default_sparse_weight")]
    pub sparse: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            vector: default_vector_weight(),
            fts: default_fts_weight(),
            sparse: default_sparse_weight(),
        }
    }
}

const fn default_vector_weight() -> f64 {
    0.5
}

const fn default_fts_weight() -> f64 {
    0.3
}

const fn default_sparse_weight() -> f64 {
    0.2
}

impl FusionWeights {
    #[must_use]
    pub const fn new(vector: f64, fts: f64, sparse: f64) -> Self {
        Self { vector, fts, sparse }
    }

    #[must_use]
    pub const fn weight(&self, kind: PathKind) -> f64 {
        match kind {
            PathKind::Vector => self.vector,
            PathKind::FullText => self.fts,
            PathKind::Sparse => self.sparse,
        }
    }

    /// Reject negative or non-finite weights.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidWeight`] naming the first bad path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for kind in PathKind::ALL {
            let value = self.weight(kind);
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { path: kind, value });
            }
        }
        Ok(())
    }

    /// Effective share of each active path after renormalization.
    ///
    /// `active` lists the paths that found the document. Inactive paths get
    /// share 0. When the active weights sum to zero the active paths share
    /// equally.
    #[must_use]
    pub fn active_shares(&self, active: [bool; 3]) -> [f64; 3] {
        let count = active.iter().filter(|&&a| a).count();
        if count == 0 {
            return [0.0; 3];
        }
        let total: f64 = PathKind::ALL
            .iter()
            .zip(active)
            .filter(|&(_, a)| a)
            .map(|(&kind, _)| self.weight(kind))
            .sum();

        let mut shares = [0.0; 3];
        for (idx, &kind) in PathKind::ALL.iter().enumerate() {
            if !active[idx] {
                continue;
            }
            shares[idx] = if total > 0.0 {
                self.weight(kind) / total
            } else {
                1.0 / count as f64
            };
        }
        shares
    }

    /// Sum of the weights of the active paths.
    #[must_use]
    pub fn active_total(&self, active: [bool; 3]) -> f64 {
        PathKind::ALL
            .iter()
            .zip(active)
            .filter(|&(_, a)| a)
            .map(|(&kind, _)| self.weight(kind))
            .sum()
    }
}

/// A document's position on one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathRank {
    /// The path did not return the document.
    Absent,
    /// 1-indexed rank within the path's output.
    Rank(usize),
}

impl PathRank {
    #[must_use]
    pub const fn is_present(self) -> bool {
        matches!(self, Self::Rank(_))
    }

    #[must_use]
    pub const fn rank(self) -> Option<usize> {
        match self {
            Self::Absent => None,
            Self::Rank(r) => Some(r),
        }
    }
}

/// `1 / (k + rank)`; an absent rank contributes nothing.
#[must_use]
pub fn rrf_term(rank: PathRank, k: f64) -> f64 {
    match rank {
        PathRank::Absent => 0.0,
        PathRank::Rank(r) => 1.0 / (k + r as f64),
    }
}

/// Plain weighted RRF sum, before renormalization.
#[must_use]
pub fn rrf_weighted_sum(ranks: [PathRank; 3], weights: &FusionWeights, k: f64) -> f64 {
    PathKind::ALL
        .iter()
        .zip(ranks)
        .map(|(&kind, rank)| weights.weight(kind) * rrf_term(rank, k))
        .sum()
}

/// RRF score with weights renormalized over the paths that ranked the document.
#[must_use]
pub fn adaptive_rrf_score(ranks: [PathRank; 3], weights: &FusionWeights, k: f64) -> f64 {
    let shares = weights.active_shares(ranks.map(PathRank::is_present));
    ranks
        .iter()
        .zip(shares)
        .map(|(&rank, share)| share * rrf_term(rank, k))
        .sum()
}

/// Weighted similarity sum; absent paths contribute 0.
#[must_use]
pub fn weighted_score(similarities: [Option<f64>; 3], weights: &FusionWeights) -> f64 {
    PathKind::ALL
        .iter()
        .zip(similarities)
        .map(|(&kind, sim)| weights.weight(kind) * sim.unwrap_or(0.0))
        .sum()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
