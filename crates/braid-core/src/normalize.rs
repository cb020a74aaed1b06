//! Conversion of each path's native metric into a `[0, 1]` similarity.
//!
//! Every search path reports "higher is better" similarities so that the
//! quality scorer and weighted fusion can combine them directly.
//!
//! | Source                 | Native value                    | Similarity                          |
//! |------------------------|---------------------------------|-------------------------------------|
//! | L2 distance `d`        | `0..inf`                        | `1 / (1 + d)`                       |
//! | cosine distance `d`    | `0..2`                          | `max(0, 1 - d/2)`                   |
//! | inner product `p`      | negated dot product             | `clamp((-p + 1) / 2, 0, 1)`         |
//! | full-text relevance    | already `[0, 1]`                | clamped as-is                       |
//! | sparse inner product   | negated dot product             | [`sparse_inner_product_similarity`] |
//!
//! A missing or non-finite value maps to `0.0` for that row only.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Distance metric reported by the dense vector primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    L2,
    Cosine,
    /// Negated inner product: the primitive returns `-(a · b)` so that
    /// ascending order is best-first.
    InnerProduct,
}

impl MetricType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::L2 => "l2",
            Self::Cosine => "cosine",
            Self::InnerProduct => "inner_product",
        }
    }

    /// Map a raw distance under this metric to a similarity in `[0, 1]`.
    #[must_use]
    pub fn similarity(self, distance: Option<f64>) -> f64 {
        let Some(d) = finite(distance) else {
            return 0.0;
        };
        match self {
            Self::L2 => l2_similarity(d),
            Self::Cosine => cosine_similarity(d),
            Self::InnerProduct => inner_product_similarity(d),
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l2" | "euclidean" => Ok(Self::L2),
            "cosine" => Ok(Self::Cosine),
            "inner_product" | "ip" | "dot" => Ok(Self::InnerProduct),
            _ => Err(ConfigError::UnsupportedMetric(s.to_string())),
        }
    }
}

/// `1 / (1 + d)`; negative distances are treated as zero.
#[must_use]
pub fn l2_similarity(distance: f64) -> f64 {
    1.0 / (1.0 + distance.max(0.0))
}

/// `max(0, 1 - d/2)` for cosine distance in `0..2`.
#[must_use]
pub fn cosine_similarity(distance: f64) -> f64 {
    (1.0 - distance / 2.0).clamp(0.0, 1.0)
}

/// Negated inner product to similarity. Valid for normalized vectors.
#[must_use]
pub fn inner_product_similarity(negated: f64) -> f64 {
    let raw = -negated;
    f64::midpoint(raw, 1.0).clamp(0.0, 1.0)
}

/// Full-text relevance is already a similarity; only clamp it.
#[must_use]
pub fn text_relevance(score: Option<f64>) -> f64 {
    finite(score).map_or(0.0, |s| s.clamp(0.0, 1.0))
}

/// Constant similarity assigned to every substring-fallback match.
pub const SUBSTRING_MATCH_SCORE: f64 = 1.0;

/// Similarity function applied to the sparse primitive's negated inner product.
pub type SparseScoring = fn(f64) -> f64;

/// Default sparse mapping over a negated inner product `p`.
///
/// With `ip = -p`: `ip / (1 + ip)` when `ip >= 0`, otherwise
/// `clamp(1 / (1 - ip), 0, 1)`. Anti-correlated matches keep a small
/// non-zero similarity so their relative order survives. The mapping jumps
/// from 0 to 1 at `ip = 0`; swap it via [`crate::EngineBuilder::sparse_scoring`].
#[must_use]
pub fn sparse_inner_product_similarity(negated: f64) -> f64 {
    let ip = -negated;
    if ip >= 0.0 {
        ip / (1.0 + ip)
    } else {
        (1.0 / (1.0 - ip)).clamp(0.0, 1.0)
    }
}

/// Apply a sparse scoring function with the shared null/non-finite rule.
#[must_use]
pub fn sparse_similarity(scoring: SparseScoring, distance: Option<f64>) -> f64 {
    finite(distance).map_or(0.0, |d| {
        let s = scoring(d);
        if s.is_finite() { s.clamp(0.0, 1.0) } else { 0.0 }
    })
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}
