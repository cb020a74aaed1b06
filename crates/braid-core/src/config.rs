use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::fusion::{DEFAULT_RRF_K, FusionWeights};

/// Engine settings, validated once by [`crate::EngineBuilder`].
///
/// ```toml
/// metric = "cosine"
/// vector_dimension = 384
/// text_parser = "porter"
/// sparse = true
///
/// [weights]
/// vector = 0.5
/// fts = 0.3
/// sparse = 0.2
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_metric")]
    pub metric: String,
    #[serde(default)]
    pub vector_dimension: Option<usize>,
    #[serde(default)]
    pub text_parser: Option<String>,
    #[serde(default = "default_true")]
    pub full_text: bool,
    #[serde(default)]
    pub sparse: bool,
    #[serde(default = "default_fusion_method")]
    pub fusion_method: String,
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,
    #[serde(default = "default_rerank_candidate_multiplier")]
    pub rerank_candidate_multiplier: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    #[serde(default)]
    pub weights: FusionWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            metric: default_metric(),
            vector_dimension: None,
            text_parser: None,
            full_text: default_true(),
            sparse: false,
            fusion_method: default_fusion_method(),
            rrf_k: default_rrf_k(),
            rerank_candidate_multiplier: default_rerank_candidate_multiplier(),
            max_limit: default_max_limit(),
            weights: FusionWeights::default(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            vector_dimension: Some(dimension),
            ..Self::default()
        }
    }
}

/// Load an engine config from a TOML file. A missing file yields defaults.
///
/// # Errors
///
/// Fails if the file exists but cannot be read or parsed.
pub fn load_engine_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        return Ok(EngineConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<EngineConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

const fn default_true() -> bool {
    true
}

fn default_metric() -> String {
    "cosine".to_string()
}

fn default_fusion_method() -> String {
    "rrf".to_string()
}

const fn default_rrf_k() -> u32 {
    DEFAULT_RRF_K
}

const fn default_rerank_candidate_multiplier() -> usize {
    3
}

const fn default_max_limit() -> usize {
    1000
}
