//! Result records flowing through the pipeline.
//!
//! A [`SearchResult`] is created by a search path from a collaborator's
//! [`RecordRow`] and then annotated in place by each later stage. Its `score`
//! changes meaning along the way:
//!
//! | Stage        | `score` holds                         |
//! |--------------|---------------------------------------|
//! | search path  | normalized similarity in `[0, 1]`      |
//! | fusion       | fusion score (method-specific scale)  |
//! | rerank       | rerank model score                    |
//!
//! Everything needed to explain a ranking lives in the payload under the
//! underscore-prefixed keys below.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::fusion::FusionInfo;

/// Payload key for the normalized dense-vector similarity.
pub const VECTOR_SIMILARITY_KEY: &str = "_vector_similarity";
/// Payload key for the normalized full-text relevance.
pub const FTS_SCORE_KEY: &str = "_fts_score";
/// Payload key for the normalized sparse similarity.
pub const SPARSE_SIMILARITY_KEY: &str = "_sparse_similarity";
/// Payload key for the absolute quality score.
pub const QUALITY_SCORE_KEY: &str = "_quality_score";
/// Payload key for the score fusion ranked by.
pub const FUSION_SCORE_KEY: &str = "_fusion_score";
/// Payload key for the per-path fusion explanation.
pub const FUSION_INFO_KEY: &str = "_fusion_info";
/// Payload key for the reranker's score.
pub const RERANK_SCORE_KEY: &str = "_rerank_score";

/// Primary text field. The reranker sees only this field.
pub const TEXT_FIELD: &str = "text";
/// Record metadata object.
pub const METADATA_FIELD: &str = "metadata";

/// Document identifier.
pub type DocId = i64;

/// One row returned by a storage primitive.
///
/// `distance` is the primitive's native metric (a distance for ANN and sparse
/// search, a relevance for full text). `None` marks a row whose metric was
/// null or unavailable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordRow {
    pub id: DocId,
    pub text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Additional record fields (identifiers, timestamps) copied into the payload.
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub distance: Option<f64>,
}

impl RecordRow {
    #[must_use]
    pub fn new(id: DocId, text: impl Into<String>, distance: Option<f64>) -> Self {
        Self {
            id,
            text: text.into(),
            distance,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A ranked, annotated search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: DocId,
    pub score: f64,
    pub payload: Map<String, Value>,
}

impl SearchResult {
    /// Build a path-level result from a storage row and its normalized similarity.
    ///
    /// The similarity is written both to `score` and to `similarity_key`; the
    /// row's raw distance is left out of the payload entirely.
    #[must_use]
    pub fn from_row(row: RecordRow, similarity: f64, similarity_key: &str) -> Self {
        let mut payload = row.fields;
        payload.insert(TEXT_FIELD.to_string(), Value::String(row.text));
        payload.insert(METADATA_FIELD.to_string(), Value::Object(row.metadata));
        payload.insert(similarity_key.to_string(), json_number(similarity));
        Self {
            id: row.id,
            score: similarity,
            payload,
        }
    }

    /// The primary text field, if present.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.payload.get(TEXT_FIELD).and_then(Value::as_str)
    }

    /// Read a numeric payload entry.
    #[must_use]
    pub fn payload_f64(&self, key: &str) -> Option<f64> {
        self.payload.get(key).and_then(Value::as_f64)
    }

    pub fn set_payload_f64(&mut self, key: &str, value: f64) {
        self.payload.insert(key.to_string(), json_number(value));
    }

    #[must_use]
    pub fn vector_similarity(&self) -> Option<f64> {
        self.payload_f64(VECTOR_SIMILARITY_KEY)
    }

    #[must_use]
    pub fn fts_score(&self) -> Option<f64> {
        self.payload_f64(FTS_SCORE_KEY)
    }

    #[must_use]
    pub fn sparse_similarity(&self) -> Option<f64> {
        self.payload_f64(SPARSE_SIMILARITY_KEY)
    }

    #[must_use]
    pub fn quality_score(&self) -> Option<f64> {
        self.payload_f64(QUALITY_SCORE_KEY)
    }

    #[must_use]
    pub fn fusion_score(&self) -> Option<f64> {
        self.payload_f64(FUSION_SCORE_KEY)
    }

    #[must_use]
    pub fn rerank_score(&self) -> Option<f64> {
        self.payload_f64(RERANK_SCORE_KEY)
    }

    /// Decode `_fusion_info`, if fusion has run.
    #[must_use]
    pub fn fusion_info(&self) -> Option<FusionInfo> {
        self.payload
            .get(FUSION_INFO_KEY)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

/// Scores are always finite by the time they reach a payload; anything else
/// is stored as `0.0` rather than as JSON `null`.
pub(crate) fn json_number(value: f64) -> Value {
    serde_json::Number::from_f64(value).map_or_else(|| Value::from(0.0), Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_row_moves_text_metadata_and_fields_into_payload() {
        let mut fields = Map::new();
        fields.insert("created_at".into(), json!("2026-01-04T10:00:00Z"));
        let mut metadata = Map::new();
        metadata.insert("user_id".into(), json!("alice"));

        let row = RecordRow {
            id: 7,
            text: "likes green tea".into(),
            metadata,
            fields,
            distance: Some(0.25),
        };
        let result = SearchResult::from_row(row, 0.8, VECTOR_SIMILARITY_KEY);

        assert_eq!(result.id, 7);
        assert!((result.score - 0.8).abs() < 1e-12);
        assert_eq!(result.text(), Some("likes green tea"));
        assert_eq!(result.payload["metadata"]["user_id"], json!("alice"));
        assert_eq!(result.payload["created_at"], json!("2026-01-04T10:00:00Z"));
        assert_eq!(result.vector_similarity(), Some(0.8));
        assert!(result.fts_score().is_none());
    }

    #[test]
    fn non_finite_scores_are_stored_as_zero() {
        let mut result = SearchResult::from_row(RecordRow::new(1, "x", None), 0.0, FTS_SCORE_KEY);
        result.set_payload_f64(QUALITY_SCORE_KEY, f64::NAN);
        assert_eq!(result.quality_score(), Some(0.0));
    }
}
