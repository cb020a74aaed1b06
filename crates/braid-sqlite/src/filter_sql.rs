//! Metadata [`Filter`] to SQL.
//!
//! Each condition becomes one predicate over `records.metadata_json`, with the
//! JSON path and the expected value both bound as parameters. Predicates use
//! bare `?` placeholders; callers push [`WhereClause::params`] in the order the
//! clause appears in their statement.

use anyhow::{Result, bail};
use braid_core::Filter;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

/// A conjunction of predicates plus their bound values.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct WhereClause {
    predicates: Vec<String>,
    pub(crate) params: Vec<SqlValue>,
}

impl WhereClause {
    /// Translate `filter`.
    ///
    /// # Errors
    ///
    /// Fails for field names that cannot be expressed as a JSON path key.
    pub(crate) fn from_filter(filter: &Filter) -> Result<Self> {
        let mut clause = Self::default();
        for (field, expected) in filter.conditions() {
            if field.contains('"') {
                bail!("metadata filter field {field:?} contains a double quote");
            }
            let path = SqlValue::Text(format!("$.\"{field}\""));
            match expected {
                Value::Null => {
                    clause.push("json_type(metadata_json, ?) = 'null'", [path]);
                }
                Value::Bool(b) => {
                    let kind = if *b { "true" } else { "false" };
                    clause.push(
                        "json_type(metadata_json, ?) = ?",
                        [path, SqlValue::Text(kind.to_string())],
                    );
                }
                Value::Number(n) => {
                    let bound = n
                        .as_i64()
                        .map(SqlValue::Integer)
                        .or_else(|| n.as_f64().map(SqlValue::Real));
                    let Some(bound) = bound else {
                        bail!("metadata filter value {n} for {field:?} is out of range");
                    };
                    // json_type keeps `true` (stored as 1) from matching 1
                    clause.push(
                        "(json_type(metadata_json, ?) IN ('integer', 'real') AND json_extract(metadata_json, ?) = ?)",
                        [path.clone(), path, bound],
                    );
                }
                Value::String(s) => {
                    clause.push(
                        "(json_type(metadata_json, ?) = 'text' AND json_extract(metadata_json, ?) = ?)",
                        [path.clone(), path, SqlValue::Text(s.clone())],
                    );
                }
                Value::Array(_) | Value::Object(_) => {
                    clause.push(
                        "json_extract(metadata_json, ?) = json(?)",
                        [path, SqlValue::Text(expected.to_string())],
                    );
                }
            }
        }
        Ok(clause)
    }

    fn push<const N: usize>(&mut self, predicate: &str, params: [SqlValue; N]) {
        self.predicates.push(predicate.to_string());
        self.params.extend(params);
    }

    /// `AND`-joined predicates, or `1` when the filter is empty.
    #[must_use]
    pub(crate) fn sql(&self) -> String {
        if self.predicates.is_empty() {
            "1".to_string()
        } else {
            self.predicates.join(" AND ")
        }
    }
}
