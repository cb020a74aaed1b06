//! Metadata filter predicate shared by every search path.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A conjunction of metadata equality conditions.
///
/// The engine never evaluates the filter itself; it hands the same filter to
/// each path so storage can apply it before ranking. [`Filter::matches`] is
/// provided for collaborators that filter in process.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter {
    equals: BTreeMap<String, Value>,
}

impl Filter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `metadata[field] == value`.
    #[must_use]
    pub fn field_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.insert(field.into(), value.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.equals.is_empty()
    }

    /// Conditions in field order.
    pub fn conditions(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.equals.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether `metadata` satisfies every condition.
    #[must_use]
    pub fn matches(&self, metadata: &Map<String, Value>) -> bool {
        self.equals
            .iter()
            .all(|(field, expected)| metadata.get(field).is_some_and(|v| values_equal(v, expected)))
    }
}

// Integers and floats that denote the same number compare equal.
fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
            _ => a == b,
        },
        _ => actual == expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::new().matches(&Map::new()));
        assert!(Filter::new().is_empty());
    }

    #[test]
    fn all_conditions_must_hold() {
        let filter = Filter::new().field_eq("user_id", "alice").field_eq("agent", "planner");
        assert!(filter.matches(&metadata(json!({"user_id": "alice", "agent": "planner", "x": 1}))));
        assert!(!filter.matches(&metadata(json!({"user_id": "alice"}))));
        assert!(!filter.matches(&metadata(json!({"user_id": "bob", "agent": "planner"}))));
    }

    #[test]
    fn numbers_compare_by_value() {
        let filter = Filter::new().field_eq("tier", 2);
        assert!(filter.matches(&metadata(json!({"tier": 2.0}))));
        assert!(!filter.matches(&metadata(json!({"tier": "2"}))));
    }

    #[test]
    fn conditions_iterate_in_field_order() {
        let filter = Filter::new().field_eq("b", 1).field_eq("a", 2);
        let fields: Vec<&str> = filter.conditions().map(|(k, _)| k).collect();
        assert_eq!(fields, vec!["a", "b"]);
    }
}
