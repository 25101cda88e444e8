//! Foreign-key heuristics based on field names.
//!
//! Detection is a substring test on the field name. Target suggestion walks an
//! ordered rule table; the first rule whose fragment appears in the field
//! name wins. No match means no suggestion.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name fragments that mark a field as a possible reference.
const KEY_FRAGMENTS: &[&str] = &["_id", "id", "_ref", "_key"];

/// Suggested referenced column for a foreign-key candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyTarget {
    /// Referenced table.
    pub table: String,
    /// Referenced column.
    pub column: String,
    /// Heuristic confidence (0.0 to 1.0).
    pub confidence: f64,
}

/// One entry of the target lookup table.
#[derive(Debug, Clone, Copy)]
pub struct KeyRule {
    /// Lowercase fragment that must appear in the field name.
    pub fragment: &'static str,
    /// Table the field most likely references.
    pub table: &'static str,
    /// Column the field most likely references.
    pub column: &'static str,
    /// Confidence assigned to the suggestion.
    pub confidence: f64,
}

impl KeyRule {
    fn matches(&self, field_name: &str) -> bool {
        field_name.contains(self.fragment)
    }

    fn target(&self) -> ForeignKeyTarget {
        ForeignKeyTarget {
            table: self.table.to_string(),
            column: self.column.to_string(),
            confidence: self.confidence,
        }
    }
}

/// Built-in lookup rules, checked in order.
pub const DEFAULT_KEY_RULES: &[KeyRule] = &[
    KeyRule {
        fragment: "user",
        table: "users",
        column: "id",
        confidence: 0.8,
    },
    KeyRule {
        fragment: "facility",
        table: "facilities",
        column: "id",
        confidence: 0.8,
    },
    KeyRule {
        fragment: "organization",
        table: "organizations",
        column: "id",
        confidence: 0.7,
    },
];

/// Returns true if the field looks like a reference to another table.
///
/// Only scalar strings and numbers qualify; structured values never do.
#[must_use]
pub fn is_foreign_key_candidate(field_name: &str, value: &Value) -> bool {
    if !matches!(value, Value::String(_) | Value::Number(_)) {
        return false;
    }
    let lowered = field_name.to_lowercase();
    KEY_FRAGMENTS.iter().any(|fragment| lowered.contains(fragment))
}

/// Suggests a referenced table/column using [`DEFAULT_KEY_RULES`].
#[must_use]
pub fn suggest_foreign_key_target(field_name: &str, value: &Value) -> Option<ForeignKeyTarget> {
    suggest_with_rules(DEFAULT_KEY_RULES, field_name, value)
}

/// Suggests a referenced table/column using a caller-provided rule table.
#[must_use]
pub fn suggest_with_rules(
    rules: &[KeyRule],
    field_name: &str,
    value: &Value,
) -> Option<ForeignKeyTarget> {
    if !is_foreign_key_candidate(field_name, value) {
        return None;
    }
    let lowered = field_name.to_lowercase();
    rules
        .iter()
        .find(|rule| rule.matches(&lowered))
        .map(KeyRule::target)
}
