//! Storage type inference from sample values.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ASCII digits only: `\d` would also accept other scripts' digits.
static DATE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}").expect("date prefix pattern is valid")
});

/// Canonical storage type for an imported field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalType {
    /// `true` / `false`.
    Boolean,
    /// Number without a fractional part.
    Integer,
    /// Number with a fractional part.
    Numeric,
    /// String starting with `YYYY-MM-DD`.
    Date,
    /// Short string (at most [`CanonicalType::VARCHAR_MAX_LEN`] characters).
    Varchar,
    /// Long string, or the fallback for missing samples.
    Text,
    /// Objects and arrays.
    Jsonb,
}

impl CanonicalType {
    /// Longest string stored as `varchar`.
    pub const VARCHAR_MAX_LEN: usize = 255;

    /// Returns the lowercase type name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Numeric => "numeric",
            Self::Date => "date",
            Self::Varchar => "varchar",
            Self::Text => "text",
            Self::Jsonb => "jsonb",
        }
    }
}

impl std::fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Infers the canonical storage type of a sample value.
///
/// Every value maps to exactly one type. A missing sample (`null`) maps to
/// `text` so that absent data never blocks an import.
#[must_use]
pub fn infer_type(value: &Value) -> CanonicalType {
    match value {
        Value::Null => CanonicalType::Text,
        Value::Bool(_) => CanonicalType::Boolean,
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                return CanonicalType::Integer;
            }
            match n.as_f64() {
                Some(f) if f.is_finite() && f.fract() == 0.0 => CanonicalType::Integer,
                Some(_) => CanonicalType::Numeric,
                None => CanonicalType::Text,
            }
        }
        Value::String(s) => {
            if DATE_PREFIX.is_match(s) {
                CanonicalType::Date
            } else if s.chars().count() <= CanonicalType::VARCHAR_MAX_LEN {
                CanonicalType::Varchar
            } else {
                CanonicalType::Text
            }
        }
        Value::Array(_) | Value::Object(_) => CanonicalType::Jsonb,
    }
}
