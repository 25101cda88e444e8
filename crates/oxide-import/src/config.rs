//! Tunable thresholds for the planner.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Options controlling matching, plan generation and safety scoring.
///
/// Missing keys in a JSON document fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerOptions {
    /// Minimum matcher score for an existing table to be a candidate.
    pub match_threshold: f64,
    /// Patterns below this confidence require approval.
    pub approval_confidence: f64,
    /// Patterns above this confidence count as high confidence in summaries.
    pub high_confidence: f64,
    /// Plans with more operations than this require a backup.
    pub backup_operation_threshold: usize,
    /// Fixed time allowance for any plan, in seconds.
    pub base_duration_secs: u64,
    /// Additional time allowance per operation, in seconds.
    pub per_operation_secs: u64,
    /// Identifier length limit of the target engine, in bytes.
    pub identifier_max_bytes: usize,
    /// Performance impact percentage at which the performance check fails.
    pub performance_impact_threshold: f64,
    /// Maximum number of existing-table candidates reported; `None` reports
    /// every candidate that clears the match threshold.
    pub max_candidates: Option<usize>,
    /// Column recording the owning principal of each row in new tables.
    pub owner_column: String,
    /// SQL expression yielding the current principal.
    pub principal_expression: String,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            match_threshold: 0.5,
            approval_confidence: 0.7,
            high_confidence: 0.8,
            backup_operation_threshold: 3,
            base_duration_secs: 30,
            per_operation_secs: 15,
            identifier_max_bytes: 63,
            performance_impact_threshold: 50.0,
            max_candidates: None,
            owner_column: "owner_id".to_string(),
            principal_expression: "current_user".to_string(),
        }
    }
}

impl PlannerOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the matcher threshold.
    #[must_use]
    pub fn with_match_threshold(mut self, threshold: f64) -> Self {
        self.match_threshold = threshold;
        self
    }

    /// Sets the maximum number of reported candidates.
    #[must_use]
    pub fn with_max_candidates(mut self, max: usize) -> Self {
        self.max_candidates = Some(max);
        self
    }

    /// Sets the identifier length limit.
    #[must_use]
    pub fn with_identifier_limit(mut self, bytes: usize) -> Self {
        self.identifier_max_bytes = bytes;
        self
    }

    /// Sets the owner column and principal expression used by access policies.
    #[must_use]
    pub fn with_owner(
        mut self,
        column: impl Into<String>,
        principal_expression: impl Into<String>,
    ) -> Self {
        self.owner_column = column.into();
        self.principal_expression = principal_expression.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = PlannerOptions::new();
        assert!((options.match_threshold - 0.5).abs() < f64::EPSILON);
        assert_eq!(options.backup_operation_threshold, 3);
        assert_eq!(options.identifier_max_bytes, 63);
        assert_eq!(options.max_candidates, None);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let options =
            PlannerOptions::from_json_str(r#"{"max_candidates": 1, "owner_column": "tenant"}"#)
                .unwrap();
        assert_eq!(options.max_candidates, Some(1));
        assert_eq!(options.owner_column, "tenant");
        assert_eq!(options.per_operation_secs, 15);
    }

    #[test]
    fn test_builder() {
        let options = PlannerOptions::new()
            .with_match_threshold(0.6)
            .with_owner("tenant_id", "current_setting('app.tenant')");
        assert!((options.match_threshold - 0.6).abs() < f64::EPSILON);
        assert_eq!(options.owner_column, "tenant_id");
    }
}
