//! Final gating decision for an analysis.
//!
//! Rules are checked in a fixed order and the first match wins:
//! blocking failures, then approval triggers, then advisory failures.

use serde::{Deserialize, Serialize};

use crate::config::PlannerOptions;
use crate::operations::RiskTier;
use crate::pattern::ImportPattern;
use crate::plan::MigrationPlan;
use crate::safety::SafetyFinding;

/// Gating status of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// The plan can proceed.
    Success,
    /// The plan can proceed, but advisory checks failed.
    Warning,
    /// A human must approve the plan.
    RequiresApproval,
    /// A blocking check failed.
    Error,
}

/// Caller preferences carried on the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreferences {
    /// Mark safe plans as eligible for automatic execution.
    pub auto_apply_safe_migrations: bool,
    /// Recommend regenerating typed bindings for new tables.
    pub generate_typed_bindings: bool,
    /// Recommend renaming fields that don't follow naming conventions.
    pub enforce_naming_conventions: bool,
    /// Always require approval.
    pub require_manual_approval: bool,
}

/// Status and follow-up steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    /// Gating status.
    pub status: AnalysisStatus,
    /// Ordered human-readable next steps.
    pub next_steps: Vec<String>,
}

const APPROVAL_STEPS: [&str; 3] = [
    "Review the generated migration plan",
    "Approve or modify the proposed operations",
    "Execute the migration with monitoring enabled",
];

const WARNING_STEPS: [&str; 3] = [
    "Review the safety warnings",
    "Consider addressing the warnings before proceeding",
    "Proceed with caution if the warnings are acceptable",
];

const SUCCESS_STEPS: [&str; 3] = [
    "Review and approve the migration plan",
    "Execute the migration",
    "Import the data into the target tables",
];

fn steps(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Combines confidence, plan risk and findings into a status.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    approval_confidence: f64,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(&PlannerOptions::default())
    }
}

impl DecisionEngine {
    /// Creates a decision engine from planner options.
    #[must_use]
    pub fn new(options: &PlannerOptions) -> Self {
        Self {
            approval_confidence: options.approval_confidence,
        }
    }

    /// Decides the status of an analysis.
    #[must_use]
    pub fn decide(
        &self,
        patterns: &[ImportPattern],
        plan: &MigrationPlan,
        findings: &[SafetyFinding],
        preferences: &UserPreferences,
    ) -> Decision {
        let blocking: Vec<&SafetyFinding> = findings
            .iter()
            .filter(|f| f.is_blocking_failure())
            .collect();
        if !blocking.is_empty() {
            return Decision {
                status: AnalysisStatus::Error,
                next_steps: blocking
                    .iter()
                    .map(|f| format!("Fix: {}", f.description))
                    .collect(),
            };
        }

        let high_risk = plan
            .operations
            .iter()
            .any(|op| op.risk_tier == RiskTier::High);
        let low_confidence = patterns
            .iter()
            .any(|p| p.confidence_score < self.approval_confidence);
        if preferences.require_manual_approval || high_risk || low_confidence {
            return Decision {
                status: AnalysisStatus::RequiresApproval,
                next_steps: steps(&APPROVAL_STEPS),
            };
        }

        if findings.iter().any(|f| !f.passed) {
            return Decision {
                status: AnalysisStatus::Warning,
                next_steps: steps(&WARNING_STEPS),
            };
        }

        Decision {
            status: AnalysisStatus::Success,
            next_steps: steps(&SUCCESS_STEPS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::SafetyDimension;

    fn empty_plan() -> MigrationPlan {
        MigrationPlan {
            id: "p".to_string(),
            title: "t".to_string(),
            description: "d".to_string(),
            operations: Vec::new(),
            estimated_duration: "30 seconds".to_string(),
            backup_required: false,
        }
    }

    fn pattern(confidence: f64) -> ImportPattern {
        ImportPattern {
            target_table_name: "t".to_string(),
            is_new_table: false,
            confidence_score: confidence,
            field_mappings: Vec::new(),
            relationship_hints: Vec::new(),
            suggested_enhancements: Vec::new(),
        }
    }

    fn finding(passed: bool, blocking: bool) -> SafetyFinding {
        SafetyFinding {
            dimension: SafetyDimension::DataIntegrity,
            passed,
            description: "integrity".to_string(),
            warning: None,
            blocking,
        }
    }

    #[test]
    fn test_blocking_failure_wins() {
        let prefs = UserPreferences {
            require_manual_approval: true,
            ..UserPreferences::default()
        };
        let decision = DecisionEngine::default().decide(
            &[pattern(0.1)],
            &empty_plan(),
            &[finding(false, true), finding(false, false)],
            &prefs,
        );
        assert_eq!(decision.status, AnalysisStatus::Error);
        assert_eq!(decision.next_steps, vec!["Fix: integrity"]);
    }

    #[test]
    fn test_low_confidence_requires_approval() {
        let decision = DecisionEngine::default().decide(
            &[pattern(0.69)],
            &empty_plan(),
            &[finding(true, false)],
            &UserPreferences::default(),
        );
        assert_eq!(decision.status, AnalysisStatus::RequiresApproval);
        assert_eq!(decision.next_steps.len(), 3);
    }

    #[test]
    fn test_preference_requires_approval() {
        let prefs = UserPreferences {
            require_manual_approval: true,
            ..UserPreferences::default()
        };
        let decision =
            DecisionEngine::default().decide(&[pattern(1.0)], &empty_plan(), &[], &prefs);
        assert_eq!(decision.status, AnalysisStatus::RequiresApproval);
    }

    #[test]
    fn test_advisory_failure_warns() {
        let decision = DecisionEngine::default().decide(
            &[pattern(0.9)],
            &empty_plan(),
            &[finding(false, false)],
            &UserPreferences::default(),
        );
        assert_eq!(decision.status, AnalysisStatus::Warning);
    }

    #[test]
    fn test_clean_analysis_succeeds() {
        let decision = DecisionEngine::default().decide(
            &[pattern(0.7)],
            &empty_plan(),
            &[finding(true, false)],
            &UserPreferences::default(),
        );
        assert_eq!(decision.status, AnalysisStatus::Success);
        assert_eq!(decision.next_steps[1], "Execute the migration");
    }

    #[test]
    fn test_preferences_from_json() {
        let prefs: UserPreferences =
            serde_json::from_str(r#"{"requireManualApproval": true}"#).unwrap();
        assert!(prefs.require_manual_approval);
        assert!(!prefs.auto_apply_safe_migrations);
    }
}
