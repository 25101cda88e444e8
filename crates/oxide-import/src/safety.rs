//! Safety checks over a built migration plan.
//!
//! Three independent checks always run. Only the data-integrity check can
//! block; the others are advisory. A check that cannot be scored reports a
//! non-blocking failure rather than a pass.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::PlannerOptions;
use crate::operations::{OperationKind, RiskTier};
use crate::plan::MigrationPlan;
use crate::schema::SchemaSnapshot;

/// Risk dimension a finding covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyDimension {
    /// Existing data and referential integrity.
    DataIntegrity,
    /// Load placed on the database.
    Performance,
    /// Access control on generated tables.
    Security,
}

/// Result of one safety check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyFinding {
    /// Dimension checked.
    pub dimension: SafetyDimension,
    /// Whether the check passed.
    pub passed: bool,
    /// What was checked.
    pub description: String,
    /// Explanation when the check failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Whether a failure forbids executing the plan.
    pub blocking: bool,
}

impl SafetyFinding {
    fn pass(dimension: SafetyDimension, description: impl Into<String>) -> Self {
        Self {
            dimension,
            passed: true,
            description: description.into(),
            warning: None,
            blocking: false,
        }
    }

    fn fail(
        dimension: SafetyDimension,
        description: impl Into<String>,
        warning: impl Into<String>,
        blocking: bool,
    ) -> Self {
        Self {
            dimension,
            passed: false,
            description: description.into(),
            warning: Some(warning.into()),
            blocking,
        }
    }

    /// Returns true for a failed, blocking finding.
    #[must_use]
    pub fn is_blocking_failure(&self) -> bool {
        self.blocking && !self.passed
    }
}

/// Evaluates plans against the safety dimensions.
#[derive(Debug, Clone)]
pub struct SafetyChecker {
    impact_threshold: f64,
}

impl Default for SafetyChecker {
    fn default() -> Self {
        Self::new(&PlannerOptions::default())
    }
}

impl SafetyChecker {
    /// Creates a checker from planner options.
    #[must_use]
    pub fn new(options: &PlannerOptions) -> Self {
        Self {
            impact_threshold: options.performance_impact_threshold,
        }
    }

    /// Runs every check against `plan`.
    #[must_use]
    pub fn check(&self, plan: &MigrationPlan, snapshot: &SchemaSnapshot) -> Vec<SafetyFinding> {
        let findings = vec![
            self.check_data_integrity(plan),
            self.check_performance(plan, snapshot),
            self.check_security(plan),
        ];
        for finding in findings.iter().filter(|f| !f.passed) {
            warn!(
                dimension = ?finding.dimension,
                blocking = finding.blocking,
                warning = finding.warning.as_deref().unwrap_or_default(),
                "Safety check failed"
            );
        }
        findings
    }

    fn check_data_integrity(&self, plan: &MigrationPlan) -> SafetyFinding {
        let description = "No high-risk operations that could corrupt existing data";
        let risky: Vec<&str> = plan
            .operations
            .iter()
            .filter(|op| op.risk_tier == RiskTier::High)
            .map(|op| op.id.as_str())
            .collect();

        if risky.is_empty() {
            SafetyFinding::pass(SafetyDimension::DataIntegrity, description)
        } else {
            SafetyFinding::fail(
                SafetyDimension::DataIntegrity,
                description,
                format!("High-risk operations: {}", risky.join(", ")),
                true,
            )
        }
    }

    fn check_performance(&self, plan: &MigrationPlan, snapshot: &SchemaSnapshot) -> SafetyFinding {
        let description = "Schema changes are small relative to the existing schema";

        // Nothing exists yet, so there is no workload to degrade.
        if snapshot.is_empty() {
            return SafetyFinding::pass(SafetyDimension::Performance, description);
        }

        let existing = snapshot.tables.len().max(1) as f64;
        let impact = plan.operations.len() as f64 / existing * 100.0;
        if !impact.is_finite() {
            return SafetyFinding::fail(
                SafetyDimension::Performance,
                description,
                "Performance impact could not be estimated",
                false,
            );
        }

        if impact >= self.impact_threshold {
            SafetyFinding::fail(
                SafetyDimension::Performance,
                description,
                format!(
                    "Plan touches {:.0}% as many tables as already exist; schedule it off-peak",
                    impact
                ),
                false,
            )
        } else {
            SafetyFinding::pass(SafetyDimension::Performance, description)
        }
    }

    fn check_security(&self, plan: &MigrationPlan) -> SafetyFinding {
        let description = "Every generated table is protected by an access policy";
        if plan.is_empty() {
            return SafetyFinding::pass(SafetyDimension::Security, description);
        }

        let policies = plan
            .operations
            .iter()
            .filter(|op| op.installs_access_policy())
            .count();
        let unprotected: Vec<&str> = plan
            .operations
            .iter()
            .filter(|op| op.kind == OperationKind::CreateTable && !op.installs_access_policy())
            .map(|op| op.id.as_str())
            .collect();

        if policies == 0 {
            SafetyFinding::fail(
                SafetyDimension::Security,
                description,
                "Plan contains no access-control policy operations",
                false,
            )
        } else if !unprotected.is_empty() {
            SafetyFinding::fail(
                SafetyDimension::Security,
                description,
                format!("Tables created without a policy: {}", unprotected.join(", ")),
                false,
            )
        } else {
            SafetyFinding::pass(SafetyDimension::Security, description)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::PostgresDialect;
    use crate::operations::{ColumnSpec, MigrationOperation, SchemaChange, TableDefinition};
    use crate::plan::PlanBuilder;
    use crate::schema::{ColumnType, TableDescriptor};

    fn plan_of(changes: Vec<SchemaChange>) -> MigrationPlan {
        let dialect = PostgresDialect::new();
        let ops = changes
            .into_iter()
            .enumerate()
            .map(|(i, c)| MigrationOperation::new(format!("op_{}", i), i as u32, c, &dialect))
            .collect();
        PlanBuilder::default()
            .assemble("p", "t", "d", ops)
            .unwrap()
    }

    fn bare_table(name: &str) -> SchemaChange {
        SchemaChange::CreateTable {
            table: TableDefinition::new(name)
                .column(ColumnSpec::new("id", ColumnType::Uuid).primary_key()),
            row_security: false,
            policy: None,
        }
    }

    fn finding(findings: &[SafetyFinding], dimension: SafetyDimension) -> &SafetyFinding {
        findings.iter().find(|f| f.dimension == dimension).unwrap()
    }

    fn catalog(n: usize) -> SchemaSnapshot {
        (0..n).fold(SchemaSnapshot::new(), |s, i| {
            s.table(TableDescriptor::new(format!("t{}", i)))
        })
    }

    #[test]
    fn test_empty_plan_passes_everything() {
        let findings = SafetyChecker::default().check(&plan_of(vec![]), &catalog(2));
        assert_eq!(findings.len(), 3);
        assert!(findings.iter().all(|f| f.passed));
    }

    #[test]
    fn test_high_risk_blocks() {
        let plan = plan_of(vec![SchemaChange::DropTable {
            name: "t0".to_string(),
            if_exists: false,
        }]);
        let findings = SafetyChecker::default().check(&plan, &catalog(10));
        let integrity = finding(&findings, SafetyDimension::DataIntegrity);
        assert!(!integrity.passed);
        assert!(integrity.blocking);
        assert!(integrity.is_blocking_failure());
    }

    #[test]
    fn test_performance_impact_is_advisory() {
        let plan = plan_of(vec![bare_table("a"), bare_table("b")]);
        let findings = SafetyChecker::default().check(&plan, &catalog(4));
        let perf = finding(&findings, SafetyDimension::Performance);
        assert!(!perf.passed);
        assert!(!perf.blocking);

        let findings = SafetyChecker::default().check(&plan, &catalog(5));
        assert!(finding(&findings, SafetyDimension::Performance).passed);
    }

    #[test]
    fn test_greenfield_performance_passes() {
        let plan = plan_of(vec![bare_table("a")]);
        let findings = SafetyChecker::default().check(&plan, &SchemaSnapshot::new());
        assert!(finding(&findings, SafetyDimension::Performance).passed);
    }

    #[test]
    fn test_missing_policy_is_advisory() {
        let plan = plan_of(vec![bare_table("a")]);
        let findings = SafetyChecker::default().check(&plan, &catalog(10));
        let security = finding(&findings, SafetyDimension::Security);
        assert!(!security.passed);
        assert!(!security.blocking);
    }

    #[test]
    fn test_generated_tables_pass_security() {
        let pattern = crate::pattern::ImportPattern {
            target_table_name: "import_x".to_string(),
            is_new_table: true,
            confidence_score: 1.0,
            field_mappings: Vec::new(),
            relationship_hints: Vec::new(),
            suggested_enhancements: Vec::new(),
        };
        let plan = PlanBuilder::default().build("x", &[pattern]).unwrap();
        let findings = SafetyChecker::default().check(&plan, &catalog(10));
        assert!(findings.iter().all(|f| f.passed));
    }
}
