//! Migration plan construction.
//!
//! Only unambiguous new-table proposals become DDL. Matches against existing
//! tables are left for manual handling; the plan never alters them.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::PlannerOptions;
use crate::dialect::{MigrationDialect, PostgresDialect};
use crate::error::{ImportError, Result};
use crate::mapper::{
    sanitize_identifier, CREATED_AT_COLUMN, SURROGATE_KEY_COLUMN, UPDATED_AT_COLUMN,
};
use crate::operations::{
    AccessPolicy, ColumnRef, ColumnSpec, MigrationOperation, SchemaChange, TableDefinition,
};
use crate::pattern::ImportPattern;
use crate::schema::ColumnType;

/// An ordered, immutable set of schema changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationPlan {
    /// Plan id.
    pub id: String,
    /// Short title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Operations in execution order.
    pub operations: Vec<MigrationOperation>,
    /// Human-readable duration estimate.
    pub estimated_duration: String,
    /// Whether a backup should be taken before execution.
    pub backup_required: bool,
}

impl MigrationPlan {
    /// Returns true if the plan has no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns the forward statements in execution order.
    pub fn forward_script(&self) -> impl Iterator<Item = &str> {
        self.operations
            .iter()
            .map(|op| op.forward_statement.as_str())
    }

    /// Returns the rollback statements in reverse execution order.
    ///
    /// Returns `None` if any operation is irreversible.
    #[must_use]
    pub fn rollback_script(&self) -> Option<Vec<&str>> {
        self.operations
            .iter()
            .rev()
            .map(|op| op.rollback_statement.as_deref())
            .collect()
    }
}

/// Formats a duration in seconds as seconds, minutes or hours.
#[must_use]
pub fn format_duration(secs: u64) -> String {
    fn unit(n: u64, name: &str) -> String {
        if n == 1 {
            format!("{} {}", n, name)
        } else {
            format!("{} {}s", n, name)
        }
    }

    if secs < 60 {
        unit(secs, "second")
    } else if secs < 3600 {
        unit(secs.div_ceil(60), "minute")
    } else {
        unit(secs.div_ceil(3600), "hour")
    }
}

/// Orders operations so every dependency runs first.
///
/// Among operations whose dependencies are satisfied, lower priority runs
/// first, then earlier insertion.
pub fn order_operations(operations: Vec<MigrationOperation>) -> Result<Vec<MigrationOperation>> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(operations.len());
    for (i, op) in operations.iter().enumerate() {
        if index.insert(op.id.as_str(), i).is_some() {
            return Err(ImportError::DuplicateOperation(op.id.clone()));
        }
    }

    let mut in_degree = vec![0usize; operations.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); operations.len()];
    for (i, op) in operations.iter().enumerate() {
        for dep in &op.depends_on {
            let &d = index
                .get(dep.as_str())
                .ok_or_else(|| ImportError::UnknownDependency {
                    operation: op.id.clone(),
                    dependency: dep.clone(),
                })?;
            in_degree[i] += 1;
            dependents[d].push(i);
        }
    }

    let mut ready: BTreeSet<(u32, usize)> = operations
        .iter()
        .enumerate()
        .filter(|(i, _)| in_degree[*i] == 0)
        .map(|(i, op)| (op.priority, i))
        .collect();

    let mut order = Vec::with_capacity(operations.len());
    while let Some(next) = ready.pop_first() {
        let (_, i) = next;
        order.push(i);
        for &dependent in &dependents[i] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert((operations[dependent].priority, dependent));
            }
        }
    }

    if order.len() < operations.len() {
        let stuck = (0..operations.len())
            .find(|i| in_degree[*i] > 0)
            .map(|i| operations[i].id.clone())
            .unwrap_or_default();
        return Err(ImportError::CircularDependency { operation: stuck });
    }

    let mut slots: Vec<Option<MigrationOperation>> = operations.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect())
}

/// Builds migration plans from import patterns.
#[derive(Debug, Clone)]
pub struct PlanBuilder<D: MigrationDialect = PostgresDialect> {
    dialect: D,
    options: PlannerOptions,
}

impl Default for PlanBuilder<PostgresDialect> {
    fn default() -> Self {
        Self::new(PostgresDialect::new(), PlannerOptions::default())
    }
}

impl<D: MigrationDialect> PlanBuilder<D> {
    /// Creates a plan builder.
    pub fn new(dialect: D, options: PlannerOptions) -> Self {
        Self { dialect, options }
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    /// Builds the plan for an import named `source_name`.
    ///
    /// Each certain new-table pattern yields one `create_table` operation that
    /// also enables row security and installs the owner policy. Operations
    /// are independent and prioritised in pattern order.
    pub fn build(&self, source_name: &str, patterns: &[ImportPattern]) -> Result<MigrationPlan> {
        let operations: Vec<MigrationOperation> = patterns
            .iter()
            .filter(|p| p.is_certain_new_table())
            .enumerate()
            .map(|(i, pattern)| {
                let priority = u32::try_from(i + 1).unwrap_or(u32::MAX);
                MigrationOperation::new(
                    format!("op_{}_create_{}", priority, pattern.target_table_name),
                    priority,
                    self.create_table_change(pattern),
                    &self.dialect,
                )
            })
            .collect();

        let manual = patterns.iter().filter(|p| !p.is_certain_new_table()).count();
        debug!(
            operations = operations.len(),
            manual_patterns = manual,
            "Generated plan operations"
        );

        let id = sanitize_identifier(
            &format!("plan_{}", source_name),
            self.options.identifier_max_bytes,
        );
        let id = if id
            .strip_prefix("plan_")
            .unwrap_or_default()
            .trim_matches('_')
            .is_empty()
        {
            "plan_import".to_string()
        } else {
            id
        };
        let description = format!(
            "{} operation(s) from {} pattern(s); {} pattern(s) left for manual review",
            operations.len(),
            patterns.len(),
            manual
        );

        self.assemble(
            id,
            format!("Import schema for '{}'", source_name),
            description,
            operations,
        )
    }

    /// Orders operations and computes the plan-level estimates.
    pub fn assemble(
        &self,
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        operations: Vec<MigrationOperation>,
    ) -> Result<MigrationPlan> {
        let operations = order_operations(operations)?;
        let count = operations.len() as u64;
        let secs = self
            .options
            .base_duration_secs
            .saturating_add(self.options.per_operation_secs.saturating_mul(count));
        let backup_required = operations.len() > self.options.backup_operation_threshold;

        let plan = MigrationPlan {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            operations,
            estimated_duration: format_duration(secs),
            backup_required,
        };
        info!(
            plan = %plan.id,
            operations = plan.operations.len(),
            backup_required,
            "Built migration plan"
        );
        Ok(plan)
    }

    fn create_table_change(&self, pattern: &ImportPattern) -> SchemaChange {
        let name = &pattern.target_table_name;
        let mut table = TableDefinition::new(name.clone()).column(
            ColumnSpec::new(SURROGATE_KEY_COLUMN, ColumnType::Uuid)
                .primary_key()
                .default_expr("gen_random_uuid()"),
        );

        for mapping in &pattern.field_mappings {
            let mut column =
                ColumnSpec::new(mapping.suggested_column.clone(), mapping.data_type.into());
            if let Some(target) = &mapping.foreign_key_target {
                column = column.references(ColumnRef::new(
                    target.table.clone(),
                    target.column.clone(),
                ));
            }
            table = table.column(column);
        }

        table = table
            .column(
                ColumnSpec::new(self.options.owner_column.clone(), ColumnType::Text)
                    .not_null()
                    .default_expr(self.options.principal_expression.clone()),
            )
            .column(
                ColumnSpec::new(CREATED_AT_COLUMN, ColumnType::TimestampTz)
                    .not_null()
                    .default_expr("now()"),
            )
            .column(
                ColumnSpec::new(UPDATED_AT_COLUMN, ColumnType::TimestampTz)
                    .not_null()
                    .default_expr("now()"),
            );

        let policy = AccessPolicy {
            name: sanitize_identifier(
                &format!("{}_owner_access", name),
                self.options.identifier_max_bytes,
            ),
            owner_column: self.options.owner_column.clone(),
            principal_expression: self.options.principal_expression.clone(),
        };

        SchemaChange::CreateTable {
            table,
            row_security: true,
            policy: Some(policy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::CanonicalType;
    use crate::operations::{OperationKind, RiskTier};
    use crate::pattern::FieldMapping;

    fn mapping(field: &str, data_type: CanonicalType) -> FieldMapping {
        FieldMapping {
            import_field: field.to_string(),
            suggested_column: field.to_string(),
            data_type,
            constraints: Vec::new(),
            is_foreign_key_candidate: false,
            foreign_key_target: None,
            is_new_column: true,
        }
    }

    fn new_table(name: &str) -> ImportPattern {
        ImportPattern {
            target_table_name: name.to_string(),
            is_new_table: true,
            confidence_score: 1.0,
            field_mappings: vec![
                mapping("name", CanonicalType::Varchar),
                mapping("email", CanonicalType::Varchar),
            ],
            relationship_hints: Vec::new(),
            suggested_enhancements: Vec::new(),
        }
    }

    fn index_op(id: &str, priority: u32) -> MigrationOperation {
        MigrationOperation::new(
            id,
            priority,
            SchemaChange::CreateIndex {
                name: format!("idx_{}", id),
                table: "t".to_string(),
                columns: vec!["c".to_string()],
            },
            &PostgresDialect::new(),
        )
    }

    #[test]
    fn test_single_new_table() {
        let plan = PlanBuilder::default()
            .build("vendors", &[new_table("import_vendors")])
            .unwrap();

        assert_eq!(plan.operations.len(), 1);
        let op = &plan.operations[0];
        assert_eq!(op.kind, OperationKind::CreateTable);
        assert_eq!(op.risk_tier, RiskTier::Low);
        assert_eq!(op.priority, 1);
        assert!(op.depends_on.is_empty());
        assert!(op.forward_statement.contains("\"name\" VARCHAR(255)"));
        assert!(op.forward_statement.contains("ENABLE ROW LEVEL SECURITY"));
        assert!(op.forward_statement.contains("CREATE POLICY"));
        assert_eq!(
            op.rollback_statement.as_deref(),
            Some("DROP TABLE IF EXISTS \"import_vendors\";")
        );
        assert!(!plan.backup_required);
        assert_eq!(plan.estimated_duration, "45 seconds");
        assert_eq!(plan.id, "plan_vendors");
    }

    #[test]
    fn test_existing_table_patterns_are_not_planned() {
        let mut existing = new_table("contacts");
        existing.is_new_table = false;
        let mut partial = new_table("import_x");
        partial.confidence_score = 0.9;

        let plan = PlanBuilder::default()
            .build("src", &[existing, partial])
            .unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.estimated_duration, "30 seconds");
    }

    #[test]
    fn test_backup_threshold() {
        let three: Vec<ImportPattern> = (0..3).map(|i| new_table(&format!("t{}", i))).collect();
        let four: Vec<ImportPattern> = (0..4).map(|i| new_table(&format!("t{}", i))).collect();

        let builder = PlanBuilder::default();
        let plan = builder.build("s", &three).unwrap();
        assert!(!plan.backup_required);
        assert_eq!(plan.estimated_duration, "2 minutes");

        let plan = builder.build("s", &four).unwrap();
        assert!(plan.backup_required);
        let priorities: Vec<u32> = plan.operations.iter().map(|o| o.priority).collect();
        assert_eq!(priorities, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_duration_saturates() {
        let options = PlannerOptions::from_json_str(
            r#"{"base_duration_secs": 18446744073709551615, "per_operation_secs": 18446744073709551615}"#,
        )
        .unwrap();
        let builder = PlanBuilder::new(PostgresDialect::new(), options);
        let plan = builder
            .build("s", &[new_table("t1"), new_table("t2")])
            .unwrap();
        assert_eq!(plan.estimated_duration, format_duration(u64::MAX));
    }

    #[test]
    fn test_plan_id_from_numeric_source() {
        let plan = PlanBuilder::default().build("2024 Export", &[]).unwrap();
        assert_eq!(plan.id, "plan_2024_export");
        let plan = PlanBuilder::default().build("--", &[]).unwrap();
        assert_eq!(plan.id, "plan_import");
    }

    #[test]
    fn test_foreign_key_reference_in_ddl() {
        let mut pattern = new_table("import_orders");
        let mut user = mapping("user_id", CanonicalType::Varchar);
        user.is_foreign_key_candidate = true;
        user.foreign_key_target = Some(crate::keys::ForeignKeyTarget {
            table: "users".to_string(),
            column: "id".to_string(),
            confidence: 0.8,
        });
        pattern.field_mappings.push(user);

        let plan = PlanBuilder::default().build("orders", &[pattern]).unwrap();
        assert!(plan.operations[0]
            .forward_statement
            .contains("\"user_id\" VARCHAR(255) REFERENCES \"users\" (\"id\")"));
    }

    #[test]
    fn test_order_respects_dependencies_then_priority() {
        let ops = vec![
            index_op("c", 1).depends_on("b"),
            index_op("b", 3),
            index_op("a", 2),
        ];
        let ordered = order_operations(ops).unwrap();
        let ids: Vec<&str> = ordered.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let ops = vec![
            index_op("a", 1).depends_on("b"),
            index_op("b", 2).depends_on("a"),
            index_op("c", 3),
        ];
        match order_operations(ops) {
            Err(ImportError::CircularDependency { operation }) => assert_eq!(operation, "a"),
            other => panic!("Expected CircularDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_and_duplicate_ids() {
        let unknown = vec![index_op("a", 1).depends_on("ghost")];
        assert!(matches!(
            order_operations(unknown),
            Err(ImportError::UnknownDependency { .. })
        ));

        let duplicate = vec![index_op("a", 1), index_op("a", 2)];
        assert!(matches!(
            order_operations(duplicate),
            Err(ImportError::DuplicateOperation(_))
        ));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(1), "1 second");
        assert_eq!(format_duration(45), "45 seconds");
        assert_eq!(format_duration(60), "1 minute");
        assert_eq!(format_duration(90), "2 minutes");
        assert_eq!(format_duration(3600), "1 hour");
        assert_eq!(format_duration(7201), "3 hours");
    }

    #[test]
    fn test_rollback_script_reverses_order() {
        let plan = PlanBuilder::default()
            .build("s", &[new_table("t1"), new_table("t2")])
            .unwrap();
        let rollback = plan.rollback_script().unwrap();
        assert_eq!(
            rollback,
            vec!["DROP TABLE IF EXISTS \"t2\";", "DROP TABLE IF EXISTS \"t1\";"]
        );
        assert_eq!(plan.forward_script().count(), 2);
    }
}
