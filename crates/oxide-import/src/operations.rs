//! Migration operations.
//!
//! Each [`MigrationOperation`] wraps a structured [`SchemaChange`]. The change
//! knows how to reverse itself; a [`MigrationDialect`] renders both directions
//! to SQL when the operation is built.

use serde::{Deserialize, Serialize};

use crate::dialect::MigrationDialect;
use crate::schema::{ColumnDescriptor, ColumnType, TableDescriptor};

/// Referenced table and column of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Referenced table.
    pub table: String,
    /// Referenced column.
    pub column: String,
}

impl ColumnRef {
    /// Creates a column reference.
    #[must_use]
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

/// Definition of a column in generated DDL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Column type.
    pub column_type: ColumnType,
    /// Whether the column allows NULL values.
    pub nullable: bool,
    /// Whether this column is the primary key.
    pub primary_key: bool,
    /// Default value expression.
    pub default: Option<String>,
    /// Foreign key reference.
    pub references: Option<ColumnRef>,
}

impl ColumnSpec {
    /// Creates a nullable column.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            primary_key: false,
            default: None,
            references: None,
        }
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the column as the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Sets the default value expression.
    #[must_use]
    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    /// Adds a foreign key reference.
    #[must_use]
    pub fn references(mut self, target: ColumnRef) -> Self {
        self.references = Some(target);
        self
    }

    /// Describes the column the way the catalog would report it.
    #[must_use]
    pub fn to_descriptor(&self) -> ColumnDescriptor {
        ColumnDescriptor {
            name: self.name.clone(),
            data_type: self.column_type.postgres_name().to_lowercase(),
            nullable: self.nullable,
            is_primary_key: self.primary_key,
        }
    }
}

/// Definition of a table in generated DDL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnSpec>,
}

impl TableDefinition {
    /// Creates a table without columns.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    /// Describes the table the way the catalog would report it.
    #[must_use]
    pub fn to_descriptor(&self) -> TableDescriptor {
        TableDescriptor {
            name: self.name.clone(),
            columns: self.columns.iter().map(ColumnSpec::to_descriptor).collect(),
        }
    }
}

/// Row-level access policy limiting rows to their owning principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    /// Policy name.
    pub name: String,
    /// Column holding the owning principal.
    pub owner_column: String,
    /// SQL expression yielding the current principal.
    pub principal_expression: String,
}

/// A single structured schema change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum SchemaChange {
    /// Create a table, optionally enabling row security and a policy in the
    /// same step.
    CreateTable {
        /// Table definition.
        table: TableDefinition,
        /// Whether row-level security is enabled on creation.
        row_security: bool,
        /// Access policy installed on creation.
        policy: Option<AccessPolicy>,
    },

    /// Drop a table.
    DropTable {
        /// Table name.
        name: String,
        /// Whether to use IF EXISTS.
        if_exists: bool,
    },

    /// Add a column to an existing table.
    AddColumn {
        /// Table name.
        table: String,
        /// Column definition.
        column: ColumnSpec,
    },

    /// Drop a column.
    DropColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// Add a foreign key constraint.
    AddForeignKey {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
        /// Referencing column.
        column: String,
        /// Referenced column.
        references: ColumnRef,
    },

    /// Drop a named constraint.
    DropConstraint {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
    },

    /// Create an index.
    CreateIndex {
        /// Index name.
        name: String,
        /// Table name.
        table: String,
        /// Indexed columns.
        columns: Vec<String>,
    },

    /// Drop an index.
    DropIndex {
        /// Index name.
        name: String,
    },

    /// Enable row-level security on a table.
    EnableRowSecurity {
        /// Table name.
        table: String,
    },

    /// Disable row-level security on a table.
    DisableRowSecurity {
        /// Table name.
        table: String,
    },

    /// Create an access policy.
    CreatePolicy {
        /// Table name.
        table: String,
        /// Policy definition.
        policy: AccessPolicy,
    },

    /// Drop an access policy.
    DropPolicy {
        /// Table name.
        table: String,
        /// Policy name.
        name: String,
    },
}

impl SchemaChange {
    /// Returns the change that undoes this one.
    ///
    /// Returns `None` for destructive changes whose prior state is unknown.
    #[must_use]
    pub fn reverse(&self) -> Option<Self> {
        match self {
            Self::CreateTable { table, .. } => Some(Self::DropTable {
                name: table.name.clone(),
                if_exists: true,
            }),
            Self::AddColumn { table, column } => Some(Self::DropColumn {
                table: table.clone(),
                column: column.name.clone(),
            }),
            Self::AddForeignKey { table, name, .. } => Some(Self::DropConstraint {
                table: table.clone(),
                name: name.clone(),
            }),
            Self::CreateIndex { name, .. } => Some(Self::DropIndex { name: name.clone() }),
            Self::EnableRowSecurity { table } => Some(Self::DisableRowSecurity {
                table: table.clone(),
            }),
            Self::DisableRowSecurity { table } => Some(Self::EnableRowSecurity {
                table: table.clone(),
            }),
            Self::CreatePolicy { table, policy } => Some(Self::DropPolicy {
                table: table.clone(),
                name: policy.name.clone(),
            }),
            Self::DropTable { .. }
            | Self::DropColumn { .. }
            | Self::DropConstraint { .. }
            | Self::DropIndex { .. }
            | Self::DropPolicy { .. } => None,
        }
    }

    /// Returns the operation kind.
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::CreateTable { .. } => OperationKind::CreateTable,
            Self::DropTable { .. } => OperationKind::DropTable,
            Self::AddColumn { .. } => OperationKind::AddColumn,
            Self::DropColumn { .. } => OperationKind::DropColumn,
            Self::AddForeignKey { .. } => OperationKind::AddConstraint,
            Self::DropConstraint { .. } => OperationKind::DropConstraint,
            Self::CreateIndex { .. } => OperationKind::AddIndex,
            Self::DropIndex { .. } => OperationKind::DropIndex,
            Self::EnableRowSecurity { .. } | Self::DisableRowSecurity { .. } => {
                OperationKind::AlterTable
            }
            Self::CreatePolicy { .. } => OperationKind::AddPolicy,
            Self::DropPolicy { .. } => OperationKind::DropPolicy,
        }
    }

    /// Risk of applying this change to a live database.
    #[must_use]
    pub fn default_risk(&self) -> RiskTier {
        match self {
            Self::CreateTable { .. } | Self::AddColumn { .. } | Self::CreatePolicy { .. } => {
                RiskTier::Low
            }
            Self::AddForeignKey { .. } | Self::CreateIndex { .. } | Self::EnableRowSecurity { .. } => {
                RiskTier::Medium
            }
            Self::DropTable { .. }
            | Self::DropColumn { .. }
            | Self::DropConstraint { .. }
            | Self::DropIndex { .. }
            | Self::DisableRowSecurity { .. }
            | Self::DropPolicy { .. } => RiskTier::High,
        }
    }

    /// Returns true if applying this change installs an access policy.
    #[must_use]
    pub fn installs_access_policy(&self) -> bool {
        matches!(
            self,
            Self::CreateTable {
                policy: Some(_),
                ..
            } | Self::CreatePolicy { .. }
        )
    }

    /// Returns a human-readable description.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::CreateTable {
                table,
                policy: Some(policy),
                ..
            } => format!(
                "Create table '{}' with access policy '{}'",
                table.name, policy.name
            ),
            Self::CreateTable { table, .. } => format!("Create table '{}'", table.name),
            Self::DropTable { name, .. } => format!("Drop table '{}'", name),
            Self::AddColumn { table, column } => {
                format!("Add column '{}' to table '{}'", column.name, table)
            }
            Self::DropColumn { table, column } => {
                format!("Drop column '{}' from table '{}'", column, table)
            }
            Self::AddForeignKey {
                table,
                name,
                references,
                ..
            } => format!(
                "Add foreign key '{}' on table '{}' referencing '{}'",
                name, table, references.table
            ),
            Self::DropConstraint { table, name } => {
                format!("Drop constraint '{}' from table '{}'", name, table)
            }
            Self::CreateIndex { name, table, .. } => {
                format!("Create index '{}' on table '{}'", name, table)
            }
            Self::DropIndex { name } => format!("Drop index '{}'", name),
            Self::EnableRowSecurity { table } => {
                format!("Enable row level security on table '{}'", table)
            }
            Self::DisableRowSecurity { table } => {
                format!("Disable row level security on table '{}'", table)
            }
            Self::CreatePolicy { table, policy } => {
                format!("Create access policy '{}' on table '{}'", policy.name, table)
            }
            Self::DropPolicy { table, name } => {
                format!("Drop access policy '{}' from table '{}'", name, table)
            }
        }
    }
}

/// Kind of a migration operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Table creation.
    CreateTable,
    /// Table-level alteration such as toggling row security.
    AlterTable,
    /// Column addition.
    AddColumn,
    /// Constraint addition.
    AddConstraint,
    /// Index creation.
    AddIndex,
    /// Access policy creation.
    AddPolicy,
    /// Table removal.
    DropTable,
    /// Column removal.
    DropColumn,
    /// Constraint removal.
    DropConstraint,
    /// Index removal.
    DropIndex,
    /// Access policy removal.
    DropPolicy,
}

/// Risk of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    /// Touches no existing structure.
    Low,
    /// Touches existing structure without losing data.
    Medium,
    /// May lose data or weaken protection.
    High,
}

/// One reversible unit of schema change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationOperation {
    /// Id, unique within a plan.
    pub id: String,
    /// Operation kind.
    pub kind: OperationKind,
    /// Execution order weight; lower runs first among independent operations.
    pub priority: u32,
    /// SQL applying the change.
    pub forward_statement: String,
    /// SQL undoing the change, if it can be undone.
    pub rollback_statement: Option<String>,
    /// Human-readable description.
    pub description: String,
    /// Risk tier.
    pub risk_tier: RiskTier,
    /// Ids of operations that must run first.
    pub depends_on: Vec<String>,
    /// Queries confirming the change took effect.
    pub validation_queries: Vec<String>,
    /// Structured change.
    pub change: SchemaChange,
}

impl MigrationOperation {
    /// Builds an operation, rendering its SQL through `dialect`.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        priority: u32,
        change: SchemaChange,
        dialect: &dyn MigrationDialect,
    ) -> Self {
        let forward_statement = dialect.script(&change);
        let rollback_statement = change.reverse().map(|reverse| dialect.script(&reverse));
        Self {
            id: id.into(),
            kind: change.kind(),
            priority,
            forward_statement,
            rollback_statement,
            description: change.description(),
            risk_tier: change.default_risk(),
            depends_on: Vec::new(),
            validation_queries: dialect.validation_queries(&change),
            change,
        }
    }

    /// Adds a dependency on another operation.
    #[must_use]
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.depends_on.push(id.into());
        self
    }

    /// Overrides the risk tier.
    #[must_use]
    pub fn with_risk(mut self, risk: RiskTier) -> Self {
        self.risk_tier = risk;
        self
    }

    /// Returns true if the operation can be rolled back.
    #[must_use]
    pub fn is_reversible(&self) -> bool {
        self.rollback_statement.is_some()
    }

    /// Returns true if the operation installs an access policy.
    #[must_use]
    pub fn installs_access_policy(&self) -> bool {
        self.change.installs_access_policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::PostgresDialect;

    fn create_table() -> SchemaChange {
        SchemaChange::CreateTable {
            table: TableDefinition::new("leads")
                .column(ColumnSpec::new("id", ColumnType::Uuid).primary_key()),
            row_security: true,
            policy: Some(AccessPolicy {
                name: "leads_owner_access".to_string(),
                owner_column: "owner_id".to_string(),
                principal_expression: "current_user".to_string(),
            }),
        }
    }

    #[test]
    fn test_create_table_reverse() {
        match create_table().reverse().unwrap() {
            SchemaChange::DropTable { name, if_exists } => {
                assert_eq!(name, "leads");
                assert!(if_exists);
            }
            other => panic!("Expected DropTable, got {:?}", other),
        }
    }

    #[test]
    fn test_destructive_changes_not_reversible() {
        let drop = SchemaChange::DropTable {
            name: "leads".to_string(),
            if_exists: false,
        };
        assert!(drop.reverse().is_none());
        assert_eq!(drop.default_risk(), RiskTier::High);

        let op = MigrationOperation::new("op_1", 1, drop, &PostgresDialect::new());
        assert!(!op.is_reversible());
    }

    #[test]
    fn test_row_security_toggle_reverses() {
        let enable = SchemaChange::EnableRowSecurity {
            table: "leads".to_string(),
        };
        assert_eq!(enable.kind(), OperationKind::AlterTable);
        let disable = enable.reverse().unwrap();
        assert_eq!(disable.reverse().unwrap(), enable);
    }

    #[test]
    fn test_operation_from_change() {
        let op = MigrationOperation::new("op_1", 1, create_table(), &PostgresDialect::new());
        assert_eq!(op.kind, OperationKind::CreateTable);
        assert_eq!(op.risk_tier, RiskTier::Low);
        assert!(op.installs_access_policy());
        assert_eq!(
            op.rollback_statement.as_deref(),
            Some("DROP TABLE IF EXISTS \"leads\";")
        );
        assert!(op.description.contains("leads_owner_access"));
    }

    #[test]
    fn test_policy_detection() {
        let index = SchemaChange::CreateIndex {
            name: "idx".to_string(),
            table: "leads".to_string(),
            columns: vec!["email".to_string()],
        };
        assert!(!index.installs_access_policy());
        assert_eq!(index.kind(), OperationKind::AddIndex);
    }
}
