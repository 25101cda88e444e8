//! Database dialect implementations.
//!
//! A dialect renders [`SchemaChange`]s to SQL. Generated plans target
//! PostgreSQL, which supports row-level security and `JSONB`.

use crate::operations::{AccessPolicy, ColumnSpec, SchemaChange, TableDefinition};
use crate::schema::ColumnType;

/// Trait for database-specific SQL generation.
pub trait MigrationDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns the SQL type name for the given type.
    fn type_name(&self, column_type: &ColumnType) -> String;

    /// Generates the statements for one change.
    fn generate_sql(&self, change: &SchemaChange) -> Vec<String>;

    /// Generates queries confirming a change took effect.
    fn validation_queries(&self, change: &SchemaChange) -> Vec<String>;

    /// Renders a change as a single script of `;`-terminated statements.
    fn script(&self, change: &SchemaChange) -> String {
        self.generate_sql(change)
            .iter()
            .map(|stmt| format!("{};", stmt))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Quote a string literal.
    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Generates column definition SQL.
    fn column_definition(&self, column: &ColumnSpec) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.type_name(&column.column_type),
        ];

        if column.primary_key {
            parts.push("PRIMARY KEY".to_string());
        } else if !column.nullable {
            parts.push("NOT NULL".to_string());
        }

        if let Some(ref default) = column.default {
            parts.push(format!("DEFAULT {}", default));
        }

        if let Some(ref target) = column.references {
            parts.push(format!(
                "REFERENCES {} ({})",
                self.quote_identifier(&target.table),
                self.quote_identifier(&target.column)
            ));
        }

        parts.join(" ")
    }
}

/// PostgreSQL migration dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn create_table_sql(&self, table: &TableDefinition) -> String {
        let col_defs: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();
        format!(
            "CREATE TABLE {} (\n  {}\n)",
            self.quote_identifier(&table.name),
            col_defs.join(",\n  ")
        )
    }

    fn enable_row_security_sql(&self, table: &str) -> String {
        format!(
            "ALTER TABLE {} ENABLE ROW LEVEL SECURITY",
            self.quote_identifier(table)
        )
    }

    fn create_policy_sql(&self, table: &str, policy: &AccessPolicy) -> String {
        let predicate = format!(
            "{} = {}",
            self.quote_identifier(&policy.owner_column),
            policy.principal_expression
        );
        format!(
            "CREATE POLICY {} ON {} USING ({}) WITH CHECK ({})",
            self.quote_identifier(&policy.name),
            self.quote_identifier(table),
            predicate,
            predicate
        )
    }

    fn table_exists_query(&self, table: &str) -> String {
        format!(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = {}",
            self.quote_literal(table)
        )
    }

    fn row_security_query(&self, table: &str) -> String {
        format!(
            "SELECT relrowsecurity FROM pg_class WHERE relname = {}",
            self.quote_literal(table)
        )
    }

    fn policy_exists_query(&self, table: &str, policy: &str) -> String {
        format!(
            "SELECT COUNT(*) FROM pg_policies WHERE tablename = {} AND policyname = {}",
            self.quote_literal(table),
            self.quote_literal(policy)
        )
    }
}

impl MigrationDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn type_name(&self, column_type: &ColumnType) -> String {
        column_type.postgres_name()
    }

    fn generate_sql(&self, change: &SchemaChange) -> Vec<String> {
        match change {
            SchemaChange::CreateTable {
                table,
                row_security,
                policy,
            } => {
                let mut statements = vec![self.create_table_sql(table)];
                if *row_security {
                    statements.push(self.enable_row_security_sql(&table.name));
                }
                if let Some(policy) = policy {
                    statements.push(self.create_policy_sql(&table.name, policy));
                }
                statements
            }

            SchemaChange::DropTable { name, if_exists } => {
                let mut sql = String::from("DROP TABLE ");
                if *if_exists {
                    sql.push_str("IF EXISTS ");
                }
                sql.push_str(&self.quote_identifier(name));
                vec![sql]
            }

            SchemaChange::AddColumn { table, column } => vec![format!(
                "ALTER TABLE {} ADD COLUMN {}",
                self.quote_identifier(table),
                self.column_definition(column)
            )],

            SchemaChange::DropColumn { table, column } => vec![format!(
                "ALTER TABLE {} DROP COLUMN {}",
                self.quote_identifier(table),
                self.quote_identifier(column)
            )],

            SchemaChange::AddForeignKey {
                table,
                name,
                column,
                references,
            } => vec![format!(
                "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                self.quote_identifier(table),
                self.quote_identifier(name),
                self.quote_identifier(column),
                self.quote_identifier(&references.table),
                self.quote_identifier(&references.column)
            )],

            SchemaChange::DropConstraint { table, name } => vec![format!(
                "ALTER TABLE {} DROP CONSTRAINT {}",
                self.quote_identifier(table),
                self.quote_identifier(name)
            )],

            SchemaChange::CreateIndex {
                name,
                table,
                columns,
            } => {
                let quoted: Vec<String> =
                    columns.iter().map(|c| self.quote_identifier(c)).collect();
                vec![format!(
                    "CREATE INDEX {} ON {} ({})",
                    self.quote_identifier(name),
                    self.quote_identifier(table),
                    quoted.join(", ")
                )]
            }

            SchemaChange::DropIndex { name } => {
                vec![format!("DROP INDEX IF EXISTS {}", self.quote_identifier(name))]
            }

            SchemaChange::EnableRowSecurity { table } => {
                vec![self.enable_row_security_sql(table)]
            }

            SchemaChange::DisableRowSecurity { table } => vec![format!(
                "ALTER TABLE {} DISABLE ROW LEVEL SECURITY",
                self.quote_identifier(table)
            )],

            SchemaChange::CreatePolicy { table, policy } => {
                vec![self.create_policy_sql(table, policy)]
            }

            SchemaChange::DropPolicy { table, name } => vec![format!(
                "DROP POLICY IF EXISTS {} ON {}",
                self.quote_identifier(name),
                self.quote_identifier(table)
            )],
        }
    }

    fn validation_queries(&self, change: &SchemaChange) -> Vec<String> {
        match change {
            SchemaChange::CreateTable {
                table,
                row_security,
                policy,
            } => {
                let mut queries = vec![self.table_exists_query(&table.name)];
                if *row_security {
                    queries.push(self.row_security_query(&table.name));
                }
                if let Some(policy) = policy {
                    queries.push(self.policy_exists_query(&table.name, &policy.name));
                }
                queries
            }
            SchemaChange::AddColumn { table, column } => vec![format!(
                "SELECT COUNT(*) FROM information_schema.columns WHERE table_name = {} AND column_name = {}",
                self.quote_literal(table),
                self.quote_literal(&column.name)
            )],
            SchemaChange::CreateIndex { name, .. } => vec![format!(
                "SELECT COUNT(*) FROM pg_indexes WHERE indexname = {}",
                self.quote_literal(name)
            )],
            SchemaChange::EnableRowSecurity { table } => vec![self.row_security_query(table)],
            SchemaChange::CreatePolicy { table, policy } => {
                vec![self.policy_exists_query(table, &policy.name)]
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::ColumnRef;

    fn dialect() -> PostgresDialect {
        PostgresDialect::new()
    }

    fn leads_table() -> SchemaChange {
        SchemaChange::CreateTable {
            table: TableDefinition::new("leads")
                .column(
                    ColumnSpec::new("id", ColumnType::Uuid)
                        .primary_key()
                        .default_expr("gen_random_uuid()"),
                )
                .column(ColumnSpec::new("email", ColumnType::Varchar(255)))
                .column(
                    ColumnSpec::new("user_id", ColumnType::Varchar(255))
                        .references(ColumnRef::new("users", "id")),
                ),
            row_security: true,
            policy: Some(AccessPolicy {
                name: "leads_owner_access".to_string(),
                owner_column: "owner_id".to_string(),
                principal_expression: "current_user".to_string(),
            }),
        }
    }

    #[test]
    fn test_create_table_sql() {
        let sql = dialect().generate_sql(&leads_table());
        assert_eq!(sql.len(), 3);
        assert!(sql[0].starts_with("CREATE TABLE \"leads\" ("));
        assert!(sql[0].contains("\"id\" UUID PRIMARY KEY DEFAULT gen_random_uuid()"));
        assert!(sql[0].contains("\"user_id\" VARCHAR(255) REFERENCES \"users\" (\"id\")"));
        assert_eq!(sql[1], "ALTER TABLE \"leads\" ENABLE ROW LEVEL SECURITY");
        assert_eq!(
            sql[2],
            "CREATE POLICY \"leads_owner_access\" ON \"leads\" \
             USING (\"owner_id\" = current_user) WITH CHECK (\"owner_id\" = current_user)"
        );
    }

    #[test]
    fn test_script_terminates_statements() {
        let script = dialect().script(&SchemaChange::DropTable {
            name: "leads".to_string(),
            if_exists: true,
        });
        assert_eq!(script, "DROP TABLE IF EXISTS \"leads\";");
    }

    #[test]
    fn test_quoting() {
        assert_eq!(dialect().quote_identifier("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(dialect().quote_literal("o'neil"), "'o''neil'");
    }

    #[test]
    fn test_validation_queries() {
        let queries = dialect().validation_queries(&leads_table());
        assert_eq!(queries.len(), 3);
        assert!(queries[0].contains("information_schema.tables"));
        assert!(queries[2].contains("pg_policies"));
    }
}
