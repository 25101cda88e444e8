//! Plan replay against a schema snapshot.
//!
//! Replays the structured changes of a plan on a private copy of a snapshot,
//! forward or backward, without touching a database. This is how a plan's
//! rollback is checked to restore the pre-import schema.

use crate::error::{ImportError, Result};
use crate::operations::SchemaChange;
use crate::plan::MigrationPlan;
use crate::schema::SchemaSnapshot;

/// A mutable copy of a snapshot that changes can be applied to.
#[derive(Debug, Clone, Default)]
pub struct SchemaState {
    schema: SchemaSnapshot,
}

impl SchemaState {
    /// Starts from a copy of `snapshot`.
    #[must_use]
    pub fn from_snapshot(snapshot: &SchemaSnapshot) -> Self {
        Self {
            schema: snapshot.clone(),
        }
    }

    /// Returns the current schema.
    #[must_use]
    pub fn schema(&self) -> &SchemaSnapshot {
        &self.schema
    }

    /// Consumes and returns the schema.
    #[must_use]
    pub fn into_schema(self) -> SchemaSnapshot {
        self.schema
    }

    /// Applies every operation of `plan` in execution order.
    pub fn apply_plan(&mut self, plan: &MigrationPlan) -> Result<()> {
        for op in &plan.operations {
            self.apply_change(&op.change)?;
        }
        Ok(())
    }

    /// Rolls back every operation of `plan` in reverse execution order.
    pub fn rollback_plan(&mut self, plan: &MigrationPlan) -> Result<()> {
        for op in plan.operations.iter().rev() {
            let reverse = op.change.reverse().ok_or_else(|| {
                ImportError::InvalidState(format!("Operation '{}' is not reversible", op.id))
            })?;
            self.apply_change(&reverse)?;
        }
        Ok(())
    }

    /// Applies a single change.
    ///
    /// Table names compare ASCII case-insensitively, matching
    /// [`SchemaSnapshot::contains_table`].
    ///
    /// Only changes visible in a snapshot (tables and columns) alter the
    /// state; constraints, indexes and policies are checked for a target
    /// table and otherwise ignored.
    pub fn apply_change(&mut self, change: &SchemaChange) -> Result<()> {
        match change {
            SchemaChange::CreateTable { table, .. } => {
                if self.schema.contains_table(&table.name) {
                    return Err(ImportError::InvalidState(format!(
                        "Table '{}' already exists",
                        table.name
                    )));
                }
                self.schema.tables.push(table.to_descriptor());
            }

            SchemaChange::DropTable { name, if_exists } => {
                match self
                    .schema
                    .tables
                    .iter()
                    .position(|t| t.name.eq_ignore_ascii_case(name))
                {
                    Some(idx) => {
                        self.schema.tables.remove(idx);
                    }
                    None if *if_exists => {}
                    None => {
                        return Err(ImportError::InvalidState(format!(
                            "Table '{}' does not exist",
                            name
                        )))
                    }
                }
            }

            SchemaChange::AddColumn { table, column } => {
                let t = self.table_mut(table)?;
                if t.get_column(&column.name).is_some() {
                    return Err(ImportError::InvalidState(format!(
                        "Column '{}' already exists in table '{}'",
                        column.name, table
                    )));
                }
                t.columns.push(column.to_descriptor());
            }

            SchemaChange::DropColumn { table, column } => {
                let t = self.table_mut(table)?;
                let idx = t
                    .columns
                    .iter()
                    .position(|c| c.name == *column)
                    .ok_or_else(|| {
                        ImportError::InvalidState(format!(
                            "Column '{}' does not exist in table '{}'",
                            column, table
                        ))
                    })?;
                t.columns.remove(idx);
            }

            SchemaChange::AddForeignKey { table, .. }
            | SchemaChange::DropConstraint { table, .. }
            | SchemaChange::CreateIndex { table, .. }
            | SchemaChange::EnableRowSecurity { table }
            | SchemaChange::DisableRowSecurity { table }
            | SchemaChange::CreatePolicy { table, .. }
            | SchemaChange::DropPolicy { table, .. } => {
                self.table_mut(table)?;
            }

            SchemaChange::DropIndex { .. } => {}
        }
        Ok(())
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut crate::schema::TableDescriptor> {
        self.schema
            .tables
            .iter_mut()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ImportError::InvalidState(format!("Table '{}' does not exist", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::{ColumnSpec, TableDefinition};
    use crate::schema::{ColumnDescriptor, ColumnType, TableDescriptor};

    fn create(name: &str) -> SchemaChange {
        SchemaChange::CreateTable {
            table: TableDefinition::new(name)
                .column(ColumnSpec::new("id", ColumnType::Uuid).primary_key()),
            row_security: false,
            policy: None,
        }
    }

    #[test]
    fn test_create_then_drop() {
        let before = SchemaSnapshot::new().table(TableDescriptor::new("users"));
        let mut state = SchemaState::from_snapshot(&before);

        let change = create("leads");
        state.apply_change(&change).unwrap();
        let created = state.schema().get_table("leads").unwrap();
        assert_eq!(created.columns[0].data_type, "uuid");
        assert!(created.columns[0].is_primary_key);

        state.apply_change(&change.reverse().unwrap()).unwrap();
        assert_eq!(state.into_schema(), before);
    }

    #[test]
    fn test_create_existing_table_fails() {
        let snapshot = SchemaSnapshot::new().table(TableDescriptor::new("Leads"));
        let mut state = SchemaState::from_snapshot(&snapshot);
        assert!(matches!(
            state.apply_change(&create("leads")),
            Err(ImportError::InvalidState(_))
        ));
    }

    #[test]
    fn test_add_and_drop_column() {
        let snapshot = SchemaSnapshot::new().table(
            TableDescriptor::new("users").column(ColumnDescriptor::new("id", "uuid").primary_key()),
        );
        let mut state = SchemaState::from_snapshot(&snapshot);
        let add = SchemaChange::AddColumn {
            table: "users".to_string(),
            column: ColumnSpec::new("email", ColumnType::Varchar(255)),
        };
        state.apply_change(&add).unwrap();
        assert!(state.apply_change(&add).is_err());
        assert_eq!(
            state.schema().get_table("users").unwrap().columns[1].data_type,
            "varchar(255)"
        );

        state.apply_change(&add.reverse().unwrap()).unwrap();
        assert_eq!(state.schema(), &snapshot);
    }

    #[test]
    fn test_table_names_ignore_case() {
        let snapshot = SchemaSnapshot::new().table(TableDescriptor::new("Leads"));
        let mut state = SchemaState::from_snapshot(&snapshot);

        let add = SchemaChange::AddColumn {
            table: "leads".to_string(),
            column: ColumnSpec::new("email", ColumnType::Text),
        };
        state.apply_change(&add).unwrap();
        assert_eq!(state.schema().get_table("Leads").unwrap().columns.len(), 1);

        let drop = SchemaChange::DropTable {
            name: "LEADS".to_string(),
            if_exists: false,
        };
        state.apply_change(&drop).unwrap();
        assert!(state.schema().is_empty());
    }

    #[test]
    fn test_policy_on_missing_table_fails() {
        let mut state = SchemaState::default();
        let change = SchemaChange::EnableRowSecurity {
            table: "ghost".to_string(),
        };
        assert!(state.apply_change(&change).is_err());
    }
}
