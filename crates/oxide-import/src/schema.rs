//! Schema representation types.
//!
//! A [`SchemaSnapshot`] is the read-only view of the target database that the
//! introspection collaborator hands to the analyzer. The engine never mutates
//! it; plan replay works on its own copy (see [`crate::state`]).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::infer::CanonicalType;

/// Column types the planner can emit in generated DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Boolean.
    Boolean,
    /// Whole number.
    Integer,
    /// Arbitrary precision number.
    Numeric,
    /// Calendar date.
    Date,
    /// Variable-length character string with max length.
    Varchar(usize),
    /// Unbounded text.
    Text,
    /// Binary JSON document.
    Jsonb,
    /// UUID, used for surrogate keys.
    Uuid,
    /// Timestamp with time zone, used for bookkeeping columns.
    TimestampTz,
}

impl ColumnType {
    /// Returns the PostgreSQL type name.
    #[must_use]
    pub fn postgres_name(&self) -> String {
        match self {
            Self::Boolean => "BOOLEAN".to_string(),
            Self::Integer => "INTEGER".to_string(),
            Self::Numeric => "NUMERIC".to_string(),
            Self::Date => "DATE".to_string(),
            Self::Varchar(len) => format!("VARCHAR({})", len),
            Self::Text => "TEXT".to_string(),
            Self::Jsonb => "JSONB".to_string(),
            Self::Uuid => "UUID".to_string(),
            Self::TimestampTz => "TIMESTAMPTZ".to_string(),
        }
    }
}

impl From<CanonicalType> for ColumnType {
    fn from(value: CanonicalType) -> Self {
        match value {
            CanonicalType::Boolean => Self::Boolean,
            CanonicalType::Integer => Self::Integer,
            CanonicalType::Numeric => Self::Numeric,
            CanonicalType::Date => Self::Date,
            CanonicalType::Varchar => Self::Varchar(CanonicalType::VARCHAR_MAX_LEN),
            CanonicalType::Text => Self::Text,
            CanonicalType::Jsonb => Self::Jsonb,
        }
    }
}

/// Description of an existing column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,
    /// Database type name as reported by the catalog.
    #[serde(rename = "type")]
    pub data_type: String,
    /// Whether the column allows NULL values.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Whether this column is part of the primary key.
    #[serde(default)]
    pub is_primary_key: bool,
}

fn default_nullable() -> bool {
    true
}

impl ColumnDescriptor {
    /// Creates a nullable, non-key column.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            is_primary_key: false,
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
        self.is_primary_key = true;
        self.nullable = false;
        self
    }
}

/// Description of an existing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name.
    pub name: String,
    /// Columns in catalog order.
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    /// Creates a table without columns.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Adds a column to the table.
    #[must_use]
    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    /// Gets a column by exact name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns column names in catalog order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Point-in-time description of every table in the target database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// All tables, in catalog order.
    #[serde(default)]
    pub tables: Vec<TableDescriptor>,
}

impl SchemaSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table to the snapshot.
    #[must_use]
    pub fn table(mut self, table: TableDescriptor) -> Self {
        self.tables.push(table);
        self
    }

    /// Gets a table by exact name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Returns true if a table with this name exists, ignoring case.
    #[must_use]
    pub fn contains_table(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Returns table names.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }

    /// Returns true if the snapshot has no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Parses a snapshot from its JSON form.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a snapshot from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}
