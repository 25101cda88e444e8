//! Maps import fields onto table columns.
//!
//! Mapping never fails: a field that doesn't line up with any existing column
//! falls back to a sanitised column name of its own.

use std::collections::HashSet;

use crate::infer::infer_type;
use crate::keys::{is_foreign_key_candidate, suggest_foreign_key_target};
use crate::pattern::{FieldMapping, ImportRecord};
use crate::schema::{ColumnDescriptor, SchemaSnapshot, TableDescriptor};

/// Identifier length limit of common relational engines, in bytes.
pub const DEFAULT_IDENTIFIER_MAX_BYTES: usize = 63;

/// Columns every generated table carries besides the mapped fields.
pub const SURROGATE_KEY_COLUMN: &str = "id";
/// Creation timestamp column.
pub const CREATED_AT_COLUMN: &str = "created_at";
/// Update timestamp column.
pub const UPDATED_AT_COLUMN: &str = "updated_at";

const DIGIT_GUARD: char = 'c';
const FALLBACK_COLUMN: &str = "field";
const FALLBACK_TABLE: &str = "imported_records";
const TABLE_PREFIX: &str = "import_";

/// Lowercases a name and replaces everything outside `[a-z0-9_]` with `_`.
///
/// The result is cut to `max_bytes` and prefixed with a letter if it would
/// otherwise start with a digit.
#[must_use]
pub fn sanitize_identifier(name: &str, max_bytes: usize) -> String {
    let mut ident: String = name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, DIGIT_GUARD);
    }
    // Only ASCII remains, so byte truncation never splits a character.
    ident.truncate(max_bytes);
    ident
}

/// Returns `base`, or `base_2`, `base_3`, ... if taken, within `max_bytes`.
fn unique_name(base: &str, taken: &HashSet<String>, max_bytes: usize) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    let mut n = 2usize;
    loop {
        let suffix = format!("_{}", n);
        let mut stem = base.to_string();
        stem.truncate(max_bytes.saturating_sub(suffix.len()));
        let candidate = format!("{}{}", stem, suffix);
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Builds field-to-column mappings.
#[derive(Debug, Clone)]
pub struct FieldMapper {
    max_bytes: usize,
    reserved: Vec<String>,
}

impl Default for FieldMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldMapper {
    /// Creates a mapper with the default identifier limit and owner column.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(DEFAULT_IDENTIFIER_MAX_BYTES, "owner_id")
    }

    /// Creates a mapper with a custom identifier limit and owner column.
    #[must_use]
    pub fn with_options(max_bytes: usize, owner_column: &str) -> Self {
        Self {
            max_bytes,
            reserved: vec![
                SURROGATE_KEY_COLUMN.to_string(),
                owner_column.to_string(),
                CREATED_AT_COLUMN.to_string(),
                UPDATED_AT_COLUMN.to_string(),
            ],
        }
    }

    /// Sanitises a name with this mapper's identifier limit.
    #[must_use]
    pub fn sanitize(&self, name: &str) -> String {
        sanitize_identifier(name, self.max_bytes)
    }

    /// Maps every field of the sample.
    ///
    /// With a chosen table, fields resolve to existing columns where possible.
    /// Without one, every field becomes a column of a brand-new table.
    #[must_use]
    pub fn build_mapping<S: AsRef<str>>(
        &self,
        field_names: &[S],
        sample: &ImportRecord,
        table: Option<&TableDescriptor>,
    ) -> Vec<FieldMapping> {
        match table {
            Some(table) => self.map_onto_existing(field_names, sample, table),
            None => self.map_onto_new(field_names, sample),
        }
    }

    fn map_onto_existing<S: AsRef<str>>(
        &self,
        field_names: &[S],
        sample: &ImportRecord,
        table: &TableDescriptor,
    ) -> Vec<FieldMapping> {
        let mut taken: HashSet<String> = table.column_names().map(str::to_lowercase).collect();
        field_names
            .iter()
            .map(|field| {
                let field = field.as_ref();
                let sanitized = self.column_name_for(field);
                let existing =
                    find_column(field, table).or_else(|| find_column(&sanitized, table));
                match existing {
                    Some(column) => {
                        let mut mapping = base_mapping(field, column.name.clone(), sample);
                        mapping.is_new_column = false;
                        if column.is_primary_key {
                            mapping.constraints.push("PRIMARY KEY".to_string());
                        } else if !column.nullable {
                            mapping.constraints.push("NOT NULL".to_string());
                        }
                        mapping
                    }
                    None => {
                        let column = unique_name(&sanitized, &taken, self.max_bytes);
                        taken.insert(column.clone());
                        base_mapping(field, column, sample)
                    }
                }
            })
            .collect()
    }

    fn map_onto_new<S: AsRef<str>>(
        &self,
        field_names: &[S],
        sample: &ImportRecord,
    ) -> Vec<FieldMapping> {
        let mut taken: HashSet<String> = self.reserved.iter().cloned().collect();
        field_names
            .iter()
            .map(|field| {
                let field = field.as_ref();
                let column = unique_name(&self.column_name_for(field), &taken, self.max_bytes);
                taken.insert(column.clone());
                base_mapping(field, column, sample)
            })
            .collect()
    }

    fn column_name_for(&self, field: &str) -> String {
        let column = self.sanitize(field);
        if column.is_empty() {
            FALLBACK_COLUMN.to_string()
        } else {
            column
        }
    }

    /// Generates the name of the table proposed for an unmatched import.
    ///
    /// The name is unique against the snapshot so the creation never collides
    /// with an existing table.
    #[must_use]
    pub fn suggest_table_name(&self, source_name: &str, snapshot: &SchemaSnapshot) -> String {
        let prefixed = self.sanitize(&format!("{}{}", TABLE_PREFIX, source_name));
        let stem = prefixed
            .strip_prefix(TABLE_PREFIX)
            .unwrap_or_default()
            .trim_matches('_');
        let base = if stem.is_empty() {
            FALLBACK_TABLE.to_string()
        } else {
            self.sanitize(&format!("{}{}", TABLE_PREFIX, stem))
        };

        let taken: HashSet<String> = snapshot.table_names().map(str::to_lowercase).collect();
        unique_name(&base, &taken, self.max_bytes)
    }
}

/// Exact case-insensitive match first, then substring in either direction.
fn find_column<'a>(field: &str, table: &'a TableDescriptor) -> Option<&'a ColumnDescriptor> {
    let lowered = field.to_lowercase();
    table
        .columns
        .iter()
        .find(|c| c.name.to_lowercase() == lowered)
        .or_else(|| {
            table.columns.iter().find(|c| {
                let column = c.name.to_lowercase();
                column.contains(&lowered) || lowered.contains(&column)
            })
        })
}

fn base_mapping(field: &str, column: String, sample: &ImportRecord) -> FieldMapping {
    let value = sample.get(field).unwrap_or(&serde_json::Value::Null);
    FieldMapping {
        import_field: field.to_string(),
        suggested_column: column,
        data_type: infer_type(value),
        constraints: Vec::new(),
        is_foreign_key_candidate: is_foreign_key_candidate(field, value),
        foreign_key_target: suggest_foreign_key_target(field, value),
        is_new_column: true,
    }
}
