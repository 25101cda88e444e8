//! Import patterns: proposed mappings from a record shape to a table.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::PlannerOptions;
use crate::infer::CanonicalType;
use crate::keys::ForeignKeyTarget;
use crate::mapper::FieldMapper;
use crate::matcher::{MatchOutcome, SchemaMatcher};
use crate::schema::SchemaSnapshot;

/// One input row.
pub type ImportRecord = Map<String, Value>;

/// Confidence given to new-table proposals.
pub const NEW_TABLE_CONFIDENCE: f64 = 1.0;

/// Mapping of one import field to a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    /// Field name as it appears in the import.
    pub import_field: String,
    /// Column the field lands in.
    pub suggested_column: String,
    /// Inferred storage type.
    pub data_type: CanonicalType,
    /// Constraints carried over from the target column.
    pub constraints: Vec<String>,
    /// Whether the field looks like a reference.
    pub is_foreign_key_candidate: bool,
    /// Suggested referenced column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_key_target: Option<ForeignKeyTarget>,
    /// Whether the column doesn't exist yet.
    pub is_new_column: bool,
}

/// Cardinality of a suspected relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// One source row, many target rows.
    OneToMany,
    /// Many source rows, one target row.
    ManyToOne,
    /// Many to many.
    ManyToMany,
}

/// A suspected relationship between the import and another table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipHint {
    /// Cardinality.
    pub kind: RelationshipKind,
    /// Import field on the source side.
    pub source_field: String,
    /// Referenced table.
    pub target_table: String,
    /// Referenced field.
    pub target_field: String,
    /// Heuristic confidence (0.0 to 1.0).
    pub confidence: f64,
}

/// Proposed mapping of the import shape onto a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPattern {
    /// Existing table name, or the generated name of a new table.
    pub target_table_name: String,
    /// Whether the target table would be created by this import.
    pub is_new_table: bool,
    /// Match confidence (0.0 to 1.0).
    pub confidence_score: f64,
    /// Field-to-column mappings.
    pub field_mappings: Vec<FieldMapping>,
    /// Suspected relationships.
    pub relationship_hints: Vec<RelationshipHint>,
    /// Human-readable improvement suggestions.
    pub suggested_enhancements: Vec<String>,
}

impl ImportPattern {
    /// Returns true for an unambiguous new-table proposal.
    #[must_use]
    pub fn is_certain_new_table(&self) -> bool {
        self.is_new_table && self.confidence_score >= NEW_TABLE_CONFIDENCE
    }

    /// Returns mappings whose column doesn't exist yet.
    pub fn new_columns(&self) -> impl Iterator<Item = &FieldMapping> {
        self.field_mappings.iter().filter(|m| m.is_new_column)
    }
}

/// Detects relationships between import fields and other tables.
///
/// Not implemented yet: always returns an empty list. Foreign-key candidates
/// are reported on the individual [`FieldMapping`]s instead.
#[must_use]
pub fn detect_relationships(
    _mappings: &[FieldMapping],
    _snapshot: &SchemaSnapshot,
) -> Vec<RelationshipHint> {
    Vec::new()
}

/// Turns a record sample into ranked import patterns.
#[derive(Debug, Clone)]
pub struct PatternAnalyzer {
    matcher: SchemaMatcher,
    mapper: FieldMapper,
    max_candidates: Option<usize>,
}

impl Default for PatternAnalyzer {
    fn default() -> Self {
        Self::new(&PlannerOptions::default())
    }
}

impl PatternAnalyzer {
    /// Creates an analyzer from planner options.
    #[must_use]
    pub fn new(options: &PlannerOptions) -> Self {
        Self {
            matcher: SchemaMatcher::with_threshold(options.match_threshold),
            mapper: FieldMapper::with_options(options.identifier_max_bytes, &options.owner_column),
            max_candidates: options.max_candidates.map(|max| max.max(1)),
        }
    }

    /// Returns the field mapper in use.
    #[must_use]
    pub fn mapper(&self) -> &FieldMapper {
        &self.mapper
    }

    /// Analyses the shape of `sample`.
    ///
    /// Existing tables that clear the match threshold each yield a pattern,
    /// best first. When none does, a single new-table pattern is proposed.
    #[must_use]
    pub fn analyze(
        &self,
        sample: &ImportRecord,
        source_name: &str,
        snapshot: &SchemaSnapshot,
    ) -> Vec<ImportPattern> {
        let field_names: Vec<&str> = sample.keys().map(String::as_str).collect();

        match self.matcher.rank(&field_names, snapshot) {
            MatchOutcome::Ranked(candidates) => candidates
                .iter()
                .take(self.max_candidates.unwrap_or(usize::MAX))
                .map(|candidate| {
                    debug!(
                        table = %candidate.table.name,
                        score = candidate.score,
                        "Mapping onto existing table"
                    );
                    let mappings = self
                        .mapper
                        .build_mapping(&field_names, sample, Some(candidate.table));
                    let enhancements =
                        existing_table_enhancements(&candidate.table.name, &mappings);
                    ImportPattern {
                        target_table_name: candidate.table.name.clone(),
                        is_new_table: false,
                        confidence_score: candidate.score,
                        relationship_hints: detect_relationships(&mappings, snapshot),
                        field_mappings: mappings,
                        suggested_enhancements: enhancements,
                    }
                })
                .collect(),
            MatchOutcome::NoMatch => {
                let table_name = self.mapper.suggest_table_name(source_name, snapshot);
                info!(table = %table_name, "No matching table, proposing a new one");
                let mappings = self.mapper.build_mapping(&field_names, sample, None);
                let enhancements = new_table_enhancements(&table_name, &mappings);
                vec![ImportPattern {
                    target_table_name: table_name,
                    is_new_table: true,
                    confidence_score: NEW_TABLE_CONFIDENCE,
                    relationship_hints: detect_relationships(&mappings, snapshot),
                    field_mappings: mappings,
                    suggested_enhancements: enhancements,
                }]
            }
        }
    }
}

fn new_table_enhancements(table: &str, mappings: &[FieldMapping]) -> Vec<String> {
    let mut enhancements = Vec::new();
    for mapping in mappings {
        if let Some(target) = &mapping.foreign_key_target {
            enhancements.push(format!(
                "Add an index on '{}.{}' to speed up joins with '{}'",
                table, mapping.suggested_column, target.table
            ));
        }
        if mapping.data_type == CanonicalType::Jsonb {
            enhancements.push(format!(
                "Consider normalizing structured field '{}' into its own table",
                mapping.import_field
            ));
        }
    }
    enhancements
}

fn existing_table_enhancements(table: &str, mappings: &[FieldMapping]) -> Vec<String> {
    let unmapped = mappings.iter().filter(|m| m.is_new_column).count();
    if unmapped == 0 {
        Vec::new()
    } else {
        vec![format!(
            "{} field(s) have no matching column in '{}' and would need new columns",
            unmapped, table
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDescriptor, TableDescriptor};
    use serde_json::json;

    fn sample(value: Value) -> ImportRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_new_table_pattern() {
        let patterns = PatternAnalyzer::default().analyze(
            &sample(json!({"name": "Acme", "email": "a@acme.com"})),
            "vendors",
            &SchemaSnapshot::new(),
        );

        assert_eq!(patterns.len(), 1);
        let pattern = &patterns[0];
        assert!(pattern.is_certain_new_table());
        assert_eq!(pattern.target_table_name, "import_vendors");
        assert_eq!(pattern.field_mappings.len(), 2);
        assert!(pattern.relationship_hints.is_empty());
    }

    #[test]
    fn test_existing_table_pattern() {
        let snapshot = SchemaSnapshot::new().table(
            TableDescriptor::new("contacts")
                .column(ColumnDescriptor::new("name", "text"))
                .column(ColumnDescriptor::new("email", "text"))
                .column(ColumnDescriptor::new("phone", "text")),
        );
        let patterns = PatternAnalyzer::default().analyze(
            &sample(json!({"name": "Acme", "email": "a@acme.com"})),
            "vendors",
            &snapshot,
        );

        assert_eq!(patterns.len(), 1);
        assert!(!patterns[0].is_new_table);
        assert!(!patterns[0].is_certain_new_table());
        assert!((patterns[0].confidence_score - 2.0 / 3.0).abs() < 1e-9);
        assert!(patterns[0].suggested_enhancements.is_empty());
    }

    #[test]
    fn test_candidates_are_capped() {
        let snapshot = (0..5).fold(SchemaSnapshot::new(), |s, i| {
            s.table(
                TableDescriptor::new(format!("t{}", i))
                    .column(ColumnDescriptor::new("name", "text")),
            )
        });
        let options = PlannerOptions::new().with_max_candidates(2);
        let patterns = PatternAnalyzer::new(&options).analyze(
            &sample(json!({"name": "x"})),
            "src",
            &snapshot,
        );
        let names: Vec<&str> = patterns
            .iter()
            .map(|p| p.target_table_name.as_str())
            .collect();
        assert_eq!(names, vec!["t0", "t1"]);
    }

    #[test]
    fn test_every_candidate_reported_by_default() {
        let snapshot = ["a", "b", "c"]
            .iter()
            .fold(SchemaSnapshot::new(), |s, name| {
                s.table(
                    TableDescriptor::new(*name)
                        .column(ColumnDescriptor::new("name", "text"))
                        .column(ColumnDescriptor::new("email", "text")),
                )
            })
            .table(
                TableDescriptor::new("d")
                    .column(ColumnDescriptor::new("name", "text"))
                    .column(ColumnDescriptor::new("email", "text"))
                    .column(ColumnDescriptor::new("phone", "text")),
            );
        let patterns = PatternAnalyzer::default().analyze(
            &sample(json!({"name": "Acme", "email": "a@acme.com"})),
            "crm",
            &snapshot,
        );

        let names: Vec<&str> = patterns
            .iter()
            .map(|p| p.target_table_name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert!(patterns[3].confidence_score < 0.7);
    }

    #[test]
    fn test_enhancements_for_keys_and_documents() {
        let patterns = PatternAnalyzer::default().analyze(
            &sample(json!({"user_id": "u1", "payload": {"a": 1}})),
            "events",
            &SchemaSnapshot::new(),
        );
        let enhancements = &patterns[0].suggested_enhancements;
        assert_eq!(enhancements.len(), 2);
        assert!(enhancements.iter().any(|e| e.contains("'users'")));
        assert!(enhancements.iter().any(|e| e.contains("'payload'")));
    }
}
