//! Ranks existing tables by field-name overlap with an import sample.
//!
//! A field counts as matched when some column name equals it, starts with it,
//! or contains it (or the reverse), all compared case-insensitively. The score
//! is `matched / max(fields, columns)`, so wide tables are not rewarded for
//! swallowing a narrow import.

use tracing::debug;

use crate::schema::{SchemaSnapshot, TableDescriptor};

/// Default minimum score for a table to be a candidate.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.5;

/// A candidate table and its overlap score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableMatch<'a> {
    /// The candidate table.
    pub table: &'a TableDescriptor,
    /// Overlap score (0.0 to 1.0).
    pub score: f64,
}

/// Outcome of matching a record shape against a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome<'a> {
    /// Candidates at or above the threshold, best first.
    Ranked(Vec<TableMatch<'a>>),
    /// No table cleared the threshold; a new table should be proposed.
    NoMatch,
}

impl<'a> MatchOutcome<'a> {
    /// Returns the best candidate, if any.
    #[must_use]
    pub fn best(&self) -> Option<&TableMatch<'a>> {
        match self {
            Self::Ranked(matches) => matches.first(),
            Self::NoMatch => None,
        }
    }
}

/// Scores snapshot tables against import field names.
#[derive(Debug, Clone)]
pub struct SchemaMatcher {
    threshold: f64,
}

impl Default for SchemaMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaMatcher {
    /// Creates a matcher with the default threshold.
    #[must_use]
    pub fn new() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }

    /// Creates a matcher with a custom threshold.
    #[must_use]
    pub fn with_threshold(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Ranks every table in the snapshot.
    ///
    /// Ties keep catalog order.
    #[must_use]
    pub fn rank<'a, S: AsRef<str>>(
        &self,
        field_names: &[S],
        snapshot: &'a SchemaSnapshot,
    ) -> MatchOutcome<'a> {
        let mut matches: Vec<TableMatch<'a>> = snapshot
            .tables
            .iter()
            .map(|table| TableMatch {
                table,
                score: score_table(field_names, table),
            })
            .filter(|m| m.score >= self.threshold)
            .collect();

        // `sort_by` is stable, so equal scores stay in catalog order.
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));

        debug!(
            fields = field_names.len(),
            tables = snapshot.tables.len(),
            candidates = matches.len(),
            "Ranked candidate tables"
        );

        if matches.is_empty() {
            MatchOutcome::NoMatch
        } else {
            MatchOutcome::Ranked(matches)
        }
    }
}

/// Computes the overlap score of one table.
#[must_use]
pub fn score_table<S: AsRef<str>>(field_names: &[S], table: &TableDescriptor) -> f64 {
    let denominator = field_names.len().max(table.columns.len());
    if denominator == 0 {
        return 0.0;
    }

    let columns: Vec<String> = table.column_names().map(str::to_lowercase).collect();
    let matched = field_names
        .iter()
        .filter(|field| {
            let field = field.as_ref().to_lowercase();
            columns.iter().any(|column| names_overlap(&field, column))
        })
        .count();

    matched as f64 / denominator as f64
}

/// Both arguments must already be lowercase.
fn names_overlap(field: &str, column: &str) -> bool {
    field == column
        || column.starts_with(field)
        || field.starts_with(column)
        || column.contains(field)
        || field.contains(column)
}
