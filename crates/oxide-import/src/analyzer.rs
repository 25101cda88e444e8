//! Request-level analysis service.
//!
//! [`ImportAnalyzer`] runs the whole pipeline for one request: pattern
//! analysis, plan building, safety checks and the final decision. It holds
//! no per-request state and can be shared between threads.
//!
//! # Example
//!
//! ```
//! use oxide_import::analyzer::{AnalysisRequest, ImportAnalyzer};
//! use oxide_import::decision::AnalysisStatus;
//! use oxide_import::schema::SchemaSnapshot;
//! use serde_json::json;
//!
//! let record = json!({"name": "Acme", "email": "a@acme.com"});
//! let request = AnalysisRequest::new("vendors", vec![record.as_object().unwrap().clone()]);
//!
//! let response = ImportAnalyzer::default()
//!     .analyze(&request, &SchemaSnapshot::new())
//!     .unwrap();
//! assert_eq!(response.result.status, AnalysisStatus::Success);
//! assert_eq!(response.summary.migration_operation_count, 1);
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::PlannerOptions;
use crate::decision::{AnalysisStatus, DecisionEngine, UserPreferences};
use crate::dialect::{MigrationDialect, PostgresDialect};
use crate::error::{ImportError, Result};
use crate::pattern::{ImportPattern, ImportRecord, PatternAnalyzer};
use crate::plan::{MigrationPlan, PlanBuilder};
use crate::safety::{SafetyChecker, SafetyFinding};
use crate::schema::SchemaSnapshot;

/// Provides the current schema snapshot.
pub trait SchemaSource: Send + Sync {
    /// Returns the snapshot to analyse against.
    fn get_schema_snapshot(&self) -> Result<SchemaSnapshot>;
}

impl SchemaSource for SchemaSnapshot {
    fn get_schema_snapshot(&self) -> Result<SchemaSnapshot> {
        Ok(self.clone())
    }
}

/// Reads the snapshot from a JSON file on every call.
#[derive(Debug, Clone)]
pub struct JsonFileSchemaSource {
    path: PathBuf,
}

impl JsonFileSchemaSource {
    /// Creates a source reading from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SchemaSource for JsonFileSchemaSource {
    fn get_schema_snapshot(&self) -> Result<SchemaSnapshot> {
        SchemaSnapshot::from_json_file(&self.path).map_err(|e| {
            ImportError::SchemaUnavailable(format!("{}: {}", self.path.display(), e))
        })
    }
}

/// One analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// Records to import. Only the first record's shape is analysed.
    pub records: Vec<ImportRecord>,
    /// Name of the import source (file name, feed name).
    pub source_name: String,
    /// Caller preferences.
    #[serde(default)]
    pub user_preferences: UserPreferences,
}

impl AnalysisRequest {
    /// Creates a request with default preferences.
    pub fn new(source_name: impl Into<String>, records: Vec<ImportRecord>) -> Self {
        Self {
            records,
            source_name: source_name.into(),
            user_preferences: UserPreferences::default(),
        }
    }

    /// Sets the caller preferences.
    #[must_use]
    pub fn with_preferences(mut self, preferences: UserPreferences) -> Self {
        self.user_preferences = preferences;
        self
    }
}

/// Full outcome of an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Candidate patterns, best first.
    pub patterns: Vec<ImportPattern>,
    /// Generated migration plan.
    pub plan: MigrationPlan,
    /// Safety findings, one per dimension.
    pub findings: Vec<SafetyFinding>,
    /// Human-readable recommendations.
    pub recommendations: Vec<String>,
    /// Gating status.
    pub status: AnalysisStatus,
    /// Ordered next steps.
    pub next_steps: Vec<String>,
    /// Whether the plan may be applied without review.
    pub auto_apply_eligible: bool,
}

/// Counts describing an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    /// Records in the request.
    pub total_records: usize,
    /// Patterns returned.
    pub patterns_found: usize,
    /// Patterns scoring above the high-confidence mark.
    pub high_confidence_pattern_count: usize,
    /// Operations in the plan.
    pub migration_operation_count: usize,
    /// Safety checks that passed.
    pub safety_checks_passed: usize,
    /// Safety checks run.
    pub safety_checks_total: usize,
}

/// Analysis result plus its summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    /// The result.
    #[serde(flatten)]
    pub result: AnalysisResult,
    /// The summary block.
    pub summary: AnalysisSummary,
}

/// Audit record handed to a [`SessionRecorder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSession {
    /// Name of the import source.
    pub source_name: String,
    /// Records in the request.
    pub total_records: usize,
    /// When the analysis finished.
    pub analyzed_at: DateTime<Utc>,
    /// What was returned to the caller.
    pub response: AnalysisResponse,
}

/// Persists import sessions for audit and history.
pub trait SessionRecorder: Send + Sync {
    /// Stores one session.
    fn record(&self, session: ImportSession) -> Result<()>;
}

/// In-memory session log.
#[derive(Debug, Default)]
pub struct MemorySessionLog {
    sessions: Mutex<Vec<ImportSession>>,
}

impl MemorySessionLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded sessions, oldest first.
    #[must_use]
    pub fn sessions(&self) -> Vec<ImportSession> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of recorded sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionRecorder for MemorySessionLog {
    fn record(&self, session: ImportSession) -> Result<()> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(session);
        Ok(())
    }
}

/// Runs import analyses.
#[derive(Debug, Clone)]
pub struct ImportAnalyzer<D: MigrationDialect = PostgresDialect> {
    options: PlannerOptions,
    patterns: PatternAnalyzer,
    planner: PlanBuilder<D>,
    safety: SafetyChecker,
    decision: DecisionEngine,
}

impl Default for ImportAnalyzer<PostgresDialect> {
    fn default() -> Self {
        Self::new(PlannerOptions::default())
    }
}

impl ImportAnalyzer<PostgresDialect> {
    /// Creates an analyzer generating PostgreSQL plans.
    #[must_use]
    pub fn new(options: PlannerOptions) -> Self {
        Self::with_dialect(PostgresDialect::new(), options)
    }
}

impl<D: MigrationDialect> ImportAnalyzer<D> {
    /// Creates an analyzer for the given dialect.
    pub fn with_dialect(dialect: D, options: PlannerOptions) -> Self {
        Self {
            patterns: PatternAnalyzer::new(&options),
            planner: PlanBuilder::new(dialect, options.clone()),
            safety: SafetyChecker::new(&options),
            decision: DecisionEngine::new(&options),
            options,
        }
    }

    /// Returns the options in use.
    #[must_use]
    pub fn options(&self) -> &PlannerOptions {
        &self.options
    }

    /// Analyses one request against the snapshot from `source`.
    ///
    /// Fails only for an empty batch, an unavailable snapshot or an
    /// unorderable plan. Uncertain matches are reported in the result.
    pub fn analyze(
        &self,
        request: &AnalysisRequest,
        source: &dyn SchemaSource,
    ) -> Result<AnalysisResponse> {
        let sample = request.records.first().ok_or(ImportError::EmptyBatch)?;
        info!(
            source = %request.source_name,
            records = request.records.len(),
            "Analysing import batch"
        );

        let snapshot = source.get_schema_snapshot().map_err(|e| match e {
            ImportError::SchemaUnavailable(_) => e,
            other => ImportError::SchemaUnavailable(other.to_string()),
        })?;
        debug!(tables = snapshot.tables.len(), "Loaded schema snapshot");

        let patterns = self
            .patterns
            .analyze(sample, &request.source_name, &snapshot);
        let plan = self.planner.build(&request.source_name, &patterns)?;
        let findings = self.safety.check(&plan, &snapshot);
        let preferences = &request.user_preferences;
        let decision = self
            .decision
            .decide(&patterns, &plan, &findings, preferences);
        let recommendations =
            self.recommendations(&patterns, &plan, &findings, &snapshot, preferences);

        let summary = AnalysisSummary {
            total_records: request.records.len(),
            patterns_found: patterns.len(),
            high_confidence_pattern_count: patterns
                .iter()
                .filter(|p| p.confidence_score > self.options.high_confidence)
                .count(),
            migration_operation_count: plan.operations.len(),
            safety_checks_passed: findings.iter().filter(|f| f.passed).count(),
            safety_checks_total: findings.len(),
        };

        info!(
            source = %request.source_name,
            status = ?decision.status,
            patterns = summary.patterns_found,
            operations = summary.migration_operation_count,
            "Import analysis complete"
        );

        Ok(AnalysisResponse {
            result: AnalysisResult {
                auto_apply_eligible: preferences.auto_apply_safe_migrations
                    && decision.status == AnalysisStatus::Success,
                patterns,
                plan,
                findings,
                recommendations,
                status: decision.status,
                next_steps: decision.next_steps,
            },
            summary,
        })
    }

    /// Analyses a request and hands the outcome to `recorder`.
    pub fn analyze_and_record(
        &self,
        request: &AnalysisRequest,
        source: &dyn SchemaSource,
        recorder: &dyn SessionRecorder,
    ) -> Result<AnalysisResponse> {
        let response = self.analyze(request, source)?;
        recorder.record(ImportSession {
            source_name: request.source_name.clone(),
            total_records: request.records.len(),
            analyzed_at: Utc::now(),
            response: response.clone(),
        })?;
        Ok(response)
    }

    fn recommendations(
        &self,
        patterns: &[ImportPattern],
        plan: &MigrationPlan,
        findings: &[SafetyFinding],
        snapshot: &SchemaSnapshot,
        preferences: &UserPreferences,
    ) -> Vec<String> {
        let mut out = Vec::new();
        let mut push = |line: String| {
            if !out.contains(&line) {
                out.push(line);
            }
        };

        for pattern in patterns {
            for enhancement in &pattern.suggested_enhancements {
                push(enhancement.clone());
            }
        }

        for finding in findings.iter().filter(|f| !f.passed) {
            if let Some(warning) = &finding.warning {
                push(format!("Safety: {}", warning));
            }
        }

        if plan.backup_required {
            push("Back up the database before executing the migration".to_string());
        }

        for pattern in patterns.iter().filter(|p| !p.is_new_table) {
            push(format!(
                "Records resemble existing table '{}' (confidence {:.2}); review the field mapping manually",
                pattern.target_table_name, pattern.confidence_score
            ));
        }

        let created: BTreeSet<&str> = patterns
            .iter()
            .filter(|p| p.is_certain_new_table())
            .map(|p| p.target_table_name.as_str())
            .collect();
        for target in patterns
            .iter()
            .flat_map(|p| &p.field_mappings)
            .filter_map(|m| m.foreign_key_target.as_ref())
        {
            if !snapshot.contains_table(&target.table) && !created.contains(target.table.as_str())
            {
                push(format!(
                    "Referenced table '{}' doesn't exist; create it before executing the migration",
                    target.table
                ));
            }
        }

        if preferences.enforce_naming_conventions {
            for mapping in patterns
                .iter()
                .flat_map(|p| &p.field_mappings)
                .filter(|m| m.is_new_column && m.suggested_column != m.import_field)
            {
                push(format!(
                    "Rename field '{}' to '{}' to follow naming conventions",
                    mapping.import_field, mapping.suggested_column
                ));
            }
        }

        if preferences.generate_typed_bindings {
            for table in &created {
                push(format!("Regenerate typed bindings to include table '{}'", table));
            }
        }

        out
    }
}
