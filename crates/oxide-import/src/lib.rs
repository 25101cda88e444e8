//! Schema-aware import reconciliation and migration planning.
//!
//! `oxide-import` looks at a batch of semi-structured records and an existing
//! relational schema and works out where the records belong:
//! - Which existing table the record shape most plausibly matches
//! - How each field maps onto an existing or new column, with inferred types
//!   and foreign-key candidates
//! - A reversible migration plan (DDL plus rollback) for new tables
//! - Safety findings and a gating status (`success`, `warning`,
//!   `requires_approval`, `error`)
//!
//! The engine never executes DDL. It returns a plan and a verdict.
//!
//! # Architecture
//!
//! - **Infer** - Canonical column type for a sample value
//! - **Keys** - Foreign-key candidate detection as an ordered rule table
//! - **Matcher** - Scores existing tables by field-name overlap
//! - **Mapper** - Field-to-column mappings and identifier sanitising
//! - **Plan** - Ordered, reversible migration operations
//! - **Safety** - Data-integrity, performance and security checks
//! - **Decision** - Final status and next steps
//! - **Analyzer** - Request/response service tying the stages together
//!
//! # Example
//!
//! ```rust
//! use oxide_import::prelude::*;
//! use serde_json::json;
//!
//! let snapshot = SchemaSnapshot::new().table(
//!     TableDescriptor::new("contacts")
//!         .column(ColumnDescriptor::new("name", "text"))
//!         .column(ColumnDescriptor::new("email", "text"))
//!         .column(ColumnDescriptor::new("phone", "text")),
//! );
//! let record = json!({"name": "Acme", "email": "a@acme.com"});
//! let request = AnalysisRequest::new("crm_export", vec![record.as_object().unwrap().clone()]);
//!
//! let response = ImportAnalyzer::default().analyze(&request, &snapshot).unwrap();
//! assert_eq!(response.result.status, AnalysisStatus::RequiresApproval);
//! assert_eq!(response.result.patterns[0].target_table_name, "contacts");
//! ```

pub mod analyzer;
pub mod config;
pub mod decision;
pub mod dialect;
pub mod error;
pub mod infer;
pub mod keys;
pub mod mapper;
pub mod matcher;
pub mod operations;
pub mod pattern;
pub mod plan;
pub mod safety;
pub mod schema;
pub mod state;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::analyzer::{
        AnalysisRequest, AnalysisResponse, AnalysisResult, AnalysisSummary, ImportAnalyzer,
        ImportSession, JsonFileSchemaSource, MemorySessionLog, SchemaSource, SessionRecorder,
    };
    pub use crate::config::PlannerOptions;
    pub use crate::decision::{AnalysisStatus, Decision, DecisionEngine, UserPreferences};
    pub use crate::dialect::{MigrationDialect, PostgresDialect};
    pub use crate::error::{ImportError, Result};
    pub use crate::infer::{infer_type, CanonicalType};
    pub use crate::keys::{suggest_foreign_key_target, ForeignKeyTarget, KeyRule};
    pub use crate::mapper::FieldMapper;
    pub use crate::matcher::{MatchOutcome, SchemaMatcher, TableMatch};
    pub use crate::operations::{
        ColumnSpec, MigrationOperation, OperationKind, RiskTier, SchemaChange, TableDefinition,
    };
    pub use crate::pattern::{FieldMapping, ImportPattern, ImportRecord, PatternAnalyzer};
    pub use crate::plan::{MigrationPlan, PlanBuilder};
    pub use crate::safety::{SafetyChecker, SafetyDimension, SafetyFinding};
    pub use crate::schema::{ColumnDescriptor, ColumnType, SchemaSnapshot, TableDescriptor};
    pub use crate::state::SchemaState;
}
