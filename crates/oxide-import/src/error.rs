//! Error types for import analysis.

/// Errors that can occur while analysing an import batch.
///
/// Low-confidence matches are never errors; they surface in the result as
/// confidence scores, advisory findings or an approval status.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The request carried no records.
    #[error("Import batch is empty")]
    EmptyBatch,

    /// The schema snapshot could not be obtained.
    #[error("Schema snapshot unavailable: {0}")]
    SchemaUnavailable(String),

    /// The operation graph contains a cycle.
    #[error("Circular dependency detected at operation '{operation}'")]
    CircularDependency {
        /// An operation that takes part in the cycle.
        operation: String,
    },

    /// An operation depends on an id that isn't part of the plan.
    #[error("Operation '{operation}' depends on '{dependency}' which doesn't exist")]
    UnknownDependency {
        /// The operation with the dangling dependency.
        operation: String,
        /// The missing operation id.
        dependency: String,
    },

    /// Two operations in one plan share an id.
    #[error("Duplicate operation id: {0}")]
    DuplicateOperation(String),

    /// Replaying a plan against a snapshot hit an impossible state.
    #[error("Invalid schema state: {0}")]
    InvalidState(String),

    /// IO error (reading snapshot files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for import analysis.
pub type Result<T> = std::result::Result<T, ImportError>;
