//! Error types for lead intake.

use crate::pipeline::types::Field;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
///
/// Any of these reaching the orchestrator means persistence is broken.
/// The one exception is `Constraint`, which the lead store uses to reject
/// a lead that fails validation.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Why a message could not be turned into a lead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("Missing required fields: {}", join_fields(.fields))]
    MissingFields { fields: Vec<Field> },

    #[error("Invalid email format: {value}")]
    InvalidEmailFormat { value: String },

    /// Anything else that went wrong while decoding or extracting.
    #[error("{0}")]
    Malformed(String),
}

impl ParseErrorKind {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MissingFields { .. } => "missing_fields",
            Self::InvalidEmailFormat { .. } => "invalid_email_format",
            Self::Malformed(_) => "malformed",
        }
    }
}

fn join_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .map(Field::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A classified parse failure for one input file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to parse email {filename}: {kind}")]
pub struct ParseFailure {
    pub filename: String,
    pub kind: ParseErrorKind,
}

impl ParseFailure {
    pub fn new(filename: impl Into<String>, kind: ParseErrorKind) -> Self {
        Self {
            filename: filename.into(),
            kind,
        }
    }
}

/// Upload acceptance and staging errors.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("{filename} must be a .eml file")]
    InvalidExtension { filename: String },

    #[error("{filename} is empty")]
    Empty { filename: String },

    #[error("Upload has no filename")]
    MissingFilename,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that escape a pipeline run.
///
/// Bad input never shows up here; it is recorded as a failed ledger entry.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Storage failure: {0}")]
    Storage(#[from] DatabaseError),

    #[error("Upload failed: {0}")]
    Upload(#[from] UploadError),
}
