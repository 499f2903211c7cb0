//! Schema and cast error types
//!
//! Error codes:
//! - GRAPHDOC_CAST_FAILED
//! - GRAPHDOC_VALIDATOR_FAILED
//! - GRAPHDOC_SCHEMA_RESERVED_PATH
//! - GRAPHDOC_SCHEMA_DUPLICATE_PATH
//! - GRAPHDOC_SCHEMA_DUPLICATE
//! - GRAPHDOC_SCHEMA_MALFORMED

use thiserror::Error;

use crate::value::Value;

/// Result type for schema definition operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for casting
pub type CastResult<T> = Result<T, CastError>;

/// A value could not be coerced to the declared type of a path.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Cast to {kind} failed for value \"{value}\"")]
pub struct CastError {
    /// Declared type name (e.g. "number")
    pub kind: String,
    /// The offending raw value
    pub value: Value,
    /// Path being assigned, when known
    pub path: Option<String>,
}

impl CastError {
    pub fn new(kind: impl Into<String>, value: Value) -> Self {
        Self {
            kind: kind.into(),
            value,
            path: None,
        }
    }

    /// Attaches the path being assigned.
    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn code(&self) -> &'static str {
        "GRAPHDOC_CAST_FAILED"
    }
}

/// A single constraint failed for one path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Validator \"{kind}\" failed for path {path}")]
pub struct ValidatorError {
    /// Path that failed
    pub path: String,
    /// Validator kind (e.g. "required", "min", or a user-supplied name)
    pub kind: String,
}

impl ValidatorError {
    pub fn new(path: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: kind.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        "GRAPHDOC_VALIDATOR_FAILED"
    }
}

/// Errors raised while defining or loading a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Path '{0}' collides with a reserved document name")]
    ReservedPath(String),

    #[error("Path '{0}' is already declared")]
    DuplicatePath(String),

    #[error("Schema '{0}' is already registered")]
    DuplicateSchema(String),

    #[error("Malformed schema '{source_name}': {reason}")]
    Malformed { source_name: String, reason: String },
}

impl SchemaError {
    /// Create an error for a malformed schema definition
    pub fn malformed(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::Malformed {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaError::ReservedPath(_) => "GRAPHDOC_SCHEMA_RESERVED_PATH",
            SchemaError::DuplicatePath(_) => "GRAPHDOC_SCHEMA_DUPLICATE_PATH",
            SchemaError::DuplicateSchema(_) => "GRAPHDOC_SCHEMA_DUPLICATE",
            SchemaError::Malformed { .. } => "GRAPHDOC_SCHEMA_MALFORMED",
        }
    }
}
