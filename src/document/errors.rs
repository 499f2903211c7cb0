//! Document error types
//!
//! Error codes:
//! - GRAPHDOC_VALIDATION_FAILED
//! - GRAPHDOC_STRICT_MODE
//! - GRAPHDOC_HOOK_FAILED
//!
//! Cast failures keep the GRAPHDOC_CAST_FAILED code of the wrapped error.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::schema::{CastError, ValidatorError};

/// Result type for document operations
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Aggregate of every path that failed validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    /// Failures keyed by path
    pub errors: BTreeMap<String, ValidatorError>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure; a later failure for the same path replaces it.
    pub fn add(&mut self, error: ValidatorError) {
        self.errors.insert(error.path.clone(), error);
    }

    pub fn get(&self, path: &str) -> Option<&ValidatorError> {
        self.errors.get(path)
    }

    pub fn paths(&self) -> Vec<&str> {
        self.errors.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn code(&self) -> &'static str {
        "GRAPHDOC_VALIDATION_FAILED"
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed")?;
        if !self.errors.is_empty() {
            write!(f, ": {}", self.paths().join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Errors surfaced by document and model operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Cast(#[from] CastError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Path '{0}' is not declared in the schema")]
    StrictModeViolation(String),

    #[error("Hook '{name}' failed during {phase}: {message}")]
    Hook {
        phase: String,
        name: String,
        message: String,
    },
}

impl DocumentError {
    /// Create a hook failure
    pub fn hook(
        phase: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        DocumentError::Hook {
            phase: phase.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            DocumentError::Cast(e) => e.code(),
            DocumentError::Validation(e) => e.code(),
            DocumentError::StrictModeViolation(_) => "GRAPHDOC_STRICT_MODE",
            DocumentError::Hook { .. } => "GRAPHDOC_HOOK_FAILED",
        }
    }

    /// The aggregate validation error, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            DocumentError::Validation(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_validation_error_lists_paths() {
        let mut err = ValidationError::new();
        assert_eq!(format!("{}", err), "Validation failed");

        err.add(ValidatorError::new("name", "required"));
        err.add(ValidatorError::new("age", "min"));
        assert_eq!(err.len(), 2);
        assert_eq!(format!("{}", err), "Validation failed: age, name");
        assert_eq!(err.get("age").unwrap().kind, "min");
    }

    #[test]
    fn test_later_failure_replaces_earlier() {
        let mut err = ValidationError::new();
        err.add(ValidatorError::new("age", "min"));
        err.add(ValidatorError::new("age", "max"));
        assert_eq!(err.len(), 1);
        assert_eq!(err.get("age").unwrap().kind, "max");
    }

    #[test]
    fn test_error_codes() {
        let cast: DocumentError = CastError::new("number", Value::from("x")).into();
        assert_eq!(cast.code(), "GRAPHDOC_CAST_FAILED");

        let validation: DocumentError = ValidationError::new().into();
        assert_eq!(validation.code(), "GRAPHDOC_VALIDATION_FAILED");
        assert!(validation.as_validation().is_some());

        assert_eq!(
            DocumentError::StrictModeViolation("x".into()).code(),
            "GRAPHDOC_STRICT_MODE"
        );
        assert_eq!(
            DocumentError::hook("pre-save", "audit", "boom").code(),
            "GRAPHDOC_HOOK_FAILED"
        );
    }

    #[test]
    fn test_cast_display_passes_through() {
        let err: DocumentError = CastError::new("number", Value::from("abc")).at("age").into();
        assert_eq!(format!("{}", err), "Cast to number failed for value \"abc\"");
    }
}
