// ABOUTME: Error types for reader, validator, evaluator and storage failures

use crate::value::Value;
use thiserror::Error;

// ===== Arity constant strings (eliminates allocations in error paths) =====
pub const ARITY_ONE: &str = "1";
pub const ARITY_TWO: &str = "2";
pub const ARITY_AT_LEAST_ONE: &str = "at least 1";
pub const ARITY_ONE_TO_THREE: &str = "1-3";
pub const ARITY_TWO_OR_THREE: &str = "2-3";

#[derive(Error, Debug, Clone)]
pub enum ScmError {
    /// Reader could not tokenize or parse the input
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Declaration validator rejected a form before evaluation
    #[error("{location}: {message}")]
    ValidationError { location: String, message: String },

    /// Primitive called with the wrong value kind at runtime
    #[error("{function}: expected {expected}, got {actual} at argument {position}")]
    TypeMismatch {
        function: String,
        expected: String,
        actual: &'static str,
        position: usize,
    },

    #[error("{function}: expected {expected} argument{}, got {actual}", if *.expected == "1" { "" } else { "s" })]
    ArityError {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Unknown table, column, database or help target
    #[error("not found: {0}")]
    NotFound(String),

    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("value is not callable: {0}")]
    NotCallable(String),

    /// Runtime error with function context
    #[error("{function}: {message}")]
    RuntimeError { function: String, message: String },

    /// I/O failure in load/import/network accept
    #[error("host fault: {0}")]
    HostFault(String),
}

impl ScmError {
    /// Create a type mismatch error with full context
    pub fn type_error(function: &str, expected: &str, actual: &Value, position: usize) -> Self {
        ScmError::TypeMismatch {
            function: function.to_string(),
            expected: expected.to_string(),
            actual: actual.type_name(),
            position,
        }
    }

    /// Create an arity error with expected and actual counts
    pub fn arity_error(function: &str, expected: impl Into<String>, actual: usize) -> Self {
        ScmError::ArityError {
            function: function.to_string(),
            expected: expected.into(),
            actual,
        }
    }

    /// Create a runtime error with function context
    pub fn runtime_error(function: &str, message: impl Into<String>) -> Self {
        ScmError::RuntimeError {
            function: function.to_string(),
            message: message.into(),
        }
    }

    /// Wrap an I/O failure with the path or endpoint it concerns
    pub fn host_fault(context: &str, err: impl std::fmt::Display) -> Self {
        ScmError::HostFault(format!("{context}: {err}"))
    }
}
