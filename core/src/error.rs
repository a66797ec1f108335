//! Evaluation error types.

use std::fmt;

/// Categories of evaluation and definition errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Instance member, method or indexer used on a null value
    NullReference,
    /// `Value` read off an empty nullable
    EmptyNullable,
    /// A value does not have the type the expression expects
    TypeMismatch,
    /// Member or method name not declared on the type
    MissingMember,
    /// Array index outside the array
    IndexOutOfRange,
    /// Malformed type definition (duplicate member, redefinition, ...)
    InvalidDefinition,
    /// Expression shape the operation cannot handle
    Unsupported,
    /// Raised by user code: a property getter, method or equality operator
    User,
}

/// An evaluation error with context.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    /// The category of error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The expression that caused the error (if available)
    pub expression: Option<String>,
}

impl EvalError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            expression: None,
        }
    }

    /// Add expression context to the error.
    pub fn with_expression(mut self, expr: impl fmt::Display) -> Self {
        self.expression = Some(expr.to_string());
        self
    }

    pub fn null_reference(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::NullReference, what)
    }

    pub fn empty_nullable(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::EmptyNullable, what)
    }

    pub fn type_mismatch(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, what)
    }

    pub fn missing_member(type_name: impl fmt::Display, member: &str) -> Self {
        Self::new(
            ErrorKind::MissingMember,
            format!("`{type_name}` has no member named `{member}`"),
        )
    }

    pub fn index_out_of_range(index: i64, len: usize) -> Self {
        Self::new(
            ErrorKind::IndexOutOfRange,
            format!("index {index} is outside an array of length {len}"),
        )
    }

    pub fn invalid_definition(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidDefinition, what)
    }

    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported, what)
    }

    /// Error raised from user-supplied getters, methods and operators.
    pub fn user(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::User, what)
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref expr) = self.expression {
            // Truncate long expressions
            if expr.chars().count() > 60 {
                let head: String = expr.chars().take(57).collect();
                write!(f, " in: {head}...")?;
            } else {
                write!(f, " in: {expr}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {}

impl From<EvalError> for String {
    fn from(err: EvalError) -> String {
        err.to_string()
    }
}
