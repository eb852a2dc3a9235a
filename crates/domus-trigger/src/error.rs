//! Trigger compilation and evaluation errors

use domus_core::ValueKind;
use thiserror::Error;

/// A trigger failed to compile
///
/// Only the rule owning the trigger is rejected; positions are 1-based and
/// relative to the trigger source text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}:{column}: {message}")]
pub struct CompileError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl CompileError {
    pub(crate) fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

/// Result type for trigger compilation
pub type CompileResult<T> = Result<T, CompileError>;

/// Evaluation of a trigger was aborted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// The current value of `id` is not of the kind the comparison expects
    #[error("line {line}: type error: {id} is not a {expected} (found {found})")]
    TypeMismatch {
        line: usize,
        id: String,
        expected: ValueKind,
        found: ValueKind,
    },
}

/// Result type for trigger evaluation
pub type EvalResult<T> = Result<T, EvalError>;
