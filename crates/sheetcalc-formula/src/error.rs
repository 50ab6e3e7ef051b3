//! Formula error types
//!
//! These are hard failures surfaced to the caller. Spreadsheet errors such as
//! `#REF!` are ordinary [`Value`](crate::Value)s and never appear here.

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula parsing or evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// Malformed formula text
    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    /// Wrong number of arguments for a known function
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// The model could not be read or written
    #[error("Model error: {0}")]
    Model(#[from] sheetcalc_core::Error),

    /// Nested cell evaluation went deeper than the configured limit
    #[error("Evaluation exceeded the maximum depth of {0} nested cells")]
    DepthLimit(usize),
}

impl FormulaError {
    /// Shorthand for a [`FormulaError::Syntax`]
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        FormulaError::Syntax {
            position,
            message: message.into(),
        }
    }
}
