//! Error types for sheetcalc-core

use crate::cell::ErrorKind;
use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving references or accessing the model
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Reference text that cannot be parsed
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// A reference that falls outside the sheet grid
    #[error("Reference out of bounds: row {row}, column {col}")]
    RefOutOfBounds { row: i64, col: i64 },

    /// A zero-sized height or width
    #[error("Invalid dimension: height {height}, width {width}")]
    InvalidDimension { height: i64, width: i64 },

    /// Sheet not found by name
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// Invalid sheet name
    #[error("Invalid sheet name: {0}")]
    InvalidSheetName(String),

    /// Duplicate sheet name
    #[error("Sheet name already exists: {0}")]
    DuplicateSheetName(String),

    /// Invalid defined name
    #[error("Invalid name: {0}")]
    InvalidName(String),
}

impl Error {
    /// The spreadsheet error value this failure surfaces as inside a formula
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            Error::RefOutOfBounds { .. } => ErrorKind::Ref,
            Error::InvalidDimension { .. } => ErrorKind::Value,
            Error::InvalidReference(_)
            | Error::SheetNotFound(_)
            | Error::InvalidSheetName(_)
            | Error::DuplicateSheetName(_)
            | Error::InvalidName(_) => ErrorKind::Name,
        }
    }
}
