//! # sheetcalc-core
//!
//! Core data structures for the sheetcalc formula engine.
//!
//! This crate provides:
//! - [`CellValue`], [`CellContent`] and [`ErrorKind`] - what a cell stores
//! - [`CellAddress`], [`RangeAddress`] and [`CellCoord`] - 1-based cell addressing
//! - [`reference`] - parsing, formatting and offsetting of reference text
//! - [`Model`] - the contract the evaluator reads cells through
//! - [`Workbook`], [`Worksheet`] - an in-memory, thread-safe `Model`
//!
//! ## Example
//!
//! ```rust
//! use sheetcalc_core::{CellAddress, CellValue, Model, Workbook};
//!
//! let mut workbook = Workbook::new();
//! workbook.set_cell_value("A1", "Hello").unwrap();
//! workbook.set_cell_value("Sheet1!B1", 42.0).unwrap();
//!
//! let b1 = workbook.get_raw(&CellAddress::new("Sheet1", 1, 2)).unwrap();
//! assert_eq!(b1.value, CellValue::Number(42.0));
//! ```

pub mod cell;
pub mod error;
pub mod model;
pub mod named_range;
pub mod reference;
pub mod workbook;
pub mod worksheet;

// Re-exports for convenience
pub use cell::{
    CellAddress, CellContent, CellCoord, CellValue, ErrorKind, RangeAddress, RangeKind,
};
pub use error::{Error, Result};
pub use model::Model;
pub use named_range::{NamedRange, NamedRangeCollection};
pub use workbook::Workbook;
pub use worksheet::Worksheet;

/// Maximum number of rows in a worksheet
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet
pub const MAX_COLS: u32 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
