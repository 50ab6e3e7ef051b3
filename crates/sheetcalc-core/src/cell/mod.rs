//! Cell-related types and utilities
//!
//! This module contains:
//! - [`CellValue`] - The raw value stored in a cell
//! - [`CellContent`] - A value plus optional formula text
//! - [`CellAddress`] / [`RangeAddress`] - Sheet-qualified locations
//! - [`CellCoord`] - A sheet-less A1 coordinate

mod address;
mod value;

pub use address::{
    column_to_letters, letters_to_column, CellAddress, CellCoord, RangeAddress, RangeCells,
    RangeKind,
};
pub(crate) use address::parse_row_number;
pub use value::{CellContent, CellValue, ErrorKind};
