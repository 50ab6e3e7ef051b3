//! The data model contract consumed by the evaluator

use crate::cell::{CellAddress, CellContent, RangeAddress};
use crate::error::Result;

/// Cell-addressed data the evaluator reads from and writes to
///
/// Implementations are shared between threads, so every method takes `&self`
/// and must be safe to call concurrently.
pub trait Model: Send + Sync {
    /// Raw value and optional formula text stored at `address`
    ///
    /// Missing cells on an existing sheet read as [`CellContent::default`].
    /// An unknown sheet is an error.
    fn get_raw(&self, address: &CellAddress) -> Result<CellContent>;

    /// Whether a sheet with this name exists (case-insensitive)
    fn has_sheet(&self, name: &str) -> bool;

    /// The range a defined name refers to
    fn defined_name_target(&self, name: &str) -> Option<RangeAddress>;

    /// Replace the content stored at `address`
    fn set_raw(&self, address: &CellAddress, content: CellContent) -> Result<()>;

    /// Bottom-right corner `(rows, cols)` of the populated part of a sheet
    ///
    /// Whole-column and whole-row ranges are bounded by this extent.
    fn used_extent(&self, sheet: &str) -> Option<(u32, u32)>;

    /// The stored spelling of a sheet name, if the sheet exists
    fn sheet_name(&self, name: &str) -> Option<String> {
        self.has_sheet(name).then(|| name.to_string())
    }
}
