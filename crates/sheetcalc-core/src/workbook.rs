//! Workbook type - the in-memory [`Model`] implementation

use crate::cell::{CellAddress, CellContent, CellValue, RangeAddress};
use crate::error::{Error, Result};
use crate::model::Model;
use crate::named_range::{NamedRange, NamedRangeCollection};
use crate::reference;
use crate::worksheet::Worksheet;
use crate::MAX_SHEET_NAME_LEN;

/// A workbook: ordered worksheets plus defined names
///
/// Sheets, names and cell contents are set up through `&mut self`. Once an
/// evaluator borrows the workbook, cells change only through the evaluator,
/// which writes with [`Model::set_raw`] and invalidates what it cached.
#[derive(Debug)]
pub struct Workbook {
    /// Worksheets in the workbook
    worksheets: Vec<Worksheet>,
    /// Named ranges (defined names)
    named_ranges: NamedRangeCollection,
}

impl Workbook {
    /// Create a new workbook with one worksheet named "Sheet1"
    pub fn new() -> Self {
        Self {
            worksheets: vec![Worksheet::new("Sheet1")],
            named_ranges: NamedRangeCollection::new(),
        }
    }

    /// Create an empty workbook with no worksheets
    pub fn empty() -> Self {
        Self {
            worksheets: Vec::new(),
            named_ranges: NamedRangeCollection::new(),
        }
    }

    /// Get the number of worksheets
    pub fn sheet_count(&self) -> usize {
        self.worksheets.len()
    }

    /// Get a worksheet by name (case-insensitive)
    pub fn worksheet(&self, name: &str) -> Option<&Worksheet> {
        self.worksheets
            .iter()
            .find(|ws| ws.name().eq_ignore_ascii_case(name))
    }

    /// Get a worksheet by index
    pub fn worksheet_at(&self, index: usize) -> Option<&Worksheet> {
        self.worksheets.get(index)
    }

    /// Iterate over all worksheets
    pub fn worksheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.worksheets.iter()
    }

    /// Add a new worksheet with the given name, returning its index
    pub fn add_worksheet(&mut self, name: &str) -> Result<usize> {
        self.validate_sheet_name(name)?;
        self.worksheets.push(Worksheet::new(name));
        Ok(self.worksheets.len() - 1)
    }

    /// Set a value by reference text such as `"Sheet1!B2"`
    ///
    /// Unqualified text goes to the first sheet.
    pub fn set_cell_value<V: Into<CellValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let addr = self.resolve(address)?;
        self.set_raw(&addr, CellContent::value(value))
    }

    /// Set a formula by reference text; a leading `=` is optional
    pub fn set_cell_formula(&mut self, address: &str, formula: &str) -> Result<()> {
        let addr = self.resolve(address)?;
        self.set_raw(&addr, CellContent::formula(formula))
    }

    /// Define a workbook-level name referring to `refers_to` (e.g. `"Sheet1!$B$1:$B$10"`)
    pub fn define_name(&mut self, name: &str, refers_to: &str) -> Result<()> {
        let default_sheet = self.default_sheet()?.to_string();
        let mut range = reference::parse_range(refers_to, &default_sheet)?;
        range.start.sheet = self.canonical_sheet(range.sheet())?;
        range.end.sheet = range.start.sheet.clone();
        self.named_ranges.define(NamedRange::new(name, range))
    }

    /// Get a named range by name (case-insensitive)
    pub fn named_range(&self, name: &str) -> Option<&NamedRange> {
        self.named_ranges.get(name)
    }

    /// Remove a defined name
    pub fn remove_name(&mut self, name: &str) -> Option<NamedRange> {
        self.named_ranges.remove(name)
    }

    /// Address of every formula cell, sheet by sheet in row-major order
    pub fn formula_cells(&self) -> Vec<CellAddress> {
        self.worksheets
            .iter()
            .flat_map(|ws| {
                ws.formula_cells()
                    .into_iter()
                    .map(move |(row, col, _)| CellAddress::new(ws.name(), row, col))
            })
            .collect()
    }

    fn default_sheet(&self) -> Result<&str> {
        self.worksheets
            .first()
            .map(|ws| ws.name())
            .ok_or_else(|| Error::SheetNotFound("(no sheets)".into()))
    }

    fn canonical_sheet(&self, name: &str) -> Result<String> {
        self.worksheet(name)
            .map(|ws| ws.name().to_string())
            .ok_or_else(|| Error::SheetNotFound(name.into()))
    }

    fn resolve(&self, address: &str) -> Result<CellAddress> {
        let mut addr = reference::parse_cell(address, self.default_sheet()?)?;
        addr.sheet = self.canonical_sheet(&addr.sheet)?;
        Ok(addr)
    }

    fn sheet_for(&self, address: &CellAddress) -> Result<&Worksheet> {
        reference::validate_bounds(address)?;
        self.worksheet(&address.sheet)
            .ok_or_else(|| Error::SheetNotFound(address.sheet.clone()))
    }

    /// Validate a sheet name
    fn validate_sheet_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidSheetName("Sheet name cannot be empty".into()));
        }
        if name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name too long (max {} characters)",
                MAX_SHEET_NAME_LEN
            )));
        }

        const INVALID_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];
        if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name cannot contain '{}'",
                c
            )));
        }
        if name.starts_with('\'') || name.ends_with('\'') {
            return Err(Error::InvalidSheetName(
                "Sheet name cannot start or end with an apostrophe".into(),
            ));
        }

        if self.worksheet(name).is_some() {
            return Err(Error::DuplicateSheetName(name.into()));
        }

        Ok(())
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Model for Workbook {
    fn get_raw(&self, address: &CellAddress) -> Result<CellContent> {
        let sheet = self.sheet_for(address)?;
        Ok(sheet.get(address.row, address.col).unwrap_or_default())
    }

    fn has_sheet(&self, name: &str) -> bool {
        self.worksheet(name).is_some()
    }

    fn defined_name_target(&self, name: &str) -> Option<RangeAddress> {
        self.named_ranges.get(name).map(|nr| nr.refers_to.clone())
    }

    fn set_raw(&self, address: &CellAddress, content: CellContent) -> Result<()> {
        let sheet = self.sheet_for(address)?;
        sheet.store(address.row, address.col, content);
        Ok(())
    }

    fn used_extent(&self, sheet: &str) -> Option<(u32, u32)> {
        self.worksheet(sheet).and_then(|ws| ws.used_extent())
    }

    fn sheet_name(&self, name: &str) -> Option<String> {
        self.worksheet(name).map(|ws| ws.name().to_string())
    }
}
