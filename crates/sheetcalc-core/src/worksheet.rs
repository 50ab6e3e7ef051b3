//! Worksheet type

use crate::cell::{CellContent, CellCoord, CellValue};
use crate::error::Result;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// A worksheet (single sheet in a workbook)
///
/// Cells live in a concurrent map. The public setters take `&mut self`; the
/// only shared-reference write is [`Model::set_raw`](crate::Model::set_raw)
/// on the owning workbook, which the evaluator pairs with cache invalidation.
#[derive(Debug)]
pub struct Worksheet {
    /// Sheet name
    name: String,
    /// Cell storage keyed by 1-based (row, col)
    cells: DashMap<(u32, u32), CellContent>,
    /// Highest row ever written
    max_row: AtomicU32,
    /// Highest column ever written
    max_col: AtomicU32,
}

impl Worksheet {
    /// Create a new worksheet with the given name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            cells: DashMap::new(),
            max_row: AtomicU32::new(0),
            max_col: AtomicU32::new(0),
        }
    }

    /// Get the sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    // === Cell Access ===

    /// Content of the cell at `row`/`col` (1-based), if any
    pub fn get(&self, row: u32, col: u32) -> Option<CellContent> {
        self.cells.get(&(row, col)).map(|entry| entry.value().clone())
    }

    /// Content of the cell at A1-style `address`
    pub fn cell(&self, address: &str) -> Result<Option<CellContent>> {
        let coord = CellCoord::parse_a1(address)?;
        Ok(self.get(coord.row, coord.col))
    }

    /// Store `content` at `row`/`col`; empty content removes the cell
    pub fn set(&mut self, row: u32, col: u32, content: CellContent) {
        self.store(row, col, content);
    }

    pub(crate) fn store(&self, row: u32, col: u32, content: CellContent) {
        if content.is_empty() {
            self.cells.remove(&(row, col));
            return;
        }
        self.cells.insert((row, col), content);
        self.max_row.fetch_max(row, Ordering::AcqRel);
        self.max_col.fetch_max(col, Ordering::AcqRel);
    }

    /// Set a value at A1-style `address`
    pub fn set_cell_value<V: Into<CellValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let coord = CellCoord::parse_a1(address)?;
        self.set(coord.row, coord.col, CellContent::value(value));
        Ok(())
    }

    /// Set a formula at A1-style `address` (leading `=` optional)
    pub fn set_cell_formula(&mut self, address: &str, formula: &str) -> Result<()> {
        let coord = CellCoord::parse_a1(address)?;
        self.set(coord.row, coord.col, CellContent::formula(formula));
        Ok(())
    }

    /// Remove the cell at `row`/`col`
    pub fn clear(&mut self, row: u32, col: u32) {
        self.cells.remove(&(row, col));
    }

    /// Bottom-right corner of everything ever written, or `None` for a
    /// sheet that was never written
    ///
    /// The extent never shrinks when cells are cleared.
    pub fn used_extent(&self) -> Option<(u32, u32)> {
        let rows = self.max_row.load(Ordering::Acquire);
        let cols = self.max_col.load(Ordering::Acquire);
        (rows > 0 && cols > 0).then_some((rows, cols))
    }

    /// Number of stored cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Coordinates and text of every formula cell, in row-major order
    pub fn formula_cells(&self) -> Vec<(u32, u32, String)> {
        let mut formulas: Vec<_> = self
            .cells
            .iter()
            .filter_map(|entry| {
                let (row, col) = *entry.key();
                entry
                    .value()
                    .formula
                    .as_ref()
                    .map(|text| (row, col, text.clone()))
            })
            .collect();
        formulas.sort_by_key(|(row, col, _)| (*row, *col));
        formulas
    }
}
