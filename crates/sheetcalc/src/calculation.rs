//! Whole-workbook calculation
//!
//! Evaluates every formula cell of a workbook once, filling the evaluator's
//! cache, and reports what happened.
//!
//! # Example
//!
//! ```rust
//! use sheetcalc::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! workbook.set_cell_value("A1", 10.0).unwrap();
//! workbook.set_cell_value("A2", 20.0).unwrap();
//! workbook.set_cell_formula("A3", "=A1+A2").unwrap();
//!
//! let stats = workbook.calculate().unwrap();
//! assert_eq!(stats.cells_calculated, 1);
//! ```

use crate::{Evaluator, FormulaResult, Value, Workbook};
use log::{debug, warn};
use sheetcalc_core::ErrorKind;

/// Options for workbook calculation
#[derive(Debug, Clone, Default)]
pub struct CalculationOptions {
    /// Abort on the first hard failure (syntax error, depth limit, model
    /// error) instead of counting it and moving on
    pub stop_on_error: bool,
}

impl CalculationOptions {
    /// Set whether the first hard failure aborts the pass
    pub fn with_stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = stop_on_error;
        self
    }
}

/// Statistics from a calculation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculationStats {
    /// Total number of formula cells
    pub formula_count: usize,
    /// Number of cells that produced a value
    pub cells_calculated: usize,
    /// Number of cells whose value is or contains an error value
    pub errors: usize,
    /// Number of cells whose value is a circular reference error
    pub circular_references: usize,
    /// Number of cells that failed hard
    pub failures: usize,
}

/// Evaluate every formula cell of `workbook` through `evaluator`
///
/// `evaluator` should read from `workbook`; cells come from
/// [`Workbook::formula_cells`], sheet by sheet in row-major order.
pub fn calculate(
    evaluator: &Evaluator,
    workbook: &Workbook,
    options: &CalculationOptions,
) -> FormulaResult<CalculationStats> {
    let cells = workbook.formula_cells();
    let mut stats = CalculationStats {
        formula_count: cells.len(),
        ..Default::default()
    };

    for cell in &cells {
        match evaluator.evaluate(cell) {
            Ok(value) => {
                stats.cells_calculated += 1;
                match first_error(&value) {
                    Some(ErrorKind::Circular) => {
                        stats.errors += 1;
                        stats.circular_references += 1;
                    }
                    Some(_) => stats.errors += 1,
                    None => {}
                }
            }
            Err(e) if options.stop_on_error => return Err(e),
            Err(e) => {
                warn!("Failed to calculate {}: {}", cell, e);
                stats.failures += 1;
            }
        }
    }

    debug!(
        "Calculated {} of {} formula cells ({} errors, {} circular)",
        stats.cells_calculated, stats.formula_count, stats.errors, stats.circular_references
    );
    Ok(stats)
}

/// The error of a scalar, or the first error element of an array
fn first_error(value: &Value) -> Option<ErrorKind> {
    match value {
        Value::Array(array) => array.iter().find_map(Value::error),
        v => v.error(),
    }
}

/// Extension trait for Workbook to add calculation methods
pub trait WorkbookCalculationExt {
    /// Calculate all formulas in the workbook with default options
    fn calculate(&self) -> FormulaResult<CalculationStats>;

    /// Calculate all formulas with custom options
    fn calculate_with_options(&self, options: &CalculationOptions)
        -> FormulaResult<CalculationStats>;
}

impl WorkbookCalculationExt for Workbook {
    fn calculate(&self) -> FormulaResult<CalculationStats> {
        self.calculate_with_options(&CalculationOptions::default())
    }

    fn calculate_with_options(
        &self,
        options: &CalculationOptions,
    ) -> FormulaResult<CalculationStats> {
        let evaluator = Evaluator::new(self);
        calculate(&evaluator, self, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CellAddress, FormulaError};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_simple_calculation() {
        let mut workbook = Workbook::new();
        workbook.set_cell_value("A1", 10.0).unwrap();
        workbook.set_cell_value("A2", 20.0).unwrap();
        workbook.set_cell_formula("A3", "=A1+A2").unwrap();

        let evaluator = Evaluator::new(&workbook);
        let stats = calculate(&evaluator, &workbook, &CalculationOptions::default()).unwrap();

        assert_eq!(
            stats,
            CalculationStats {
                formula_count: 1,
                cells_calculated: 1,
                ..Default::default()
            }
        );
        assert_eq!(
            evaluator.cached_value(&CellAddress::new("Sheet1", 3, 1)),
            Some(Value::Number(30.0))
        );
    }

    #[test]
    fn test_chain_calculation() {
        let mut workbook = Workbook::new();
        workbook.set_cell_value("A1", 5.0).unwrap();
        workbook.set_cell_formula("A2", "=A1*2").unwrap();
        workbook.set_cell_formula("A3", "=A2+10").unwrap();
        workbook.set_cell_formula("A4", "=A3*A1").unwrap();

        let evaluator = Evaluator::new(&workbook);
        let stats = calculate(&evaluator, &workbook, &CalculationOptions::default()).unwrap();
        assert_eq!(stats.cells_calculated, 3);

        let a4 = CellAddress::new("Sheet1", 4, 1);
        assert_eq!(evaluator.cached_value(&a4), Some(Value::Number(100.0)));
    }

    #[test]
    fn test_error_values_are_counted() {
        let mut workbook = Workbook::new();
        workbook.set_cell_formula("A1", "=1/0").unwrap();
        workbook.set_cell_formula("A2", "={1,#N/A}").unwrap();
        workbook.set_cell_formula("A3", "=2").unwrap();

        let stats = workbook.calculate().unwrap();
        assert_eq!(stats.formula_count, 3);
        assert_eq!(stats.cells_calculated, 3);
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.circular_references, 0);
    }

    #[test]
    fn test_circular_reference_detection() {
        let mut workbook = Workbook::new();
        workbook.set_cell_formula("A1", "=B1+1").unwrap();
        workbook.set_cell_formula("B1", "=A1+1").unwrap();
        workbook.set_cell_formula("C1", "=5").unwrap();

        let stats = workbook.calculate().unwrap();
        assert_eq!(stats.circular_references, 2);
        assert_eq!(stats.errors, 2);
    }

    #[test]
    fn test_multiple_sheets() {
        let mut workbook = Workbook::new();
        workbook.add_worksheet("Data").unwrap();
        workbook.set_cell_value("Data!A1", 7.0).unwrap();
        workbook.set_cell_formula("Sheet1!A1", "=Data!A1*2").unwrap();
        workbook.set_cell_formula("Data!B1", "=Sheet1!A1+1").unwrap();

        let evaluator = Evaluator::new(&workbook);
        let stats = calculate(&evaluator, &workbook, &CalculationOptions::default()).unwrap();
        assert_eq!(stats.cells_calculated, 2);
        assert_eq!(
            evaluator.cached_value(&CellAddress::new("Data", 1, 2)),
            Some(Value::Number(15.0))
        );
    }

    #[test]
    fn test_stop_on_error() {
        let mut workbook = Workbook::new();
        workbook.set_cell_formula("A1", "=1+").unwrap();
        workbook.set_cell_formula("A2", "=1+1").unwrap();

        let stats = workbook.calculate().unwrap();
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.cells_calculated, 1);

        let options = CalculationOptions::default().with_stop_on_error(true);
        let result = workbook.calculate_with_options(&options);
        assert!(matches!(result, Err(FormulaError::Syntax { .. })));
    }
}
