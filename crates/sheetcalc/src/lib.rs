//! # sheetcalc
//!
//! A spreadsheet formula engine.
//!
//! Sheetcalc parses spreadsheet formulas and evaluates them against a cell
//! model, including the functions that turn values into references
//! (`OFFSET`, `INDEX`, `INDIRECT`).
//!
//! ## Features
//!
//! - A1 and R1C1 reference text, quoted sheet names, whole-column ranges
//! - Lazy `IF`/`IFERROR`, array constants and element-wise array arithmetic
//! - Circular reference detection, within one call and across threads
//! - A shared value cache invalidated through recorded dependencies
//!
//! ## Example
//!
//! ```rust
//! use sheetcalc::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! workbook.set_cell_value("A1", 10.0).unwrap();
//! workbook.set_cell_value("A2", 20.0).unwrap();
//! workbook.set_cell_formula("A3", "=SUM(A1:INDEX(A1:A2,2))").unwrap();
//!
//! let evaluator = Evaluator::new(&workbook);
//! let a3 = CellAddress::new("Sheet1", 3, 1);
//! assert_eq!(evaluator.evaluate(&a3).unwrap(), Value::Number(30.0));
//!
//! // Writes go through the evaluator so cached results stay current
//! evaluator
//!     .set_cell_value(&CellAddress::new("Sheet1", 1, 1), 5.0)
//!     .unwrap();
//! assert_eq!(evaluator.evaluate(&a3).unwrap(), Value::Number(25.0));
//! ```

pub mod calculation;
pub mod prelude;

// Re-export calculation types
pub use calculation::{calculate, CalculationOptions, CalculationStats, WorkbookCalculationExt};

// Re-export core types
pub use sheetcalc_core::{
    reference,
    // Cell types
    CellAddress,
    CellContent,
    CellCoord,
    CellValue,
    // Error types
    Error,
    ErrorKind,
    Model,
    NamedRange,
    RangeAddress,
    RangeKind,
    Result,
    // Main types
    Workbook,
    Worksheet,

    MAX_COLS,
    // Constants
    MAX_ROWS,
    MAX_SHEET_NAME_LEN,
};

// Re-export formula types
pub use sheetcalc_formula::{
    parse_formula, parse_formula_checked, Argument, Array, EvaluationContext, Evaluator,
    EvaluatorConfig, FormulaError, FormulaExpr, FormulaResult, FunctionDef, FunctionRegistry,
    Implementation, Operand, ParamKind, Reference, Target, Value,
};
