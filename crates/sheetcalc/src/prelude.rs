//! Prelude module - common imports for sheetcalc users
//!
//! ```rust
//! use sheetcalc::prelude::*;
//! ```

pub use crate::{
    // Calculation types
    calculate,
    CalculationOptions,
    CalculationStats,
    // Addressing
    CellAddress,
    // Cell types
    CellValue,
    ErrorKind,
    // Evaluation
    Evaluator,
    EvaluatorConfig,
    // Error types
    FormulaError,
    FormulaResult,
    Model,
    RangeAddress,
    Value,
    // Main types
    Workbook,
    // Extension traits
    WorkbookCalculationExt,
};
