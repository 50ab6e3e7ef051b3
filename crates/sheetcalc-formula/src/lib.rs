//! # sheetcalc-formula
//!
//! Formula engine for sheetcalc.
//!
//! This crate provides:
//! - Formula tokenizing and parsing (text → AST)
//! - Evaluation with reference-producing functions (`OFFSET`, `INDEX`, `INDIRECT`)
//! - A per-cell value cache that many threads can share
//! - Dependency tracking for cache invalidation
//!
//! ## Example
//!
//! ```rust
//! use sheetcalc_core::{CellAddress, Workbook};
//! use sheetcalc_formula::{Evaluator, Value};
//!
//! let mut wb = Workbook::new();
//! wb.set_cell_value("B2", 25).unwrap();
//! wb.set_cell_value("B3", 30).unwrap();
//! wb.set_cell_formula("D1", "=SUM(OFFSET(B1,1,0,2,1))").unwrap();
//!
//! let evaluator = Evaluator::new(&wb);
//! let d1 = CellAddress::new("Sheet1", 1, 4);
//! assert_eq!(evaluator.evaluate(&d1).unwrap(), Value::Number(55.0));
//! ```

pub mod ast;
pub mod context;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod tokenizer;
pub mod value;

pub use ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
pub use context::{EvaluationContext, MAX_AREA_CELLS};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{Evaluator, EvaluatorConfig, Target};
pub use functions::{Argument, FunctionDef, FunctionRegistry, Implementation, ParamKind};
pub use parser::{parse_formula, parse_formula_checked};
pub use tokenizer::tokenize;
pub use value::{Array, Operand, Reference, Value};
