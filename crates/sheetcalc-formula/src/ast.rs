//! Formula Abstract Syntax Tree types
//!
//! Trees are built once per formula text and never mutated afterwards.

use sheetcalc_core::{CellAddress, CellCoord, ErrorKind, RangeAddress, RangeKind};

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// Text literal
    Text(String),
    /// Boolean literal
    Boolean(bool),
    /// Error literal
    Error(ErrorKind),

    // === References ===
    /// Single cell reference
    CellRef(CellReference),
    /// Range reference
    RangeRef(RangeReference),
    /// Defined name
    NameRef(String),

    // === Operators ===
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    // === Function call ===
    /// Function call; `name` is upper-cased
    Function {
        name: String,
        args: Vec<FormulaExpr>,
    },

    // === Array ===
    /// Array constant, rectangular
    Array(Vec<Vec<FormulaExpr>>),

    /// Parenthesized list of references, `(A1:A5, C1:C5)`
    AreaUnion(Vec<FormulaExpr>),
}

impl FormulaExpr {
    /// Visit this node and every node below it, parents first
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a FormulaExpr)) {
        visit(self);
        match self {
            FormulaExpr::BinaryOp { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            FormulaExpr::UnaryOp { operand, .. } => operand.walk(visit),
            FormulaExpr::Function { args, .. } | FormulaExpr::AreaUnion(args) => {
                args.iter().for_each(|arg| arg.walk(visit));
            }
            FormulaExpr::Array(rows) => rows.iter().flatten().for_each(|e| e.walk(visit)),
            _ => {}
        }
    }
}

/// Cell reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct CellReference {
    pub sheet: Option<String>,
    pub coord: CellCoord,
}

impl CellReference {
    /// Resolve against the sheet of the evaluating cell
    pub fn resolve(&self, current_sheet: &str) -> CellAddress {
        self.coord
            .on_sheet(self.sheet.as_deref().unwrap_or(current_sheet))
    }
}

/// Range reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct RangeReference {
    pub sheet: Option<String>,
    pub start: CellCoord,
    pub end: CellCoord,
    pub kind: RangeKind,
}

impl RangeReference {
    /// Resolve against the sheet of the evaluating cell
    pub fn resolve(&self, current_sheet: &str) -> RangeAddress {
        let sheet = self.sheet.as_deref().unwrap_or(current_sheet);
        RangeAddress {
            start: self.start.on_sheet(sheet),
            end: self.end.on_sheet(sheet),
            kind: self.kind,
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Text
    Concat,

    // Reference
    Range,
}

impl BinaryOperator {
    /// Operator text as written in formulas
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Power => "^",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Concat => "&",
            BinaryOperator::Range => ":",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Percent,
}
