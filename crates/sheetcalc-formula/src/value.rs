//! Runtime values produced by formula evaluation
//!
//! [`Value`] is what every AST node evaluates to. Coercion follows the host
//! spreadsheet: blank reads as `0`, `""` or `FALSE` depending on the context,
//! booleans are `1`/`0` in arithmetic, and numeric text converts to a number.

use crate::ast::BinaryOperator;
use sheetcalc_core::{CellValue, ErrorKind, RangeAddress};
use std::cmp::Ordering;
use std::fmt;

/// Relative tolerance used when comparing numbers for equality
pub const NUMBER_EQUALITY_TOLERANCE: f64 = 1e-15;

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    Number(f64),
    Text(String),
    Boolean(bool),
    Array(Array),
    Error(ErrorKind),
    /// An empty cell
    #[default]
    Blank,
}

impl Value {
    /// Create a text value
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Get the error if this is one
    pub fn error(&self) -> Option<ErrorKind> {
        match self {
            Value::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Check if this is a blank
    pub fn is_blank(&self) -> bool {
        matches!(self, Value::Blank)
    }

    /// Collapse an array to its top-left element
    ///
    /// This is how a cell holding an array result reads when another formula
    /// refers to it.
    pub fn into_scalar(self) -> Value {
        match self {
            Value::Array(array) => array
                .into_values()
                .next()
                .unwrap_or(Value::Error(ErrorKind::Value)),
            v => v,
        }
    }

    /// Convert to a number for arithmetic
    pub fn to_number(&self) -> Result<f64, ErrorKind> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Blank => Ok(0.0),
            Value::Text(s) => parse_number(s).ok_or(ErrorKind::Value),
            Value::Error(e) => Err(*e),
            Value::Array(a) => a.top_left().map_or(Err(ErrorKind::Value), Value::to_number),
        }
    }

    /// Convert to a boolean for logical operations
    pub fn to_bool(&self) -> Result<bool, ErrorKind> {
        match self {
            Value::Boolean(b) => Ok(*b),
            Value::Number(n) => Ok(*n != 0.0),
            Value::Blank => Ok(false),
            Value::Text(s) if s.eq_ignore_ascii_case("TRUE") => Ok(true),
            Value::Text(s) if s.eq_ignore_ascii_case("FALSE") => Ok(false),
            Value::Text(_) => Err(ErrorKind::Value),
            Value::Error(e) => Err(*e),
            Value::Array(a) => a.top_left().map_or(Err(ErrorKind::Value), Value::to_bool),
        }
    }

    /// Convert to text for concatenation and text parameters
    pub fn to_text(&self) -> Result<String, ErrorKind> {
        match self {
            Value::Number(n) => Ok(format_number(*n)),
            Value::Text(s) => Ok(s.clone()),
            Value::Boolean(true) => Ok("TRUE".to_string()),
            Value::Boolean(false) => Ok("FALSE".to_string()),
            Value::Blank => Ok(String::new()),
            Value::Error(e) => Err(*e),
            Value::Array(a) => a.top_left().map_or(Err(ErrorKind::Value), Value::to_text),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Text(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Array(a) => write!(f, "{}", a),
            Value::Error(e) => write!(f, "{}", e),
            Value::Blank => Ok(()),
        }
    }
}

impl From<CellValue> for Value {
    fn from(value: CellValue) -> Self {
        match value {
            CellValue::Empty => Value::Blank,
            CellValue::Boolean(b) => Value::Boolean(b),
            CellValue::Number(n) => Value::Number(n),
            CellValue::Text(s) => Value::Text(s),
            CellValue::Error(e) => Value::Error(e),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<ErrorKind> for Value {
    fn from(e: ErrorKind) -> Self {
        Value::Error(e)
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::Array(a)
    }
}

/// A rectangular block of values, stored row by row
///
/// Elements are always scalars: nested arrays collapse to their top-left
/// element on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    rows: usize,
    cols: usize,
    data: Vec<Value>,
}

impl Array {
    /// Build an array from rows; `None` if the rows are ragged or empty
    pub fn from_rows(rows: Vec<Vec<Value>>) -> Option<Self> {
        let cols = rows.first()?.len();
        if cols == 0 || rows.iter().any(|row| row.len() != cols) {
            return None;
        }
        Some(Self {
            rows: rows.len(),
            cols,
            data: rows.into_iter().flatten().map(Value::into_scalar).collect(),
        })
    }

    /// Build a `rows` x `cols` array from a function of `(row, col)`, 0-based
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> Value) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c).into_scalar());
            }
        }
        Self { rows, cols, data }
    }

    /// A 1x1 array
    pub fn scalar(value: Value) -> Self {
        Self {
            rows: 1,
            cols: 1,
            data: vec![value.into_scalar()],
        }
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Element at 0-based `(row, col)`
    pub fn get(&self, row: usize, col: usize) -> Option<&Value> {
        if row < self.rows && col < self.cols {
            self.data.get(row * self.cols + col)
        } else {
            None
        }
    }

    pub fn top_left(&self) -> Option<&Value> {
        self.data.first()
    }

    /// All elements in row-major order
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.data.iter()
    }

    pub fn into_values(self) -> impl Iterator<Item = Value> {
        self.data.into_iter()
    }

    /// Row `row` (0-based) as a 1 x cols array
    pub fn row(&self, row: usize) -> Option<Array> {
        (row < self.rows)
            .then(|| Array::from_fn(1, self.cols, |_, c| self.data[row * self.cols + c].clone()))
    }

    /// Column `col` (0-based) as a rows x 1 array
    pub fn column(&self, col: usize) -> Option<Array> {
        (col < self.cols)
            .then(|| Array::from_fn(self.rows, 1, |r, _| self.data[r * self.cols + col].clone()))
    }

    /// Apply `f` to every element
    pub fn map(&self, f: impl FnMut(&Value) -> Value) -> Array {
        Array {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(f).map(Value::into_scalar).collect(),
        }
    }

    /// Copy out as nested rows
    pub fn to_rows(&self) -> Vec<Vec<Value>> {
        self.data.chunks(self.cols.max(1)).map(<[Value]>::to_vec).collect()
    }

    /// Element used when broadcasting to a larger extent
    ///
    /// A single row repeats downwards and a single column repeats to the
    /// right; anything else outside the array's extent is missing.
    fn broadcast_get(&self, row: usize, col: usize) -> Option<&Value> {
        let row = if self.rows == 1 { 0 } else { row };
        let col = if self.cols == 1 { 0 } else { col };
        self.get(row, col)
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (r, row) in self.data.chunks(self.cols.max(1)).enumerate() {
            if r > 0 {
                write!(f, ";")?;
            }
            for (c, value) in row.iter().enumerate() {
                if c > 0 {
                    write!(f, ",")?;
                }
                match value {
                    Value::Text(s) => write!(f, "\"{}\"", s.replace('"', "\"\""))?,
                    v => write!(f, "{}", v)?,
                }
            }
        }
        write!(f, "}}")
    }
}

/// A resolved reference: one area or a union of areas
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    Area(RangeAddress),
    Union(Vec<RangeAddress>),
}

impl Reference {
    /// Every area of the reference, in written order
    pub fn areas(&self) -> &[RangeAddress] {
        match self {
            Reference::Area(range) => std::slice::from_ref(range),
            Reference::Union(areas) => areas,
        }
    }

    /// The only area, unless this is a multi-area union
    pub fn single_area(&self) -> Option<&RangeAddress> {
        match self.areas() {
            [range] => Some(range),
            _ => None,
        }
    }
}

/// Result of evaluating an expression where a reference is acceptable
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Reference(Reference),
    Value(Value),
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

impl From<ErrorKind> for Operand {
    fn from(e: ErrorKind) -> Self {
        Operand::Value(Value::Error(e))
    }
}

impl From<RangeAddress> for Operand {
    fn from(range: RangeAddress) -> Self {
        Operand::Reference(Reference::Area(range))
    }
}

// === Operators ===

/// Apply a binary operator element-wise
///
/// Scalars broadcast over arrays. When two arrays differ in size the result
/// takes the larger extent and positions missing from either side are `#N/A`.
/// The range operator is resolved on references and yields `#VALUE!` here.
pub fn binary_op(op: BinaryOperator, left: &Value, right: &Value) -> Value {
    broadcast(left, right, |l, r| scalar_binary_op(op, l, r))
}

/// Negation, element-wise
pub fn negate(value: &Value) -> Value {
    map_scalar(value, |v| match v.to_number() {
        Ok(n) => Value::Number(-n),
        Err(e) => Value::Error(e),
    })
}

/// Postfix percent, element-wise
pub fn percent(value: &Value) -> Value {
    map_scalar(value, |v| match v.to_number() {
        Ok(n) => Value::Number(n / 100.0),
        Err(e) => Value::Error(e),
    })
}

/// Apply `f` to a scalar, or to every element of an array
pub fn map_scalar(value: &Value, mut f: impl FnMut(&Value) -> Value) -> Value {
    match value {
        Value::Array(a) => Value::Array(a.map(f)),
        v => f(v),
    }
}

fn broadcast(left: &Value, right: &Value, op: impl Fn(&Value, &Value) -> Value) -> Value {
    match (left, right) {
        (Value::Array(l), Value::Array(r)) => {
            let rows = l.rows().max(r.rows());
            let cols = l.cols().max(r.cols());
            Value::Array(Array::from_fn(rows, cols, |i, j| {
                match (l.broadcast_get(i, j), r.broadcast_get(i, j)) {
                    (Some(a), Some(b)) => op(a, b),
                    _ => Value::Error(ErrorKind::Na),
                }
            }))
        }
        (Value::Array(l), r) => Value::Array(l.map(|a| op(a, r))),
        (l, Value::Array(r)) => Value::Array(r.map(|b| op(l, b))),
        (l, r) => op(l, r),
    }
}

fn scalar_binary_op(op: BinaryOperator, left: &Value, right: &Value) -> Value {
    use BinaryOperator::*;

    match op {
        Add | Subtract | Multiply | Divide | Power => {
            let (a, b) = match (left.to_number(), right.to_number()) {
                (Ok(a), Ok(b)) => (a, b),
                (Err(e), _) | (_, Err(e)) => return Value::Error(e),
            };
            arithmetic(op, a, b)
        }
        Equal | NotEqual | LessThan | LessEqual | GreaterThan | GreaterEqual => {
            if let Some(e) = left.error().or_else(|| right.error()) {
                return Value::Error(e);
            }
            let ord = compare(left, right);
            Value::Boolean(match op {
                Equal => ord == Ordering::Equal,
                NotEqual => ord != Ordering::Equal,
                LessThan => ord == Ordering::Less,
                LessEqual => ord != Ordering::Greater,
                GreaterThan => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            })
        }
        Concat => match (left.to_text(), right.to_text()) {
            (Ok(a), Ok(b)) => Value::Text(a + &b),
            (Err(e), _) | (_, Err(e)) => Value::Error(e),
        },
        Range => Value::Error(ErrorKind::Value),
    }
}

fn arithmetic(op: BinaryOperator, a: f64, b: f64) -> Value {
    let result = match op {
        BinaryOperator::Add => a + b,
        BinaryOperator::Subtract => a - b,
        BinaryOperator::Multiply => a * b,
        BinaryOperator::Divide => {
            if b == 0.0 {
                return Value::Error(ErrorKind::Div0);
            }
            a / b
        }
        _ => {
            if a == 0.0 && b == 0.0 {
                return Value::Error(ErrorKind::Num);
            }
            if a == 0.0 && b < 0.0 {
                return Value::Error(ErrorKind::Div0);
            }
            a.powf(b)
        }
    };
    number_result(result)
}

/// Wrap a computed number, mapping NaN and infinities to `#NUM!`
pub fn number_result(n: f64) -> Value {
    if n.is_finite() {
        Value::Number(n)
    } else {
        Value::Error(ErrorKind::Num)
    }
}

// === Comparison ===

/// Whether two numbers are equal within [`NUMBER_EQUALITY_TOLERANCE`]
pub fn numbers_equal(a: f64, b: f64) -> bool {
    a == b || (a - b).abs() <= NUMBER_EQUALITY_TOLERANCE * a.abs().max(b.abs())
}

/// Order two scalar values the way comparison operators do
///
/// Numbers sort before text, text before booleans. Text compares
/// case-insensitively. Blank takes the zero value of the other side's type.
/// Errors must be handled by the caller.
pub fn compare(left: &Value, right: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Number(_) | Value::Blank => 0,
            Value::Text(_) => 1,
            Value::Boolean(_) => 2,
            Value::Array(_) | Value::Error(_) => 3,
        }
    }

    match (left, right) {
        (Value::Array(a), _) => match a.top_left() {
            Some(l) => compare(l, right),
            None => Ordering::Equal,
        },
        (_, Value::Array(b)) => match b.top_left() {
            Some(r) => compare(left, r),
            None => Ordering::Equal,
        },
        (Value::Blank, Value::Blank) => Ordering::Equal,
        (Value::Blank, Value::Text(s)) => "".cmp(s.as_str()),
        (Value::Text(s), Value::Blank) => s.as_str().cmp(""),
        (Value::Blank, Value::Boolean(b)) => false.cmp(b),
        (Value::Boolean(b), Value::Blank) => b.cmp(&false),
        (Value::Number(_) | Value::Blank, Value::Number(_) | Value::Blank) => {
            let a = left.to_number().unwrap_or(0.0);
            let b = right.to_number().unwrap_or(0.0);
            if numbers_equal(a, b) {
                Ordering::Equal
            } else {
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
        }
        (Value::Text(a), Value::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
        _ => rank(left).cmp(&rank(right)),
    }
}

// === Number text ===

/// Parse numeric text the way arithmetic coercion does
///
/// Surrounding whitespace is ignored and a trailing `%` divides by 100.
/// Empty text is not a number.
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    let (text, scale) = match text.strip_suffix('%') {
        Some(rest) => (rest.trim_end(), 0.01),
        None => (text, 1.0),
    };
    let first = text.chars().next()?;
    if !(first.is_ascii_digit() || matches!(first, '.' | '+' | '-')) {
        return None;
    }
    // Rejects "inf" and "nan" spellings that slip past the first-char check
    if text.chars().any(|c| c.is_ascii_alphabetic() && !matches!(c, 'e' | 'E')) {
        return None;
    }
    text.parse::<f64>()
        .ok()
        .map(|n| n * scale)
        .filter(|n| n.is_finite())
}

/// Render a number in general format
///
/// Integers print without a fraction, other values round to 15 significant
/// digits. Very large and very small magnitudes use scientific notation.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }

    let rounded: f64 = format!("{:.14e}", n).parse().unwrap_or(n);
    let magnitude = rounded.abs();
    if (1e-9..1e15).contains(&magnitude) {
        return format!("{}", rounded);
    }

    let scientific = format!("{:E}", rounded);
    match scientific.split_once('E') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}E{}{:0>2}", mantissa, sign, digits)
        }
        None => scientific,
    }
}
