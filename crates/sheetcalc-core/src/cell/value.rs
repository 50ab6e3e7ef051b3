//! Cell value types

use std::fmt;

/// Represents the raw value stored in a cell
///
/// Formula text is stored next to the value in [`CellContent`](crate::CellContent);
/// computed results are owned by the evaluator, never by the model.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// Empty cell (no value)
    #[default]
    Empty,

    /// Boolean value (TRUE/FALSE)
    Boolean(bool),

    /// Numeric value (all numbers stored as f64, including dates)
    Number(f64),

    /// Text value
    Text(String),

    /// Error value (#VALUE!, #REF!, etc.)
    Error(ErrorKind),
}

impl CellValue {
    /// Create a new text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        CellValue::Text(s.into())
    }

    /// Check if the cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Check if the cell contains an error
    pub fn is_error(&self) -> bool {
        matches!(self, CellValue::Error(_))
    }

    /// Try to get the value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Boolean(true) => Some(1.0),
            CellValue::Boolean(false) => Some(0.0),
            _ => None,
        }
    }

    /// Try to get the value as text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Empty => "empty",
            CellValue::Boolean(_) => "boolean",
            CellValue::Number(_) => "number",
            CellValue::Text(_) => "text",
            CellValue::Error(_) => "error",
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => write!(f, ""),
            CellValue::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Error(e) => write!(f, "{}", e),
        }
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::text(s)
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<ErrorKind> for CellValue {
    fn from(e: ErrorKind) -> Self {
        CellValue::Error(e)
    }
}

/// What a model stores for one cell: a raw value and optional formula text
///
/// Formula text is kept without the leading `=`. For formula cells `value`
/// is whatever the loader had (often empty); the evaluator never trusts it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellContent {
    /// Raw stored value
    pub value: CellValue,
    /// Formula text, if the cell holds a formula
    pub formula: Option<String>,
}

impl CellContent {
    /// A plain value cell
    pub fn value(value: impl Into<CellValue>) -> Self {
        Self {
            value: value.into(),
            formula: None,
        }
    }

    /// A formula cell; a leading `=` is stripped
    pub fn formula(text: impl AsRef<str>) -> Self {
        let text = text.as_ref().trim();
        Self {
            value: CellValue::Empty,
            formula: Some(text.strip_prefix('=').unwrap_or(text).to_string()),
        }
    }

    /// Whether the cell holds a formula
    pub fn is_formula(&self) -> bool {
        self.formula.is_some()
    }

    /// Whether the cell holds nothing at all
    pub fn is_empty(&self) -> bool {
        self.formula.is_none() && self.value.is_empty()
    }
}

/// Spreadsheet error values
///
/// These are ordinary values: they flow through evaluation like numbers or text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// #NULL! - Incorrect range operator
    Null,
    /// #DIV/0! - Division by zero
    Div0,
    /// #VALUE! - Wrong type of argument or operand
    Value,
    /// #REF! - Invalid cell reference
    Ref,
    /// #NAME? - Unrecognized formula name or reference text
    Name,
    /// #NUM! - Invalid numeric value
    Num,
    /// #N/A - Value not available
    Na,
    /// Circular reference detected by the evaluator.
    /// Not part of the host application's error set.
    Circular,
}

impl ErrorKind {
    /// Get the display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Null => "#NULL!",
            ErrorKind::Div0 => "#DIV/0!",
            ErrorKind::Value => "#VALUE!",
            ErrorKind::Ref => "#REF!",
            ErrorKind::Name => "#NAME?",
            ErrorKind::Num => "#NUM!",
            ErrorKind::Na => "#N/A",
            ErrorKind::Circular => "#CIRCULAR!",
        }
    }

    /// Parse a host error literal (case-insensitive)
    ///
    /// The evaluator-specific circular marker is not a literal and never parses.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "#NULL!" => Some(ErrorKind::Null),
            "#DIV/0!" => Some(ErrorKind::Div0),
            "#VALUE!" => Some(ErrorKind::Value),
            "#REF!" => Some(ErrorKind::Ref),
            "#NAME?" => Some(ErrorKind::Name),
            "#NUM!" => Some(ErrorKind::Num),
            "#N/A" => Some(ErrorKind::Na),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_conversions() {
        assert_eq!(CellValue::from(42), CellValue::Number(42.0));
        assert_eq!(CellValue::from(3.5), CellValue::Number(3.5));
        assert_eq!(CellValue::from(true), CellValue::Boolean(true));

        let s = CellValue::from("hello");
        assert_eq!(s.as_text(), Some("hello"));
    }

    #[test]
    fn test_cell_value_as_number() {
        assert_eq!(CellValue::Number(42.0).as_number(), Some(42.0));
        assert_eq!(CellValue::Boolean(true).as_number(), Some(1.0));
        assert_eq!(CellValue::text("hello").as_number(), None);
        assert_eq!(CellValue::Empty.as_number(), None);
    }

    #[test]
    fn test_cell_content_formula_strips_equals() {
        let content = CellContent::formula("=SUM(A1:A3)");
        assert_eq!(content.formula.as_deref(), Some("SUM(A1:A3)"));
        assert!(content.is_formula());
        assert!(!content.is_empty());

        assert!(CellContent::default().is_empty());
        assert!(!CellContent::value(0).is_empty());
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::Div0.to_string(), "#DIV/0!");
        assert_eq!(ErrorKind::Value.to_string(), "#VALUE!");
        assert_eq!(ErrorKind::Na.to_string(), "#N/A");
    }

    #[test]
    fn test_error_kind_parse() {
        assert_eq!(ErrorKind::parse("#DIV/0!"), Some(ErrorKind::Div0));
        assert_eq!(ErrorKind::parse("#ref!"), Some(ErrorKind::Ref));
        assert_eq!(ErrorKind::parse("#n/a"), Some(ErrorKind::Na));
        assert_eq!(ErrorKind::parse("#CIRCULAR!"), None);
        assert_eq!(ErrorKind::parse("invalid"), None);
    }
}
