//! Cell address and range types
//!
//! All coordinates are 1-based, matching how references are written in
//! formula text. Conversions to and from text live in [`crate::reference`].

use crate::error::{Error, Result};
use crate::reference;
use crate::{MAX_COLS, MAX_ROWS};
use std::fmt;

/// A sheet-less coordinate as written in A1 text (e.g., "B2", "$C$10")
///
/// The `$` markers are recorded but carry no meaning during evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellCoord {
    /// Row number (1-based)
    pub row: u32,
    /// Column number (1-based, A=1, B=2, ..., XFD=16384)
    pub col: u32,
    /// Whether the row reference is absolute ($)
    pub row_absolute: bool,
    /// Whether the column reference is absolute ($)
    pub col_absolute: bool,
}

impl CellCoord {
    /// Create a new coordinate with relative markers
    pub fn new(row: u32, col: u32) -> Self {
        Self {
            row,
            col,
            row_absolute: false,
            col_absolute: false,
        }
    }

    /// Create a new coordinate with specified absolute/relative flags
    pub fn with_absolute(row: u32, col: u32, row_absolute: bool, col_absolute: bool) -> Self {
        Self {
            row,
            col,
            row_absolute,
            col_absolute,
        }
    }

    /// Parse a coordinate from A1-style notation
    ///
    /// # Examples
    /// ```
    /// use sheetcalc_core::CellCoord;
    ///
    /// let coord = CellCoord::parse_a1("$B$2").unwrap();
    /// assert_eq!(coord.row, 2);
    /// assert_eq!(coord.col, 2);
    /// assert!(coord.row_absolute);
    /// assert!(coord.col_absolute);
    /// ```
    pub fn parse_a1(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidReference("empty address".into()));
        }

        let bytes = s.as_bytes();
        let mut pos = 0;

        let col_absolute = if bytes.get(pos) == Some(&b'$') {
            pos += 1;
            true
        } else {
            false
        };

        let col_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
            pos += 1;
        }
        if pos == col_start {
            return Err(Error::InvalidReference(format!(
                "no column letters in '{}'",
                s
            )));
        }
        let col = letters_to_column(&s[col_start..pos])?;

        let row_absolute = if bytes.get(pos) == Some(&b'$') {
            pos += 1;
            true
        } else {
            false
        };

        let row = parse_row_number(&s[pos..]).ok_or_else(|| {
            Error::InvalidReference(format!("invalid row number in '{}'", s))
        })?;

        Ok(Self {
            row,
            col,
            row_absolute,
            col_absolute,
        })
    }

    /// Format as A1 text, keeping `$` markers
    pub fn to_a1_string(&self) -> String {
        let mut result = String::new();
        if self.col_absolute {
            result.push('$');
        }
        result.push_str(&column_to_letters(self.col));
        if self.row_absolute {
            result.push('$');
        }
        result.push_str(&self.row.to_string());
        result
    }

    /// Attach a sheet to this coordinate
    pub fn on_sheet(&self, sheet: impl Into<String>) -> CellAddress {
        CellAddress::new(sheet, self.row, self.col)
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

/// Parse a row number in `1..=MAX_ROWS`
pub(crate) fn parse_row_number(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let row: u32 = s.parse().ok()?;
    (1..=MAX_ROWS).contains(&row).then_some(row)
}

/// Convert a 1-based column number to letters (1 = A, 26 = Z, 27 = AA, etc.)
pub fn column_to_letters(col: u32) -> String {
    let mut result = Vec::new();
    let mut n = col;

    while n > 0 {
        n -= 1;
        result.push((n % 26) as u8 + b'A');
        n /= 26;
    }

    result.reverse();
    String::from_utf8_lossy(&result).into_owned()
}

/// Convert column letters to a 1-based column number (A = 1, Z = 26, AA = 27, etc.)
pub fn letters_to_column(letters: &str) -> Result<u32> {
    if letters.is_empty() {
        return Err(Error::InvalidReference("empty column letters".into()));
    }
    // Anything longer than XFD overflows the grid anyway.
    if letters.len() > 3 {
        return Err(Error::InvalidReference(format!(
            "column '{}' out of range",
            letters
        )));
    }

    let mut col: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return Err(Error::InvalidReference(format!(
                "invalid column letter '{}'",
                c
            )));
        }
        col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }

    if col > MAX_COLS {
        return Err(Error::InvalidReference(format!(
            "column '{}' out of range",
            letters
        )));
    }

    Ok(col)
}

/// One cell on a named sheet
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    /// Sheet name
    pub sheet: String,
    /// Row number (1-based)
    pub row: u32,
    /// Column number (1-based)
    pub col: u32,
}

impl CellAddress {
    /// Create a new cell address
    pub fn new(sheet: impl Into<String>, row: u32, col: u32) -> Self {
        Self {
            sheet: sheet.into(),
            row,
            col,
        }
    }

    /// The sheet-less coordinate of this address
    pub fn coord(&self) -> CellCoord {
        CellCoord::new(self.row, self.col)
    }

    /// A 1x1 range over this cell
    pub fn to_range(&self) -> RangeAddress {
        RangeAddress::single(self.clone())
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", reference::format_cell(self))
    }
}

/// How a range was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RangeKind {
    /// A bounded block such as `A1:B2`
    #[default]
    Cells,
    /// Whole columns such as `A:B`
    Columns,
    /// Whole rows such as `1:2`
    Rows,
}

/// A rectangular block of cells on one sheet
///
/// `start` is always the top-left corner and `end` the bottom-right one.
/// Whole-column and whole-row ranges span the full sheet grid; use
/// [`RangeAddress::clip_to`] to bound them to a model's used extent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeAddress {
    /// Top-left corner
    pub start: CellAddress,
    /// Bottom-right corner
    pub end: CellAddress,
    /// How the range was written
    pub kind: RangeKind,
}

impl RangeAddress {
    /// Create a bounded range, normalizing corner order
    ///
    /// The sheet of `start` is used for both corners.
    pub fn new(start: CellAddress, end: CellAddress) -> Self {
        let (r1, r2) = (start.row.min(end.row), start.row.max(end.row));
        let (c1, c2) = (start.col.min(end.col), start.col.max(end.col));
        let sheet = start.sheet;
        Self {
            start: CellAddress::new(sheet.clone(), r1, c1),
            end: CellAddress::new(sheet, r2, c2),
            kind: RangeKind::Cells,
        }
    }

    /// Create a range from 1-based indices
    pub fn from_indices(
        sheet: impl Into<String>,
        start_row: u32,
        start_col: u32,
        end_row: u32,
        end_col: u32,
    ) -> Self {
        let sheet = sheet.into();
        Self::new(
            CellAddress::new(sheet.clone(), start_row, start_col),
            CellAddress::new(sheet, end_row, end_col),
        )
    }

    /// Create a single-cell range
    pub fn single(addr: CellAddress) -> Self {
        Self {
            start: addr.clone(),
            end: addr,
            kind: RangeKind::Cells,
        }
    }

    /// Whole columns `first..=last` (in either order)
    pub fn full_columns(sheet: impl Into<String>, first: u32, last: u32) -> Self {
        let mut range = Self::from_indices(sheet, 1, first, MAX_ROWS, last);
        range.kind = RangeKind::Columns;
        range
    }

    /// Whole rows `first..=last` (in either order)
    pub fn full_rows(sheet: impl Into<String>, first: u32, last: u32) -> Self {
        let mut range = Self::from_indices(sheet, first, 1, last, MAX_COLS);
        range.kind = RangeKind::Rows;
        range
    }

    /// Sheet the range lives on
    pub fn sheet(&self) -> &str {
        &self.start.sheet
    }

    /// Number of rows
    pub fn rows(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    /// Number of columns
    pub fn cols(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    /// Total number of cells
    pub fn cell_count(&self) -> u64 {
        self.rows() as u64 * self.cols() as u64
    }

    /// Whether the range covers exactly one cell
    pub fn is_single_cell(&self) -> bool {
        self.start == self.end
    }

    /// Check if a cell is within this range
    pub fn contains(&self, addr: &CellAddress) -> bool {
        addr.sheet == self.start.sheet
            && addr.row >= self.start.row
            && addr.row <= self.end.row
            && addr.col >= self.start.col
            && addr.col <= self.end.col
    }

    /// Check if this range overlaps with another
    pub fn overlaps(&self, other: &RangeAddress) -> bool {
        self.sheet() == other.sheet()
            && self.start.row <= other.end.row
            && self.end.row >= other.start.row
            && self.start.col <= other.end.col
            && self.end.col >= other.start.col
    }

    /// Smallest range covering both ranges
    ///
    /// Fails when the ranges live on different sheets.
    pub fn bounding(&self, other: &RangeAddress) -> Result<RangeAddress> {
        if self.sheet() != other.sheet() {
            return Err(Error::InvalidReference(format!(
                "{} and {} are on different sheets",
                self, other
            )));
        }
        let mut range = RangeAddress::from_indices(
            self.sheet(),
            self.start.row.min(other.start.row),
            self.start.col.min(other.start.col),
            self.end.row.max(other.end.row),
            self.end.col.max(other.end.col),
        );
        if self.kind == other.kind {
            range.kind = self.kind;
        }
        Ok(range)
    }

    /// Bound whole-column/row ranges to `rows` x `cols`
    ///
    /// Bounded ranges are returned unchanged. The result always keeps at
    /// least the first row/column of the original range.
    pub fn clip_to(&self, rows: u32, cols: u32) -> RangeAddress {
        let mut clipped = self.clone();
        match self.kind {
            RangeKind::Cells => return clipped,
            RangeKind::Columns => {
                clipped.end.row = rows.clamp(self.start.row, self.end.row);
            }
            RangeKind::Rows => {
                clipped.end.col = cols.clamp(self.start.col, self.end.col);
            }
        }
        clipped.kind = RangeKind::Cells;
        clipped
    }

    /// The part of the range inside rows `1..=rows` and columns `1..=cols`
    ///
    /// `None` when nothing of the range lies inside.
    pub fn within(&self, rows: u32, cols: u32) -> Option<RangeAddress> {
        if self.start.row > rows || self.start.col > cols {
            return None;
        }
        Some(RangeAddress::from_indices(
            self.sheet(),
            self.start.row,
            self.start.col,
            self.end.row.min(rows),
            self.end.col.min(cols),
        ))
    }

    /// Iterate over all cell addresses in the range (row by row)
    pub fn cells(&self) -> RangeCells<'_> {
        RangeCells {
            range: self,
            row: self.start.row,
            col: self.start.col,
        }
    }
}

impl fmt::Display for RangeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", reference::format_range(self))
    }
}

impl From<CellAddress> for RangeAddress {
    fn from(addr: CellAddress) -> Self {
        RangeAddress::single(addr)
    }
}

/// Iterator over cells in a range
pub struct RangeCells<'a> {
    range: &'a RangeAddress,
    row: u32,
    col: u32,
}

impl Iterator for RangeCells<'_> {
    type Item = CellAddress;

    fn next(&mut self) -> Option<Self::Item> {
        if self.row > self.range.end.row {
            return None;
        }

        let addr = CellAddress::new(self.range.sheet(), self.row, self.col);

        self.col += 1;
        if self.col > self.range.end.col {
            self.col = self.range.start.col;
            self.row += 1;
        }

        Some(addr)
    }
}
