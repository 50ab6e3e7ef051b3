//! Reference resolution
//!
//! Parsing, formatting and arithmetic on cell and range reference text.
//! Everything here is pure: no model access, no evaluation.
//!
//! Accepted text forms:
//! - A1: `B2`, `$B$2`, `B2:C5`, `A:C`, `3:7`
//! - absolute R1C1: `R2C3`, `R2C3:R5C4` (accepted by [`parse_cell`]/[`parse_range`])
//! - relative R1C1: `R[1]C[-2]`, `RC`, `R`, `C3` (only via [`parse_cell_r1c1`]/[`parse_range_r1c1`])
//! - any of the above with a `Sheet!` or `'Quoted Sheet'!` prefix

use crate::cell::{
    column_to_letters, letters_to_column, parse_row_number, CellAddress, CellCoord,
    RangeAddress, RangeKind,
};
use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};
use lazy_regex::regex_captures;

/// Split an optional sheet prefix from reference text
///
/// The sheet ends at the last `!` outside a quoted name. Quoted names use
/// `''` for a literal apostrophe.
///
/// ```
/// use sheetcalc_core::reference::split_sheet;
///
/// assert_eq!(split_sheet("Data!A1").unwrap(), (Some("Data".to_string()), "A1"));
/// assert_eq!(split_sheet("'Bob''s'!A1").unwrap(), (Some("Bob's".to_string()), "A1"));
/// assert_eq!(split_sheet("A1").unwrap(), (None, "A1"));
/// ```
pub fn split_sheet(text: &str) -> Result<(Option<String>, &str)> {
    let text = text.trim();

    if let Some(rest) = text.strip_prefix('\'') {
        let mut name = String::new();
        let mut chars = rest.char_indices();
        while let Some((i, c)) = chars.next() {
            if c != '\'' {
                name.push(c);
                continue;
            }
            if rest[i + 1..].starts_with('\'') {
                name.push('\'');
                chars.next();
                continue;
            }
            return match rest[i + 1..].strip_prefix('!') {
                Some(body) if !name.is_empty() => Ok((Some(name), body)),
                _ => Err(Error::InvalidReference(text.to_string())),
            };
        }
        return Err(Error::InvalidReference(format!(
            "unterminated sheet name in '{}'",
            text
        )));
    }

    match text.rfind('!') {
        Some(0) => Err(Error::InvalidReference(text.to_string())),
        Some(i) => Ok((Some(text[..i].to_string()), &text[i + 1..])),
        None => Ok((None, text)),
    }
}

/// Parse a single cell reference
///
/// `default_sheet` is used when the text carries no sheet prefix.
/// Accepts A1 and absolute R1C1 text.
///
/// # Examples
/// ```
/// use sheetcalc_core::reference::parse_cell;
///
/// let a1 = parse_cell("Data!$C$2", "Sheet1").unwrap();
/// let r1c1 = parse_cell("Data!R2C3", "Sheet1").unwrap();
/// assert_eq!(a1, r1c1);
/// assert_eq!((a1.row, a1.col), (2, 3));
/// ```
pub fn parse_cell(text: &str, default_sheet: &str) -> Result<CellAddress> {
    let (sheet, body) = split_sheet(text)?;
    let sheet = sheet.unwrap_or_else(|| default_sheet.to_string());
    let coord = parse_cell_coord(body)
        .ok_or_else(|| Error::InvalidReference(text.trim().to_string()))?;
    let addr = coord.on_sheet(sheet);
    validate_bounds(&addr)?;
    Ok(addr)
}

/// Parse a range reference
///
/// Both corners are normalized so `start` is top-left. A single cell yields a
/// 1x1 range. Whole columns (`A:C`) and whole rows (`3:7`) carry their
/// [`RangeKind`]. The end corner may repeat the same sheet prefix.
pub fn parse_range(text: &str, default_sheet: &str) -> Result<RangeAddress> {
    let (sheet, body) = split_range_sheet(text)?;
    let sheet = sheet.unwrap_or_else(|| default_sheet.to_string());
    if sheet.is_empty() {
        return Err(Error::InvalidReference(text.trim().to_string()));
    }
    let (start, end, kind) = parse_range_body(&body)?;
    Ok(RangeAddress {
        start: start.on_sheet(sheet.clone()),
        end: end.on_sheet(sheet),
        kind,
    })
}

/// Split the sheet prefix from range text
///
/// Returns the sheet (if any) and the sheet-less body, e.g.
/// `Data!A1:Data!B2` becomes `(Some("Data"), "A1:B2")`.
pub fn split_range_sheet(text: &str) -> Result<(Option<String>, String)> {
    let text = text.trim();
    let Some((first, second)) = text.split_once(':') else {
        let (sheet, body) = split_sheet(text)?;
        return Ok((sheet, body.to_string()));
    };

    let (sheet, first_body) = split_sheet(first)?;
    let (second_sheet, second_body) = split_sheet(second)?;
    if second_sheet.is_some() && second_sheet != sheet {
        return Err(Error::InvalidReference(text.to_string()));
    }
    Ok((sheet, format!("{}:{}", first_body, second_body)))
}

/// Parse sheet-less range text into normalized corners and kind
///
/// `$` markers are preserved on the returned coordinates. Whole columns span
/// rows `1..=MAX_ROWS` and whole rows span columns `1..=MAX_COLS`.
pub fn parse_range_body(body: &str) -> Result<(CellCoord, CellCoord, RangeKind)> {
    let invalid = || Error::InvalidReference(body.trim().to_string());

    let Some((first, second)) = body.split_once(':') else {
        let coord = parse_cell_coord(body).ok_or_else(invalid)?;
        return Ok((coord, coord, RangeKind::Cells));
    };

    if let (Some(a), Some(b)) = (parse_cell_coord(first), parse_cell_coord(second)) {
        let (start, end) = normalize(a, b);
        return Ok((start, end, RangeKind::Cells));
    }
    if let (Some((c1, abs1)), Some((c2, abs2))) = (parse_column_part(first), parse_column_part(second)) {
        let a = CellCoord::with_absolute(1, c1, false, abs1);
        let b = CellCoord::with_absolute(MAX_ROWS, c2, false, abs2);
        let (start, end) = normalize(a, b);
        return Ok((start, end, RangeKind::Columns));
    }
    if let (Some((r1, abs1)), Some((r2, abs2))) = (parse_row_part(first), parse_row_part(second)) {
        let a = CellCoord::with_absolute(r1, 1, abs1, false);
        let b = CellCoord::with_absolute(r2, MAX_COLS, abs2, false);
        let (start, end) = normalize(a, b);
        return Ok((start, end, RangeKind::Rows));
    }
    Err(invalid())
}

/// Parse a sheet-less cell in A1 or absolute R1C1 form
pub fn parse_cell_coord(body: &str) -> Option<CellCoord> {
    let body = body.trim();
    if let Ok(coord) = CellCoord::parse_a1(body) {
        return Some(coord);
    }
    let (_, row, col) = regex_captures!(r"^[Rr](\d+)[Cc](\d+)$", body)?;
    let row = parse_row_number(row)?;
    let col: u32 = col.parse().ok()?;
    (1..=MAX_COLS)
        .contains(&col)
        .then(|| CellCoord::with_absolute(row, col, true, true))
}

/// Parse a single R1C1 cell reference, resolving relative parts against `base`
///
/// `R[1]C[-1]` is one row down and one column left of `base`; a bare `R` or
/// `C` means the same row or column as `base`. An unqualified reference lives
/// on `base`'s sheet.
///
/// ```
/// use sheetcalc_core::{reference::parse_cell_r1c1, CellAddress};
///
/// let base = CellAddress::new("Sheet1", 5, 5);
/// let addr = parse_cell_r1c1("R[-1]C2", &base).unwrap();
/// assert_eq!(addr, CellAddress::new("Sheet1", 4, 2));
/// ```
pub fn parse_cell_r1c1(text: &str, base: &CellAddress) -> Result<CellAddress> {
    let (sheet, body) = split_sheet(text)?;
    let sheet = sheet.unwrap_or_else(|| base.sheet.clone());
    let (row, col) = parse_r1c1_cell_body(body, base)
        .ok_or_else(|| Error::InvalidReference(text.trim().to_string()))?;
    checked_address(sheet, row, col)
}

/// Parse an R1C1 range, resolving relative parts against `base`
///
/// Besides `cell:cell`, accepts whole rows (`R2`, `R[1]:R[3]`) and whole
/// columns (`C4`, `C:C[2]`).
pub fn parse_range_r1c1(text: &str, base: &CellAddress) -> Result<RangeAddress> {
    let (sheet, body) = split_range_sheet(text)?;
    let sheet = sheet.unwrap_or_else(|| base.sheet.clone());
    let (first, second) = body.split_once(':').unwrap_or((body.as_str(), body.as_str()));

    if let (Some((r1, c1)), Some((r2, c2))) = (
        parse_r1c1_cell_body(first, base),
        parse_r1c1_cell_body(second, base),
    ) {
        let start = checked_address(sheet.clone(), r1, c1)?;
        let end = checked_address(sheet, r2, c2)?;
        return Ok(RangeAddress::new(start, end));
    }

    let row_part = |part: &str| -> Option<i64> {
        let (_, row) = regex_captures!(r"^[Rr](\[[+-]?\d+\]|\d+)?$", part)?;
        resolve_r1c1_part(row, base.row)
    };
    if let (Some(r1), Some(r2)) = (row_part(first), row_part(second)) {
        check_row(r1)?;
        check_row(r2)?;
        return Ok(RangeAddress::full_rows(sheet, r1 as u32, r2 as u32));
    }

    let col_part = |part: &str| -> Option<i64> {
        let (_, col) = regex_captures!(r"^[Cc](\[[+-]?\d+\]|\d+)?$", part)?;
        resolve_r1c1_part(col, base.col)
    };
    if let (Some(c1), Some(c2)) = (col_part(first), col_part(second)) {
        check_col(c1)?;
        check_col(c2)?;
        return Ok(RangeAddress::full_columns(sheet, c1 as u32, c2 as u32));
    }

    Err(Error::InvalidReference(text.trim().to_string()))
}

/// Format a cell address as canonical text (`Sheet!B2`)
pub fn format_cell(addr: &CellAddress) -> String {
    format!(
        "{}{}{}",
        sheet_prefix(&addr.sheet),
        column_to_letters(addr.col),
        addr.row
    )
}

/// Format a range as canonical text
///
/// `Sheet!A1` for a single cell, `Sheet!A1:B2` for a block, `Sheet!A:B` for
/// whole columns and `Sheet!1:2` for whole rows.
pub fn format_range(range: &RangeAddress) -> String {
    let prefix = sheet_prefix(range.sheet());
    let (start, end) = (&range.start, &range.end);
    match range.kind {
        RangeKind::Columns => format!(
            "{}{}:{}",
            prefix,
            column_to_letters(start.col),
            column_to_letters(end.col)
        ),
        RangeKind::Rows => format!("{}{}:{}", prefix, start.row, end.row),
        RangeKind::Cells if range.is_single_cell() => format_cell(start),
        RangeKind::Cells => format!(
            "{}{}{}:{}{}",
            prefix,
            column_to_letters(start.col),
            start.row,
            column_to_letters(end.col),
            end.row
        ),
    }
}

/// Format a sheet name as it must appear before `!`
pub fn quote_sheet_name(sheet: &str) -> String {
    if sheet_needs_quotes(sheet) {
        format!("'{}'", sheet.replace('\'', "''"))
    } else {
        sheet.to_string()
    }
}

/// Move `base` by `d_row`/`d_col` and size the result `height` x `width`
///
/// A negative height or width extends the range up or left from the moved
/// anchor. Fails with [`Error::InvalidDimension`] for a zero height or width
/// and [`Error::RefOutOfBounds`] when any part of the result leaves the grid.
///
/// ```
/// use sheetcalc_core::{reference::offset, CellAddress, RangeAddress};
///
/// let a1 = CellAddress::new("S", 1, 1);
/// let range = offset(&a1, 1, 1, 2, 2).unwrap();
/// assert_eq!(range, RangeAddress::from_indices("S", 2, 2, 3, 3));
/// assert!(offset(&a1, -2, 0, 1, 1).is_err());
/// ```
pub fn offset(
    base: &CellAddress,
    d_row: i64,
    d_col: i64,
    height: i64,
    width: i64,
) -> Result<RangeAddress> {
    if height == 0 || width == 0 {
        return Err(Error::InvalidDimension { height, width });
    }

    let out_of_bounds = || Error::RefOutOfBounds {
        row: (base.row as i64).saturating_add(d_row),
        col: (base.col as i64).saturating_add(d_col),
    };
    let (r1, r2) = (base.row as i64)
        .checked_add(d_row)
        .and_then(|top| span(top, height))
        .ok_or_else(out_of_bounds)?;
    let (c1, c2) = (base.col as i64)
        .checked_add(d_col)
        .and_then(|left| span(left, width))
        .ok_or_else(out_of_bounds)?;

    for (row, col) in [(r1, c1), (r2, c2)] {
        if !(1..=MAX_ROWS as i64).contains(&row) || !(1..=MAX_COLS as i64).contains(&col) {
            return Err(Error::RefOutOfBounds { row, col });
        }
    }

    Ok(RangeAddress::from_indices(
        base.sheet.clone(),
        r1 as u32,
        c1 as u32,
        r2 as u32,
        c2 as u32,
    ))
}

/// [`offset`] applied to a range anchored at its top-left corner
///
/// Omitted `height`/`width` default to the size of `base`. A whole-column or
/// whole-row base keeps its kind when the result still spans the full grid.
pub fn offset_range(
    base: &RangeAddress,
    d_row: i64,
    d_col: i64,
    height: Option<i64>,
    width: Option<i64>,
) -> Result<RangeAddress> {
    let height = height.unwrap_or(base.rows() as i64);
    let width = width.unwrap_or(base.cols() as i64);
    let mut range = offset(&base.start, d_row, d_col, height, width)?;

    let full_height = range.start.row == 1 && range.end.row == MAX_ROWS;
    let full_width = range.start.col == 1 && range.end.col == MAX_COLS;
    range.kind = match base.kind {
        RangeKind::Columns if full_height => RangeKind::Columns,
        RangeKind::Rows if full_width => RangeKind::Rows,
        _ => RangeKind::Cells,
    };
    Ok(range)
}

/// Check that an address lies inside the sheet grid
pub fn validate_bounds(addr: &CellAddress) -> Result<()> {
    if addr.sheet.is_empty() {
        return Err(Error::InvalidReference("empty sheet name".into()));
    }
    if !(1..=MAX_ROWS).contains(&addr.row) || !(1..=MAX_COLS).contains(&addr.col) {
        return Err(Error::RefOutOfBounds {
            row: addr.row as i64,
            col: addr.col as i64,
        });
    }
    Ok(())
}

/// First and last index covered by `size` cells from `anchor`, `None` on overflow
fn span(anchor: i64, size: i64) -> Option<(i64, i64)> {
    if size > 0 {
        Some((anchor, anchor.checked_add(size - 1)?))
    } else {
        Some((anchor.checked_add(size + 1)?, anchor))
    }
}

fn normalize(a: CellCoord, b: CellCoord) -> (CellCoord, CellCoord) {
    let start = CellCoord::with_absolute(
        a.row.min(b.row),
        a.col.min(b.col),
        a.row_absolute,
        a.col_absolute,
    );
    let end = CellCoord::with_absolute(
        a.row.max(b.row),
        a.col.max(b.col),
        b.row_absolute,
        b.col_absolute,
    );
    (start, end)
}

fn parse_column_part(part: &str) -> Option<(u32, bool)> {
    let part = part.trim();
    let letters = part.strip_prefix('$');
    let absolute = letters.is_some();
    letters_to_column(letters.unwrap_or(part))
        .ok()
        .map(|col| (col, absolute))
}

fn parse_row_part(part: &str) -> Option<(u32, bool)> {
    let part = part.trim();
    let digits = part.strip_prefix('$');
    let absolute = digits.is_some();
    parse_row_number(digits.unwrap_or(part)).map(|row| (row, absolute))
}

fn parse_r1c1_cell_body(body: &str, base: &CellAddress) -> Option<(i64, i64)> {
    let (_, row, col) = regex_captures!(
        r"^[Rr](\[[+-]?\d+\]|\d+)?[Cc](\[[+-]?\d+\]|\d+)?$",
        body.trim()
    )?;
    Some((
        resolve_r1c1_part(row, base.row)?,
        resolve_r1c1_part(col, base.col)?,
    ))
}

fn resolve_r1c1_part(part: &str, base: u32) -> Option<i64> {
    if part.is_empty() {
        return Some(base as i64);
    }
    match part.strip_prefix('[').and_then(|p| p.strip_suffix(']')) {
        Some(delta) => Some((base as i64).saturating_add(delta.parse::<i64>().ok()?)),
        None => part.parse::<i64>().ok(),
    }
}

fn check_row(row: i64) -> Result<()> {
    match (1..=MAX_ROWS as i64).contains(&row) {
        true => Ok(()),
        false => Err(Error::RefOutOfBounds { row, col: 1 }),
    }
}

fn check_col(col: i64) -> Result<()> {
    match (1..=MAX_COLS as i64).contains(&col) {
        true => Ok(()),
        false => Err(Error::RefOutOfBounds { row: 1, col }),
    }
}

fn checked_address(sheet: String, row: i64, col: i64) -> Result<CellAddress> {
    check_row(row).and(check_col(col)).map_err(|_| Error::RefOutOfBounds { row, col })?;
    Ok(CellAddress::new(sheet, row as u32, col as u32))
}

fn sheet_prefix(sheet: &str) -> String {
    format!("{}!", quote_sheet_name(sheet))
}

fn sheet_needs_quotes(sheet: &str) -> bool {
    let starts_with_digit = sheet.chars().next().map_or(true, |c| c.is_ascii_digit());
    starts_with_digit
        || !sheet
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
        || CellCoord::parse_a1(sheet).is_ok()
        || regex_captures!(r"^[Rr]\d*[Cc]\d*$", sheet).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_parse_cell_a1() {
        let addr = parse_cell("B2", "Sheet1").unwrap();
        assert_eq!(addr, CellAddress::new("Sheet1", 2, 2));

        let addr = parse_cell("Data!$C$10", "Sheet1").unwrap();
        assert_eq!(addr, CellAddress::new("Data", 10, 3));

        let addr = parse_cell("'My Sheet'!A1", "Sheet1").unwrap();
        assert_eq!(addr, CellAddress::new("My Sheet", 1, 1));
    }

    #[test]
    fn test_parse_cell_errors() {
        assert!(matches!(
            parse_cell("", "S"),
            Err(Error::InvalidReference(_))
        ));
        assert!(matches!(
            parse_cell("A0", "S"),
            Err(Error::InvalidReference(_))
        ));
        assert!(matches!(
            parse_cell("!A1", "S"),
            Err(Error::InvalidReference(_))
        ));
        assert!(matches!(
            parse_cell("'Open!A1", "S"),
            Err(Error::InvalidReference(_))
        ));
        assert!(parse_cell("A1:B2", "S").is_err());
        assert!(parse_cell("R0C1", "S").is_err());
        assert!(parse_cell("R1C16385", "S").is_err());
    }

    #[test]
    fn test_split_sheet_last_bang() {
        assert_eq!(
            split_sheet("'Q1!Totals'!B3").unwrap(),
            (Some("Q1!Totals".to_string()), "B3")
        );
        assert_eq!(
            split_sheet("'It''s'!B3").unwrap(),
            (Some("It's".to_string()), "B3")
        );
    }

    #[test]
    fn test_parse_range_forms() {
        let range = parse_range("Data!B3:A1", "S").unwrap();
        assert_eq!(range, RangeAddress::from_indices("Data", 1, 1, 3, 2));

        let range = parse_range("C3", "S").unwrap();
        assert!(range.is_single_cell());

        let range = parse_range("$A:$C", "S").unwrap();
        assert_eq!(range.kind, RangeKind::Columns);
        assert_eq!((range.start.col, range.end.col), (1, 3));
        assert_eq!(range.rows(), MAX_ROWS);

        let range = parse_range("7:3", "S").unwrap();
        assert_eq!(range.kind, RangeKind::Rows);
        assert_eq!((range.start.row, range.end.row), (3, 7));

        let range = parse_range("R1C1:R2C3", "S").unwrap();
        assert_eq!(range, RangeAddress::from_indices("S", 1, 1, 2, 3));

        let range = parse_range("Data!A1:Data!B2", "S").unwrap();
        assert_eq!(range, RangeAddress::from_indices("Data", 1, 1, 2, 2));

        assert!(parse_range("Data!A1:Other!B2", "S").is_err());
        assert!(parse_range("A1:B", "S").is_err());
        assert!(parse_range("A1:B2:C3", "S").is_err());
    }

    #[test]
    fn test_parse_r1c1_relative() {
        let base = CellAddress::new("S", 10, 10);
        assert_eq!(
            parse_cell_r1c1("RC", &base).unwrap(),
            CellAddress::new("S", 10, 10)
        );
        assert_eq!(
            parse_cell_r1c1("R[2]C[-3]", &base).unwrap(),
            CellAddress::new("S", 12, 7)
        );
        assert_eq!(
            parse_cell_r1c1("Other!R1C[1]", &base).unwrap(),
            CellAddress::new("Other", 1, 11)
        );
        assert!(matches!(
            parse_cell_r1c1("R[-10]C", &base),
            Err(Error::RefOutOfBounds { .. })
        ));
        assert!(parse_cell_r1c1("A1", &base).is_err());
    }

    #[test]
    fn test_parse_range_r1c1() {
        let base = CellAddress::new("S", 5, 5);
        assert_eq!(
            parse_range_r1c1("R1C1:R[1]C[1]", &base).unwrap(),
            RangeAddress::from_indices("S", 1, 1, 6, 6)
        );
        let rows = parse_range_r1c1("R2", &base).unwrap();
        assert_eq!(rows, RangeAddress::full_rows("S", 2, 2));
        let cols = parse_range_r1c1("C:C[1]", &base).unwrap();
        assert_eq!(cols, RangeAddress::full_columns("S", 5, 6));
        let quoted = parse_range_r1c1("'My Sheet'!R1C1:R2C2", &base).unwrap();
        assert_eq!(quoted, RangeAddress::from_indices("My Sheet", 1, 1, 2, 2));
    }

    #[test]
    fn test_format_canonical() {
        assert_eq!(format_cell(&CellAddress::new("Sheet1", 2, 3)), "Sheet1!C2");
        assert_eq!(
            format_cell(&CellAddress::new("My Sheet", 1, 1)),
            "'My Sheet'!A1"
        );
        assert_eq!(format_cell(&CellAddress::new("It's", 1, 1)), "'It''s'!A1");
        assert_eq!(format_cell(&CellAddress::new("A1", 1, 1)), "'A1'!A1");
        assert_eq!(format_cell(&CellAddress::new("2024", 1, 1)), "'2024'!A1");

        assert_eq!(
            format_range(&RangeAddress::from_indices("S", 1, 1, 2, 2)),
            "S!A1:B2"
        );
        assert_eq!(format_range(&RangeAddress::full_columns("S", 1, 2)), "S!A:B");
        assert_eq!(format_range(&RangeAddress::full_rows("S", 3, 4)), "S!3:4");
        assert_eq!(
            format_range(&RangeAddress::from_indices("S", 4, 4, 4, 4)),
            "S!D4"
        );
    }

    #[test]
    fn test_format_round_trip_examples() {
        for text in ["Data!$B$2", "data!b2"] {
            let addr = parse_cell(text, "S").unwrap();
            assert_eq!(format_cell(&addr), format!("{}!B2", addr.sheet));
        }
        let range = parse_range("'Q 1'!$A$1:$C$3", "S").unwrap();
        assert_eq!(format_range(&range), "'Q 1'!A1:C3");
        assert_eq!(parse_range(&format_range(&range), "S").unwrap(), range);
    }

    #[test]
    fn test_offset_basic() {
        let a1 = CellAddress::new("S", 1, 1);
        assert_eq!(
            offset(&a1, 1, 1, 2, 2).unwrap(),
            RangeAddress::from_indices("S", 2, 2, 3, 3)
        );
        assert_eq!(
            offset(&a1, 0, 0, 1, 1).unwrap(),
            RangeAddress::single(a1.clone())
        );
    }

    #[test]
    fn test_offset_negative_size_extends_up_left() {
        let c5 = CellAddress::new("S", 5, 3);
        assert_eq!(
            offset(&c5, 0, 0, -2, -3).unwrap(),
            RangeAddress::from_indices("S", 4, 1, 5, 3)
        );
    }

    #[test]
    fn test_offset_errors() {
        let a1 = CellAddress::new("S", 1, 1);
        assert!(matches!(
            offset(&a1, -2, 0, 1, 1),
            Err(Error::RefOutOfBounds { row: -1, .. })
        ));
        assert!(matches!(
            offset(&a1, 0, 16_384, 1, 1),
            Err(Error::RefOutOfBounds { .. })
        ));
        assert!(matches!(
            offset(&a1, 0, 0, 0, 1),
            Err(Error::InvalidDimension { height: 0, .. })
        ));
        assert!(matches!(
            offset(&a1, 0, 0, 1, 0),
            Err(Error::InvalidDimension { width: 0, .. })
        ));
        assert!(matches!(
            offset(&a1, 1_048_575, 0, 2, 1),
            Err(Error::RefOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_offset_extreme_arguments_are_out_of_bounds() {
        let b2 = CellAddress::new("S", 2, 2);
        for (d_row, d_col, height, width) in [
            (i64::MAX, 0, 1, 1),
            (0, i64::MAX, 1, 1),
            (i64::MIN, 0, 1, 1),
            (0, 0, i64::MAX, 1),
            (0, 0, 1, i64::MIN),
            (i64::MAX, i64::MAX, i64::MAX, i64::MAX),
        ] {
            assert!(matches!(
                offset(&b2, d_row, d_col, height, width),
                Err(Error::RefOutOfBounds { .. })
            ));
        }
    }

    #[test]
    fn test_r1c1_huge_relative_offset_is_out_of_bounds() {
        let base = CellAddress::new("S", 2, 2);
        assert!(matches!(
            parse_cell_r1c1("R[9223372036854775807]C", &base),
            Err(Error::RefOutOfBounds { .. })
        ));
        assert!(matches!(
            parse_range_r1c1("RC[-9223372036854775808]", &base),
            Err(Error::RefOutOfBounds { .. })
        ));
        assert!(parse_range_r1c1("R[9223372036854775807]", &base).is_err());
    }

    #[test]
    fn test_offset_range_keeps_kind() {
        let column = RangeAddress::full_columns("S", 1, 1);
        let moved = offset_range(&column, 0, 2, None, None).unwrap();
        assert_eq!(moved, RangeAddress::full_columns("S", 3, 3));

        let shrunk = offset_range(&column, 0, 0, Some(5), None).unwrap();
        assert_eq!(shrunk.kind, RangeKind::Cells);
        assert_eq!(shrunk, RangeAddress::from_indices("S", 1, 1, 5, 1));

        assert!(offset_range(&column, 1, 0, None, None).is_err());

        let block = RangeAddress::from_indices("S", 2, 2, 3, 4);
        let moved = offset_range(&block, 1, -1, None, None).unwrap();
        assert_eq!(moved, RangeAddress::from_indices("S", 3, 1, 4, 3));
    }

    #[test]
    fn test_validate_bounds() {
        assert!(validate_bounds(&CellAddress::new("S", 1, 1)).is_ok());
        assert!(validate_bounds(&CellAddress::new("S", MAX_ROWS, MAX_COLS)).is_ok());
        assert!(validate_bounds(&CellAddress::new("S", 0, 1)).is_err());
        assert!(validate_bounds(&CellAddress::new("S", 1, MAX_COLS + 1)).is_err());
        assert!(validate_bounds(&CellAddress::new("", 1, 1)).is_err());
    }

    proptest! {
        #[test]
        fn test_a1_and_r1c1_agree(row in 1u32..=MAX_ROWS, col in 1u32..=MAX_COLS) {
            let a1 = format!("Data!{}{}", column_to_letters(col), row);
            let r1c1 = format!("Data!R{}C{}", row, col);
            let from_a1 = parse_cell(&a1, "S").unwrap();
            let from_r1c1 = parse_cell(&r1c1, "S").unwrap();
            prop_assert_eq!(&from_a1, &from_r1c1);
            prop_assert_eq!(from_a1, CellAddress::new("Data", row, col));
        }

        #[test]
        fn test_cell_round_trip(
            row in 1u32..=MAX_ROWS,
            col in 1u32..=MAX_COLS,
            sheet in "[A-Za-z][A-Za-z0-9 ]{0,8}[A-Za-z]",
        ) {
            let addr = CellAddress::new(sheet, row, col);
            let text = format_cell(&addr);
            prop_assert_eq!(parse_cell(&text, "Other").unwrap(), addr);
        }

        #[test]
        fn test_range_round_trip(
            r1 in 1u32..=MAX_ROWS,
            r2 in 1u32..=MAX_ROWS,
            c1 in 1u32..=MAX_COLS,
            c2 in 1u32..=MAX_COLS,
        ) {
            let range = RangeAddress::from_indices("Sheet1", r1, c1, r2, c2);
            let text = format_range(&range);
            prop_assert_eq!(parse_range(&text, "Other").unwrap(), range);
        }
    }
}
