//! Reference functions
//!
//! `OFFSET`, `INDEX` and `INDIRECT` produce references rather than values, so
//! they can feed reference parameters of other functions (`SUM(OFFSET(..))`,
//! `A1:INDEX(..)`) and only read cells when used where a value is needed.

use super::Argument;
use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::value::{Array, Operand, Value};
use log::debug;
use sheetcalc_core::{
    reference, CellAddress, CellCoord, ErrorKind, RangeAddress, RangeKind, MAX_COLS, MAX_ROWS,
};

/// Truncated integer of a number argument
fn int_arg(args: &[Argument], index: usize) -> Option<i64> {
    args.get(index)
        .and_then(Argument::number)
        .map(|n| n.trunc() as i64)
}

/// The single area of a reference argument
fn area_arg<'r>(arg: Option<&'r Argument>) -> Result<&'r RangeAddress, ErrorKind> {
    match arg {
        Some(Argument::Reference(r)) => r.single_area().ok_or(ErrorKind::Value),
        Some(Argument::Value(Value::Error(e))) => Err(*e),
        _ => Err(ErrorKind::Value),
    }
}

/// OFFSET(reference, rows, cols, [height], [width])
///
/// Height and width default to the size of `reference`. A 1x1 result reads
/// as a scalar, anything larger as an array.
pub fn fn_offset(args: &[Argument], _ctx: &EvaluationContext) -> FormulaResult<Operand> {
    let base = match area_arg(args.first()) {
        Ok(base) => base,
        Err(e) => return Ok(e.into()),
    };
    let d_row = int_arg(args, 1).unwrap_or(0);
    let d_col = int_arg(args, 2).unwrap_or(0);

    Ok(
        match reference::offset_range(base, d_row, d_col, int_arg(args, 3), int_arg(args, 4)) {
            Ok(range) => range.into(),
            Err(e) => e.error_kind().into(),
        },
    )
}

/// Part of an indexed block, as 0-based offsets
enum Slice {
    Cell(usize, usize),
    Row(usize),
    Column(usize),
}

/// Resolve INDEX row/column numbers against a `rows` x `cols` block
fn index_slice(
    rows: usize,
    cols: usize,
    row_num: i64,
    col_num: Option<i64>,
) -> Result<Slice, ErrorKind> {
    // A single row indexed with one number picks a column
    let (row_num, col_num) = match col_num {
        Some(c) => (row_num, c),
        None if rows == 1 && cols > 1 => (1, row_num),
        None => (row_num, 1),
    };

    if row_num < 0 || col_num < 0 {
        return Err(ErrorKind::Value);
    }
    if row_num as u64 > rows as u64 || col_num as u64 > cols as u64 {
        return Err(ErrorKind::Ref);
    }

    match (row_num as usize, col_num as usize) {
        (0, 0) => Err(ErrorKind::Value),
        (0, c) => Ok(Slice::Column(c - 1)),
        (r, 0) => Ok(Slice::Row(r - 1)),
        (r, c) => Ok(Slice::Cell(r - 1, c - 1)),
    }
}

/// INDEX(array, row_num, [col_num], [area_num])
///
/// Returns a reference when `array` is one, so the result can be the end of
/// a range (`A1:INDEX(..)`). `area_num` picks an area of a union.
pub fn fn_index(args: &[Argument], _ctx: &EvaluationContext) -> FormulaResult<Operand> {
    let row_num = int_arg(args, 1).unwrap_or(0);
    let col_num = int_arg(args, 2);
    let area_num = int_arg(args, 3).unwrap_or(1);

    match args.first() {
        Some(Argument::Reference(r)) => {
            let areas = r.areas();
            if area_num < 1 || area_num as u64 > areas.len() as u64 {
                return Ok(ErrorKind::Ref.into());
            }
            let area = &areas[area_num as usize - 1];
            Ok(
                match index_slice(area.rows() as usize, area.cols() as usize, row_num, col_num) {
                    Ok(slice) => index_area(area, slice).into(),
                    Err(e) => e.into(),
                },
            )
        }
        Some(Argument::Value(Value::Error(e))) => Ok((*e).into()),
        Some(Argument::Value(v)) => {
            if area_num != 1 {
                return Ok(ErrorKind::Ref.into());
            }
            let array = match v {
                Value::Array(a) => a.clone(),
                other => Array::scalar(other.clone()),
            };
            let value = match index_slice(array.rows(), array.cols(), row_num, col_num) {
                Ok(Slice::Cell(r, c)) => array.get(r, c).cloned(),
                Ok(Slice::Row(r)) => array.row(r).map(Value::Array),
                Ok(Slice::Column(c)) => array.column(c).map(Value::Array),
                Err(e) => Some(Value::Error(e)),
            };
            Ok(Operand::Value(value.unwrap_or(Value::Error(ErrorKind::Ref))))
        }
        _ => Ok(ErrorKind::Value.into()),
    }
}

fn index_area(area: &RangeAddress, slice: Slice) -> RangeAddress {
    let sheet = area.sheet();
    let (top, left) = (area.start.row, area.start.col);
    match slice {
        Slice::Cell(r, c) => {
            RangeAddress::single(CellAddress::new(sheet, top + r as u32, left + c as u32))
        }
        Slice::Row(r) => {
            let row = top + r as u32;
            let mut range = RangeAddress::from_indices(sheet, row, left, row, area.end.col);
            if area.kind == RangeKind::Rows {
                range.kind = RangeKind::Rows;
            }
            range
        }
        Slice::Column(c) => {
            let col = left + c as u32;
            let mut range = RangeAddress::from_indices(sheet, top, col, area.end.row, col);
            if area.kind == RangeKind::Columns {
                range.kind = RangeKind::Columns;
            }
            range
        }
    }
}

/// INDIRECT(ref_text, [a1])
///
/// With `a1` FALSE the text is read as R1C1, relative parts counting from the
/// calling cell. Text that is not a reference may name a defined range.
/// Unparsable text, empty text and unknown sheets give `#NAME?`.
pub fn fn_indirect(args: &[Argument], ctx: &EvaluationContext) -> FormulaResult<Operand> {
    let text = args.first().and_then(Argument::text).unwrap_or("").trim();
    let a1 = args.get(1).and_then(Argument::boolean).unwrap_or(true);
    if text.is_empty() {
        return Ok(ErrorKind::Name.into());
    }

    let current = ctx.current_cell();
    let parsed = if a1 {
        reference::parse_range(text, &current.sheet)
    } else {
        reference::parse_range_r1c1(text, &current)
    };

    let mut range = match parsed {
        Ok(range) => range,
        Err(e) => match ctx.model().defined_name_target(text) {
            Some(target) => target,
            None => {
                debug!("INDIRECT could not resolve '{}': {}", text, e);
                return Ok(ErrorKind::Name.into());
            }
        },
    };

    let Some(sheet) = ctx.canonical_sheet(range.sheet()) else {
        debug!("INDIRECT refers to unknown sheet '{}'", range.sheet());
        return Ok(ErrorKind::Name.into());
    };
    range.start.sheet = sheet.clone();
    range.end.sheet = sheet;
    Ok(range.into())
}

/// ROW([reference])
///
/// Without an argument, the row of the calling cell. For a multi-row area,
/// the first row.
pub fn fn_row(args: &[Argument], ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(match args.first() {
        None => Value::Number(ctx.current_cell().row as f64),
        arg => match area_arg(arg) {
            Ok(area) => Value::Number(area.start.row as f64),
            Err(e) => Value::Error(e),
        },
    })
}

/// COLUMN([reference])
pub fn fn_column(args: &[Argument], ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(match args.first() {
        None => Value::Number(ctx.current_cell().col as f64),
        arg => match area_arg(arg) {
            Ok(area) => Value::Number(area.start.col as f64),
            Err(e) => Value::Error(e),
        },
    })
}

/// Extent of a reference or array argument as (rows, cols)
fn extent(arg: Option<&Argument>) -> Result<(usize, usize), ErrorKind> {
    match arg {
        Some(Argument::Value(Value::Array(a))) => Ok((a.rows(), a.cols())),
        Some(Argument::Value(Value::Error(e))) => Err(*e),
        Some(Argument::Value(_)) => Ok((1, 1)),
        other => area_arg(other).map(|area| (area.rows() as usize, area.cols() as usize)),
    }
}

/// ROWS(array)
pub fn fn_rows(args: &[Argument]) -> Value {
    match extent(args.first()) {
        Ok((rows, _)) => Value::Number(rows as f64),
        Err(e) => Value::Error(e),
    }
}

/// COLUMNS(array)
pub fn fn_columns(args: &[Argument]) -> Value {
    match extent(args.first()) {
        Ok((_, cols)) => Value::Number(cols as f64),
        Err(e) => Value::Error(e),
    }
}

/// AREAS(reference)
pub fn fn_areas(args: &[Argument]) -> Value {
    match args.first() {
        Some(Argument::Reference(r)) => Value::Number(r.areas().len() as f64),
        Some(Argument::Value(Value::Error(e))) => Value::Error(*e),
        _ => Value::Error(ErrorKind::Value),
    }
}

/// ADDRESS(row, col, [abs_num], [a1], [sheet_text])
///
/// `abs_num` 1 to 4: absolute, absolute row, absolute column, relative.
pub fn fn_address(args: &[Argument]) -> Value {
    let (Some(row), Some(col)) = (int_arg(args, 0), int_arg(args, 1)) else {
        return Value::Error(ErrorKind::Value);
    };
    if !(1..=MAX_ROWS as i64).contains(&row) || !(1..=MAX_COLS as i64).contains(&col) {
        return Value::Error(ErrorKind::Value);
    }
    let (row_abs, col_abs) = match int_arg(args, 2).unwrap_or(1) {
        1 => (true, true),
        2 => (true, false),
        3 => (false, true),
        4 => (false, false),
        _ => return Value::Error(ErrorKind::Value),
    };
    let a1 = args.get(3).and_then(Argument::boolean).unwrap_or(true);

    let body = if a1 {
        CellCoord::with_absolute(row as u32, col as u32, row_abs, col_abs).to_a1_string()
    } else {
        let r = if row_abs { format!("R{}", row) } else { format!("R[{}]", row) };
        let c = if col_abs { format!("C{}", col) } else { format!("C[{}]", col) };
        r + &c
    };

    match args.get(4).and_then(Argument::text) {
        Some(sheet) if !sheet.is_empty() => {
            Value::Text(format!("{}!{}", reference::quote_sheet_name(sheet), body))
        }
        _ => Value::Text(body),
    }
}

#[cfg(test)]
mod tests {
    use crate::evaluator::Evaluator;
    use crate::value::{Array, Value};
    use pretty_assertions::assert_eq;
    use sheetcalc_core::{CellAddress, ErrorKind, Workbook};

    /// Name/Age/City table in A1:C3
    fn sample() -> Workbook {
        let mut wb = Workbook::new();
        for (cell, value) in [("A1", "Name"), ("B1", "Age"), ("C1", "City")] {
            wb.set_cell_value(cell, value).unwrap();
        }
        wb.set_cell_value("A2", "Ann").unwrap();
        wb.set_cell_value("B2", 25).unwrap();
        wb.set_cell_value("C2", "NYC").unwrap();
        wb.set_cell_value("A3", "Bob").unwrap();
        wb.set_cell_value("B3", 30).unwrap();
        wb.set_cell_value("C3", "LA").unwrap();
        wb
    }

    /// Evaluate from J10
    fn eval(wb: &Workbook, formula: &str) -> Value {
        Evaluator::new(wb)
            .evaluate_formula(formula, &CellAddress::new("Sheet1", 10, 10))
            .unwrap()
    }

    fn n(x: f64) -> Value {
        Value::Number(x)
    }

    fn err(e: ErrorKind) -> Value {
        Value::Error(e)
    }

    fn array(rows: Vec<Vec<Value>>) -> Value {
        Value::Array(Array::from_rows(rows).unwrap())
    }

    #[test]
    fn test_offset_block() {
        let wb = sample();
        assert_eq!(
            eval(&wb, "=OFFSET(A1,1,1,2,2)"),
            array(vec![
                vec![n(25.0), Value::text("NYC")],
                vec![n(30.0), Value::text("LA")],
            ])
        );
        assert_eq!(eval(&wb, "=OFFSET(A1,1,1)"), n(25.0));
        assert_eq!(eval(&wb, "=OFFSET(A1,2.9,1.2)"), n(30.0));
        assert_eq!(eval(&wb, "=SUM(OFFSET(B1,1,0,2,1))"), n(55.0));
        assert_eq!(
            eval(&wb, "=OFFSET(C3,-1,-1,-2,1)"),
            array(vec![vec![Value::text("Age")], vec![n(25.0)]])
        );
    }

    #[test]
    fn test_offset_errors() {
        let wb = sample();
        assert_eq!(eval(&wb, "=OFFSET(A1,-2,0)"), err(ErrorKind::Ref));
        assert_eq!(eval(&wb, "=OFFSET(A1,0,-1)"), err(ErrorKind::Ref));
        assert_eq!(eval(&wb, "=OFFSET(A1,0,0,0,1)"), err(ErrorKind::Value));
        assert_eq!(eval(&wb, "=OFFSET(A1,\"x\",0)"), err(ErrorKind::Value));
        assert_eq!(eval(&wb, "=OFFSET(5,1,1)"), err(ErrorKind::Value));
        assert_eq!(eval(&wb, "=OFFSET((A1,B1),1,1)"), err(ErrorKind::Value));
        assert_eq!(eval(&wb, "=OFFSET(A1,1/0,1)"), err(ErrorKind::Div0));
    }

    #[test]
    fn test_extreme_numbers_give_errors() {
        let wb = sample();
        assert_eq!(eval(&wb, "=OFFSET(B2,1E+300,0)"), err(ErrorKind::Ref));
        assert_eq!(eval(&wb, "=OFFSET(B2,-1E+300,0)"), err(ErrorKind::Ref));
        assert_eq!(eval(&wb, "=OFFSET(B2,0,1E+300)"), err(ErrorKind::Ref));
        assert_eq!(eval(&wb, "=OFFSET(B2,0,0,1E+300,1)"), err(ErrorKind::Ref));
        assert_eq!(eval(&wb, "=OFFSET(B2,0,0,1,-1E+300)"), err(ErrorKind::Ref));
        assert_eq!(
            eval(&wb, "=INDIRECT(\"R[9223372036854775807]C\",FALSE)"),
            err(ErrorKind::Name)
        );
        assert_eq!(eval(&wb, "=INDEX(A1:C3,1E+300,1)"), err(ErrorKind::Ref));
        assert_eq!(eval(&wb, "=INDEX(A1:C3,1,1,1E+300)"), err(ErrorKind::Ref));
        assert_eq!(eval(&wb, "=INDEX(A1:C3,-1E+300,1)"), err(ErrorKind::Value));
        assert_eq!(eval(&wb, "=ADDRESS(1E+300,1)"), err(ErrorKind::Value));
        assert_eq!(eval(&wb, "=ADDRESS(1,1,1E+300)"), err(ErrorKind::Value));
    }

    #[test]
    fn test_offset_full_column_keeps_kind() {
        let wb = sample();
        assert_eq!(eval(&wb, "=ROWS(OFFSET(A:A,0,1))"), n(1_048_576.0));
        assert_eq!(eval(&wb, "=COLUMN(OFFSET(A:A,0,2))"), n(3.0));
        assert_eq!(eval(&wb, "=SUM(OFFSET(A:A,0,1))"), n(55.0));
    }

    #[test]
    fn test_index_reference() {
        let wb = sample();
        assert_eq!(eval(&wb, "=INDEX(A1:C3,2,3)"), Value::text("NYC"));
        assert_eq!(
            eval(&wb, "=INDEX(A1:C3,0,2)"),
            array(vec![vec![Value::text("Age")], vec![n(25.0)], vec![n(30.0)]])
        );
        assert_eq!(
            eval(&wb, "=INDEX(A1:C3,3,0)"),
            array(vec![vec![Value::text("Bob"), n(30.0), Value::text("LA")]])
        );
        assert_eq!(eval(&wb, "=INDEX(A1:C1,3)"), Value::text("City"));
        assert_eq!(eval(&wb, "=SUM(B2:INDEX(B1:B3,3))"), n(55.0));
    }

    #[test]
    fn test_index_errors() {
        let wb = sample();
        assert_eq!(eval(&wb, "=INDEX(A1:C3,0,0)"), err(ErrorKind::Value));
        assert_eq!(eval(&wb, "=INDEX(A1:C3,-1,1)"), err(ErrorKind::Value));
        assert_eq!(eval(&wb, "=INDEX(A1:C3,4,1)"), err(ErrorKind::Ref));
        assert_eq!(eval(&wb, "=INDEX(A1:C3,1,4)"), err(ErrorKind::Ref));
        assert_eq!(eval(&wb, "=INDEX(A1:C3,1,1,2)"), err(ErrorKind::Ref));
    }

    #[test]
    fn test_index_area_union() {
        let wb = sample();
        assert_eq!(eval(&wb, "=INDEX((A1:A3,C1:C3),2,1,2)"), Value::text("NYC"));
        assert_eq!(eval(&wb, "=INDEX((A1:A3,C1:C3),3,1,1)"), Value::text("Bob"));
        assert_eq!(eval(&wb, "=INDEX((A1:A3,C1:C3),1,1,3)"), err(ErrorKind::Ref));
        assert_eq!(eval(&wb, "=INDEX((A1:A3,C1:C3),1,1,0)"), err(ErrorKind::Ref));
    }

    #[test]
    fn test_index_array_constant() {
        let wb = Workbook::new();
        assert_eq!(eval(&wb, "=INDEX({1,2;3,4},2,2)"), n(4.0));
        assert_eq!(eval(&wb, "=INDEX({1,2;3,4},0,1)"), array(vec![vec![n(1.0)], vec![n(3.0)]]));
        assert_eq!(eval(&wb, "=INDEX({1,2;3,4},3,1)"), err(ErrorKind::Ref));
        assert_eq!(eval(&wb, "=INDEX(7,1,1)"), n(7.0));
    }

    #[test]
    fn test_indirect() {
        let wb = sample();
        assert_eq!(eval(&wb, "=INDIRECT(\"B2\")"), n(25.0));
        assert_eq!(eval(&wb, "=INDIRECT(\"sheet1!C3\")"), Value::text("LA"));
        assert_eq!(eval(&wb, "=SUM(INDIRECT(\"B2:B3\"))"), n(55.0));
        assert_eq!(eval(&wb, "=INDIRECT(ADDRESS(3,3))"), Value::text("LA"));
        assert_eq!(eval(&wb, "=INDIRECT(\"D9\")"), Value::Blank);
        assert_eq!(eval(&wb, "=INDIRECT(\"D9\")+1"), n(1.0));
    }

    #[test]
    fn test_indirect_r1c1() {
        let wb = sample();
        assert_eq!(eval(&wb, "=INDIRECT(\"R2C2\",FALSE)"), n(25.0));
        assert_eq!(eval(&wb, "=INDIRECT(\"R[-8]C[-8]\",FALSE)"), n(25.0));
        assert_eq!(eval(&wb, "=SUM(INDIRECT(\"R2C2:R3C2\",FALSE))"), n(55.0));
    }

    #[test]
    fn test_indirect_errors() {
        let wb = sample();
        assert_eq!(eval(&wb, "=INDIRECT(\"Missing!A1\")"), err(ErrorKind::Name));
        assert_eq!(eval(&wb, "=INDIRECT(\"\")"), err(ErrorKind::Name));
        assert_eq!(eval(&wb, "=INDIRECT(\"not a ref!!\")"), err(ErrorKind::Name));
        assert_eq!(eval(&wb, "=INDIRECT(\"NoSuchName\")"), err(ErrorKind::Name));
    }

    #[test]
    fn test_indirect_defined_name() {
        let mut wb = sample();
        wb.define_name("Ages", "Sheet1!$B$2:$B$3").unwrap();
        assert_eq!(eval(&wb, "=SUM(INDIRECT(\"Ages\"))"), n(55.0));
    }

    #[test]
    fn test_row_and_column() {
        let wb = sample();
        assert_eq!(eval(&wb, "=ROW()"), n(10.0));
        assert_eq!(eval(&wb, "=COLUMN()"), n(10.0));
        assert_eq!(eval(&wb, "=ROW(C5)"), n(5.0));
        assert_eq!(eval(&wb, "=COLUMN(C5:E9)"), n(3.0));
        assert_eq!(eval(&wb, "=ROW(1)"), err(ErrorKind::Value));
    }

    #[test]
    fn test_rows_columns_areas() {
        let wb = sample();
        assert_eq!(eval(&wb, "=ROWS(A1:C3)"), n(3.0));
        assert_eq!(eval(&wb, "=COLUMNS({1,2,3})"), n(3.0));
        assert_eq!(eval(&wb, "=ROWS(5)"), n(1.0));
        assert_eq!(eval(&wb, "=AREAS((A1,B2:C3))"), n(2.0));
        assert_eq!(eval(&wb, "=AREAS(A1:B2)"), n(1.0));
        assert_eq!(eval(&wb, "=AREAS(1)"), err(ErrorKind::Value));
    }

    #[test]
    fn test_address() {
        let wb = Workbook::new();
        assert_eq!(eval(&wb, "=ADDRESS(2,3)"), Value::text("$C$2"));
        assert_eq!(eval(&wb, "=ADDRESS(2,3,2)"), Value::text("C$2"));
        assert_eq!(eval(&wb, "=ADDRESS(2,3,4)"), Value::text("C2"));
        assert_eq!(eval(&wb, "=ADDRESS(2,3,1,FALSE)"), Value::text("R2C3"));
        assert_eq!(eval(&wb, "=ADDRESS(2,3,4,FALSE)"), Value::text("R[2]C[3]"));
        assert_eq!(
            eval(&wb, "=ADDRESS(2,3,1,TRUE,\"My Sheet\")"),
            Value::text("'My Sheet'!$C$2")
        );
        assert_eq!(eval(&wb, "=ADDRESS(0,1)"), err(ErrorKind::Value));
        assert_eq!(eval(&wb, "=ADDRESS(1,1,5)"), err(ErrorKind::Value));
    }
}
