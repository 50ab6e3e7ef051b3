//! Math and aggregate functions
//!
//! Values typed directly as arguments are coerced (`SUM("2", TRUE)` is 3),
//! while text, booleans and blanks inside ranges and arrays are ignored.

use super::Argument;
use crate::value::{self, Array, Value};
use sheetcalc_core::ErrorKind;

/// Numbers taken from aggregate arguments; the first error wins
fn numbers(args: &[Argument]) -> Result<Vec<f64>, ErrorKind> {
    let mut result = Vec::new();
    for arg in args {
        match arg {
            Argument::Value(v) => result.push(v.to_number()?),
            Argument::Areas(areas) => {
                for v in areas.iter().flat_map(Array::iter) {
                    match v {
                        Value::Number(n) => result.push(*n),
                        Value::Error(e) => return Err(*e),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    Ok(result)
}

fn aggregate(args: &[Argument], f: impl FnOnce(Vec<f64>) -> Value) -> Value {
    match numbers(args) {
        Ok(values) => f(values),
        Err(e) => Value::Error(e),
    }
}

/// SUM(number1, ...)
pub fn fn_sum(args: &[Argument]) -> Value {
    aggregate(args, |values| value::number_result(values.iter().sum()))
}

/// AVERAGE(number1, ...)
pub fn fn_average(args: &[Argument]) -> Value {
    aggregate(args, |values| {
        if values.is_empty() {
            Value::Error(ErrorKind::Div0)
        } else {
            value::number_result(values.iter().sum::<f64>() / values.len() as f64)
        }
    })
}

/// MIN(number1, ...); 0 when there are no numbers
pub fn fn_min(args: &[Argument]) -> Value {
    aggregate(args, |values| {
        Value::Number(values.into_iter().reduce(f64::min).unwrap_or(0.0))
    })
}

/// MAX(number1, ...); 0 when there are no numbers
pub fn fn_max(args: &[Argument]) -> Value {
    aggregate(args, |values| {
        Value::Number(values.into_iter().reduce(f64::max).unwrap_or(0.0))
    })
}

/// COUNT(value1, ...)
///
/// Counts numbers. Direct arguments also count when they convert to one;
/// errors are never counted and never propagate.
pub fn fn_count(args: &[Argument]) -> Value {
    let mut count = 0usize;
    for arg in args {
        match arg {
            Argument::Value(v) if !v.is_error() && v.to_number().is_ok() => count += 1,
            Argument::Areas(areas) => {
                count += areas
                    .iter()
                    .flat_map(Array::iter)
                    .filter(|v| matches!(v, Value::Number(_)))
                    .count();
            }
            _ => {}
        }
    }
    Value::Number(count as f64)
}

/// COUNTA(value1, ...): every non-blank value, errors included
pub fn fn_counta(args: &[Argument]) -> Value {
    let mut count = 0usize;
    for arg in args {
        match arg {
            Argument::Value(v) if !v.is_blank() => count += 1,
            Argument::Areas(areas) => {
                count += areas
                    .iter()
                    .flat_map(Array::iter)
                    .filter(|v| !v.is_blank())
                    .count();
            }
            _ => {}
        }
    }
    Value::Number(count as f64)
}

#[cfg(test)]
mod tests {
    use crate::evaluator::Evaluator;
    use crate::value::Value;
    use sheetcalc_core::{CellAddress, ErrorKind, Workbook};

    /// A1:A5 = 1, 2, "three", TRUE, (blank); B1 = #N/A
    fn sample() -> Workbook {
        let mut wb = Workbook::new();
        wb.set_cell_value("A1", 1).unwrap();
        wb.set_cell_value("A2", 2).unwrap();
        wb.set_cell_value("A3", "three").unwrap();
        wb.set_cell_value("A4", true).unwrap();
        wb.set_cell_value("B1", ErrorKind::Na).unwrap();
        wb
    }

    fn eval(wb: &Workbook, formula: &str) -> Value {
        Evaluator::new(wb)
            .evaluate_formula(formula, &CellAddress::new("Sheet1", 10, 10))
            .unwrap()
    }

    fn n(x: f64) -> Value {
        Value::Number(x)
    }

    #[test]
    fn test_sum() {
        let wb = sample();
        assert_eq!(eval(&wb, "=SUM(A1:A5)"), n(3.0));
        assert_eq!(eval(&wb, "=SUM(A:A)"), n(3.0));
        assert_eq!(eval(&wb, "=SUM(1,\"2\",TRUE)"), n(4.0));
        assert_eq!(eval(&wb, "=SUM({1,2;3,4},10)"), n(20.0));
        assert_eq!(eval(&wb, "=SUM((A1,A2),A2)"), n(5.0));
        assert_eq!(eval(&wb, "=SUM(\"abc\")"), Value::Error(ErrorKind::Value));
        assert_eq!(eval(&wb, "=SUM(A1:B1)"), Value::Error(ErrorKind::Na));
    }

    #[test]
    fn test_average() {
        let wb = sample();
        assert_eq!(eval(&wb, "=AVERAGE(A1:A5)"), n(1.5));
        assert_eq!(eval(&wb, "=AVERAGE(A3:A5)"), Value::Error(ErrorKind::Div0));
        assert_eq!(eval(&wb, "=AVERAGE(2,4,TRUE)"), n(7.0 / 3.0));
    }

    #[test]
    fn test_min_max() {
        let wb = sample();
        assert_eq!(eval(&wb, "=MIN(A1:A5,5)"), n(1.0));
        assert_eq!(eval(&wb, "=MAX(A1:A5,-5)"), n(2.0));
        assert_eq!(eval(&wb, "=MAX(A3:A5)"), n(0.0));
        assert_eq!(eval(&wb, "=MIN(A1,B1)"), Value::Error(ErrorKind::Na));
    }

    #[test]
    fn test_count() {
        let wb = sample();
        assert_eq!(eval(&wb, "=COUNT(A1:B5)"), n(2.0));
        assert_eq!(eval(&wb, "=COUNT(1,\"2\",\"x\",TRUE,NA())"), n(3.0));
    }

    #[test]
    fn test_counta() {
        let wb = sample();
        assert_eq!(eval(&wb, "=COUNTA(A1:B5)"), n(5.0));
        assert_eq!(eval(&wb, "=COUNTA(\"\",NA())"), n(2.0));
    }
}
