//! Logical functions

use super::Argument;
use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::value::{Array, Value};
use sheetcalc_core::ErrorKind;

/// Evaluate a lazy argument, or read it if it was already evaluated
fn force(arg: Option<&Argument>, ctx: &EvaluationContext) -> FormulaResult<Value> {
    match arg {
        Some(Argument::Lazy(expr)) => ctx.evaluate(expr),
        Some(other) => Ok(other.value().cloned().unwrap_or_default()),
        None => Ok(Value::Blank),
    }
}

/// IF(condition, value_if_true, [value_if_false])
///
/// Only the chosen branch is evaluated, so the other one may refer back to
/// the calling cell without forming a cycle.
pub fn fn_if(args: &[Argument], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let condition = args.first().and_then(Argument::boolean).unwrap_or(false);
    if condition {
        force(args.get(1), ctx)
    } else if args.len() > 2 {
        force(args.get(2), ctx)
    } else {
        Ok(Value::Boolean(false))
    }
}

/// Booleans taken from AND/OR arguments
///
/// Direct arguments are coerced; inside ranges and arrays, text and blanks
/// are skipped. No logical value at all is `#VALUE!`.
fn logical_values(args: &[Argument]) -> Result<Vec<bool>, ErrorKind> {
    let mut values = Vec::new();
    for arg in args {
        match arg {
            Argument::Value(v) => values.push(v.to_bool()?),
            Argument::Areas(areas) => {
                for v in areas.iter().flat_map(Array::iter) {
                    match v {
                        Value::Boolean(b) => values.push(*b),
                        Value::Number(n) => values.push(*n != 0.0),
                        Value::Error(e) => return Err(*e),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    if values.is_empty() {
        Err(ErrorKind::Value)
    } else {
        Ok(values)
    }
}

/// AND(logical1, ...)
pub fn fn_and(args: &[Argument]) -> Value {
    match logical_values(args) {
        Ok(values) => Value::Boolean(values.iter().all(|b| *b)),
        Err(e) => Value::Error(e),
    }
}

/// OR(logical1, ...)
pub fn fn_or(args: &[Argument]) -> Value {
    match logical_values(args) {
        Ok(values) => Value::Boolean(values.iter().any(|b| *b)),
        Err(e) => Value::Error(e),
    }
}

/// NOT(logical)
pub fn fn_not(args: &[Argument]) -> Value {
    match args.first().and_then(Argument::boolean) {
        Some(b) => Value::Boolean(!b),
        None => Value::Error(ErrorKind::Value),
    }
}

/// IFERROR(value, value_if_error)
pub fn fn_iferror(args: &[Argument], ctx: &EvaluationContext) -> FormulaResult<Value> {
    replace_errors(args, ctx, |_| true)
}

/// IFNA(value, value_if_na)
pub fn fn_ifna(args: &[Argument], ctx: &EvaluationContext) -> FormulaResult<Value> {
    replace_errors(args, ctx, |e| e == ErrorKind::Na)
}

/// Replace caught errors in the first argument with the second
///
/// The fallback is evaluated at most once, and only when something is caught.
/// Array elements are replaced one by one.
fn replace_errors(
    args: &[Argument],
    ctx: &EvaluationContext,
    catches: impl Fn(ErrorKind) -> bool,
) -> FormulaResult<Value> {
    let value = args
        .first()
        .and_then(Argument::value)
        .cloned()
        .unwrap_or_default();
    let caught = |v: &Value| matches!(v, Value::Error(e) if catches(*e));

    match value {
        v if caught(&v) => force(args.get(1), ctx),
        Value::Array(array) if array.iter().any(caught) => {
            let fallback = force(args.get(1), ctx)?.into_scalar();
            Ok(Value::Array(array.map(|v| {
                if caught(v) {
                    fallback.clone()
                } else {
                    v.clone()
                }
            })))
        }
        v => Ok(v),
    }
}
