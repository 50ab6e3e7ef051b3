//! Information functions
//!
//! The `IS*` predicates apply element by element to array arguments.

use super::Argument;
use crate::value::{self, Value};
use sheetcalc_core::ErrorKind;

fn predicate(args: &[Argument], test: impl Fn(&Value) -> bool) -> Value {
    let v = args.first().and_then(Argument::value).cloned().unwrap_or_default();
    value::map_scalar(&v, |v| Value::Boolean(test(v)))
}

/// ISBLANK(value)
pub fn fn_isblank(args: &[Argument]) -> Value {
    predicate(args, Value::is_blank)
}

/// ISERROR(value)
pub fn fn_iserror(args: &[Argument]) -> Value {
    predicate(args, Value::is_error)
}

/// ISERR(value): any error except `#N/A`
pub fn fn_iserr(args: &[Argument]) -> Value {
    predicate(args, |v| v.is_error() && v.error() != Some(ErrorKind::Na))
}

/// ISNA(value)
pub fn fn_isna(args: &[Argument]) -> Value {
    predicate(args, |v| v.error() == Some(ErrorKind::Na))
}

/// ISNUMBER(value)
pub fn fn_isnumber(args: &[Argument]) -> Value {
    predicate(args, |v| matches!(v, Value::Number(_)))
}

/// ISTEXT(value)
pub fn fn_istext(args: &[Argument]) -> Value {
    predicate(args, |v| matches!(v, Value::Text(_)))
}

/// ISLOGICAL(value)
pub fn fn_islogical(args: &[Argument]) -> Value {
    predicate(args, |v| matches!(v, Value::Boolean(_)))
}

/// ISREF(value)
pub fn fn_isref(args: &[Argument]) -> Value {
    Value::Boolean(matches!(args.first(), Some(Argument::Reference(_))))
}

/// NA()
pub fn fn_na(_args: &[Argument]) -> Value {
    Value::Error(ErrorKind::Na)
}
