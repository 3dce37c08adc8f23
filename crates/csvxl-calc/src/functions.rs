//! Built-in worksheet functions.

use csvxl_model::{CellValue, ErrorValue, WorksheetId};

use crate::ast::Expr;
use crate::evaluator::{number_result, to_bool, to_number, to_text, Evaluator, Value};

/// Names of every supported function.
pub const FUNCTION_NAMES: &[&str] = &[
    "ABS", "AND", "AVERAGE", "CONCAT", "CONCATENATE", "COUNT", "COUNTA", "IF", "IFERROR", "INT",
    "ISBLANK", "LEFT", "LEN", "LOWER", "MAX", "MID", "MIN", "MOD", "NOT", "OR", "RIGHT", "ROUND",
    "SUM", "TRIM", "UPPER",
];

pub(crate) fn call(ev: &mut Evaluator<'_>, sheet: WorksheetId, name: &str, args: &[Expr]) -> Value {
    let result = match name {
        // Lazily evaluated: only the selected branch runs.
        "IF" => return if_fn(ev, sheet, args),
        "IFERROR" => {
            if !(1..=2).contains(&args.len()) {
                return arity_error();
            }
            match ev.eval(sheet, &args[0]) {
                Value::Scalar(CellValue::Error(_)) => match args.get(1) {
                    Some(fallback) => return ev.eval(sheet, fallback),
                    None => CellValue::Empty,
                },
                other => return other,
            }
        }
        _ => {
            let values: Vec<Value> = args.iter().map(|a| ev.eval(sheet, a)).collect();
            eager(name, values)
        }
    };
    Value::Scalar(result)
}

fn arity_error() -> Value {
    Value::Scalar(CellValue::Error(ErrorValue::Value))
}

fn if_fn(ev: &mut Evaluator<'_>, sheet: WorksheetId, args: &[Expr]) -> Value {
    if !(1..=3).contains(&args.len()) {
        return arity_error();
    }
    let cond = ev.eval(sheet, &args[0]).into_scalar();
    match to_bool(&cond) {
        Ok(true) => match args.get(1) {
            Some(Expr::Missing) => Value::Scalar(CellValue::Number(0.0)),
            Some(expr) => ev.eval(sheet, expr),
            None => Value::Scalar(CellValue::Boolean(true)),
        },
        Ok(false) => match args.get(2) {
            Some(Expr::Missing) => Value::Scalar(CellValue::Number(0.0)),
            Some(expr) => ev.eval(sheet, expr),
            None => Value::Scalar(CellValue::Boolean(false)),
        },
        Err(e) => Value::Scalar(CellValue::Error(e)),
    }
}

fn eager(name: &str, args: Vec<Value>) -> CellValue {
    let result = match name {
        "SUM" => numbers(&args).map(|ns| CellValue::Number(ns.iter().sum())),
        "AVERAGE" => numbers(&args).and_then(|ns| {
            if ns.is_empty() {
                Err(ErrorValue::Div0)
            } else {
                Ok(CellValue::Number(ns.iter().sum::<f64>() / ns.len() as f64))
            }
        }),
        "MIN" => numbers(&args).map(|ns| {
            CellValue::Number(ns.into_iter().reduce(f64::min).unwrap_or(0.0))
        }),
        "MAX" => numbers(&args).map(|ns| {
            CellValue::Number(ns.into_iter().reduce(f64::max).unwrap_or(0.0))
        }),
        "COUNT" => Ok(CellValue::Number(count(&args, |v| {
            matches!(v, CellValue::Number(_))
        }))),
        "COUNTA" => Ok(CellValue::Number(count(&args, |v| !v.is_empty()))),
        "CONCAT" | "CONCATENATE" => concat(&args),
        "AND" => logical(&args, true),
        "OR" => logical(&args, false),
        _ => return scalar_fn(name, args),
    };
    result.unwrap_or_else(CellValue::Error)
}

/// Functions that only take scalar arguments.
fn scalar_fn(name: &str, args: Vec<Value>) -> CellValue {
    let args: Vec<CellValue> = args.into_iter().map(Value::into_scalar).collect();
    let arity = |min: usize, max: usize| (min..=max).contains(&args.len());

    let result = match name {
        "LEN" if arity(1, 1) => text(&args[0]).map(|s| CellValue::Number(s.chars().count() as f64)),
        "UPPER" if arity(1, 1) => text(&args[0]).map(|s| CellValue::String(s.to_uppercase())),
        "LOWER" if arity(1, 1) => text(&args[0]).map(|s| CellValue::String(s.to_lowercase())),
        "TRIM" if arity(1, 1) => text(&args[0]).map(|s| {
            CellValue::String(s.split(' ').filter(|p| !p.is_empty()).collect::<Vec<_>>().join(" "))
        }),
        "LEFT" if arity(1, 2) => text(&args[0]).and_then(|s| {
            let n = count_arg(args.get(1))?;
            Ok(CellValue::String(s.chars().take(n).collect()))
        }),
        "RIGHT" if arity(1, 2) => text(&args[0]).and_then(|s| {
            let n = count_arg(args.get(1))?;
            let len = s.chars().count();
            Ok(CellValue::String(s.chars().skip(len.saturating_sub(n)).collect()))
        }),
        "MID" if arity(3, 3) => text(&args[0]).and_then(|s| {
            let start = to_number(&args[1])?.trunc();
            let len = to_number(&args[2])?.trunc();
            if start < 1.0 || len < 0.0 {
                return Err(ErrorValue::Value);
            }
            Ok(CellValue::String(
                s.chars().skip(start as usize - 1).take(len as usize).collect(),
            ))
        }),
        "NOT" if arity(1, 1) => to_bool(&args[0]).map(|b| CellValue::Boolean(!b)),
        "ABS" if arity(1, 1) => to_number(&args[0]).map(|n| CellValue::Number(n.abs())),
        "INT" if arity(1, 1) => to_number(&args[0]).map(|n| CellValue::Number(n.floor())),
        "ROUND" if arity(2, 2) => to_number(&args[0]).and_then(|n| {
            let digits = to_number(&args[1])?.trunc();
            let factor = 10f64.powf(digits);
            // Excel rounds half away from zero, which `f64::round` also does.
            Ok(number_result((n * factor).round() / factor))
        }),
        "MOD" if arity(2, 2) => to_number(&args[0]).and_then(|n| {
            let d = to_number(&args[1])?;
            if d == 0.0 {
                return Err(ErrorValue::Div0);
            }
            // Result takes the sign of the divisor.
            Ok(number_result(n - d * (n / d).floor()))
        }),
        "ISBLANK" if arity(1, 1) => Ok(CellValue::Boolean(args[0].is_empty())),
        _ if FUNCTION_NAMES.contains(&name) => Err(ErrorValue::Value),
        _ => {
            log::debug!("unsupported function `{name}`");
            Err(ErrorValue::Name)
        }
    };
    result.unwrap_or_else(CellValue::Error)
}

fn text(v: &CellValue) -> Result<String, ErrorValue> {
    match v {
        CellValue::Error(e) => Err(*e),
        other => Ok(to_text(other)),
    }
}

/// Optional character count argument (defaults to 1, must be >= 0).
fn count_arg(v: Option<&CellValue>) -> Result<usize, ErrorValue> {
    let Some(v) = v else { return Ok(1) };
    let n = to_number(v)?.trunc();
    if n < 0.0 {
        return Err(ErrorValue::Value);
    }
    Ok(n as usize)
}

/// Collect numeric arguments the way SUM/MIN/MAX do.
///
/// Scalars are coerced (text that is not a number is `#VALUE!`), while text and
/// booleans inside ranges are ignored. Errors anywhere propagate.
fn numbers(args: &[Value]) -> Result<Vec<f64>, ErrorValue> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Value::Scalar(CellValue::Empty) => {}
            Value::Scalar(v) => out.push(to_number(v)?),
            Value::Range(values) => {
                for v in values {
                    match v {
                        CellValue::Number(n) => out.push(*n),
                        CellValue::Error(e) => return Err(*e),
                        _ => {}
                    }
                }
            }
        }
    }
    Ok(out)
}

fn count(args: &[Value], pred: impl Fn(&CellValue) -> bool) -> f64 {
    args.iter()
        .map(|arg| match arg {
            Value::Scalar(v) => usize::from(pred(v)),
            Value::Range(values) => values.iter().filter(|v| pred(v)).count(),
        })
        .sum::<usize>() as f64
}

fn concat(args: &[Value]) -> Result<CellValue, ErrorValue> {
    let mut out = String::new();
    for arg in args {
        let values: &[CellValue] = match arg {
            Value::Scalar(v) => std::slice::from_ref(v),
            Value::Range(values) => values,
        };
        for v in values {
            out.push_str(&text(v)?);
        }
    }
    Ok(CellValue::String(out))
}

/// AND (`all = true`) / OR (`all = false`) over every argument value.
fn logical(args: &[Value], all: bool) -> Result<CellValue, ErrorValue> {
    let mut seen = false;
    let mut acc = all;
    for arg in args {
        let values: &[CellValue] = match arg {
            Value::Scalar(v) => std::slice::from_ref(v),
            Value::Range(values) => values,
        };
        for v in values {
            let b = match (arg, v) {
                (_, CellValue::Empty) => continue,
                // Text in ranges is ignored.
                (Value::Range(_), CellValue::String(_)) => continue,
                _ => to_bool(v)?,
            };
            seen = true;
            acc = if all { acc && b } else { acc || b };
        }
    }
    if !seen {
        return Err(ErrorValue::Value);
    }
    Ok(CellValue::Boolean(acc))
}
