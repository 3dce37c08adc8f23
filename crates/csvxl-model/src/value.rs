use serde::{Deserialize, Serialize};

use crate::ErrorValue;

/// Scalar value held by a cell.
///
/// The enum uses an explicit `{type, value}` tagged layout so it serializes
/// predictably.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    /// Empty / unset cell value.
    #[default]
    Empty,
    /// IEEE-754 double precision number. Dates are stored as serial numbers.
    Number(f64),
    String(String),
    Boolean(bool),
    Error(ErrorValue),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Text of the value as a record field.
    ///
    /// Returns `None` for [`CellValue::Empty`]. Numbers with no fractional part
    /// are rendered without a decimal point (`40`, not `40.0`); other numbers
    /// use the shortest representation that round-trips.
    pub fn to_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Number(n) => Some(format_number(*n)),
            CellValue::String(s) => Some(s.clone()),
            CellValue::Boolean(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
            CellValue::Error(e) => Some(e.as_str().to_string()),
        }
    }
}

/// Render a number the way Excel's General format shows whole values.
pub(crate) fn format_number(n: f64) -> String {
    if n == 0.0 {
        // Collapse `-0.0`.
        return "0".to_string();
    }
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    format!("{n}")
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<ErrorValue> for CellValue {
    fn from(value: ErrorValue) -> Self {
        CellValue::Error(value)
    }
}
