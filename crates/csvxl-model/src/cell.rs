use serde::{Deserialize, Serialize};

use crate::{CellRef, CellValue};

/// Excel-compatible maximum rows per worksheet (1,048,576).
pub const EXCEL_MAX_ROWS: u32 = 1_048_576;

/// Excel-compatible maximum columns per worksheet (16,384).
pub const EXCEL_MAX_COLS: u32 = 16_384;

const COL_BITS: u32 = 14; // 2^14 = 16,384 columns.
const COL_MASK: u64 = (1u64 << COL_BITS) - 1;

/// Compact key used for sparse cell storage.
///
/// The key is a packed `(row, col)` pair:
///
/// ```text
/// key = (row << 14) | col
/// ```
///
/// Ordering keys numerically walks a worksheet in row-major order, which is
/// what record readers rely on when they scan one row at a time.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct CellKey(u64);

impl CellKey {
    #[inline]
    pub fn new(row: u32, col: u32) -> Self {
        assert!(row < EXCEL_MAX_ROWS, "row out of Excel bounds: {row}");
        assert!(col < EXCEL_MAX_COLS, "col out of Excel bounds: {col}");
        Self(((row as u64) << COL_BITS) | (col as u64))
    }

    /// Decode the row component (0-indexed).
    #[inline]
    pub const fn row(self) -> u32 {
        (self.0 >> COL_BITS) as u32
    }

    /// Decode the column component (0-indexed).
    #[inline]
    pub const fn col(self) -> u32 {
        (self.0 & COL_MASK) as u32
    }

    #[inline]
    pub const fn to_ref(self) -> CellRef {
        CellRef::new(self.row(), self.col())
    }
}

impl From<CellRef> for CellKey {
    fn from(value: CellRef) -> Self {
        Self::new(value.row, value.col)
    }
}

/// A single stored cell.
///
/// Cells are stored sparsely: a cell without a value and without a formula is
/// removed from the worksheet map.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// The computed (or literal) value.
    #[serde(default)]
    pub value: CellValue,

    /// Formula text without the leading `=`, if the cell contains a formula.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

impl Cell {
    pub fn new(value: CellValue) -> Self {
        Self {
            value,
            formula: None,
        }
    }

    /// A formula cell whose value has not been calculated yet.
    pub fn with_formula(formula: impl Into<String>) -> Self {
        Self {
            value: CellValue::Empty,
            formula: Some(normalize_formula(&formula.into())),
        }
        .normalized()
    }

    /// Returns true if the cell has no observable content.
    pub fn is_truly_empty(&self) -> bool {
        self.value.is_empty() && self.formula.is_none()
    }

    fn normalized(mut self) -> Self {
        if self.formula.as_deref() == Some("") {
            self.formula = None;
        }
        self
    }
}

/// Strip surrounding whitespace and a single leading `=`.
pub(crate) fn normalize_formula(formula: &str) -> String {
    let trimmed = formula.trim();
    trimmed.strip_prefix('=').unwrap_or(trimmed).trim().to_string()
}
