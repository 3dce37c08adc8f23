//! `csvxl-model` defines the in-memory spreadsheet data structures shared by the
//! csvxl crates.
//!
//! The crate is deliberately small:
//! - the formula evaluator (`csvxl-calc`) reads it
//! - the `.xlsx` package layer (`csvxl-xlsx`) loads and saves it
//! - the record adapters (`csvxl`) walk it row by row

mod address;
mod cell;
mod error;
mod sheet_name;
mod value;
mod workbook;
mod worksheet;

pub use address::{A1ParseError, CellRef, Range, RangeParseError};
pub use cell::{Cell, CellKey, EXCEL_MAX_COLS, EXCEL_MAX_ROWS};
pub use error::ErrorValue;
pub use sheet_name::{
    sheet_name_eq_case_insensitive, validate_sheet_name, SheetNameError, EXCEL_MAX_SHEET_NAME_LEN,
};
pub use value::CellValue;
pub use workbook::{AddSheetError, Workbook};
pub use worksheet::{Worksheet, WorksheetId};
