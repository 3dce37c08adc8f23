//! Spreadsheet packages for csvxl.
//!
//! Workbooks are loaded with `calamine` (any format it auto-detects) and saved as
//! `.xlsx` with `rust_xlsxwriter`. [`Package`] ties a [`Workbook`] to the file it
//! was opened from so adapters can save it back in place.
//!
//! [`Workbook`]: csvxl_model::Workbook

use std::path::PathBuf;

mod package;
mod read;
mod write;

pub use package::Package;
pub use read::{read_workbook, read_workbook_from_reader};
pub use write::{write_workbook, write_workbook_to_writer};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open workbook `{path}`: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },
    #[error("failed to read `.xlsx` workbook: {0}")]
    Read(#[from] calamine::XlsxError),
    #[error("invalid worksheet: {0}")]
    Sheet(#[from] csvxl_model::AddSheetError),
    #[error("failed to encode `.xlsx` workbook: {0}")]
    Encode(#[from] rust_xlsxwriter::XlsxError),
    #[error("failed to save workbook `{path}`: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("package is not bound to a file; use `save_as` or `save_to_writer`")]
    Unbound,
}
