use csvxl_model::AddSheetError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Package(#[from] csvxl_xlsx::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("worksheet `{0}` not found")]
    SheetNotFound(String),
    #[error("workbook has no worksheets")]
    NoWorksheets,
    #[error("invalid worksheet: {0}")]
    InvalidSheet(#[from] AddSheetError),
    #[error("cell at row {row}, column {column} is outside the worksheet")]
    OutOfBounds { row: u64, column: u64 },
    #[error("failed to deserialize record {row}: {message}")]
    Deserialize { row: usize, message: String },
    #[error("field `{field}` cannot be written: {reason}")]
    UnsupportedValue { field: String, reason: &'static str },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("failed to serialize record: {0}")]
    Json(#[from] serde_json::Error),
}
