use std::io::{Read, Seek};
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Xlsx};
use csvxl_model::{CellRef, CellValue, ErrorValue, Workbook, EXCEL_MAX_COLS, EXCEL_MAX_ROWS};

use crate::Error;

/// Load a workbook from disk. The format is detected from the file extension.
pub fn read_workbook(path: impl AsRef<Path>) -> Result<Workbook, Error> {
    let path = path.as_ref();
    let wrap = |source| Error::Open {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = open_workbook_auto(path).map_err(wrap)?;
    let workbook = load(&mut reader, wrap)?;
    log::debug!(
        "loaded {} sheet(s) from `{}`",
        workbook.sheets.len(),
        path.display()
    );
    Ok(workbook)
}

/// Load an `.xlsx` workbook from any seekable reader.
pub fn read_workbook_from_reader<R: Read + Seek>(reader: R) -> Result<Workbook, Error> {
    let mut reader = Xlsx::new(reader)?;
    load(&mut reader, Error::Read)
}

fn load<RS, R>(reader: &mut R, wrap: impl Fn(R::Error) -> Error) -> Result<Workbook, Error>
where
    RS: Read + Seek,
    R: Reader<RS>,
{
    let mut out = Workbook::new();

    for sheet_name in reader.sheet_names() {
        let sheet_id = out.add_sheet(sheet_name.clone())?;
        let Some(sheet) = out.sheet_mut(sheet_id) else {
            continue;
        };

        let range = reader.worksheet_range(&sheet_name).map_err(&wrap)?;
        let start = range.start().unwrap_or((0, 0));
        for (row, col, value) in range.used_cells() {
            let Some(cell) = to_cell_ref(start, row, col) else {
                log::warn!("skipping out-of-bounds cell in sheet `{sheet_name}` at ({row},{col})");
                continue;
            };
            if let Some(value) = convert_value(value) {
                sheet.set_value(cell, value);
            }
        }

        match reader.worksheet_formula(&sheet_name) {
            Ok(formulas) => {
                let start = formulas.start().unwrap_or((0, 0));
                for (row, col, formula) in formulas.used_cells() {
                    let Some(cell) = to_cell_ref(start, row, col) else {
                        continue;
                    };
                    let text = formula.trim().trim_start_matches('=');
                    if text.is_empty() {
                        continue;
                    }
                    // Error values are saved as error-literal formulas.
                    if let Ok(err) = text.parse::<ErrorValue>() {
                        sheet.set_value(cell, CellValue::Error(err));
                        continue;
                    }
                    sheet.set_formula(cell, Some(text.to_string()));
                }
            }
            Err(err) => {
                log::warn!("failed to read formulas for sheet `{sheet_name}`: {err:?}");
            }
        }
    }

    Ok(out)
}

fn to_cell_ref(start: (u32, u32), row: usize, col: usize) -> Option<CellRef> {
    // calamine reports coordinates relative to `range.start()`.
    let row = start.0.checked_add(u32::try_from(row).ok()?)?;
    let col = start.1.checked_add(u32::try_from(col).ok()?)?;
    if row >= EXCEL_MAX_ROWS || col >= EXCEL_MAX_COLS {
        return None;
    }
    Some(CellRef::new(row, col))
}

fn convert_value(value: &Data) -> Option<CellValue> {
    match value {
        Data::Empty => None,
        Data::Bool(v) => Some(CellValue::Boolean(*v)),
        Data::Int(v) => Some(CellValue::Number(*v as f64)),
        Data::Float(v) => Some(CellValue::Number(*v)),
        Data::String(v) => Some(CellValue::String(v.clone())),
        Data::Error(e) => Some(CellValue::Error(convert_error(e))),
        Data::DateTime(v) => Some(CellValue::Number(v.as_f64())),
        Data::DateTimeIso(v) | Data::DurationIso(v) => Some(CellValue::String(v.clone())),
    }
}

fn convert_error(err: &calamine::CellErrorType) -> ErrorValue {
    use calamine::CellErrorType;

    match err {
        CellErrorType::Div0 => ErrorValue::Div0,
        CellErrorType::NA => ErrorValue::NA,
        CellErrorType::Name => ErrorValue::Name,
        CellErrorType::Null => ErrorValue::Null,
        CellErrorType::Num => ErrorValue::Num,
        CellErrorType::Ref => ErrorValue::Ref,
        CellErrorType::Value => ErrorValue::Value,
        CellErrorType::GettingData => ErrorValue::GettingData,
    }
}
