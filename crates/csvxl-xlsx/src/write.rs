use std::fs;
use std::io::Write;
use std::path::Path;

use csvxl_model::{Cell, CellValue, Workbook};
use rust_xlsxwriter::{Formula, Worksheet, XlsxError};
use tempfile::NamedTempFile;

use crate::Error;

/// Encode `workbook` as `.xlsx` and write it to `writer`.
pub fn write_workbook_to_writer<W: Write>(workbook: &Workbook, mut writer: W) -> Result<(), Error> {
    let bytes = encode(workbook)?;
    writer.write_all(&bytes)?;
    Ok(())
}

/// Save `workbook` to `path` as `.xlsx`.
///
/// The bytes are written to a temp file in the destination directory and renamed
/// into place, so a failed save leaves any existing file untouched.
pub fn write_workbook(workbook: &Workbook, path: impl AsRef<Path>) -> Result<(), Error> {
    let path = path.as_ref();
    let bytes = encode(workbook)?;
    let save_err = |source| Error::Save {
        path: path.to_path_buf(),
        source,
    };

    // `Path::parent` is `Some("")` for bare file names.
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(save_err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(save_err)?;
    tmp.write_all(&bytes).map_err(save_err)?;
    tmp.as_file().sync_all().map_err(save_err)?;
    tmp.persist(path).map_err(|err| save_err(err.error))?;

    log::debug!("saved {} byte(s) to `{}`", bytes.len(), path.display());
    Ok(())
}

fn encode(workbook: &Workbook) -> Result<Vec<u8>, Error> {
    let mut out = rust_xlsxwriter::Workbook::new();
    for sheet in &workbook.sheets {
        let worksheet = out.add_worksheet();
        worksheet.set_name(&sheet.name)?;
        for (cell, stored) in sheet.iter_cells() {
            // Columns are bounded by `EXCEL_MAX_COLS`, which fits in `u16`.
            let Ok(col) = u16::try_from(cell.col) else {
                continue;
            };
            write_cell(worksheet, cell.row, col, stored)?;
        }
    }
    Ok(out.save_to_buffer()?)
}

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, cell: &Cell) -> Result<(), XlsxError> {
    if let Some(formula) = &cell.formula {
        let mut formula = Formula::new(format!("={formula}"));
        if let Some(result) = cell.value.to_text() {
            formula = formula.set_result(result);
        }
        worksheet.write_formula(row, col, formula)?;
        return Ok(());
    }

    match &cell.value {
        CellValue::Empty => {}
        CellValue::Number(n) => {
            worksheet.write_number(row, col, *n)?;
        }
        CellValue::String(s) => {
            worksheet.write_string(row, col, s)?;
        }
        CellValue::Boolean(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        // Error literals are valid formulas; the cached result keeps the value readable.
        CellValue::Error(e) => {
            worksheet.write_formula(row, col, Formula::new(e.as_str()).set_result(e.as_str()))?;
        }
    }
    Ok(())
}
