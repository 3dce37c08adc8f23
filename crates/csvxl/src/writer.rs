use std::io::{self, Write};
use std::path::Path;

use csvxl_model::{CellRef, CellValue, Range, WorksheetId, EXCEL_MAX_COLS, EXCEL_MAX_ROWS};
use csvxl_xlsx::Package;

use crate::sanitize::prepare_cell_text;
use crate::{Configuration, Error, RecordWriter, Result, Writer};

enum Target<'a> {
    Owned(Package),
    Borrowed(&'a mut Package),
}

impl Target<'_> {
    fn package(&self) -> &Package {
        match self {
            Target::Owned(package) => package,
            Target::Borrowed(package) => package,
        }
    }

    fn package_mut(&mut self) -> &mut Package {
        match self {
            Target::Owned(package) => package,
            Target::Borrowed(package) => package,
        }
    }
}

/// Writes records into worksheet cells, one record per row.
///
/// Every field is stored as text. The package is saved when the writer is closed
/// (or dropped): into the stream for [`ExcelWriter::from_writer`], otherwise to the
/// package's bound path.
pub struct ExcelWriter<'a, W: Write = io::Sink> {
    target: Target<'a>,
    stream: Option<W>,
    sheet_id: WorksheetId,
    origin: CellRef,
    row: u32,
    index: u32,
    row_offset: u32,
    column_offset: u32,
    config: Configuration,
    finished: bool,
}

impl<W: Write> ExcelWriter<'static, W> {
    /// Write into a new workbook that is encoded into `stream` on close.
    pub fn from_writer(stream: W, sheet: Option<&str>, config: Configuration) -> Result<Self> {
        let mut writer = Self::open(Target::Owned(Package::new()), sheet, config)?;
        writer.stream = Some(stream);
        Ok(writer)
    }
}

impl ExcelWriter<'static> {
    /// Write into the workbook at `path`, creating it on close when missing.
    pub fn from_path(path: impl AsRef<Path>, sheet: Option<&str>, config: Configuration) -> Result<Self> {
        let package = Package::open(path)?;
        Self::open(Target::Owned(package), sheet, config)
    }

    /// Take ownership of `package`; it is saved to its bound path on close.
    ///
    /// Closing fails with [`csvxl_xlsx::Error::Unbound`] when the package has no
    /// path. Use [`ExcelWriter::into_package`] to keep an in-memory package.
    pub fn from_owned_package(package: Package, sheet: Option<&str>, config: Configuration) -> Result<Self> {
        Self::open(Target::Owned(package), sheet, config)
    }
}

impl<'a> ExcelWriter<'a> {
    /// Write into a caller-owned package. It is saved on close when bound to a path.
    pub fn from_package(package: &'a mut Package, sheet: Option<&str>, config: Configuration) -> Result<Self> {
        Self::open(Target::Borrowed(package), sheet, config)
    }

    pub fn from_worksheet(package: &'a mut Package, sheet_id: WorksheetId, config: Configuration) -> Result<Self> {
        let range = package
            .workbook()
            .sheet(sheet_id)
            .map_or_else(Range::full_sheet, |sheet| sheet.full_range());
        Self::from_range(package, sheet_id, range, config)
    }

    /// Write starting at the top-left cell of `range`.
    pub fn from_range(
        package: &'a mut Package,
        sheet_id: WorksheetId,
        range: Range,
        config: Configuration,
    ) -> Result<Self> {
        config.validate()?;
        if package.workbook().sheet(sheet_id).is_none() {
            return Err(Error::SheetNotFound(format!("#{sheet_id}")));
        }
        Ok(Self::new(Target::Borrowed(package), sheet_id, range.start, config))
    }
}

impl<'a, W: Write> ExcelWriter<'a, W> {
    fn open(mut target: Target<'a>, sheet: Option<&str>, config: Configuration) -> Result<Self> {
        config.validate()?;
        let name = sheet.unwrap_or(&config.default_sheet_name);
        let sheet_id = target.package_mut().workbook_mut().get_or_add_sheet(name)?;
        Ok(Self::new(target, sheet_id, CellRef::new(0, 0), config))
    }

    fn new(target: Target<'a>, sheet_id: WorksheetId, origin: CellRef, config: Configuration) -> Self {
        Self {
            target,
            stream: None,
            sheet_id,
            origin,
            row: 1,
            index: 1,
            row_offset: 0,
            column_offset: 0,
            config,
            finished: false,
        }
    }

    pub fn package(&self) -> &Package {
        self.target.package()
    }

    pub fn sheet_id(&self) -> WorksheetId {
        self.sheet_id
    }

    /// 1-based record (row) currently being written.
    pub fn row(&self) -> u32 {
        self.row
    }

    /// 1-based position of the next field within the current record.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn row_offset(&self) -> u32 {
        self.row_offset
    }

    pub fn set_row_offset(&mut self, offset: u32) {
        self.row_offset = offset;
    }

    pub fn column_offset(&self) -> u32 {
        self.column_offset
    }

    pub fn set_column_offset(&mut self, offset: u32) {
        self.column_offset = offset;
    }

    /// Wrap the writer in a [`RecordWriter`] honoring `has_header_record`.
    pub fn records(self) -> RecordWriter<Self> {
        let has_headers = self.config.has_header_record;
        RecordWriter::new(self).has_headers(has_headers)
    }

    /// Save the package and release the writer.
    pub fn close(mut self) -> Result<()> {
        self.finish()
    }

    /// Release the writer without saving, handing back an owned package.
    ///
    /// Returns `None` for writers over a borrowed package; the caller already has it.
    pub fn into_package(mut self) -> Option<Package> {
        self.finished = true;
        match std::mem::replace(&mut self.target, Target::Owned(Package::new())) {
            Target::Owned(package) => Some(package),
            Target::Borrowed(_) => None,
        }
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        if let Some(mut stream) = self.stream.take() {
            self.target.package().save_to_writer(&mut stream)?;
            stream.flush()?;
            return Ok(());
        }
        match (&self.target, self.target.package().path()) {
            (target, Some(_)) => target.package().save()?,
            // Dropping an owned in-memory package would lose every write.
            (Target::Owned(_), None) => return Err(csvxl_xlsx::Error::Unbound.into()),
            (Target::Borrowed(_), None) => {
                log::debug!("package is not bound to a file; leaving it to the caller")
            }
        }
        Ok(())
    }

    fn current_cell(&self) -> Result<CellRef> {
        let row = u64::from(self.origin.row) + u64::from(self.row_offset) + u64::from(self.row) - 1;
        let column =
            u64::from(self.origin.col) + u64::from(self.column_offset) + u64::from(self.index) - 1;
        if row >= u64::from(EXCEL_MAX_ROWS) || column >= u64::from(EXCEL_MAX_COLS) {
            return Err(Error::OutOfBounds { row, column });
        }
        Ok(CellRef::new(row as u32, column as u32))
    }
}

impl<W: Write> Writer for ExcelWriter<'_, W> {
    fn write_field(&mut self, field: Option<&str>) -> Result<()> {
        if let Some(field) = field {
            let cell = self.current_cell()?;
            let text = prepare_cell_text(field, &self.config).into_owned();
            let sheet_id = self.sheet_id;
            let sheet = self
                .target
                .package_mut()
                .workbook_mut()
                .sheet_mut(sheet_id)
                .ok_or_else(|| Error::SheetNotFound(format!("#{sheet_id}")))?;
            sheet.set_value(cell, CellValue::String(text));
        }
        self.index += 1;
        Ok(())
    }

    fn next_record(&mut self) -> Result<()> {
        self.flush()?;
        self.index = 1;
        self.row += 1;
        Ok(())
    }

    /// Cells are written in memory; nothing to flush until the package is saved.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<W: Write> Drop for ExcelWriter<'_, W> {
    fn drop(&mut self) {
        if let Err(err) = self.finish() {
            log::error!("failed to save workbook while dropping writer: {err}");
        }
    }
}
