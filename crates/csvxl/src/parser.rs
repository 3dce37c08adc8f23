use std::io::{Read, Seek};
use std::path::Path;

use csvxl_calc::{EvaluationCache, Evaluator};
use csvxl_model::{Range, Workbook, Worksheet, WorksheetId};
use csvxl_xlsx::Package;

use crate::{Configuration, Error, Parser, Record, RecordReader, Result};

enum Source<'a> {
    Owned(Workbook),
    Borrowed(&'a Workbook),
}

impl Source<'_> {
    fn workbook(&self) -> &Workbook {
        match self {
            Source::Owned(workbook) => workbook,
            Source::Borrowed(workbook) => workbook,
        }
    }
}

/// Reads the rows of a worksheet (or a range of one) as records.
///
/// Each call to [`Parser::read`] returns one worksheet row, `field_count` cells
/// wide. Empty cells are `None`.
///
/// For an explicit range, reading starts at the range's top-left cell shifted
/// by the row and column offsets, and stays inside the range.
///
/// For a whole worksheet, the window is the sheet's used range. Offsets count
/// from `A1` there, so an offset that points inside the used range skips ahead,
/// and one that points before it has no effect.
///
/// Reading stops at the first row without any stored cell: rows after a blank
/// row are not returned.
pub struct ExcelParser<'a> {
    source: Source<'a>,
    sheet_id: WorksheetId,
    /// The explicit range, or the used range of a whole-sheet source.
    range: Option<Range>,
    /// Explicit ranges are offset from their origin; whole sheets from `A1`.
    bounded: bool,
    row: u32,
    row_offset: u32,
    column_offset: u32,
    /// Formula results, kept for the parser's lifetime.
    cache: EvaluationCache,
    config: Configuration,
}

impl ExcelParser<'static> {
    /// Open the workbook at `path` and read `sheet` (or the first worksheet).
    pub fn from_path(
        path: impl AsRef<Path>,
        sheet: Option<&str>,
        config: Configuration,
    ) -> Result<Self> {
        let workbook = csvxl_xlsx::read_workbook(path)?;
        let sheet_id = resolve_sheet(&workbook, sheet)?;
        Self::whole_sheet(Source::Owned(workbook), sheet_id, config)
    }

    /// Read an `.xlsx` stream and parse `sheet` (or the first worksheet).
    pub fn from_reader<R: Read + Seek>(
        reader: R,
        sheet: Option<&str>,
        config: Configuration,
    ) -> Result<Self> {
        let workbook = csvxl_xlsx::read_workbook_from_reader(reader)?;
        let sheet_id = resolve_sheet(&workbook, sheet)?;
        Self::whole_sheet(Source::Owned(workbook), sheet_id, config)
    }
}

impl<'a> ExcelParser<'a> {
    pub fn from_package(
        package: &'a Package,
        sheet: Option<&str>,
        config: Configuration,
    ) -> Result<Self> {
        Self::from_workbook(package.workbook(), sheet, config)
    }

    pub fn from_workbook(
        workbook: &'a Workbook,
        sheet: Option<&str>,
        config: Configuration,
    ) -> Result<Self> {
        let sheet_id = resolve_sheet(workbook, sheet)?;
        Self::whole_sheet(Source::Borrowed(workbook), sheet_id, config)
    }

    pub fn from_worksheet(
        workbook: &'a Workbook,
        sheet_id: WorksheetId,
        config: Configuration,
    ) -> Result<Self> {
        Self::whole_sheet(Source::Borrowed(workbook), sheet_id, config)
    }

    /// Parse only `range`; records are `range.width() - column_offset` fields wide.
    pub fn from_range(
        workbook: &'a Workbook,
        sheet_id: WorksheetId,
        range: Range,
        config: Configuration,
    ) -> Result<Self> {
        config.validate()?;
        sheet(workbook, sheet_id)?;
        Ok(Self {
            source: Source::Borrowed(workbook),
            sheet_id,
            range: Some(range),
            bounded: true,
            row: 1,
            row_offset: 0,
            column_offset: 0,
            cache: EvaluationCache::default(),
            config,
        })
    }

    fn whole_sheet(source: Source<'a>, sheet_id: WorksheetId, config: Configuration) -> Result<Self> {
        config.validate()?;
        let range = sheet(source.workbook(), sheet_id)?.used_range();
        Ok(Self {
            source,
            sheet_id,
            range,
            bounded: false,
            row: 1,
            row_offset: 0,
            column_offset: 0,
            cache: EvaluationCache::default(),
            config,
        })
    }

    pub fn workbook(&self) -> &Workbook {
        self.source.workbook()
    }

    pub fn worksheet(&self) -> Result<&Worksheet> {
        sheet(self.source.workbook(), self.sheet_id)
    }

    /// The explicit range, or the used range for a whole-sheet source
    /// (`None` when the sheet is empty).
    pub fn range(&self) -> Option<Range> {
        self.range
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
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

    /// Wrap the parser in a [`RecordReader`] honoring `has_header_record`.
    pub fn records(self) -> RecordReader<Self> {
        let has_headers = self.config.has_header_record;
        RecordReader::new(self).has_headers(has_headers)
    }

    /// Release the parser and, for path or stream sources, the workbook it loaded.
    pub fn close(self) {
        log::debug!("closing parser after {} record(s)", self.row - 1);
    }

    /// Top-left cell of the read window as `(row, col)`, before the record counter.
    fn origin(&self) -> Option<(u64, u64)> {
        let range = self.range?;
        let (row, col) = if self.bounded {
            (
                u64::from(range.start.row) + u64::from(self.row_offset),
                u64::from(range.start.col) + u64::from(self.column_offset),
            )
        } else {
            (
                u64::from(range.start.row.max(self.row_offset)),
                u64::from(range.start.col.max(self.column_offset)),
            )
        };
        Some((row, col))
    }

    fn width(&self) -> u32 {
        match (self.range, self.origin()) {
            (Some(range), Some((_, from_col))) => {
                (u64::from(range.end.col) + 1).saturating_sub(from_col) as u32
            }
            _ => 0,
        }
    }

    /// The cells of the next row, or `None` when the row is past the data.
    fn next_range(&self) -> Option<Range> {
        let range = self.range?;
        let (origin_row, from_col) = self.origin()?;
        let width = self.width();
        if width == 0 {
            return None;
        }
        let from_row = origin_row + u64::from(self.row) - 1;
        if from_row > u64::from(range.end.row) {
            return None;
        }
        let to_col = from_col + u64::from(width) - 1;
        // The window lies inside `range`, which lies inside the sheet.
        Some(Range::from_bounds(
            from_row as u32,
            from_col as u32,
            from_row as u32,
            to_col as u32,
        ))
    }
}

impl Parser for ExcelParser<'_> {
    fn read(&mut self) -> Result<Option<Record>> {
        let Some(cells) = self.next_range() else {
            return Ok(None);
        };
        let field_count = self.width() as usize;
        let workbook = self.source.workbook();
        let sheet = sheet(workbook, self.sheet_id)?;
        let mut evaluator = self
            .config
            .calculate_formulas
            .then(|| Evaluator::with_cache(workbook, std::mem::take(&mut self.cache)));

        let mut record: Record = Vec::with_capacity(field_count);
        for (cell, stored) in sheet.iter_range(cells) {
            // Gaps between stored cells are empty fields.
            let index = (cell.col - cells.start.col) as usize;
            if index > record.len() {
                record.resize(index, None);
            }
            let value = match (&mut evaluator, &stored.formula) {
                (Some(evaluator), Some(_)) => evaluator.cell_value(self.sheet_id, cell),
                _ => stored.value.clone(),
            };
            record.push(value.to_text());
        }

        if let Some(evaluator) = evaluator {
            self.cache = evaluator.into_cache();
        }
        if record.is_empty() {
            return Ok(None);
        }
        record.resize(field_count, None);
        self.row += 1;
        Ok(Some(record))
    }

    fn row(&self) -> usize {
        self.row as usize
    }

    fn field_count(&self) -> usize {
        self.width() as usize
    }
}

fn resolve_sheet(workbook: &Workbook, name: Option<&str>) -> Result<WorksheetId> {
    match name {
        Some(name) => workbook
            .sheet_by_name(name)
            .map(|s| s.id)
            .ok_or_else(|| Error::SheetNotFound(name.to_string())),
        None => workbook.first_sheet().map(|s| s.id).ok_or(Error::NoWorksheets),
    }
}

fn sheet(workbook: &Workbook, sheet_id: WorksheetId) -> Result<&Worksheet> {
    workbook
        .sheet(sheet_id)
        .ok_or_else(|| Error::SheetNotFound(format!("#{sheet_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use csvxl_model::CellRef;
    use pretty_assertions::assert_eq;

    fn text(values: &[Option<&str>]) -> Record {
        values.iter().map(|v| v.map(str::to_string)).collect()
    }

    fn grid() -> Workbook {
        let mut workbook = Workbook::new();
        let id = workbook.add_sheet("Data").unwrap();
        let sheet = workbook.sheet_mut(id).unwrap();
        sheet.set_value_a1("A1", "a").unwrap();
        sheet.set_value_a1("C1", "c").unwrap();
        sheet.set_value_a1("B2", 2.0).unwrap();
        sheet.set_value_a1("B3", true).unwrap();
        workbook
    }

    #[test]
    fn fills_gaps_and_pads_to_field_count() {
        let workbook = grid();
        let mut parser = ExcelParser::from_workbook(&workbook, None, Configuration::default()).unwrap();
        assert_eq!(parser.field_count(), 3);
        assert_eq!(parser.read().unwrap(), Some(text(&[Some("a"), None, Some("c")])));
        assert_eq!(parser.read().unwrap(), Some(text(&[None, Some("2"), None])));
        assert_eq!(parser.read().unwrap(), Some(text(&[None, Some("TRUE"), None])));
        assert_eq!(parser.read().unwrap(), None);
        // End of data does not advance the row counter.
        assert_eq!(parser.row(), 4);
        assert_eq!(parser.read().unwrap(), None);
    }

    #[test]
    fn empty_sheet_has_no_records() {
        let mut workbook = Workbook::new();
        workbook.add_sheet("Empty").unwrap();
        let mut parser = ExcelParser::from_workbook(&workbook, None, Configuration::default()).unwrap();
        assert_eq!(parser.field_count(), 0);
        assert_eq!(parser.read().unwrap(), None);
    }

    #[test]
    fn missing_sheets_are_reported() {
        let workbook = grid();
        assert!(matches!(
            ExcelParser::from_workbook(&workbook, Some("Nope"), Configuration::default()),
            Err(Error::SheetNotFound(name)) if name == "Nope"
        ));
        assert!(matches!(
            ExcelParser::from_workbook(&Workbook::new(), None, Configuration::default()),
            Err(Error::NoWorksheets)
        ));
    }

    #[test]
    fn explicit_range_stops_at_its_last_row() {
        let workbook = grid();
        let id = workbook.first_sheet().unwrap().id;
        let range = Range::new(CellRef::new(0, 1), CellRef::new(1, 2));
        let mut parser =
            ExcelParser::from_range(&workbook, id, range, Configuration::default()).unwrap();
        assert_eq!(parser.field_count(), 2);
        assert_eq!(parser.read().unwrap(), Some(text(&[None, Some("c")])));
        assert_eq!(parser.read().unwrap(), Some(text(&[Some("2"), None])));
        // B3 exists but is outside the range.
        assert_eq!(parser.read().unwrap(), None);
    }

    #[test]
    fn offsets_shift_the_window() {
        let workbook = grid();
        let mut parser = ExcelParser::from_workbook(&workbook, None, Configuration::default()).unwrap();
        parser.set_row_offset(1);
        parser.set_column_offset(1);
        assert_eq!(parser.field_count(), 2);
        assert_eq!(parser.read().unwrap(), Some(text(&[Some("2"), None])));
    }

    #[test]
    fn whole_sheet_reads_start_at_the_used_range() {
        let mut workbook = Workbook::new();
        let id = workbook.add_sheet("Data").unwrap();
        let sheet = workbook.sheet_mut(id).unwrap();
        sheet.set_value_a1("B2", "Name").unwrap();
        sheet.set_value_a1("C2", "Age").unwrap();
        sheet.set_value_a1("D2", "City").unwrap();
        sheet.set_value_a1("B3", "Bill").unwrap();
        sheet.set_value_a1("D3", "Leeds").unwrap();

        let mut parser = ExcelParser::from_workbook(&workbook, None, Configuration::default()).unwrap();
        assert_eq!(parser.field_count(), 3);
        assert_eq!(parser.range(), Some(Range::from_a1("B2:D3").unwrap()));
        assert_eq!(
            parser.read().unwrap(),
            Some(text(&[Some("Name"), Some("Age"), Some("City")]))
        );
        assert_eq!(parser.read().unwrap(), Some(text(&[Some("Bill"), None, Some("Leeds")])));
        assert_eq!(parser.read().unwrap(), None);

        // Offsets count from A1 and only skip ahead inside the used range.
        let mut parser = ExcelParser::from_workbook(&workbook, None, Configuration::default()).unwrap();
        parser.set_row_offset(2);
        parser.set_column_offset(2);
        assert_eq!(parser.field_count(), 2);
        assert_eq!(parser.read().unwrap(), Some(text(&[None, Some("Leeds")])));
    }

    #[test]
    fn header_off_a1_keeps_every_column() {
        let mut workbook = Workbook::new();
        let id = workbook.add_sheet("Data").unwrap();
        let sheet = workbook.sheet_mut(id).unwrap();
        sheet.set_value_a1("B1", "Name").unwrap();
        sheet.set_value_a1("C1", "Age").unwrap();

        let mut parser = ExcelParser::from_workbook(&workbook, None, Configuration::default()).unwrap();
        assert_eq!(parser.read().unwrap(), Some(text(&[Some("Name"), Some("Age")])));
    }

    #[test]
    fn a_blank_row_ends_the_data() {
        let mut workbook = Workbook::new();
        let id = workbook.add_sheet("Data").unwrap();
        let sheet = workbook.sheet_mut(id).unwrap();
        sheet.set_value_a1("A1", "first").unwrap();
        sheet.set_value_a1("A3", "after the gap").unwrap();

        let mut parser = ExcelParser::from_workbook(&workbook, None, Configuration::default()).unwrap();
        assert_eq!(parser.read().unwrap(), Some(text(&[Some("first")])));
        assert_eq!(parser.read().unwrap(), None);
        assert_eq!(parser.row(), 2);
    }

    #[test]
    fn column_offset_stays_inside_an_explicit_range() {
        let workbook = grid();
        let id = workbook.first_sheet().unwrap().id;
        let range = Range::from_a1("A1:B3").unwrap();
        let mut parser =
            ExcelParser::from_range(&workbook, id, range, Configuration::default()).unwrap();
        parser.set_row_offset(1);
        parser.set_column_offset(1);
        // Column C lies outside the range.
        assert_eq!(parser.field_count(), 1);
        assert_eq!(parser.read().unwrap(), Some(text(&[Some("2")])));
        assert_eq!(parser.read().unwrap(), Some(text(&[Some("TRUE")])));
        assert_eq!(parser.read().unwrap(), None);
    }

    #[test]
    fn formula_results_are_cached_across_rows() {
        let rows = 50_000u32;
        let mut workbook = Workbook::new();
        let id = workbook.add_sheet("Totals").unwrap();
        let sheet = workbook.sheet_mut(id).unwrap();
        for row in 0..rows {
            sheet.set_value(CellRef::new(row, 0), 1.0);
            let formula = if row == 0 {
                "=A1".to_string()
            } else {
                format!("=B{}+A{}", row, row + 1)
            };
            sheet.set_formula(CellRef::new(row, 1), Some(formula));
        }

        let mut parser = ExcelParser::from_workbook(&workbook, None, Configuration::default()).unwrap();
        parser.set_row_offset(rows - 2);
        assert_eq!(parser.read().unwrap(), Some(text(&[Some("1"), Some("49999")])));
        assert_eq!(parser.read().unwrap(), Some(text(&[Some("1"), Some("50000")])));
        assert_eq!(parser.read().unwrap(), None);
    }

    #[test]
    fn formulas_are_evaluated_unless_disabled() {
        let mut workbook = grid();
        workbook
            .sheet_mut(1)
            .unwrap()
            .set_formula_a1("A2", Some("=LEN(C1)*10".to_string()))
            .unwrap();

        let mut parser = ExcelParser::from_workbook(&workbook, None, Configuration::default()).unwrap();
        parser.set_row_offset(1);
        assert_eq!(parser.read().unwrap(), Some(text(&[Some("10"), Some("2"), None])));

        let config = Configuration {
            calculate_formulas: false,
            ..Configuration::default()
        };
        let mut parser = ExcelParser::from_workbook(&workbook, None, config).unwrap();
        parser.set_row_offset(1);
        // No cached value yet: the formula cell reads as empty.
        assert_eq!(parser.read().unwrap(), Some(text(&[None, Some("2"), None])));
    }
}
