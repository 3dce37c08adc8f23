use thiserror::Error;

use crate::{sheet_name_eq_case_insensitive, validate_sheet_name, SheetNameError, Worksheet, WorksheetId};

/// A workbook: an ordered list of worksheets.
#[derive(Clone, Debug, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Worksheet>,
    next_sheet_id: WorksheetId,
}

/// Errors raised when adding a worksheet.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AddSheetError {
    #[error(transparent)]
    InvalidName(#[from] SheetNameError),
    #[error("sheet `{0}` already exists")]
    DuplicateName(String),
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Workbook {
    pub fn new() -> Self {
        Self {
            sheets: Vec::new(),
            next_sheet_id: 1,
        }
    }

    /// Add a worksheet, returning its id.
    pub fn add_sheet(&mut self, name: impl Into<String>) -> Result<WorksheetId, AddSheetError> {
        let name = name.into();
        validate_sheet_name(&name)?;
        if self.sheet_by_name(&name).is_some() {
            return Err(AddSheetError::DuplicateName(name));
        }

        let id = self.next_sheet_id;
        self.next_sheet_id = self.next_sheet_id.wrapping_add(1);
        self.sheets.push(Worksheet::new(id, name));
        Ok(id)
    }

    /// Id of the sheet called `name`, adding it when missing.
    pub fn get_or_add_sheet(&mut self, name: &str) -> Result<WorksheetId, AddSheetError> {
        match self.sheet_by_name(name) {
            Some(sheet) => Ok(sheet.id),
            None => self.add_sheet(name),
        }
    }

    pub fn sheet(&self, id: WorksheetId) -> Option<&Worksheet> {
        self.sheets.iter().find(|s| s.id == id)
    }

    pub fn sheet_mut(&mut self, id: WorksheetId) -> Option<&mut Worksheet> {
        self.sheets.iter_mut().find(|s| s.id == id)
    }

    /// Find a sheet by name (case-insensitive, like Excel).
    pub fn sheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.sheets
            .iter()
            .find(|s| sheet_name_eq_case_insensitive(&s.name, name))
    }

    pub fn sheet_by_name_mut(&mut self, name: &str) -> Option<&mut Worksheet> {
        self.sheets
            .iter_mut()
            .find(|s| sheet_name_eq_case_insensitive(&s.name, name))
    }

    /// The first worksheet in tab order.
    pub fn first_sheet(&self) -> Option<&Worksheet> {
        self.sheets.first()
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_sheet_rejects_duplicates_case_insensitively() {
        let mut wb = Workbook::new();
        let export = wb.add_sheet("Export").unwrap();
        assert_eq!(
            wb.add_sheet("EXPORT"),
            Err(AddSheetError::DuplicateName("EXPORT".to_string()))
        );
        assert_eq!(wb.get_or_add_sheet("export").unwrap(), export);

        let other = wb.get_or_add_sheet("Other").unwrap();
        assert_ne!(other, export);
        assert_eq!(wb.sheet_names(), vec!["Export", "Other"]);
    }

    #[test]
    fn add_sheet_validates_names() {
        let mut wb = Workbook::new();
        assert_eq!(
            wb.add_sheet("bad[name]"),
            Err(AddSheetError::InvalidName(SheetNameError::InvalidCharacter('[')))
        );
        assert!(wb.first_sheet().is_none());
    }
}
