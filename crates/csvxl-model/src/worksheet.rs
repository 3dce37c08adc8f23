use std::collections::BTreeMap;

use crate::cell::normalize_formula;
use crate::{A1ParseError, Cell, CellKey, CellRef, CellValue, Range};

/// Identifier for a worksheet within its workbook.
pub type WorksheetId = u32;

/// A single sheet: a name plus sparse cell storage.
#[derive(Clone, Debug, PartialEq)]
pub struct Worksheet {
    pub id: WorksheetId,
    pub name: String,
    cells: BTreeMap<CellKey, Cell>,
    used_range: Option<Range>,
}

impl Worksheet {
    pub fn new(id: WorksheetId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            cells: BTreeMap::new(),
            used_range: None,
        }
    }

    /// Number of stored (non-empty) cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Bounding box of all stored cells (the sheet "dimension").
    pub fn used_range(&self) -> Option<Range> {
        self.used_range
    }

    /// The whole grid, `A1:XFD1048576`.
    pub fn full_range(&self) -> Range {
        Range::full_sheet()
    }

    pub fn cell(&self, cell: CellRef) -> Option<&Cell> {
        self.cells.get(&CellKey::from(cell))
    }

    pub fn cell_a1(&self, a1: &str) -> Result<Option<&Cell>, A1ParseError> {
        Ok(self.cell(CellRef::from_a1(a1)?))
    }

    /// Value at `cell`, [`CellValue::Empty`] when nothing is stored.
    pub fn value(&self, cell: CellRef) -> CellValue {
        self.cell(cell)
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    pub fn value_a1(&self, a1: &str) -> Result<CellValue, A1ParseError> {
        Ok(self.value(CellRef::from_a1(a1)?))
    }

    /// Formula text (without `=`) at `cell`.
    pub fn formula(&self, cell: CellRef) -> Option<&str> {
        self.cell(cell).and_then(|c| c.formula.as_deref())
    }

    /// Set a literal value, clearing any formula in the cell.
    pub fn set_value(&mut self, cell: CellRef, value: impl Into<CellValue>) {
        self.set_cell(cell, Cell::new(value.into()));
    }

    pub fn set_value_a1(&mut self, a1: &str, value: impl Into<CellValue>) -> Result<(), A1ParseError> {
        self.set_value(CellRef::from_a1(a1)?, value);
        Ok(())
    }

    /// Set or clear the formula of a cell, keeping its last computed value.
    pub fn set_formula(&mut self, cell: CellRef, formula: Option<String>) {
        let mut stored = self.cell(cell).cloned().unwrap_or_default();
        stored.formula = formula
            .map(|f| normalize_formula(&f))
            .filter(|f| !f.is_empty());
        self.set_cell(cell, stored);
    }

    pub fn set_formula_a1(&mut self, a1: &str, formula: Option<String>) -> Result<(), A1ParseError> {
        self.set_formula(CellRef::from_a1(a1)?, formula);
        Ok(())
    }

    /// Replace the computed value of a cell without touching its formula.
    pub fn set_computed_value(&mut self, cell: CellRef, value: CellValue) {
        let key = CellKey::from(cell);
        match self.cells.get_mut(&key) {
            Some(stored) => {
                stored.value = value;
                if stored.is_truly_empty() {
                    self.remove(key);
                }
            }
            None => self.set_value(cell, value),
        }
    }

    /// Store `value` at `cell`; truly empty cells are removed instead.
    pub fn set_cell(&mut self, cell: CellRef, value: Cell) {
        let key = CellKey::from(cell);
        if value.is_truly_empty() {
            self.remove(key);
            return;
        }
        self.cells.insert(key, value);
        self.used_range = Some(match self.used_range {
            Some(range) => range.expand_to(cell),
            None => Range::new(cell, cell),
        });
    }

    pub fn clear_cell(&mut self, cell: CellRef) {
        self.remove(CellKey::from(cell));
    }

    pub fn clear_cell_a1(&mut self, a1: &str) -> Result<(), A1ParseError> {
        self.clear_cell(CellRef::from_a1(a1)?);
        Ok(())
    }

    /// All stored cells in row-major order.
    pub fn iter_cells(&self) -> impl Iterator<Item = (CellRef, &Cell)> + '_ {
        self.cells.iter().map(|(k, c)| (k.to_ref(), c))
    }

    /// Stored cells inside `range`, in row-major order.
    ///
    /// Empty positions are skipped; callers that need a dense grid must fill
    /// the gaps themselves.
    pub fn iter_range(&self, range: Range) -> impl Iterator<Item = (CellRef, &Cell)> + '_ {
        let rows = match self.used_range {
            Some(used) if used.start.row <= range.end.row && range.start.row <= used.end.row => {
                range.start.row.max(used.start.row)..=range.end.row.min(used.end.row)
            }
            // Empty iterator.
            _ => 1..=0,
        };
        rows.flat_map(move |row| {
            let lo = CellKey::new(row, range.start.col);
            let hi = CellKey::new(row, range.end.col);
            self.cells.range(lo..=hi).map(|(k, c)| (k.to_ref(), c))
        })
    }

    fn remove(&mut self, key: CellKey) {
        if self.cells.remove(&key).is_none() {
            return;
        }
        let cell = key.to_ref();
        let on_boundary = self.used_range.is_some_and(|r| {
            cell.row == r.start.row
                || cell.row == r.end.row
                || cell.col == r.start.col
                || cell.col == r.end.col
        });
        if on_boundary {
            self.recompute_used_range();
        }
    }

    fn recompute_used_range(&mut self) {
        self.used_range = self
            .cells
            .keys()
            .map(|k| k.to_ref())
            .fold(None, |acc: Option<Range>, cell| {
                Some(match acc {
                    Some(range) => range.expand_to(cell),
                    None => Range::new(cell, cell),
                })
            });
    }
}
