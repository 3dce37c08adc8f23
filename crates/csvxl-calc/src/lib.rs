//! Formula support for csvxl workbooks.
//!
//! Formulas are parsed into an [`Expr`] tree with a small Pratt parser and evaluated
//! against a [`Workbook`] snapshot. Only a core set of worksheet functions is
//! supported; anything else evaluates to `#NAME?`.
//!
//! Recalculation writes results back as the cells' cached values, leaving the
//! formula text untouched.

mod ast;
mod evaluator;
mod functions;
mod parser;

pub use ast::{BinaryOp, Expr, SheetCell, SheetRange, UnaryOp};
pub use evaluator::{EvaluationCache, Evaluator};
pub use functions::FUNCTION_NAMES;
pub use parser::{parse_formula, ParseError};

use csvxl_model::{CellRef, CellValue, Range, Workbook, WorksheetId};

/// Parse and evaluate a standalone formula in the context of `sheet_id`.
///
/// A leading `=` is optional.
pub fn evaluate_formula(
    workbook: &Workbook,
    sheet_id: WorksheetId,
    formula: &str,
) -> Result<CellValue, ParseError> {
    let expr = parse_formula(formula)?;
    Ok(Evaluator::new(workbook).evaluate(sheet_id, &expr))
}

/// Recalculate every formula cell of `sheet_id` inside `range`.
///
/// Cells outside the range are evaluated on demand but their cached values are
/// not updated. Returns the number of formula cells recalculated.
pub fn calculate_range(workbook: &mut Workbook, sheet_id: WorksheetId, range: Range) -> usize {
    let results = {
        let Some(sheet) = workbook.sheet(sheet_id) else {
            return 0;
        };
        let formulas: Vec<CellRef> = sheet
            .iter_range(range)
            .filter(|(_, cell)| cell.formula.is_some())
            .map(|(cell, _)| cell)
            .collect();
        if formulas.is_empty() {
            return 0;
        }
        let mut evaluator = Evaluator::new(workbook);
        formulas
            .into_iter()
            .map(|cell| (cell, evaluator.cell_value(sheet_id, cell)))
            .collect::<Vec<_>>()
    };

    let count = results.len();
    if let Some(sheet) = workbook.sheet_mut(sheet_id) {
        for (cell, value) in results {
            sheet.set_computed_value(cell, value);
        }
    }
    log::trace!("recalculated {count} formula cell(s) in sheet {sheet_id}");
    count
}

/// Recalculate every formula cell in the workbook.
pub fn calculate_workbook(workbook: &mut Workbook) -> usize {
    let ids: Vec<WorksheetId> = workbook.sheets.iter().map(|s| s.id).collect();
    ids.into_iter()
        .map(|id| calculate_range(workbook, id, Range::full_sheet()))
        .sum()
}
