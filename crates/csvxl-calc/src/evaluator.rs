use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use csvxl_model::{CellRef, CellValue, ErrorValue, Range, Workbook, WorksheetId};

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::functions;
use crate::parser::parse_formula;

/// Result of evaluating an expression: a scalar, or the stored values of a range.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Value {
    Scalar(CellValue),
    /// Values of the non-empty cells of a range, row-major.
    Range(Vec<CellValue>),
}

impl Value {
    /// Collapse to a scalar; ranges in scalar position are `#VALUE!`.
    pub(crate) fn into_scalar(self) -> CellValue {
        match self {
            Value::Scalar(v) => v,
            Value::Range(_) => CellValue::Error(ErrorValue::Value),
        }
    }
}

/// Reference chains deeper than this are resolved in stages instead of by recursion.
const MAX_DEPTH: usize = 64;

type CellKey = (WorksheetId, CellRef);

/// Formula results computed by an [`Evaluator`].
///
/// The cache does not borrow the workbook, so it can be kept between evaluators
/// over the same unchanged workbook.
#[derive(Clone, Debug, Default)]
pub struct EvaluationCache {
    values: HashMap<CellKey, CellValue>,
}

impl EvaluationCache {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Evaluates formulas against a read-only workbook.
///
/// Every formula cell is evaluated at most once per cache; results are cached.
/// A cell that (transitively) refers to itself evaluates to `#REF!`.
///
/// Long reference chains do not grow the call stack without bound: when a
/// chain gets deeper than a fixed limit the pending cell is evaluated first
/// and the outer evaluation is retried against the warmed cache.
pub struct Evaluator<'a> {
    workbook: &'a Workbook,
    cache: EvaluationCache,
    in_progress: HashSet<CellKey>,
    depth: usize,
    /// Set while unwinding from a chain that hit `MAX_DEPTH`.
    deferred: Option<CellKey>,
}

impl<'a> Evaluator<'a> {
    pub fn new(workbook: &'a Workbook) -> Self {
        Self::with_cache(workbook, EvaluationCache::default())
    }

    /// Reuse results from an earlier evaluator over the same workbook.
    pub fn with_cache(workbook: &'a Workbook, cache: EvaluationCache) -> Self {
        Self {
            workbook,
            cache,
            in_progress: HashSet::new(),
            depth: 0,
            deferred: None,
        }
    }

    pub fn into_cache(self) -> EvaluationCache {
        self.cache
    }

    /// Current value of a cell, evaluating its formula if it has one.
    pub fn cell_value(&mut self, sheet_id: WorksheetId, cell: CellRef) -> CellValue {
        let mut pending = vec![(sheet_id, cell)];
        let mut pending_set: HashSet<CellKey> = pending.iter().copied().collect();
        while let Some(&(sheet_id, cell)) = pending.last() {
            let value = self.resolve(sheet_id, cell);
            match self.deferred.take() {
                Some(dependency) if pending_set.contains(&dependency) => {
                    self.report_cycle(dependency);
                    self.cache
                        .values
                        .insert(dependency, CellValue::Error(ErrorValue::Ref));
                }
                Some(dependency) => {
                    pending.push(dependency);
                    pending_set.insert(dependency);
                }
                None => {
                    pending.pop();
                    pending_set.remove(&(sheet_id, cell));
                    if pending.is_empty() {
                        return value;
                    }
                }
            }
        }
        CellValue::Empty
    }

    /// Value of a cell within the current evaluation pass.
    fn resolve(&mut self, sheet_id: WorksheetId, cell: CellRef) -> CellValue {
        if self.deferred.is_some() {
            // Unwinding; the result of this pass is discarded.
            return CellValue::Empty;
        }
        let workbook = self.workbook;
        let Some(sheet) = workbook.sheet(sheet_id) else {
            return CellValue::Error(ErrorValue::Ref);
        };
        let Some(stored) = sheet.cell(cell) else {
            return CellValue::Empty;
        };
        let Some(formula) = stored.formula.as_deref() else {
            return stored.value.clone();
        };

        let key = (sheet_id, cell);
        if let Some(value) = self.cache.values.get(&key) {
            return value.clone();
        }
        if self.depth >= MAX_DEPTH {
            self.deferred = Some(key);
            return CellValue::Empty;
        }
        if !self.in_progress.insert(key) {
            self.report_cycle(key);
            return CellValue::Error(ErrorValue::Ref);
        }

        self.depth += 1;
        let value = match parse_formula(formula) {
            Ok(expr) => self.eval(sheet_id, &expr).into_scalar(),
            Err(err) => {
                log::warn!(
                    "failed to parse formula `{formula}` in `{}`!{}: {err}",
                    sheet.name,
                    cell.to_a1()
                );
                CellValue::Error(ErrorValue::Name)
            }
        };
        self.depth -= 1;

        self.in_progress.remove(&key);
        if self.deferred.is_none() {
            self.cache.values.insert(key, value.clone());
        }
        value
    }

    fn report_cycle(&self, (sheet_id, cell): CellKey) {
        let name = self.workbook.sheet(sheet_id).map_or("?", |s| s.name.as_str());
        log::warn!("circular reference through `{name}`!{}", cell.to_a1());
    }

    /// Evaluate a parsed expression in the context of `sheet_id`.
    pub fn evaluate(&mut self, sheet_id: WorksheetId, expr: &Expr) -> CellValue {
        loop {
            let value = self.eval(sheet_id, expr).into_scalar();
            match self.deferred.take() {
                // Warm the cache with the deep dependency, then retry.
                Some((dep_sheet, dep_cell)) => {
                    self.cell_value(dep_sheet, dep_cell);
                }
                None => return value,
            }
        }
    }

    pub(crate) fn eval(&mut self, sheet_id: WorksheetId, expr: &Expr) -> Value {
        match expr {
            Expr::Number(n) => Value::Scalar(CellValue::Number(*n)),
            Expr::String(s) => Value::Scalar(CellValue::String(s.clone())),
            Expr::Boolean(b) => Value::Scalar(CellValue::Boolean(*b)),
            Expr::Error(e) => Value::Scalar(CellValue::Error(*e)),
            Expr::Missing => Value::Scalar(CellValue::Empty),
            Expr::Cell(r) => match self.resolve_sheet(sheet_id, r.sheet.as_deref()) {
                Some(target) => Value::Scalar(self.resolve(target, r.cell)),
                None => Value::Scalar(CellValue::Error(ErrorValue::Ref)),
            },
            Expr::Range(r) => match self.resolve_sheet(sheet_id, r.sheet.as_deref()) {
                Some(target) => Value::Range(self.range_values(target, r.range)),
                None => Value::Scalar(CellValue::Error(ErrorValue::Ref)),
            },
            Expr::Unary(op, inner) => {
                let v = self.eval(sheet_id, inner).into_scalar();
                Value::Scalar(match to_number(&v) {
                    Ok(n) => CellValue::Number(match op {
                        UnaryOp::Plus => n,
                        UnaryOp::Minus => -n,
                    }),
                    Err(e) => CellValue::Error(e),
                })
            }
            Expr::Percent(inner) => {
                let v = self.eval(sheet_id, inner).into_scalar();
                Value::Scalar(match to_number(&v) {
                    Ok(n) => CellValue::Number(n / 100.0),
                    Err(e) => CellValue::Error(e),
                })
            }
            Expr::Binary(op, left, right) => {
                let l = self.eval(sheet_id, left).into_scalar();
                let r = self.eval(sheet_id, right).into_scalar();
                Value::Scalar(binary(*op, &l, &r))
            }
            Expr::Call(name, args) => functions::call(self, sheet_id, name, args),
        }
    }

    fn resolve_sheet(&self, current: WorksheetId, name: Option<&str>) -> Option<WorksheetId> {
        match name {
            None => Some(current),
            Some(name) => self.workbook.sheet_by_name(name).map(|s| s.id),
        }
    }

    fn range_values(&mut self, sheet_id: WorksheetId, range: Range) -> Vec<CellValue> {
        let workbook = self.workbook;
        let Some(sheet) = workbook.sheet(sheet_id) else {
            return Vec::new();
        };
        let cells: Vec<CellRef> = sheet.iter_range(range).map(|(cell, _)| cell).collect();
        cells
            .into_iter()
            .map(|cell| self.resolve(sheet_id, cell))
            .filter(|v| !v.is_empty())
            .collect()
    }
}

fn binary(op: BinaryOp, l: &CellValue, r: &CellValue) -> CellValue {
    if let CellValue::Error(e) = l {
        return CellValue::Error(*e);
    }
    if let CellValue::Error(e) = r {
        return CellValue::Error(*e);
    }

    if op == BinaryOp::Concat {
        return CellValue::String(format!("{}{}", to_text(l), to_text(r)));
    }
    if op.is_comparison() {
        let ord = compare(l, r);
        let result = match op {
            BinaryOp::Eq => ord == Ordering::Equal,
            BinaryOp::Ne => ord != Ordering::Equal,
            BinaryOp::Lt => ord == Ordering::Less,
            BinaryOp::Gt => ord == Ordering::Greater,
            BinaryOp::Le => ord != Ordering::Greater,
            BinaryOp::Ge => ord != Ordering::Less,
            _ => unreachable!("comparison operator"),
        };
        return CellValue::Boolean(result);
    }

    let (a, b) = match (to_number(l), to_number(r)) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(e), _) | (_, Err(e)) => return CellValue::Error(e),
    };
    let n = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return CellValue::Error(ErrorValue::Div0);
            }
            a / b
        }
        BinaryOp::Pow => a.powf(b),
        _ => unreachable!("arithmetic operator"),
    };
    number_result(n)
}

/// Wrap an arithmetic result, mapping NaN/infinity to `#NUM!`.
pub(crate) fn number_result(n: f64) -> CellValue {
    if n.is_finite() {
        CellValue::Number(n)
    } else {
        CellValue::Error(ErrorValue::Num)
    }
}

/// Excel's scalar-to-number coercion.
pub(crate) fn to_number(v: &CellValue) -> Result<f64, ErrorValue> {
    match v {
        CellValue::Empty => Ok(0.0),
        CellValue::Number(n) => Ok(*n),
        CellValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        CellValue::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                return Err(ErrorValue::Value);
            }
            t.parse::<f64>().map_err(|_| ErrorValue::Value)
        }
        CellValue::Error(e) => Err(*e),
    }
}

/// Excel's scalar-to-text coercion (errors must be handled by the caller).
pub(crate) fn to_text(v: &CellValue) -> String {
    v.to_text().unwrap_or_default()
}

/// Excel's scalar-to-boolean coercion.
pub(crate) fn to_bool(v: &CellValue) -> Result<bool, ErrorValue> {
    match v {
        CellValue::Empty => Ok(false),
        CellValue::Boolean(b) => Ok(*b),
        CellValue::Number(n) => Ok(*n != 0.0),
        CellValue::String(s) if s.eq_ignore_ascii_case("TRUE") => Ok(true),
        CellValue::String(s) if s.eq_ignore_ascii_case("FALSE") => Ok(false),
        CellValue::String(_) => Err(ErrorValue::Value),
        CellValue::Error(e) => Err(*e),
    }
}

/// Ordering used by comparison operators: numbers < text < booleans, text case-insensitive.
fn compare(l: &CellValue, r: &CellValue) -> Ordering {
    fn rank(v: &CellValue) -> u8 {
        match v {
            CellValue::Number(_) | CellValue::Empty => 0,
            CellValue::String(_) => 1,
            CellValue::Boolean(_) => 2,
            CellValue::Error(_) => 3,
        }
    }

    match (l, r) {
        // A blank compares equal to `""`, `0` and `FALSE` depending on the other side.
        (CellValue::Empty, CellValue::String(s)) => "".cmp(s.to_lowercase().as_str()),
        (CellValue::String(s), CellValue::Empty) => s.to_lowercase().as_str().cmp(""),
        (CellValue::Empty, CellValue::Boolean(b)) => false.cmp(b),
        (CellValue::Boolean(b), CellValue::Empty) => b.cmp(&false),
        (CellValue::String(a), CellValue::String(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        (CellValue::Boolean(a), CellValue::Boolean(b)) => a.cmp(b),
        _ if rank(l) == 0 && rank(r) == 0 => {
            let a = to_number(l).unwrap_or(0.0);
            let b = to_number(r).unwrap_or(0.0);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        _ => rank(l).cmp(&rank(r)),
    }
}
