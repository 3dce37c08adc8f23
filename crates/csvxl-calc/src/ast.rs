use csvxl_model::{CellRef, ErrorValue, Range};

/// Parsed formula expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Number(f64),
    String(String),
    Boolean(bool),
    Error(ErrorValue),
    Cell(SheetCell),
    Range(SheetRange),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Percent(Box<Expr>),
    Call(String, Vec<Expr>),
    /// An omitted argument, e.g. the middle of `IF(A1,,2)`.
    Missing,
}

/// A cell reference with an optional sheet qualifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetCell {
    pub sheet: Option<String>,
    pub cell: CellRef,
}

/// A range reference with an optional sheet qualifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetRange {
    pub sheet: Option<String>,
    pub range: Range,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl BinaryOp {
    pub(crate) const fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge
        )
    }
}

/// Left and right binding power of an infix operator.
///
/// Excel evaluates `^` left-to-right, so every operator is left-associative.
pub(crate) const fn infix_binding_power(op: BinaryOp) -> (u8, u8) {
    match op {
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
            (10, 11)
        }
        BinaryOp::Concat => (20, 21),
        BinaryOp::Add | BinaryOp::Sub => (30, 31),
        BinaryOp::Mul | BinaryOp::Div => (40, 41),
        BinaryOp::Pow => (50, 51),
    }
}

/// Unary minus binds tighter than `^` (`-2^2` is `4`).
pub(crate) const PREFIX_BINDING_POWER: u8 = 60;
pub(crate) const POSTFIX_BINDING_POWER: u8 = 70;
