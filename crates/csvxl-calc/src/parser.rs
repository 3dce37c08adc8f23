//! Formula lexer and parser.

use csvxl_model::{CellRef, ErrorValue, Range};
use thiserror::Error;

use crate::ast::{
    infix_binding_power, BinaryOp, Expr, SheetCell, SheetRange, UnaryOp, POSTFIX_BINDING_POWER,
    PREFIX_BINDING_POWER,
};

/// Excel's limit on formula length, counted in characters.
const EXCEL_MAX_FORMULA_CHARS: usize = 8_192;
/// Excel's limit on nested function calls / groups.
const EXCEL_MAX_NESTING: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message} (at byte {position})")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum TokenKind {
    Number(f64),
    String(String),
    Error(ErrorValue),
    Ident(String),
    QuotedIdent(String),
    LParen,
    RParen,
    Comma,
    Colon,
    Bang,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Amp,
    Percent,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Eof,
}

#[derive(Clone, Debug, PartialEq)]
struct Token {
    kind: TokenKind,
    start: usize,
}

/// Parse formula text (with or without the leading `=`).
pub fn parse_formula(formula: &str) -> Result<Expr, ParseError> {
    let char_len = formula.chars().count();
    if char_len > EXCEL_MAX_FORMULA_CHARS {
        return Err(ParseError::new(
            format!("formula exceeds Excel's {EXCEL_MAX_FORMULA_CHARS}-character limit (got {char_len})"),
            0,
        ));
    }

    let trimmed = formula.trim_start();
    let offset = formula.len() - trimmed.len();
    let (src, offset) = match trimmed.strip_prefix('=') {
        Some(rest) => (rest, offset + 1),
        None => (trimmed, offset),
    };

    let tokens = Lexer::new(src, offset).lex()?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_expression(0)?;
    match parser.peek() {
        TokenKind::Eof => Ok(expr),
        _ => Err(ParseError::new("unexpected token", parser.position())),
    }
}

struct Lexer<'a> {
    src: &'a str,
    offset: usize,
    idx: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str, offset: usize) -> Self {
        Self {
            src,
            offset,
            idx: 0,
            tokens: Vec::new(),
        }
    }

    fn lex(mut self) -> Result<Vec<Token>, ParseError> {
        while let Some(c) = self.peek_char() {
            let start = self.idx;
            if c.is_whitespace() {
                self.bump();
                continue;
            }

            let kind = match c {
                '0'..='9' | '.' => self.lex_number()?,
                '"' => TokenKind::String(self.lex_string()?),
                '\'' => TokenKind::QuotedIdent(self.lex_quoted_ident()?),
                '#' => TokenKind::Error(self.lex_error()?),
                c if c.is_alphabetic() || c == '_' || c == '$' => {
                    TokenKind::Ident(self.take_while(|c| {
                        c.is_alphanumeric() || c == '_' || c == '$' || c == '.'
                    }))
                }
                _ => {
                    self.bump();
                    match c {
                        '(' => TokenKind::LParen,
                        ')' => TokenKind::RParen,
                        ',' => TokenKind::Comma,
                        ':' => TokenKind::Colon,
                        '!' => TokenKind::Bang,
                        '+' => TokenKind::Plus,
                        '-' => TokenKind::Minus,
                        '*' => TokenKind::Star,
                        '/' => TokenKind::Slash,
                        '^' => TokenKind::Caret,
                        '&' => TokenKind::Amp,
                        '%' => TokenKind::Percent,
                        '=' => TokenKind::Eq,
                        '<' => match self.peek_char() {
                            Some('>') => {
                                self.bump();
                                TokenKind::Ne
                            }
                            Some('=') => {
                                self.bump();
                                TokenKind::Le
                            }
                            _ => TokenKind::Lt,
                        },
                        '>' => match self.peek_char() {
                            Some('=') => {
                                self.bump();
                                TokenKind::Ge
                            }
                            _ => TokenKind::Gt,
                        },
                        other => {
                            return Err(ParseError::new(
                                format!("unexpected character `{other}`"),
                                self.offset + start,
                            ))
                        }
                    }
                }
            };
            self.push(kind, start);
        }
        let end = self.idx;
        self.push(TokenKind::Eof, end);
        Ok(self.tokens)
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            start: self.offset + start,
        });
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.idx..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.idx += c.len_utf8();
        Some(c)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.idx;
        while self.peek_char().is_some_and(&pred) {
            self.bump();
        }
        self.src[start..self.idx].to_string()
    }

    fn lex_number(&mut self) -> Result<TokenKind, ParseError> {
        let start = self.idx;
        self.take_while(|c| c.is_ascii_digit() || c == '.');
        if matches!(self.peek_char(), Some('e' | 'E')) {
            let mark = self.idx;
            self.bump();
            if matches!(self.peek_char(), Some('+' | '-')) {
                self.bump();
            }
            if self.take_while(|c| c.is_ascii_digit()).is_empty() {
                // Not an exponent after all (e.g. `1E` is never valid, but keep the error local).
                self.idx = mark;
            }
        }
        let raw = &self.src[start..self.idx];
        raw.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| ParseError::new(format!("invalid number `{raw}`"), self.offset + start))
    }

    fn lex_string(&mut self) -> Result<String, ParseError> {
        let start = self.idx;
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') if self.peek_char() == Some('"') => {
                    self.bump();
                    out.push('"');
                }
                Some('"') => return Ok(out),
                Some(c) => out.push(c),
                None => {
                    return Err(ParseError::new(
                        "unterminated string literal",
                        self.offset + start,
                    ))
                }
            }
        }
    }

    fn lex_quoted_ident(&mut self) -> Result<String, ParseError> {
        let start = self.idx;
        self.bump(); // opening apostrophe
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\'') if self.peek_char() == Some('\'') => {
                    self.bump();
                    out.push('\'');
                }
                Some('\'') => return Ok(out),
                Some(c) => out.push(c),
                None => {
                    return Err(ParseError::new(
                        "unterminated quoted sheet name",
                        self.offset + start,
                    ))
                }
            }
        }
    }

    fn lex_error(&mut self) -> Result<ErrorValue, ParseError> {
        let rest = &self.src[self.idx..];
        let found = ErrorValue::ALL.into_iter().find(|e| {
            let lit = e.as_str();
            rest.len() >= lit.len()
                && rest.is_char_boundary(lit.len())
                && rest[..lit.len()].eq_ignore_ascii_case(lit)
        });
        match found {
            Some(err) => {
                self.idx += err.as_str().len();
                Ok(err)
            }
            None => Err(ParseError::new(
                "unknown error literal",
                self.offset + self.idx,
            )),
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_at(&self, ahead: usize) -> &TokenKind {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn position(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].start
    }

    fn next(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn expect(&mut self, expected: TokenKind) -> Result<(), ParseError> {
        if *self.peek() == expected {
            self.next();
            Ok(())
        } else {
            Err(ParseError::new(
                format!("expected {expected:?}"),
                self.position(),
            ))
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        if self.depth >= EXCEL_MAX_NESTING {
            return Err(ParseError::new(
                format!("expression nesting exceeds Excel's {EXCEL_MAX_NESTING}-level limit"),
                self.position(),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_expression(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_prefix()?;

        loop {
            if matches!(self.peek(), TokenKind::Percent) && POSTFIX_BINDING_POWER >= min_bp {
                self.next();
                lhs = Expr::Percent(Box::new(lhs));
                continue;
            }

            let op = match self.peek() {
                TokenKind::Caret => BinaryOp::Pow,
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                TokenKind::Amp => BinaryOp::Concat,
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::Ne => BinaryOp::Ne,
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            let (l_bp, r_bp) = infix_binding_power(op);
            if l_bp < min_bp {
                break;
            }
            self.next();
            let rhs = self.parse_expression(r_bp)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Minus => UnaryOp::Minus,
            _ => return self.parse_primary(),
        };
        self.next();
        self.enter()?;
        let expr = self.parse_expression(PREFIX_BINDING_POWER);
        self.depth -= 1;
        Ok(Expr::Unary(op, Box::new(expr?)))
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let position = self.position();
        match self.peek().clone() {
            TokenKind::Number(n) => {
                self.next();
                Ok(Expr::Number(n))
            }
            TokenKind::String(s) => {
                self.next();
                Ok(Expr::String(s))
            }
            TokenKind::Error(e) => {
                self.next();
                Ok(Expr::Error(e))
            }
            TokenKind::LParen => {
                self.next();
                self.enter()?;
                let expr = self.parse_expression(0);
                self.depth -= 1;
                let expr = expr?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::QuotedIdent(sheet) => {
                self.next();
                self.expect(TokenKind::Bang)?;
                self.parse_reference(Some(sheet))
            }
            TokenKind::Ident(name) => {
                if matches!(self.peek_at(1), TokenKind::Bang) {
                    self.next();
                    self.next();
                    return self.parse_reference(Some(name));
                }
                if matches!(self.peek_at(1), TokenKind::LParen) {
                    self.next();
                    return self.parse_call(name);
                }
                if name.eq_ignore_ascii_case("TRUE") {
                    self.next();
                    return Ok(Expr::Boolean(true));
                }
                if name.eq_ignore_ascii_case("FALSE") {
                    self.next();
                    return Ok(Expr::Boolean(false));
                }
                if CellRef::from_a1(&name).is_ok() {
                    return self.parse_reference(None);
                }
                // Defined names are not supported.
                self.next();
                Ok(Expr::Error(ErrorValue::Name))
            }
            TokenKind::Comma | TokenKind::RParen => Ok(Expr::Missing),
            TokenKind::Eof => Err(ParseError::new("unexpected end of formula", position)),
            other => Err(ParseError::new(format!("unexpected token {other:?}"), position)),
        }
    }

    /// Parse `A1` or `A1:B2` after an optional `Sheet!` prefix has been consumed.
    fn parse_reference(&mut self, sheet: Option<String>) -> Result<Expr, ParseError> {
        let start = self.take_cell_ref()?;
        if !matches!(self.peek(), TokenKind::Colon) {
            return Ok(Expr::Cell(SheetCell { sheet, cell: start }));
        }
        self.next();
        let end = self.take_cell_ref()?;
        Ok(Expr::Range(SheetRange {
            sheet,
            range: Range::new(start, end),
        }))
    }

    fn take_cell_ref(&mut self) -> Result<CellRef, ParseError> {
        let position = self.position();
        match self.next() {
            TokenKind::Ident(text) => CellRef::from_a1(&text)
                .map_err(|e| ParseError::new(format!("invalid reference `{text}`: {e}"), position)),
            _ => Err(ParseError::new("expected a cell reference", position)),
        }
    }

    fn parse_call(&mut self, name: String) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LParen)?;
        self.enter()?;
        let args = self.parse_args();
        self.depth -= 1;
        Ok(Expr::Call(name.to_ascii_uppercase(), args?))
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if matches!(self.peek(), TokenKind::RParen) {
            self.next();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression(0)?);
            match self.next() {
                TokenKind::Comma => continue,
                TokenKind::RParen => return Ok(args),
                _ => {
                    return Err(ParseError::new(
                        "expected `,` or `)` in argument list",
                        self.position(),
                    ))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cell(a1: &str) -> Expr {
        Expr::Cell(SheetCell {
            sheet: None,
            cell: CellRef::from_a1(a1).unwrap(),
        })
    }

    #[test]
    fn parses_function_over_reference() {
        let expr = parse_formula("=LEN(A2)*10").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Mul,
                Box::new(Expr::Call("LEN".to_string(), vec![cell("A2")])),
                Box::new(Expr::Number(10.0)),
            )
        );
    }

    #[test]
    fn operator_precedence_matches_excel() {
        // `-2^2` is `(-2)^2` in Excel.
        assert_eq!(
            parse_formula("-2^2").unwrap(),
            Expr::Binary(
                BinaryOp::Pow,
                Box::new(Expr::Unary(UnaryOp::Minus, Box::new(Expr::Number(2.0)))),
                Box::new(Expr::Number(2.0)),
            )
        );
        // `1+2&3` is `(1+2)&3`.
        assert!(matches!(
            parse_formula("1+2&3").unwrap(),
            Expr::Binary(BinaryOp::Concat, _, _)
        ));
        // Comparisons bind loosest.
        assert!(matches!(
            parse_formula("A1&\"x\"=B1").unwrap(),
            Expr::Binary(BinaryOp::Eq, _, _)
        ));
    }

    #[test]
    fn parses_sheet_qualified_ranges() {
        assert_eq!(
            parse_formula("SUM('My Sheet'!$A$1:B3)").unwrap(),
            Expr::Call(
                "SUM".to_string(),
                vec![Expr::Range(SheetRange {
                    sheet: Some("My Sheet".to_string()),
                    range: Range::from_a1("A1:B3").unwrap(),
                })]
            )
        );
        assert_eq!(
            parse_formula("Data!C4").unwrap(),
            Expr::Cell(SheetCell {
                sheet: Some("Data".to_string()),
                cell: CellRef::new(3, 2),
            })
        );
    }

    #[test]
    fn parses_literals() {
        assert_eq!(
            parse_formula("\"say \"\"hi\"\"\"").unwrap(),
            Expr::String("say \"hi\"".to_string())
        );
        assert_eq!(parse_formula("true").unwrap(), Expr::Boolean(true));
        assert_eq!(parse_formula("#div/0!").unwrap(), Expr::Error(ErrorValue::Div0));
        assert_eq!(parse_formula("1.5e3").unwrap(), Expr::Number(1500.0));
        assert_eq!(
            parse_formula("50%").unwrap(),
            Expr::Percent(Box::new(Expr::Number(50.0)))
        );
        assert_eq!(
            parse_formula("IF(A1,,2)").unwrap(),
            Expr::Call(
                "IF".to_string(),
                vec![cell("A1"), Expr::Missing, Expr::Number(2.0)]
            )
        );
    }

    #[test]
    fn reports_errors_with_positions() {
        let err = parse_formula("=1+").unwrap_err();
        assert_eq!(err.message, "unexpected end of formula");
        assert_eq!(err.position, 3);

        assert!(parse_formula("=\"open").is_err());
        assert!(parse_formula("=SUM(1 2)").is_err());
        assert!(parse_formula("=1 ~ 2").is_err());
        assert!(parse_formula(&format!("={}", "(".repeat(100))).is_err());
    }
}
