//! Macro expression language: lexer, parser, and runtime values.
//!
//! The grammar is closed: literals, lists, tuples, mappings, arithmetic,
//! and calls to named functions. There are no variables, attribute access,
//! or statements, so a macro can never reach anything outside the function
//! registry it is evaluated against.
//!
//! ```text
//! expr      := additive
//! additive  := term (('+' | '-') term)*
//! term      := unary (('*' | '/' | '//' | '%') unary)*
//! unary     := ('+' | '-') unary | power
//! power     := postfix ('**' unary)?
//! postfix   := IDENT '(' args ')' | atom
//! atom      := INT | FLOAT | STRING | BOOL | '(' expr ')' | tuple | list | map
//! ```

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExprError {
    #[error("unexpected character '{found}' at {position}")]
    UnexpectedChar { found: char, position: usize },
    #[error("unterminated string literal starting at {position}")]
    UnterminatedString { position: usize },
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
    #[error("unexpected {found} at {position}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
        position: usize,
    },
    #[error("empty expression")]
    Empty,
    #[error("unknown name '{0}' (only function calls are allowed)")]
    UnknownName(String),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("{function}() takes {expected} argument(s), {found} given")]
    Arity {
        function: String,
        expected: &'static str,
        found: usize,
    },
    #[error("{0}")]
    Type(String),
    #[error("{function}(): {message}")]
    InvalidArgument { function: String, message: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    Overflow,
    #[error("string of {0} bytes exceeds the 1 MiB limit")]
    TooLarge(usize),
    #[error("expression nested too deeply")]
    TooDeep,
}

/// Maximum nesting of operators, calls and brackets in one expression.
pub const MAX_DEPTH: usize = 128;

/// Maximum length of a string built by `+` or `*`.
pub const MAX_STRING_LEN: usize = 1 << 20;

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Int(n) => write!(f, "number {}", n),
            Token::Float(n) => write!(f, "number {}", n),
            Token::Str(s) => write!(f, "string {:?}", s),
            Token::Ident(name) => write!(f, "name '{}'", name),
            Token::Plus => f.write_str("'+'"),
            Token::Minus => f.write_str("'-'"),
            Token::Star => f.write_str("'*'"),
            Token::DoubleStar => f.write_str("'**'"),
            Token::Slash => f.write_str("'/'"),
            Token::DoubleSlash => f.write_str("'//'"),
            Token::Percent => f.write_str("'%'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::LBracket => f.write_str("'['"),
            Token::RBracket => f.write_str("']'"),
            Token::LBrace => f.write_str("'{'"),
            Token::RBrace => f.write_str("'}'"),
            Token::Comma => f.write_str("','"),
            Token::Colon => f.write_str("':'"),
        }
    }
}

/// A token with its character offset in the expression text.
#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    position: usize,
}

fn lex(input: &str) -> Result<Vec<Spanned>, ExprError> {
    let chars: Vec<char> = input.chars().collect();
    let len = chars.len();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < len {
        let c = chars[i];
        let position = i;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && i + 1 < len && chars[i + 1].is_ascii_digit()) {
            let start = i;
            let mut is_float = false;
            while i < len && (chars[i].is_ascii_digit() || chars[i] == '_') {
                i += 1;
            }
            if i < len && chars[i] == '.' {
                is_float = true;
                i += 1;
                while i < len && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            if i < len && (chars[i] == 'e' || chars[i] == 'E') {
                is_float = true;
                i += 1;
                if i < len && (chars[i] == '+' || chars[i] == '-') {
                    i += 1;
                }
                while i < len && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().filter(|c| **c != '_').collect();
            let token = if is_float {
                Token::Float(
                    text.parse()
                        .map_err(|_| ExprError::InvalidNumber(text.clone()))?,
                )
            } else {
                Token::Int(
                    text.parse()
                        .map_err(|_| ExprError::InvalidNumber(text.clone()))?,
                )
            };
            tokens.push(Spanned { token, position });
            continue;
        }

        if c == '\'' || c == '"' {
            let quote = c;
            let mut value = String::new();
            i += 1;
            loop {
                if i >= len {
                    return Err(ExprError::UnterminatedString { position });
                }
                match chars[i] {
                    ch if ch == quote => {
                        i += 1;
                        break;
                    }
                    '\\' if i + 1 < len => {
                        value.push(match chars[i + 1] {
                            'n' => '\n',
                            't' => '\t',
                            other => other,
                        });
                        i += 2;
                    }
                    ch => {
                        value.push(ch);
                        i += 1;
                    }
                }
            }
            tokens.push(Spanned {
                token: Token::Str(value),
                position,
            });
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < len && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let name: String = chars[start..i].iter().collect();
            tokens.push(Spanned {
                token: Token::Ident(name),
                position,
            });
            continue;
        }

        let next = chars.get(i + 1).copied();
        let (token, width) = match (c, next) {
            ('*', Some('*')) => (Token::DoubleStar, 2),
            ('/', Some('/')) => (Token::DoubleSlash, 2),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('{', _) => (Token::LBrace, 1),
            ('}', _) => (Token::RBrace, 1),
            (',', _) => (Token::Comma, 1),
            (':', _) => (Token::Colon, 1),
            (found, _) => return Err(ExprError::UnexpectedChar { found, position }),
        };
        tokens.push(Spanned { token, position });
        i += width;
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Pos,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

/// A parsed macro expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Parse expression text into a tree.
    pub fn parse(input: &str) -> Result<Expr, ExprError> {
        let tokens = lex(input)?;
        if tokens.is_empty() {
            return Err(ExprError::Empty);
        }
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            end: input.chars().count(),
            depth: 0,
        };
        let expr = parser.parse_expr()?;
        if parser.pos < tokens.len() {
            return Err(parser.unexpected("end of expression"));
        }
        Ok(expr)
    }
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    end: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<(), ExprError> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    /// Count one level of tree depth.
    fn enter(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep);
        }
        Ok(())
    }

    fn unexpected(&self, expected: &'static str) -> ExprError {
        match self.tokens.get(self.pos) {
            Some(spanned) => ExprError::UnexpectedToken {
                found: spanned.token.to_string(),
                expected,
                position: spanned.position,
            },
            None => ExprError::UnexpectedToken {
                found: "end of expression".to_string(),
                expected,
                position: self.end,
            },
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_term()?;
        let mut chained = 0;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => {
                    self.depth -= chained;
                    return Ok(lhs);
                }
            };
            self.pos += 1;
            // Left-associative chains deepen the tree without recursing.
            self.enter()?;
            chained += 1;
            let rhs = self.parse_term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_term(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_unary()?;
        let mut chained = 0;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::DoubleSlash) => BinaryOp::FloorDiv,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => {
                    self.depth -= chained;
                    return Ok(lhs);
                }
            };
            self.pos += 1;
            self.enter()?;
            chained += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        self.enter()?;
        let expr = self.parse_signed();
        self.depth -= 1;
        expr
    }

    fn parse_signed(&mut self) -> Result<Expr, ExprError> {
        let op = match self.peek() {
            Some(Token::Plus) => UnaryOp::Pos,
            Some(Token::Minus) => UnaryOp::Neg,
            _ => return self.parse_power(),
        };
        self.pos += 1;
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_power(&mut self) -> Result<Expr, ExprError> {
        let base = self.parse_postfix()?;
        if self.eat(&Token::DoubleStar) {
            // Right-associative; the exponent may carry its own sign.
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary {
                op: BinaryOp::Pow,
                lhs: Box::new(base),
                rhs: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        if let Some(Token::Ident(name)) = self.peek() {
            let name = name.clone();
            self.pos += 1;
            match name.as_str() {
                "True" | "true" => return Ok(Expr::Bool(true)),
                "False" | "false" => return Ok(Expr::Bool(false)),
                _ => {}
            }
            if !self.eat(&Token::LParen) {
                return Err(ExprError::UnknownName(name));
            }
            let args = self.parse_items(Token::RParen, "')'")?;
            return Ok(Expr::Call { name, args });
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Expr, ExprError> {
        let token = match self.peek() {
            Some(token) => token.clone(),
            None => return Err(self.unexpected("a value")),
        };
        match token {
            Token::Int(n) => {
                self.pos += 1;
                Ok(Expr::Int(n))
            }
            Token::Float(n) => {
                self.pos += 1;
                Ok(Expr::Float(n))
            }
            Token::Str(s) => {
                self.pos += 1;
                Ok(Expr::Str(s))
            }
            Token::LParen => {
                self.pos += 1;
                if self.eat(&Token::RParen) {
                    return Ok(Expr::List(Vec::new()));
                }
                let first = self.parse_expr()?;
                if self.eat(&Token::RParen) {
                    return Ok(first);
                }
                // Tuples evaluate as lists.
                self.expect(Token::Comma, "',' or ')'")?;
                let mut items = vec![first];
                items.extend(self.parse_items(Token::RParen, "')'")?);
                Ok(Expr::List(items))
            }
            Token::LBracket => {
                self.pos += 1;
                let items = self.parse_items(Token::RBracket, "']'")?;
                Ok(Expr::List(items))
            }
            Token::LBrace => {
                self.pos += 1;
                self.parse_map()
            }
            _ => Err(self.unexpected("a value")),
        }
    }

    /// Parse a comma-separated list up to and including `close`.
    /// A trailing comma is accepted.
    fn parse_items(&mut self, close: Token, expected: &'static str) -> Result<Vec<Expr>, ExprError> {
        let mut items = Vec::new();
        loop {
            if self.eat(&close) {
                return Ok(items);
            }
            items.push(self.parse_expr()?);
            if !self.eat(&Token::Comma) {
                self.expect(close, expected)?;
                return Ok(items);
            }
        }
    }

    fn parse_map(&mut self) -> Result<Expr, ExprError> {
        let mut entries = Vec::new();
        loop {
            if self.eat(&Token::RBrace) {
                return Ok(Expr::Map(entries));
            }
            let key = self.parse_expr()?;
            self.expect(Token::Colon, "':'")?;
            let value = self.parse_expr()?;
            entries.push((key, value));
            if !self.eat(&Token::Comma) {
                self.expect(Token::RBrace, "'}'")?;
                return Ok(Expr::Map(entries));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Runtime values
// ---------------------------------------------------------------------------

/// The result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    List(Vec<ExprValue>),
    Map(Vec<(ExprValue, ExprValue)>),
}

impl ExprValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Bool(_) => "bool",
            Self::List(_) => "list",
            Self::Map(_) => "mapping",
        }
    }

    /// Numeric view of the value, if it is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(n) => Some(*n),
            _ => None,
        }
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "'{}'", s),
            other => write!(f, "{}", other),
        }
    }

    pub fn unary(op: UnaryOp, operand: ExprValue) -> Result<ExprValue, ExprError> {
        match (op, operand) {
            (UnaryOp::Pos, v @ (Self::Int(_) | Self::Float(_))) => Ok(v),
            (UnaryOp::Neg, Self::Int(n)) => n.checked_neg().map(Self::Int).ok_or(ExprError::Overflow),
            (UnaryOp::Neg, Self::Float(n)) => Ok(Self::Float(-n)),
            (_, other) => Err(ExprError::Type(format!(
                "bad operand type for unary operator: '{}'",
                other.type_name()
            ))),
        }
    }

    pub fn binary(op: BinaryOp, lhs: ExprValue, rhs: ExprValue) -> Result<ExprValue, ExprError> {
        use ExprValue::*;

        match (op, lhs, rhs) {
            (_, Int(a), Int(b)) => int_binary(op, a, b),
            (_, Int(a), Float(b)) => float_binary(op, a as f64, b),
            (_, Float(a), Int(b)) => float_binary(op, a, b as f64),
            (_, Float(a), Float(b)) => float_binary(op, a, b),
            (BinaryOp::Add, Str(a), Str(b)) => {
                check_string_len(a.len().saturating_add(b.len()))?;
                Ok(Str(a + &b))
            }
            (BinaryOp::Add, List(mut a), List(b)) => {
                a.extend(b);
                Ok(List(a))
            }
            (BinaryOp::Mul, Str(s), Int(n)) | (BinaryOp::Mul, Int(n), Str(s)) => {
                let count = usize::try_from(n.max(0)).map_err(|_| ExprError::Overflow)?;
                check_string_len(s.len().saturating_mul(count))?;
                Ok(Str(s.repeat(count)))
            }
            (op, a, b) => Err(ExprError::Type(format!(
                "unsupported operand types for {:?}: '{}' and '{}'",
                op,
                a.type_name(),
                b.type_name()
            ))),
        }
    }
}

fn check_string_len(len: usize) -> Result<(), ExprError> {
    if len > MAX_STRING_LEN {
        return Err(ExprError::TooLarge(len));
    }
    Ok(())
}

fn int_binary(op: BinaryOp, a: i64, b: i64) -> Result<ExprValue, ExprError> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => return float_binary(op, a as f64, b as f64),
        BinaryOp::FloorDiv => {
            if b == 0 {
                return Err(ExprError::DivisionByZero);
            }
            a.checked_div(b).map(|q| {
                // Truncating division; step down when the signs differ.
                if a % b != 0 && (a < 0) != (b < 0) {
                    q - 1
                } else {
                    q
                }
            })
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(ExprError::DivisionByZero);
            }
            a.checked_rem(b).map(|r| if r != 0 && (r < 0) != (b < 0) { r + b } else { r })
        }
        BinaryOp::Pow => {
            if b < 0 {
                return float_binary(op, a as f64, b as f64);
            }
            u32::try_from(b).ok().and_then(|exp| a.checked_pow(exp))
        }
    };
    result.map(ExprValue::Int).ok_or(ExprError::Overflow)
}

fn float_binary(op: BinaryOp, a: f64, b: f64) -> Result<ExprValue, ExprError> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            a / b
        }
        BinaryOp::FloorDiv => {
            if b == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            (a / b).floor()
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            a - b * (a / b).floor()
        }
        BinaryOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            a.powf(b)
        }
    };
    Ok(ExprValue::Float(result))
}

/// Rendering used when a macro result is spliced into template text.
///
/// Integral floats keep a trailing `.0` and booleans are lowercase so that
/// rendered output stays valid JSON/RON.
impl fmt::Display for ExprValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Float(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e16 {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Self::Str(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{}", b),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt_nested(f)?;
                }
                f.write_str("]")
            }
            Self::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    key.fmt_nested(f)?;
                    f.write_str(": ")?;
                    value.fmt_nested(f)?;
                }
                f.write_str("}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Expr>) -> Expr {
        Expr::Call {
            name: name.to_string(),
            args,
        }
    }

    #[test]
    fn parse_arithmetic_precedence() {
        let expr = Expr::parse("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(Expr::Int(1)),
                rhs: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    lhs: Box::new(Expr::Int(2)),
                    rhs: Box::new(Expr::Int(3)),
                }),
            }
        );
    }

    #[test]
    fn power_binds_tighter_than_negation() {
        let expr = Expr::parse("-2 ** 2").unwrap();
        assert!(matches!(expr, Expr::Unary { op: UnaryOp::Neg, .. }));
    }

    #[test]
    fn parse_call_with_mapping_argument() {
        let expr = Expr::parse("choice({1:2})").unwrap();
        assert_eq!(
            expr,
            call("choice", vec![Expr::Map(vec![(Expr::Int(1), Expr::Int(2))])])
        );
    }

    #[test]
    fn parse_tuple_and_list() {
        assert_eq!(
            Expr::parse("(1, 'a')").unwrap(),
            Expr::List(vec![Expr::Int(1), Expr::Str("a".to_string())])
        );
        assert_eq!(
            Expr::parse("['fella', \"guy\",]").unwrap(),
            Expr::List(vec![
                Expr::Str("fella".to_string()),
                Expr::Str("guy".to_string())
            ])
        );
    }

    #[test]
    fn parenthesized_expression_is_not_a_tuple() {
        assert_eq!(Expr::parse("(4)").unwrap(), Expr::Int(4));
    }

    #[test]
    fn parse_float_forms() {
        assert_eq!(Expr::parse("2.5").unwrap(), Expr::Float(2.5));
        assert_eq!(Expr::parse(".5").unwrap(), Expr::Float(0.5));
        assert_eq!(Expr::parse("1e3").unwrap(), Expr::Float(1000.0));
    }

    #[test]
    fn bare_name_rejected() {
        assert!(matches!(
            Expr::parse("os"),
            Err(ExprError::UnknownName(name)) if name == "os"
        ));
    }

    #[test]
    fn attribute_access_rejected() {
        assert!(matches!(
            Expr::parse("x.y"),
            Err(ExprError::UnknownName(_)) | Err(ExprError::UnexpectedChar { .. })
        ));
        assert!(Expr::parse("__import__('os')").is_ok_and(|e| matches!(e, Expr::Call { .. })));
    }

    #[test]
    fn trailing_tokens_rejected() {
        assert!(matches!(
            Expr::parse("1 2"),
            Err(ExprError::UnexpectedToken { position: 2, .. })
        ));
    }

    #[test]
    fn empty_and_unterminated() {
        assert!(matches!(Expr::parse("   "), Err(ExprError::Empty)));
        assert!(matches!(
            Expr::parse("'abc"),
            Err(ExprError::UnterminatedString { position: 0 })
        ));
        assert!(Expr::parse("(1 + 2").is_err());
    }

    #[test]
    fn integer_arithmetic_is_floor_based() {
        use BinaryOp::*;
        assert_eq!(ExprValue::binary(FloorDiv, ExprValue::Int(7), ExprValue::Int(2)).unwrap(), ExprValue::Int(3));
        assert_eq!(ExprValue::binary(FloorDiv, ExprValue::Int(-7), ExprValue::Int(2)).unwrap(), ExprValue::Int(-4));
        assert_eq!(ExprValue::binary(FloorDiv, ExprValue::Int(7), ExprValue::Int(-2)).unwrap(), ExprValue::Int(-4));
        assert_eq!(ExprValue::binary(Mod, ExprValue::Int(-7), ExprValue::Int(3)).unwrap(), ExprValue::Int(2));
        assert_eq!(ExprValue::binary(Mod, ExprValue::Int(7), ExprValue::Int(-3)).unwrap(), ExprValue::Int(-2));
        assert_eq!(ExprValue::binary(Div, ExprValue::Int(7), ExprValue::Int(2)).unwrap(), ExprValue::Float(3.5));
        assert_eq!(ExprValue::binary(Pow, ExprValue::Int(2), ExprValue::Int(10)).unwrap(), ExprValue::Int(1024));
        assert_eq!(ExprValue::binary(Pow, ExprValue::Int(2), ExprValue::Int(-1)).unwrap(), ExprValue::Float(0.5));
    }

    #[test]
    fn arithmetic_errors() {
        use BinaryOp::*;
        assert!(matches!(
            ExprValue::binary(Div, ExprValue::Int(1), ExprValue::Int(0)),
            Err(ExprError::DivisionByZero)
        ));
        assert!(matches!(
            ExprValue::binary(Mul, ExprValue::Int(i64::MAX), ExprValue::Int(2)),
            Err(ExprError::Overflow)
        ));
        assert!(matches!(
            ExprValue::binary(Sub, ExprValue::Str("a".into()), ExprValue::Int(1)),
            Err(ExprError::Type(_))
        ));
    }

    #[test]
    fn string_operations() {
        use BinaryOp::*;
        assert_eq!(
            ExprValue::binary(Add, ExprValue::Str("ab".into()), ExprValue::Str("cd".into())).unwrap(),
            ExprValue::Str("abcd".into())
        );
        assert_eq!(
            ExprValue::binary(Mul, ExprValue::Str("ha".into()), ExprValue::Int(3)).unwrap(),
            ExprValue::Str("hahaha".into())
        );
    }

    #[test]
    fn oversized_strings_are_rejected() {
        use BinaryOp::*;
        assert!(matches!(
            ExprValue::binary(Mul, ExprValue::Str("ab".into()), ExprValue::Int(i64::MAX)),
            Err(ExprError::TooLarge(_))
        ));
        assert!(matches!(
            ExprValue::binary(Mul, ExprValue::Int(10_000_000_000), ExprValue::Str("a".into())),
            Err(ExprError::TooLarge(_))
        ));
        let half = "x".repeat(MAX_STRING_LEN / 2 + 1);
        assert!(matches!(
            ExprValue::binary(Add, ExprValue::Str(half.clone()), ExprValue::Str(half)),
            Err(ExprError::TooLarge(_))
        ));
        assert_eq!(
            ExprValue::binary(Mul, ExprValue::Str("ab".into()), ExprValue::Int(-3)).unwrap(),
            ExprValue::Str(String::new())
        );
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let parens = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        assert!(matches!(Expr::parse(&parens), Err(ExprError::TooDeep)));

        let signs = format!("{}1", "-".repeat(100_000));
        assert!(matches!(Expr::parse(&signs), Err(ExprError::TooDeep)));

        let sum = vec!["1"; 100_000].join(" + ");
        assert!(matches!(Expr::parse(&sum), Err(ExprError::TooDeep)));

        let calls = format!("{}1{}", "choice([".repeat(10_000), "])".repeat(10_000));
        assert!(matches!(Expr::parse(&calls), Err(ExprError::TooDeep)));
    }

    #[test]
    fn moderate_nesting_parses() {
        let parens = format!("{}1{}", "(".repeat(40), ")".repeat(40));
        assert_eq!(Expr::parse(&parens).unwrap(), Expr::Int(1));
        let sum = vec!["1"; 60].join(" + ");
        assert!(Expr::parse(&sum).is_ok());
    }

    #[test]
    fn display_forms() {
        assert_eq!(ExprValue::Int(2).to_string(), "2");
        assert_eq!(ExprValue::Float(2.0).to_string(), "2.0");
        assert_eq!(ExprValue::Float(0.25).to_string(), "0.25");
        assert_eq!(ExprValue::Bool(true).to_string(), "true");
        assert_eq!(ExprValue::Str("wow".into()).to_string(), "wow");
        assert_eq!(
            ExprValue::List(vec![ExprValue::Int(1), ExprValue::Str("a".into())]).to_string(),
            "[1, 'a']"
        );
        assert_eq!(
            ExprValue::Map(vec![(ExprValue::Str("k".into()), ExprValue::Float(1.5))]).to_string(),
            "{'k': 1.5}"
        );
    }
}
