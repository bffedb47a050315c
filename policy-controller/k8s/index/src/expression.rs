//! Syntax checks for CEL expressions.
//!
//! Expressions are evaluated by the data plane; the controller only verifies
//! that they are well formed, so a typo surfaces on the policy's status rather
//! than as a rejected configuration downstream.

#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("expression is empty")]
    Empty,

    #[error("unterminated string literal at offset {0}")]
    UnterminatedString(usize),

    #[error("unexpected character {1:?} at offset {0}")]
    UnexpectedChar(usize, char),

    #[error("invalid number {0:?}")]
    InvalidNumber(String),

    #[error("unexpected {found} at offset {offset}; expected {expected}")]
    Unexpected {
        offset: usize,
        found: String,
        expected: &'static str,
    },

    #[error("unexpected end of expression; expected {0}")]
    UnexpectedEnd(&'static str),

    #[error("expression nests too deeply")]
    TooDeep,
}

/// Checks that `expr` parses as a CEL expression.
pub fn check(expr: &str) -> Result<(), ExpressionError> {
    let tokens = lex(expr)?;
    if tokens.is_empty() {
        return Err(ExpressionError::Empty);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    parser.expr()?;
    match parser.peek() {
        None => Ok(()),
        Some(tok) => Err(tok.unexpected("end of expression")),
    }
}

/// Matches the recursion limit of the CEL parser used by the data plane.
const MAX_DEPTH: usize = 250;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Kind<'a> {
    Ident(&'a str),
    Literal,
    Punct(&'static str),
}

#[derive(Clone, Debug)]
struct Token<'a> {
    kind: Kind<'a>,
    offset: usize,
}

const PUNCT: &[&str] = &[
    "==", "!=", "<=", ">=", "&&", "||", "+", "-", "*", "/", "%", "<", ">", "!", "?", ":", ".",
    ",", "[", "]", "(", ")", "{", "}",
];

fn lex(src: &str) -> Result<Vec<Token<'_>>, ExpressionError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if src[i..].starts_with("//") {
            i = src[i..].find('\n').map(|n| i + n).unwrap_or(bytes.len());
            continue;
        }

        let start = i;
        if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let word = &src[start..i];
            let is_prefix = word.len() <= 2 && word.chars().all(|c| "rRbB".contains(c));
            if is_prefix && i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                let raw = word.contains(['r', 'R']);
                i = string(src, i, raw)?;
                tokens.push(Token {
                    kind: Kind::Literal,
                    offset: start,
                });
            } else {
                tokens.push(Token {
                    kind: Kind::Ident(word),
                    offset: start,
                });
            }
            continue;
        }

        if c.is_ascii_digit() || (c == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            i = number(src, i)?;
            tokens.push(Token {
                kind: Kind::Literal,
                offset: start,
            });
            continue;
        }

        if c == b'"' || c == b'\'' {
            i = string(src, i, false)?;
            tokens.push(Token {
                kind: Kind::Literal,
                offset: start,
            });
            continue;
        }

        match PUNCT.iter().find(|p| src[i..].starts_with(**p)) {
            Some(p) => {
                i += p.len();
                tokens.push(Token {
                    kind: Kind::Punct(p),
                    offset: start,
                });
            }
            None => {
                let ch = src[i..].chars().next().unwrap_or_default();
                return Err(ExpressionError::UnexpectedChar(i, ch));
            }
        }
    }
    Ok(tokens)
}

/// Scans a quoted literal starting at `start`, returning the offset after it.
fn string(src: &str, start: usize, raw: bool) -> Result<usize, ExpressionError> {
    let bytes = src.as_bytes();
    let quote = bytes[start];
    let triple = bytes.get(start..start + 3) == Some(&[quote, quote, quote][..]);
    let mut i = if triple { start + 3 } else { start + 1 };
    while i < bytes.len() {
        let c = bytes[i];
        if c == b'\\' && !raw {
            i += 2;
            continue;
        }
        if triple {
            if bytes.get(i..i + 3) == Some(&[quote, quote, quote][..]) {
                return Ok(i + 3);
            }
        } else if c == quote {
            return Ok(i + 1);
        } else if c == b'\n' {
            break;
        }
        i += 1;
    }
    Err(ExpressionError::UnterminatedString(start))
}

/// Scans an int, uint, or float literal starting at `start`.
fn number(src: &str, start: usize) -> Result<usize, ExpressionError> {
    let bytes = src.as_bytes();
    let mut i = start;
    let digits = |i: &mut usize, hex: bool| {
        let from = *i;
        while *i < bytes.len() && (bytes[*i].is_ascii_digit() || (hex && bytes[*i].is_ascii_hexdigit())) {
            *i += 1;
        }
        *i > from
    };

    if src[i..].starts_with("0x") || src[i..].starts_with("0X") {
        i += 2;
        if !digits(&mut i, true) {
            return Err(ExpressionError::InvalidNumber(src[start..i].to_string()));
        }
    } else {
        let int = digits(&mut i, false);
        let mut float = false;
        if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
            i += 1;
            digits(&mut i, false);
            float = true;
        }
        if matches!(bytes.get(i), Some(b'e' | b'E')) {
            i += 1;
            if matches!(bytes.get(i), Some(b'+' | b'-')) {
                i += 1;
            }
            if !digits(&mut i, false) {
                return Err(ExpressionError::InvalidNumber(src[start..i].to_string()));
            }
            float = true;
        }
        if !int && !float {
            return Err(ExpressionError::InvalidNumber(src[start..i].to_string()));
        }
        if float {
            return Ok(i);
        }
    }
    if matches!(bytes.get(i), Some(b'u' | b'U')) {
        i += 1;
    }
    if bytes
        .get(i)
        .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
    {
        let end = src[i..]
            .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .map(|n| i + n)
            .unwrap_or(src.len());
        return Err(ExpressionError::InvalidNumber(src[start..end].to_string()));
    }
    Ok(i)
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    depth: usize,
}

impl<'a> Token<'a> {
    fn unexpected(&self, expected: &'static str) -> ExpressionError {
        let found = match &self.kind {
            Kind::Ident(name) => format!("identifier {name:?}"),
            Kind::Literal => "literal".to_string(),
            Kind::Punct(p) => format!("{p:?}"),
        };
        ExpressionError::Unexpected {
            offset: self.offset,
            found,
            expected,
        }
    }
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn at(&self, p: &str) -> bool {
        matches!(self.peek(), Some(Token { kind: Kind::Punct(q), .. }) if *q == p)
    }

    fn eat(&mut self, p: &str) -> bool {
        let at = self.at(p);
        if at {
            self.pos += 1;
        }
        at
    }

    fn expect(&mut self, p: &'static str) -> Result<(), ExpressionError> {
        if self.eat(p) {
            return Ok(());
        }
        Err(match self.peek() {
            Some(tok) => tok.unexpected(p),
            None => ExpressionError::UnexpectedEnd(p),
        })
    }

    fn expr(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExpressionError::TooDeep);
        }
        self.binary(0)?;
        if self.eat("?") {
            self.binary(0)?;
            self.expect(":")?;
            self.expr()?;
        }
        self.depth -= 1;
        Ok(())
    }

    /// Parses left-associative binary operators, from `||` (level 0) down to
    /// multiplicative operators.
    fn binary(&mut self, level: usize) -> Result<(), ExpressionError> {
        const LEVELS: &[&[&str]] = &[
            &["||"],
            &["&&"],
            &["==", "!=", "<", "<=", ">", ">=", "in"],
            &["+", "-"],
            &["*", "/", "%"],
        ];

        let Some(ops) = LEVELS.get(level) else {
            return self.unary();
        };
        self.binary(level + 1)?;
        loop {
            let matched = match self.peek() {
                Some(Token {
                    kind: Kind::Punct(p),
                    ..
                }) => ops.contains(p),
                Some(Token {
                    kind: Kind::Ident("in"),
                    ..
                }) => ops.contains(&"in"),
                _ => false,
            };
            if !matched {
                return Ok(());
            }
            self.pos += 1;
            self.binary(level + 1)?;
        }
    }

    fn unary(&mut self) -> Result<(), ExpressionError> {
        if self.at("!") || self.at("-") {
            let op = if self.at("!") { "!" } else { "-" };
            while self.eat(op) {}
        }
        self.member()
    }

    fn member(&mut self) -> Result<(), ExpressionError> {
        self.primary()?;
        loop {
            if self.eat(".") {
                self.ident()?;
                if self.eat("(") {
                    self.list(")")?;
                }
            } else if self.eat("[") {
                self.expr()?;
                self.expect("]")?;
            } else {
                return Ok(());
            }
        }
    }

    fn ident(&mut self) -> Result<(), ExpressionError> {
        match self.peek() {
            Some(Token {
                kind: Kind::Ident(name),
                ..
            }) if *name != "in" => {
                self.pos += 1;
                Ok(())
            }
            Some(tok) => Err(tok.unexpected("identifier")),
            None => Err(ExpressionError::UnexpectedEnd("identifier")),
        }
    }

    fn primary(&mut self) -> Result<(), ExpressionError> {
        let Some(tok) = self.peek().cloned() else {
            return Err(ExpressionError::UnexpectedEnd("operand"));
        };
        match tok.kind {
            Kind::Literal => {
                self.pos += 1;
                Ok(())
            }
            Kind::Ident(_) => {
                self.ident()?;
                if self.eat("(") {
                    self.list(")")?;
                }
                Ok(())
            }
            Kind::Punct(".") => {
                self.pos += 1;
                self.ident()?;
                if self.eat("(") {
                    self.list(")")?;
                }
                Ok(())
            }
            Kind::Punct("(") => {
                self.pos += 1;
                self.expr()?;
                self.expect(")")
            }
            Kind::Punct("[") => {
                self.pos += 1;
                self.list("]")
            }
            Kind::Punct("{") => {
                self.pos += 1;
                self.map()
            }
            Kind::Punct(_) => Err(tok.unexpected("operand")),
        }
    }

    /// Comma-separated expressions up to `close`, allowing a trailing comma.
    fn list(&mut self, close: &'static str) -> Result<(), ExpressionError> {
        while !self.eat(close) {
            self.expr()?;
            if !self.eat(",") {
                return self.expect(close);
            }
        }
        Ok(())
    }

    fn map(&mut self) -> Result<(), ExpressionError> {
        while !self.eat("}") {
            self.expr()?;
            self.expect(":")?;
            self.expr()?;
            if !self.eat(",") {
                return self.expect("}");
            }
        }
        Ok(())
    }
}
