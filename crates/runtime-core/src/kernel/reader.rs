//! S-expression reader: source text to kernel cells.

use std::fmt;

use crate::arena::CellRef;
use crate::fault::FaultCode;
use crate::kernel::make_pair;
use crate::runtime::Runtime;
use crate::value::{self, FALSE_VALUE, IGNORE, INERT, TRUE_VALUE, UNIT};

/// Source location for reader errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    /// 1-indexed line number.
    pub line: usize,
    /// 1-indexed column number.
    pub column: usize,
}

/// Classification of reader errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadErrorKind {
    /// Input ended inside a form; more text may complete it.
    UnexpectedEnd,
    /// A closing delimiter with no open form.
    UnexpectedClose,
    /// A string literal was not terminated.
    UnterminatedString,
    /// An unknown string escape.
    BadEscape(char),
    /// A token that looks numeric but does not parse.
    BadNumber(String),
    /// An unknown `#` literal.
    BadLiteral(String),
    /// A dot in an illegal position.
    ImproperDot,
    /// Allocation failed while building the form.
    Fault(FaultCode),
}

impl fmt::Display for ReadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEnd => write!(f, "unexpected end of input"),
            Self::UnexpectedClose => write!(f, "unexpected ')'"),
            Self::UnterminatedString => write!(f, "unterminated string literal"),
            Self::BadEscape(c) => write!(f, "unknown string escape '\\{c}'"),
            Self::BadNumber(t) => write!(f, "malformed number '{t}'"),
            Self::BadLiteral(t) => write!(f, "unknown literal '{t}'"),
            Self::ImproperDot => write!(f, "misplaced '.'"),
            Self::Fault(code) => write!(f, "{code}"),
        }
    }
}

/// Reader error with source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadError {
    /// Where the error was noticed.
    pub location: SourceLocation,
    /// What went wrong.
    pub kind: ReadErrorKind,
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.location.line, self.location.column, self.kind
        )
    }
}

impl std::error::Error for ReadError {}

/// Cursor over source text producing kernel cells.
#[derive(Debug)]
pub struct Reader<'src> {
    bytes: &'src [u8],
    pos: usize,
    line: usize,
    column: usize,
}

const fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'(' | b')' | b'"' | b';')
}

impl<'src> Reader<'src> {
    /// Opens a reader over source text.
    #[must_use]
    pub const fn new(source: &'src str) -> Self {
        Self {
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Byte offset of the next unread input.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    const fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
        }
    }

    fn error(&self, kind: ReadErrorKind) -> ReadError {
        ReadError {
            location: self.location(),
            kind,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(b)
    }

    fn skip_atmosphere(&mut self) {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                self.bump();
            } else if b == b';' {
                while let Some(c) = self.bump() {
                    if c == b'\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn take_token(&mut self) -> String {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_delimiter(b) {
                break;
            }
            self.bump();
        }
        String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned()
    }

    /// Reads the next form, or `None` at clean end of input.
    ///
    /// # Errors
    ///
    /// Returns a located [`ReadError`]; [`ReadErrorKind::UnexpectedEnd`]
    /// means the text so far is an incomplete prefix of a form.
    pub fn read_form(&mut self, rt: &mut Runtime) -> Result<Option<CellRef>, ReadError> {
        self.skip_atmosphere();
        if self.peek().is_none() {
            return Ok(None);
        }
        self.parse_expr(rt).map(Some)
    }

    fn parse_expr(&mut self, rt: &mut Runtime) -> Result<CellRef, ReadError> {
        self.skip_atmosphere();
        match self.peek() {
            None => Err(self.error(ReadErrorKind::UnexpectedEnd)),
            Some(b'(') => {
                self.bump();
                self.parse_list(rt)
            }
            Some(b')') => Err(self.error(ReadErrorKind::UnexpectedClose)),
            Some(b'"') => {
                self.bump();
                self.parse_string(rt)
            }
            Some(_) => self.parse_atom(rt),
        }
    }

    fn parse_list(&mut self, rt: &mut Runtime) -> Result<CellRef, ReadError> {
        let mut items = Vec::new();
        let mut tail = UNIT;
        loop {
            self.skip_atmosphere();
            match self.peek() {
                None => return Err(self.error(ReadErrorKind::UnexpectedEnd)),
                Some(b')') => {
                    self.bump();
                    break;
                }
                Some(b'.') if self.delimited_dot() => {
                    if items.is_empty() {
                        return Err(self.error(ReadErrorKind::ImproperDot));
                    }
                    self.bump();
                    tail = self.parse_expr(rt)?;
                    self.skip_atmosphere();
                    if self.peek() == Some(b')') {
                        self.bump();
                        break;
                    }
                    return Err(self.error(ReadErrorKind::ImproperDot));
                }
                Some(_) => items.push(self.parse_expr(rt)?),
            }
        }

        let mut list = tail;
        for item in items.into_iter().rev() {
            list = make_pair(rt.arena_mut(), item, list)
                .map_err(|e| self.error(ReadErrorKind::Fault(e)))?;
        }
        Ok(list)
    }

    fn delimited_dot(&self) -> bool {
        self.bytes
            .get(self.pos + 1)
            .is_none_or(|b| is_delimiter(*b))
    }

    fn parse_string(&mut self, rt: &mut Runtime) -> Result<CellRef, ReadError> {
        let mut content = Vec::new();
        loop {
            match self.bump() {
                None => return Err(self.error(ReadErrorKind::UnterminatedString)),
                Some(b'"') => break,
                Some(b'\\') => match self.bump() {
                    None => return Err(self.error(ReadErrorKind::UnterminatedString)),
                    Some(b'"') => content.push(b'"'),
                    Some(b'\\') => content.push(b'\\'),
                    Some(b'n') => content.push(b'\n'),
                    Some(b't') => content.push(b'\t'),
                    Some(b'r') => content.push(b'\r'),
                    Some(other) => {
                        return Err(self.error(ReadErrorKind::BadEscape(char::from(other))))
                    }
                },
                Some(b) => content.push(b),
            }
        }
        value::make_string(rt.arena_mut(), value::StrFamily::Utf8, &content)
            .map_err(|e| self.error(ReadErrorKind::Fault(e)))
    }

    fn parse_atom(&mut self, rt: &mut Runtime) -> Result<CellRef, ReadError> {
        let token = self.take_token();
        debug_assert!(!token.is_empty());

        if token.starts_with('#') {
            return match token.as_str() {
                "#t" => Ok(TRUE_VALUE),
                "#f" => Ok(FALSE_VALUE),
                "#inert" => Ok(INERT),
                "#ignore" => Ok(IGNORE),
                _ => Err(self.error(ReadErrorKind::BadLiteral(token))),
            };
        }

        let numeric = token
            .strip_prefix(['+', '-'])
            .unwrap_or(&token)
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit());
        if numeric {
            let n: i32 = token
                .parse()
                .map_err(|_| self.error(ReadErrorKind::BadNumber(token.clone())))?;
            return value::make_int(rt.arena_mut(), n)
                .map_err(|e| self.error(ReadErrorKind::Fault(e)));
        }

        rt.intern(&token)
            .map_err(|e| self.error(ReadErrorKind::Fault(e)))
    }
}
