//! Character-level lexer for the script language.
//!
//! Responsibilities:
//! - Turn a UTF-8 byte stream into a flat token sequence, one state machine
//!   pass, no pattern library;
//! - Never fail: malformed byte runs become [`TokenKind::Invalid`] tokens and
//!   the parser decides whether to recover or report;
//! - Resolve the comparator-in-value-position ambiguity (`a = <= 5`) by
//!   look-ahead to the next non-whitespace byte.
//!
//! A leading UTF-8 byte-order mark is stripped silently. Newlines are emitted
//! as tokens so diagnostics keep their positions, but they carry no
//! grammatical weight.

use crate::span::Span;
use crate::token::{Op, Token, TokenKind};

const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[inline]
fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

#[inline]
fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b':' | b'-') || b >= 0x80
}

#[inline]
fn is_operator_byte(b: u8) -> bool {
    matches!(b, b'=' | b'<' | b'>' | b'?')
}

pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    /// Byte offset where the current line starts; column = pos - line_start + 1.
    line_start: usize,
    /// True right after an operator token: the next scalar-ish token sits in
    /// value position and angle-bracket runs lex as scalars there.
    value_position: bool,
    emitted_eof: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        let stripped = if src.as_bytes().starts_with(BOM) {
            &src[BOM.len()..]
        } else {
            src
        };
        Self {
            src: stripped,
            bytes: stripped.as_bytes(),
            pos: 0,
            line: 1,
            line_start: 0,
            value_position: false,
            emitted_eof: false,
        }
    }

    /// Lex the whole input. The final token is always `Eof`.
    pub fn tokenize(src: &'a str) -> Vec<Token<'a>> {
        Lexer::new(src).collect()
    }

    #[inline]
    fn column_at(&self, pos: usize) -> u32 {
        (pos - self.line_start + 1) as u32
    }

    #[inline]
    fn span_from(&self, start: usize) -> Span {
        Span::new(self.line, self.column_at(start), start, self.pos)
    }

    fn token_from(&self, kind: TokenKind, start: usize) -> Token<'a> {
        Token::new(kind, &self.src[start..self.pos], self.span_from(start))
    }

    fn skip_blanks(&mut self) {
        while let Some(&b) = self.bytes.get(self.pos) {
            match b {
                b' ' | b'\t' | b'\r' => self.pos += 1,
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Option<Token<'a>> {
        self.skip_blanks();

        let start = self.pos;
        let Some(&b) = self.bytes.get(self.pos) else {
            if self.emitted_eof {
                return None;
            }
            self.emitted_eof = true;
            return Some(self.token_from(TokenKind::Eof, start));
        };

        let tok = match b {
            b'\n' => {
                self.pos += 1;
                let tok = Token::new(
                    TokenKind::Newline,
                    "\n",
                    Span::new(self.line, self.column_at(start), start, self.pos),
                );
                self.line += 1;
                self.line_start = self.pos;
                tok
            }
            b'#' => {
                self.pos += 1;
                let content_start = self.pos;
                while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
                    self.pos += 1;
                }
                Token::new(
                    TokenKind::Comment,
                    &self.src[content_start..self.pos],
                    self.span_from(start),
                )
            }
            b'{' => {
                self.pos += 1;
                self.token_from(TokenKind::BraceOpen, start)
            }
            b'}' => {
                self.pos += 1;
                self.token_from(TokenKind::BraceClose, start)
            }
            b'"' => self.quoted_string(),
            b'=' => {
                self.pos += 1;
                if self.bytes.get(self.pos) == Some(&b'=') {
                    self.pos += 1;
                    self.token_from(TokenKind::Operator(Op::Equals), start)
                } else {
                    self.token_from(TokenKind::Operator(Op::Assign), start)
                }
            }
            b'?' => {
                self.pos += 1;
                if self.bytes.get(self.pos) == Some(&b'=') {
                    self.pos += 1;
                    self.token_from(TokenKind::Operator(Op::QuestionEq), start)
                } else {
                    self.token_from(TokenKind::Invalid, start)
                }
            }
            b'<' | b'>' => self.angle_token(),
            b'$' => self.variable_ref(start),
            b'-' => {
                if self.bytes.get(self.pos + 1) == Some(&b'$') {
                    self.pos += 1;
                    self.variable_ref(start)
                } else {
                    self.word(start)
                }
            }
            _ if is_ident_start(b) || b.is_ascii_digit() => self.word(start),
            _ => {
                self.pos += 1;
                self.token_from(TokenKind::Invalid, start)
            }
        };

        match tok.kind {
            TokenKind::Operator(_) => self.value_position = true,
            TokenKind::Newline | TokenKind::Comment => {}
            _ => self.value_position = false,
        }
        Some(tok)
    }

    /// Double-quoted string. Single quotes inside are literal characters; the
    /// string terminates only at `"`, end of line, or end of input. An
    /// unterminated string becomes an `Invalid` token from the opening quote.
    fn quoted_string(&mut self) -> Token<'a> {
        let start = self.pos;
        self.pos += 1;
        let content_start = self.pos;
        while self.pos < self.bytes.len()
            && self.bytes[self.pos] != b'"'
            && self.bytes[self.pos] != b'\n'
        {
            self.pos += 1;
        }
        if self.bytes.get(self.pos) == Some(&b'"') {
            let content_end = self.pos;
            self.pos += 1;
            Token::new(
                TokenKind::QuotedString,
                &self.src[content_start..content_end],
                self.span_from(start),
            )
        } else {
            self.token_from(TokenKind::Invalid, start)
        }
    }

    /// `$NAME$`, optionally already sign-prefixed (the caller consumed `-`).
    /// A reference without its closing `$` before whitespace or end of line is
    /// malformed.
    fn variable_ref(&mut self, start: usize) -> Token<'a> {
        debug_assert_eq!(self.bytes[self.pos], b'$');
        self.pos += 1;
        while self.pos < self.bytes.len() && is_ident_continue(self.bytes[self.pos]) {
            self.pos += 1;
        }
        if self.bytes.get(self.pos) == Some(&b'$') {
            self.pos += 1;
            self.token_from(TokenKind::VariableRef, start)
        } else {
            self.token_from(TokenKind::Invalid, start)
        }
    }

    /// `<`/`>` dispatch. In operator position this is a comparison operator.
    /// In value position the run lexes as a scalar when the next
    /// non-whitespace byte on the line is not an operator byte; end of line
    /// and end of input count as non-operator.
    fn angle_token(&mut self) -> Token<'a> {
        let start = self.pos;
        if self.value_position {
            while self.pos < self.bytes.len()
                && matches!(self.bytes[self.pos], b'<' | b'>' | b'=')
            {
                self.pos += 1;
            }
            let mut look = self.pos;
            while look < self.bytes.len() && matches!(self.bytes[look], b' ' | b'\t' | b'\r') {
                look += 1;
            }
            match self.bytes.get(look) {
                Some(&b) if is_operator_byte(b) => self.token_from(TokenKind::Invalid, start),
                _ => self.token_from(TokenKind::Comparator, start),
            }
        } else {
            let b = self.bytes[self.pos];
            self.pos += 1;
            let op = if self.bytes.get(self.pos) == Some(&b'=') {
                self.pos += 1;
                if b == b'<' { Op::LessEq } else { Op::GreaterEq }
            } else if b == b'<' {
                Op::Less
            } else {
                Op::Greater
            };
            self.token_from(TokenKind::Operator(op), start)
        }
    }

    /// Scan a word run (identifier/number charset, optional leading `-`) and
    /// classify it after the fact. A trailing `%` on a numeric run folds into
    /// a percentage literal.
    fn word(&mut self, start: usize) -> Token<'a> {
        if self.bytes[self.pos] == b'-' {
            self.pos += 1;
        }
        while self.pos < self.bytes.len() && is_ident_continue(self.bytes[self.pos]) {
            self.pos += 1;
        }
        let text = &self.src[start..self.pos];

        let kind = classify_word(text);
        if matches!(kind, TokenKind::Integer | TokenKind::Decimal)
            && self.bytes.get(self.pos) == Some(&b'%')
        {
            self.pos += 1;
            return self.token_from(TokenKind::Percent, start);
        }
        self.token_from(kind, start)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        self.next_token()
    }
}

fn classify_word(text: &str) -> TokenKind {
    let bytes = text.as_bytes();
    let digits = match bytes.first() {
        Some(&b'-') => &bytes[1..],
        _ => bytes,
    };
    if !digits.is_empty() && digits.iter().all(u8::is_ascii_digit) {
        return TokenKind::Integer;
    }
    if let Some(dot) = digits.iter().position(|&b| b == b'.') {
        let (int_part, frac_part) = (&digits[..dot], &digits[dot + 1..]);
        if !int_part.is_empty()
            && !frac_part.is_empty()
            && int_part.iter().all(u8::is_ascii_digit)
            && frac_part.iter().all(u8::is_ascii_digit)
        {
            return TokenKind::Decimal;
        }
    }
    if text == "yes" || text == "no" {
        return TokenKind::Boolean;
    }
    match bytes.first() {
        Some(&b) if is_ident_start(b) || b.is_ascii_digit() => TokenKind::Identifier,
        _ => TokenKind::Invalid,
    }
}
