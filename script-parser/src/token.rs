//! Token model shared by the lexer and the parser.

use crate::span::Span;
use serde::{Deserialize, Serialize};

/// The closed set of assignment/comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    /// `=`
    Assign,
    /// `==`
    Equals,
    /// `<`
    Less,
    /// `<=`
    LessEq,
    /// `>`
    Greater,
    /// `>=`
    GreaterEq,
    /// `?=`
    QuestionEq,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Assign => "=",
            Op::Equals => "==",
            Op::Less => "<",
            Op::LessEq => "<=",
            Op::Greater => ">",
            Op::GreaterEq => ">=",
            Op::QuestionEq => "?=",
        }
    }
}

/// Kind of a lexed token. Scalar-ish kinds carry their text in [`Token::text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    /// Double-quoted string; `text` holds the content without the quotes.
    QuotedString,
    Integer,
    Decimal,
    /// Numeric literal with a trailing `%`, e.g. `29%`.
    Percent,
    /// `yes` / `no`.
    Boolean,
    /// `$NAME$`, optionally sign-prefixed (`-$NAME$`); `text` holds the raw form.
    VariableRef,
    /// An operator-looking run in value position, e.g. `<=` on the right-hand
    /// side of an assignment. Lexed as a scalar, not an operator.
    Comparator,
    Operator(Op),
    BraceOpen,
    BraceClose,
    /// `#` to end of line; `text` holds the content after the `#`.
    Comment,
    Newline,
    /// Malformed byte run; `text` carries the offending slice.
    Invalid,
    Eof,
}

impl TokenKind {
    /// True for kinds that can stand as a scalar value or an assignment name.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            TokenKind::Identifier
                | TokenKind::QuotedString
                | TokenKind::Integer
                | TokenKind::Decimal
                | TokenKind::Percent
                | TokenKind::Boolean
                | TokenKind::VariableRef
                | TokenKind::Comparator
        )
    }
}

/// A single token. `text` borrows from the source buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub span: Span,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind, text: &'a str, span: Span) -> Self {
        Self { kind, text, span }
    }
}
