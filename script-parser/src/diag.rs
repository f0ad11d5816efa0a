//! Parser diagnostics.
//!
//! The parser never aborts on recoverable mistakes: it records a diagnostic
//! and keeps producing a best-effort tree. Diagnostics carry the position and
//! a short human-readable message.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A block was still open at end of input; it was closed implicitly.
    UnclosedBrace,
    /// A `}` at root level with no open block; skipped.
    StrayBraceClose,
    /// An operator-looking run that is not one of the known operators.
    UnknownOperator,
    /// A malformed byte run the parser could not place.
    InvalidToken,
    /// An assignment with no usable right-hand side.
    MissingValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, line: u32, column: u32, message: impl Into<String>) -> Self {
        Self {
            kind,
            line,
            column,
            message: message.into(),
        }
    }
}
