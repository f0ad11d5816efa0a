//! Recursive-descent parser over the token stream.
//!
//! Responsibilities:
//! - Build a best-effort [`Ast`] for any input; content problems become
//!   diagnostics, never errors;
//! - Close unclosed braces at end of input, skip stray closers at root level,
//!   and keep malformed assignments in their position in the parent;
//! - Stay deterministic: the same bytes always yield the same tree.

use crate::ast::{Assignment, Ast, Block, Comment, Entry, Scalar, ScalarKind, Value};
use crate::diag::{Diagnostic, DiagnosticKind};
use crate::lexer::Lexer;
use crate::span::Span;
use crate::token::{Op, Token, TokenKind};
use tracing::debug;

/// Outcome of parsing one source text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFile {
    pub ast: Ast,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse a source text. `source_name` is a label used only for logging; it
/// never influences the produced tree, so identical bytes parse identically
/// regardless of where they live.
pub fn parse_source(src: &str, source_name: &str) -> ParsedFile {
    let tokens = Lexer::tokenize(src);
    let mut parser = Parser {
        tokens,
        pos: 0,
        diags: Vec::new(),
    };
    let entries = parser.parse_entries(true);
    if !parser.diags.is_empty() {
        debug!(
            "parse: {} diagnostic(s) in {}",
            parser.diags.len(),
            source_name
        );
    }
    ParsedFile {
        ast: Ast { entries },
        diagnostics: parser.diags,
    }
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    diags: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    fn current(&self) -> &Token<'a> {
        let idx = self.pos.min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn bump(&mut self) -> Token<'a> {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn skip_newlines(&mut self) {
        while self.current().kind == TokenKind::Newline {
            self.bump();
        }
    }

    fn diag(&mut self, kind: DiagnosticKind, span: Span, message: impl Into<String>) {
        self.diags
            .push(Diagnostic::new(kind, span.line, span.column, message));
    }

    fn parse_entries(&mut self, at_root: bool) -> Vec<Entry> {
        let mut entries = Vec::new();
        loop {
            match self.current().kind {
                TokenKind::Eof => break,
                TokenKind::Newline => {
                    self.bump();
                }
                TokenKind::Comment => {
                    let tok = self.bump();
                    entries.push(Entry::Comment(Comment {
                        text: tok.text.to_string(),
                        span: tok.span,
                    }));
                }
                TokenKind::BraceClose => {
                    if at_root {
                        let tok = self.bump();
                        self.diag(
                            DiagnosticKind::StrayBraceClose,
                            tok.span,
                            "closing brace with no open block",
                        );
                    } else {
                        break;
                    }
                }
                TokenKind::BraceOpen => {
                    let block = self.parse_block();
                    entries.push(Entry::Value(Value::Block(block)));
                }
                kind if kind.is_scalar() => {
                    entries.push(self.scalar_entry());
                }
                TokenKind::Operator(op) => {
                    let tok = self.bump();
                    self.diag(
                        DiagnosticKind::InvalidToken,
                        tok.span,
                        format!("operator `{}` with no left-hand side", op.as_str()),
                    );
                }
                TokenKind::Invalid => {
                    let tok = self.bump();
                    self.diag(
                        DiagnosticKind::InvalidToken,
                        tok.span,
                        format!("malformed input `{}`", tok.text),
                    );
                }
                _ => unreachable!("all non-scalar TokenKind variants are handled above"),
            }
        }
        entries
    }

    /// An entry starting with a scalar: either `name OP rhs` or a bare value.
    /// The operator may sit on a following line.
    fn scalar_entry(&mut self) -> Entry {
        let name_tok = self.bump();
        let name = scalar_from_token(&name_tok);

        let mark = self.pos;
        self.skip_newlines();
        match self.current().kind {
            TokenKind::Operator(op) => {
                self.bump();
                let value = self.parse_rhs();
                let span = Span::cover(&name.span, &value.span());
                Entry::Assignment(Assignment {
                    name,
                    op,
                    value,
                    span,
                })
            }
            TokenKind::Invalid if looks_like_operator(self.current().text) => {
                // Unknown operator: report it, keep the assignment in place
                // with the plain `=` reading.
                let tok = self.bump();
                self.diag(
                    DiagnosticKind::UnknownOperator,
                    tok.span,
                    format!("unknown operator `{}`", tok.text),
                );
                let value = self.parse_rhs();
                let span = Span::cover(&name.span, &value.span());
                Entry::Assignment(Assignment {
                    name,
                    op: Op::Assign,
                    value,
                    span,
                })
            }
            _ => {
                self.pos = mark;
                Entry::Value(Value::Scalar(name))
            }
        }
    }

    fn parse_rhs(&mut self) -> Value {
        self.skip_newlines();
        match self.current().kind {
            TokenKind::BraceOpen => Value::Block(self.parse_block()),
            kind if kind.is_scalar() => {
                let tok = self.bump();
                Value::Scalar(scalar_from_token(&tok))
            }
            TokenKind::Invalid => {
                let tok = self.bump();
                self.diag(
                    DiagnosticKind::InvalidToken,
                    tok.span,
                    format!("malformed value `{}`", tok.text),
                );
                Value::Scalar(Scalar::new(ScalarKind::Invalid, tok.text, tok.span))
            }
            _ => {
                let span = self.current().span;
                self.diag(DiagnosticKind::MissingValue, span, "assignment has no value");
                Value::Scalar(Scalar::new(ScalarKind::Invalid, "", span))
            }
        }
    }

    fn parse_block(&mut self) -> Block {
        let open = self.bump();
        debug_assert_eq!(open.kind, TokenKind::BraceOpen);
        let entries = self.parse_entries(false);
        let span = match self.current().kind {
            TokenKind::BraceClose => {
                let close = self.bump();
                Span::cover(&open.span, &close.span)
            }
            _ => {
                // End of input: close the block implicitly.
                self.diag(
                    DiagnosticKind::UnclosedBrace,
                    open.span,
                    "block is not closed before end of input",
                );
                let end = entries
                    .last()
                    .map(|e| e.span())
                    .unwrap_or(open.span);
                Span::cover(&open.span, &end)
            }
        };
        Block { entries, span }
    }
}

fn scalar_from_token(tok: &Token<'_>) -> Scalar {
    let kind = match tok.kind {
        TokenKind::Identifier => ScalarKind::Identifier,
        TokenKind::QuotedString => ScalarKind::QuotedString,
        TokenKind::Integer => ScalarKind::Integer,
        TokenKind::Decimal => ScalarKind::Decimal,
        TokenKind::Percent => ScalarKind::Percent,
        TokenKind::Boolean => ScalarKind::Boolean,
        TokenKind::VariableRef => ScalarKind::VariableRef,
        TokenKind::Comparator => ScalarKind::Comparator,
        _ => ScalarKind::Invalid,
    };
    Scalar::new(kind, tok.text, tok.span)
}

/// True when a malformed run sits where an operator would: all bytes are
/// operator-ish punctuation.
fn looks_like_operator(text: &str) -> bool {
    !text.is_empty()
        && text
            .bytes()
            .all(|b| matches!(b, b'=' | b'<' | b'>' | b'?' | b'!' | b'~' | b'+' | b'*' | b'/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BlockForm;

    fn parse(src: &str) -> ParsedFile {
        parse_source(src, "test.txt")
    }

    #[test]
    fn parses_nested_blocks() {
        let parsed = parse("brave = { index = 42 opposites = { craven } }");
        assert!(parsed.diagnostics.is_empty());
        let a = parsed.ast.assignments().next().unwrap();
        assert_eq!(a.name.text, "brave");
        let block = a.value.as_block().unwrap();
        assert_eq!(block.get_scalar_text("index"), Some("42"));
        let opposites = block.get("opposites").unwrap().as_block().unwrap();
        assert_eq!(opposites.form(), BlockForm::List);
    }

    #[test]
    fn preserves_entry_order_and_form() {
        let parsed = parse("a = 1\nlist = { x y z }\nmixed = { p = 1 q }");
        let ast = parsed.ast;
        let list = ast
            .assignments()
            .find(|a| a.name.text == "list")
            .unwrap()
            .value
            .as_block()
            .unwrap()
            .clone();
        assert_eq!(list.form(), BlockForm::List);
        let texts: Vec<_> = list
            .bare_values()
            .filter_map(Value::as_scalar)
            .map(|s| s.text.clone())
            .collect();
        assert_eq!(texts, vec!["x", "y", "z"]);
        let mixed = ast
            .assignments()
            .find(|a| a.name.text == "mixed")
            .unwrap()
            .value
            .as_block()
            .unwrap()
            .form();
        assert_eq!(mixed, BlockForm::Mixed);
    }

    #[test]
    fn unclosed_brace_closes_at_eof_with_one_diagnostic() {
        let parsed = parse("outer = { inner = { a = 1 }");
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].kind, DiagnosticKind::UnclosedBrace);
        let outer = parsed.ast.assignments().next().unwrap();
        let block = outer.value.as_block().unwrap();
        assert!(block.get("inner").is_some());
    }

    #[test]
    fn stray_close_at_root_is_reported_and_skipped() {
        let parsed = parse("}\na = 1");
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].kind, DiagnosticKind::StrayBraceClose);
        assert_eq!(parsed.ast.assignments().count(), 1);
    }

    #[test]
    fn unknown_operator_keeps_assignment_in_place() {
        let parsed = parse("a = 1\nb != 2\nc = 3");
        assert!(
            parsed
                .diagnostics
                .iter()
                .any(|d| d.kind == DiagnosticKind::UnknownOperator)
        );
        let names: Vec<_> = parsed.ast.assignments().map(|a| a.name.text.clone()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn operator_may_sit_on_next_line() {
        let parsed = parse("key\n= value");
        assert!(parsed.diagnostics.is_empty());
        let a = parsed.ast.assignments().next().unwrap();
        assert_eq!(a.name.text, "key");
    }

    #[test]
    fn bare_scalars_form_root_list_entries() {
        let parsed = parse("alpha beta gamma");
        assert!(parsed.diagnostics.is_empty());
        assert_eq!(parsed.ast.entries.len(), 3);
        assert!(parsed.ast.assignments().next().is_none());
    }

    #[test]
    fn comments_are_preserved_as_entries() {
        let parsed = parse("# header\na = 1");
        assert!(matches!(parsed.ast.entries[0], Entry::Comment(_)));
    }

    #[test]
    fn all_operators_parse() {
        let parsed = parse("a = 1 b == 2 c < 3 d <= 4 e > 5 f >= 6 g ?= 7");
        assert!(parsed.diagnostics.is_empty());
        let ops: Vec<_> = parsed.ast.assignments().map(|a| a.op).collect();
        assert_eq!(
            ops,
            vec![
                Op::Assign,
                Op::Equals,
                Op::Less,
                Op::LessEq,
                Op::Greater,
                Op::GreaterEq,
                Op::QuestionEq,
            ]
        );
    }

    #[test]
    fn comparator_value_parses_without_diagnostics() {
        let parsed = parse("threshold = <= 5");
        assert!(parsed.diagnostics.is_empty());
        let a = parsed.ast.assignments().next().unwrap();
        let s = a.value.as_scalar().unwrap();
        assert_eq!(s.kind, ScalarKind::Comparator);
        assert_eq!(s.text, "<=");
    }

    #[test]
    fn same_bytes_parse_identically() {
        let src = "x = { a = 1 b = { c d } }\ny ?= -$VAL$\n";
        assert_eq!(parse(src), parse(src));
    }
}
