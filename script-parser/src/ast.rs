//! AST model produced by the parser.
//!
//! The tree is intentionally small: a root holds entries, an entry is an
//! assignment, a bare value (the list form), or a preserved comment. Blocks
//! keep their original child order and form; consumers decide semantics.
//! Every node type derives `Serialize`/`Deserialize` so a tree can be cached
//! and rehydrated byte-identically for a given parser version.

use crate::span::Span;
use crate::token::Op;
use serde::{Deserialize, Serialize};

/// Scalar kinds mirror the lexer's scalar token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Identifier,
    QuotedString,
    Integer,
    Decimal,
    Percent,
    Boolean,
    /// `$NAME$` or `-$NAME$`; the sign is part of `text`.
    VariableRef,
    /// Operator-looking scalar in value position (`<=`).
    Comparator,
    /// Malformed source preserved verbatim.
    Invalid,
}

/// A leaf value. `text` preserves the source form (strings without quotes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scalar {
    pub kind: ScalarKind,
    pub text: String,
    pub span: Span,
}

impl Scalar {
    pub fn new(kind: ScalarKind, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
        }
    }

    pub fn is_boolean_yes(&self) -> bool {
        self.kind == ScalarKind::Boolean && self.text == "yes"
    }
}

/// Right-hand side of an assignment, or a bare list element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Scalar(Scalar),
    Block(Block),
}

impl Value {
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            Value::Block(_) => None,
        }
    }

    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Value::Block(b) => Some(b),
            Value::Scalar(_) => None,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Value::Scalar(s) => s.span,
            Value::Block(b) => b.span,
        }
    }
}

/// `name OP value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub name: Scalar,
    pub op: Op,
    pub value: Value,
    pub span: Span,
}

/// A preserved `#` comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
    pub span: Span,
}

/// One entry of the root or of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entry {
    Assignment(Assignment),
    Value(Value),
    Comment(Comment),
}

impl Entry {
    pub fn as_assignment(&self) -> Option<&Assignment> {
        match self {
            Entry::Assignment(a) => Some(a),
            _ => None,
        }
    }

    /// Span of the entry; comments and bare values report their own node.
    pub fn span(&self) -> Span {
        match self {
            Entry::Assignment(a) => a.span,
            Entry::Value(v) => v.span(),
            Entry::Comment(c) => c.span,
        }
    }

    pub fn line(&self) -> u32 {
        self.span().line
    }
}

/// Shape of a block's children, ignoring comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockForm {
    Empty,
    /// All entries are bare values.
    List,
    /// All entries are assignments.
    Map,
    /// Both occur.
    Mixed,
}

/// `{ entries… }` preserving child order and form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub entries: Vec<Entry>,
    pub span: Span,
}

impl Block {
    pub fn form(&self) -> BlockForm {
        let mut has_assignment = false;
        let mut has_value = false;
        for e in &self.entries {
            match e {
                Entry::Assignment(_) => has_assignment = true,
                Entry::Value(_) => has_value = true,
                Entry::Comment(_) => {}
            }
        }
        match (has_assignment, has_value) {
            (false, false) => BlockForm::Empty,
            (false, true) => BlockForm::List,
            (true, false) => BlockForm::Map,
            (true, true) => BlockForm::Mixed,
        }
    }

    pub fn assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.entries.iter().filter_map(Entry::as_assignment)
    }

    pub fn bare_values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Value(v) => Some(v),
            _ => None,
        })
    }

    /// First assignment with the given name, if any.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.assignments()
            .find(|a| a.name.text == name)
            .map(|a| &a.value)
    }

    /// Scalar text of a named child, if present and scalar-valued.
    pub fn get_scalar_text(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(Value::as_scalar)
            .map(|s| s.text.as_str())
    }

    /// Walk a child-key path (`["a", "b"]` → `self.a.b`), if every step is a
    /// block holding the next key.
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut value = self.get(first)?;
        for key in rest {
            value = value.as_block()?.get(key)?;
        }
        Some(value)
    }
}

/// Parse result for one source text. The root is an ordered entry sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ast {
    pub entries: Vec<Entry>,
}

impl Ast {
    pub fn assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.entries.iter().filter_map(Entry::as_assignment)
    }
}
