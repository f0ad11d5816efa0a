//! Deterministic AST serialization for the cache layer.
//!
//! JSON with struct-order fields: the same tree always produces the same
//! bytes, so `(content_hash, parser_version)` cache entries can be compared
//! and rehydrated byte-exactly.

use crate::ast::Ast;

/// Serialize a tree to its canonical cached form.
pub fn to_bytes(ast: &Ast) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(ast)
}

/// Rehydrate a tree from its cached form.
pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Ast> {
    serde_json::from_slice(bytes)
}
