//! Row types persisted by the store.

use serde::{Deserialize, Serialize};

/// A sealed (or in-progress) snapshot of one source at one revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: i64,
    pub source_name: String,
    pub version_tag: String,
    /// Set when the version is sealed.
    pub root_hash: Option<String>,
    pub sealed: bool,
}

/// One file membership within a content version. A `deleted` row records
/// that the relpath is absent from this version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub content_version_id: i64,
    pub relpath: String,
    pub content_hash: Option<String>,
    pub deleted: bool,
}

/// An ordered stack of content versions plus the identity hash computed from
/// their roots at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaysetRecord {
    pub playset_id: String,
    pub name: String,
    pub version_ids: Vec<i64>,
    /// Version roots captured when the playset was created; drift detection
    /// compares these against the currently stored roots.
    pub version_roots: Vec<String>,
    pub playset_hash: String,
    /// Store mutation sequence at creation; file rows with a later sequence
    /// are what changed since.
    pub created_seq: i64,
    pub created_at: i64,
}

/// A definition extracted from a parsed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRow {
    pub symbol_id: String,
    pub content_version_id: i64,
    pub relpath: String,
    pub symbol_type: String,
    pub scope: String,
    pub name: String,
    pub line: u32,
}

/// A use-site of a typed symbol name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefRow {
    pub ref_id: String,
    pub content_version_id: i64,
    pub relpath: String,
    pub ref_type: String,
    pub name: String,
    pub line: u32,
}
