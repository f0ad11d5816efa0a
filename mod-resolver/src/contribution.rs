//! Contribution model: what one source offers for one unit key.

use script_parser::Entry;
use serde::{Deserialize, Serialize};

/// Source identity and position of a contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub version_id: i64,
    pub source_name: String,
    /// Index in the playset's load order; the base game is zero.
    pub load_order: usize,
    pub relpath: String,
    pub line: u32,
}

/// A `(source, load_order, unit_key, subtree)` tuple supplied to a merge
/// policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub source: SourceRef,
    pub unit_key: String,
    pub payload: Entry,
    /// True when the contributing file parsed with diagnostics; raises the
    /// conflict uncertainty one level.
    pub has_diagnostics: bool,
}
