//! Folder schema registry and per-folder extraction.
//!
//! A closed set of recognized folders maps each relpath to a symbol type, a
//! scope rule, a merge policy, reference-emission patterns, and a unit-key
//! rule. Extraction walks a parsed tree once per file; localization files
//! use a dedicated line-format reader instead.

pub mod extract;
pub mod localization;
pub mod registry;
pub mod types;

pub use extract::{Extraction, ReferenceRecord, SymbolRecord, UnitSlice, extract_file, unit_slices};
pub use localization::{LocEntry, LocFile, parse_localization};
pub use registry::{ContentClass, SchemaRegistry};
pub use types::{FolderSchema, MergePolicy, RefPattern, ScopeRule, SymbolType, UnitKeyRule};
