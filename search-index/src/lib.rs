//! Playset-scoped symbol search.
//!
//! Five query modes over one in-memory index: exact, prefix, token, flex
//! wildcard, and edit distance ≤ 2 — plus the exhaustive confirm-not-exists
//! sweep whose answer is reproducible by construction.

pub mod fuzzy;
pub mod index;
pub mod patterns;

pub use fuzzy::within_distance;
pub use index::{SearchIndex, SymbolEntry, tokenize, wildcard_match};
pub use patterns::{
    FUZZY_DISTANCE, NotExistsReport, PatternMode, PatternSweep, confirm_not_exists,
    expansion_patterns,
};
