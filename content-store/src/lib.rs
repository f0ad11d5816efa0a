//! Content-addressed store for game/mod content.
//!
//! A file is a path within a content version; a payload is identified by the
//! SHA-256 of its normalized bytes and stored exactly once. Versions seal to
//! a root hash over their manifest; playsets stack sealed versions and hash
//! the ordered roots. Parsed trees are cached under
//! `(content_hash, parser_version)` and survive playset reconstruction.

pub mod errors;
pub mod hash;
pub mod ids;
pub mod model;
pub mod normalize;
pub mod store;

pub use errors::{Result, StoreError};
pub use model::{FileRecord, PlaysetRecord, RefRow, SymbolRow, VersionRecord};
pub use store::ContentStore;
