//! Merge policies and the folder resolver.
//!
//! Policies are a closed tagged set (`OVERRIDE`, `CONTAINER_MERGE`,
//! `PER_KEY_OVERRIDE`, `FIOS`); the resolver applies them over load-ordered
//! contribution sets and emits resolved units with full provenance plus
//! scored conflict units.

pub mod conflict;
pub mod contribution;
pub mod policy;
pub mod resolver;

pub use conflict::{
    ConflictUnit, HotspotFlags, MergeCapability, Uncertainty, build_conflict, domain_weight,
    risk_score,
};
pub use contribution::{Contribution, SourceRef};
pub use policy::{PolicyOutcome, Residual, apply};
pub use resolver::{
    FolderResolution, ResolvedUnit, ResolverFile, SourceFiles, resolve_contributions,
    resolve_folder,
};
