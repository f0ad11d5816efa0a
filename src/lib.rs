//! High-level facade over the mod-content pipeline: ingestion, resolution,
//! and search.
//!
//! This crate wires the script parser, the content-addressed store, the
//! folder schema, the resolver, and the search index into one handle.
//! [`ModLens`] is the single entry point recommended for collaborators
//! (editor bridges, daemons, playset managers): ingest source roots into
//! sealed content versions, stack them into playsets, then resolve folders,
//! search symbols, and read conflict reports against that playset.

pub mod config;
pub mod errors;
pub mod export;
mod ingest;
mod resolve;
pub mod scan;
mod single_flight;

pub use config::LensConfig;
pub use errors::{LensError, Result};
pub use export::export_folder_resolution;
pub use ingest::IngestSummary;
pub use resolve::{
    CancelToken, ChangedFile, DriftReport, PlaysetIdentity, PlaysetResolution, PlaysetStatus,
    ResolveOutcome,
};

pub use content_schema::{SchemaRegistry, SymbolType};
pub use content_store::{ContentStore, PlaysetRecord, RefRow, SymbolRow, VersionRecord};
pub use mod_resolver::{ConflictUnit, FolderResolution, MergeCapability, ResolvedUnit, Uncertainty};
pub use script_parser::PARSER_VERSION;
pub use search_index::{NotExistsReport, SearchIndex, SymbolEntry};

use crate::single_flight::{CachedParse, ParseFlights};
use content_schema::ContentClass;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Conflict queries share the resolution outcome shape: a drifted playset or
/// a cancellation yields no conflict list.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReport {
    Complete(Vec<ConflictUnit>),
    Cancelled,
    Drift(DriftReport),
}

pub struct ModLens {
    pub(crate) store: Arc<ContentStore>,
    pub(crate) registry: SchemaRegistry,
    pub(crate) flights: ParseFlights,
    pub(crate) cfg: LensConfig,
}

impl ModLens {
    /// Open (or create) the store at `db_path` with configuration from the
    /// environment.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let cfg = LensConfig::load_from_env_or_default()?;
        Ok(Self::with_store(Arc::new(ContentStore::open(db_path)?), cfg))
    }

    /// In-memory store with default configuration, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::with_store(
            Arc::new(ContentStore::open_in_memory()?),
            LensConfig::default(),
        ))
    }

    pub fn with_store(store: Arc<ContentStore>, cfg: LensConfig) -> Self {
        Self {
            store,
            registry: SchemaRegistry::standard(),
            flights: ParseFlights::new(),
            cfg,
        }
    }

    /// Parser version for cache-validity checks by external collaborators.
    pub fn parser_version(&self) -> u32 {
        PARSER_VERSION
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn config(&self) -> &LensConfig {
        &self.cfg
    }

    /* ------------------------------ ingest ------------------------------ */

    /// Ingest one source root (base game or one mod) as a sealed content
    /// version. Re-ingesting the same `(source_name, version_tag)` refreshes
    /// the version in place; unchanged files are no-ops.
    ///
    /// # Errors
    /// Returns [`LensError`] on I/O or storage failures. Content problems
    /// (malformed script) never fail ingestion; they surface as per-file
    /// diagnostics in the summary.
    pub async fn ingest_source(
        &self,
        root: impl AsRef<Path>,
        source_name: &str,
        version_tag: &str,
    ) -> Result<IngestSummary> {
        ingest::ingest_source(self, root.as_ref(), source_name, version_tag).await
    }

    /* ----------------------------- playsets ----------------------------- */

    /// Record a playset over sealed versions. Element zero is the base game.
    pub fn create_playset(&self, name: &str, version_ids: &[i64]) -> Result<PlaysetRecord> {
        Ok(self.store.create_playset(name, version_ids)?)
    }

    pub fn playset_identity(&self, playset_id: &str) -> Result<PlaysetIdentity> {
        resolve::playset_identity(self, playset_id)
    }

    /// Compare the stored playset identity against the versions' current
    /// roots; drifted playsets report the changed files.
    pub fn verify_playset(&self, playset_id: &str) -> Result<PlaysetStatus> {
        resolve::verify_playset(self, playset_id)
    }

    /* ---------------------------- resolution ---------------------------- */

    /// Resolve one folder against a playset.
    ///
    /// # Errors
    /// Fails only on resource errors; drift and cancellation are outcomes,
    /// not errors.
    pub async fn resolve_folder(
        &self,
        playset_id: &str,
        folder: &str,
        cancel: &CancelToken,
    ) -> Result<ResolveOutcome> {
        resolve::resolve_folder(self, playset_id, folder, cancel).await
    }

    /// Resolve every recognized folder of a playset.
    pub async fn resolve_playset(
        &self,
        playset_id: &str,
        cancel: &CancelToken,
    ) -> Result<PlaysetResolution> {
        resolve::resolve_playset(self, playset_id, cancel).await
    }

    /* ----------------------------- conflicts ----------------------------- */

    pub async fn conflicts_for_folder(
        &self,
        playset_id: &str,
        folder: &str,
        cancel: &CancelToken,
    ) -> Result<ConflictReport> {
        Ok(match self.resolve_folder(playset_id, folder, cancel).await? {
            ResolveOutcome::Complete(resolution) => ConflictReport::Complete(resolution.conflicts),
            ResolveOutcome::Cancelled => ConflictReport::Cancelled,
            ResolveOutcome::Drift(report) => ConflictReport::Drift(report),
        })
    }

    pub async fn conflicts_for_unit(
        &self,
        playset_id: &str,
        folder: &str,
        unit_key: &str,
        cancel: &CancelToken,
    ) -> Result<ConflictReport> {
        Ok(
            match self.conflicts_for_folder(playset_id, folder, cancel).await? {
                ConflictReport::Complete(conflicts) => ConflictReport::Complete(
                    conflicts
                        .into_iter()
                        .filter(|c| c.unit_key == unit_key)
                        .collect(),
                ),
                other => other,
            },
        )
    }

    pub async fn conflicts_for_playset(
        &self,
        playset_id: &str,
        cancel: &CancelToken,
    ) -> Result<ConflictReport> {
        Ok(match self.resolve_playset(playset_id, cancel).await? {
            PlaysetResolution::Complete(folders) => ConflictReport::Complete(
                folders.into_iter().flat_map(|f| f.conflicts).collect(),
            ),
            PlaysetResolution::Cancelled => ConflictReport::Cancelled,
            PlaysetResolution::Drift(report) => ConflictReport::Drift(report),
        })
    }

    /* ------------------------------- files ------------------------------- */

    /// Content of a file in one version.
    pub fn get_file(&self, version_id: i64, relpath: &str) -> Result<Option<Vec<u8>>> {
        let Some(record) = self.store.file_record(version_id, relpath)? else {
            return Ok(None);
        };
        let Some(content_hash) = record.content_hash.filter(|_| !record.deleted) else {
            return Ok(None);
        };
        Ok(self.store.get_content(&content_hash)?)
    }

    /// Content of a file as the runtime would see it in a playset: the
    /// highest-load-order version carrying the relpath wins; a deletion
    /// marker in a later version falls through to earlier sources.
    pub fn get_file_in_playset(&self, playset_id: &str, relpath: &str) -> Result<Option<Vec<u8>>> {
        let rec = self.store.get_playset(playset_id)?;
        for &version_id in rec.version_ids.iter().rev() {
            if let Some(bytes) = self.get_file(version_id, relpath)? {
                return Ok(Some(bytes));
            }
        }
        Ok(None)
    }

    /* ------------------------------- search ------------------------------ */

    /// Build the playset-scoped search index: symbol names, reference names,
    /// and content words of recognized files.
    pub fn build_search_index(&self, playset_id: &str) -> Result<SearchIndex> {
        let rec = self.store.get_playset(playset_id)?;
        let entries: Vec<SymbolEntry> = self
            .store
            .symbols_for_versions(&rec.version_ids)?
            .into_iter()
            .map(|s| SymbolEntry {
                symbol_type: s.symbol_type,
                scope: s.scope,
                name: s.name,
                version_id: s.content_version_id,
                relpath: s.relpath,
                line: s.line,
            })
            .collect();
        let mut index = SearchIndex::build(entries);
        index.add_reference_names(
            self.store
                .references_for_versions(&rec.version_ids)?
                .into_iter()
                .map(|r| r.name),
        );
        for &version_id in &rec.version_ids {
            for f in self.store.version_files(version_id)? {
                if self.registry.classify(&f.relpath) == ContentClass::Opaque {
                    continue;
                }
                let Some(content_hash) = f.content_hash else {
                    continue;
                };
                if let Some(bytes) = self.store.get_content(&content_hash)? {
                    index.index_content(&f.relpath, &String::from_utf8_lossy(&bytes));
                }
            }
        }
        Ok(index)
    }

    /// Exhaustive adjacency sweep; true only when every pattern mode comes
    /// back empty.
    pub fn confirm_not_exists(
        &self,
        playset_id: &str,
        symbol_type: Option<&str>,
        name: &str,
    ) -> Result<NotExistsReport> {
        let index = self.build_search_index(playset_id)?;
        Ok(search_index::confirm_not_exists(&index, symbol_type, name))
    }

    /// Reference rows with no binding anywhere in the playset.
    pub fn unknown_references(&self, playset_id: &str) -> Result<Vec<RefRow>> {
        let rec = self.store.get_playset(playset_id)?;
        Ok(self.store.unbound_references(&rec.version_ids)?)
    }

    /* ----------------------------- internals ----------------------------- */

    /// Single-flight, cache-backed parse of one payload. The returned flag is
    /// true when this call initiated the flight (as opposed to joining one).
    pub(crate) async fn parse_cached(
        &self,
        content_hash: &str,
        label: &str,
    ) -> Result<(Arc<CachedParse>, bool)> {
        let ran = AtomicBool::new(false);
        let result = self
            .flights
            .get_or_parse((content_hash.to_string(), PARSER_VERSION), || {
                ran.store(true, Ordering::Relaxed);
                let store = self.store.clone();
                let content_hash = content_hash.to_string();
                let label = label.to_string();
                async move {
                    if let Some((bytes, diag_count)) =
                        store.ast_cache_get(&content_hash, PARSER_VERSION)?
                    {
                        match script_parser::serialize::from_bytes(&bytes) {
                            Ok(ast) => {
                                debug!("parse: cache hit for {}", content_hash);
                                return Ok(Arc::new(CachedParse {
                                    ast: Arc::new(ast),
                                    diag_count,
                                    from_cache: true,
                                }));
                            }
                            Err(err) => {
                                warn!("parse: unreadable cache entry for {content_hash}: {err}");
                            }
                        }
                    }
                    let source = store
                        .get_content(&content_hash)?
                        .ok_or_else(|| LensError::MissingContent(content_hash.clone()))?;
                    let parsed = tokio::task::spawn_blocking(move || {
                        let text = String::from_utf8_lossy(&source);
                        script_parser::parse_source(&text, &label)
                    })
                    .await?;
                    let serialized = script_parser::serialize::to_bytes(&parsed.ast)?;
                    let diag_count = parsed.diagnostics.len() as u32;
                    store.ast_cache_put(&content_hash, PARSER_VERSION, &serialized, diag_count)?;
                    Ok(Arc::new(CachedParse {
                        ast: Arc::new(parsed.ast),
                        diag_count,
                        from_cache: false,
                    }))
                }
            })
            .await?;
        Ok((result, ran.load(Ordering::Relaxed)))
    }
}
