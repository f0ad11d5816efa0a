//! Playset identity, drift detection, and folder resolution.
//!
//! Resolution is relative to a playset and fails only on resource errors or
//! cancellation; content problems surface as conflict units with raised
//! uncertainty. A playset whose stored identity no longer matches the
//! versions' current roots yields a drift outcome instead of a resolution.

use crate::ModLens;
use crate::errors::{LensError, Result};
use content_schema::{ContentClass, FolderSchema, UnitKeyRule, parse_localization};
use content_store::{PlaysetRecord, VersionRecord, hash};
use mod_resolver::{
    Contribution, FolderResolution, ResolverFile, SourceFiles, SourceRef, resolve_contributions,
};
use script_parser::{Assignment, Entry, Op, Scalar, ScalarKind, Span, Value};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Cooperative cancellation flag checked at stage boundaries (per file, per
/// folder). Cancelled resolutions discard partial output; cached bytes and
/// trees populated before the cancel are retained.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A file whose recorded state changed after the playset was created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangedFile {
    pub version_id: i64,
    pub relpath: String,
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftReport {
    pub playset_id: String,
    pub expected_hash: String,
    pub actual_hash: String,
    pub changed: Vec<ChangedFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaysetStatus {
    Current,
    Drifted(DriftReport),
}

/// Outcome of one folder resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveOutcome {
    Complete(FolderResolution),
    Cancelled,
    Drift(DriftReport),
}

/// Outcome of resolving every recognized folder of a playset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaysetResolution {
    Complete(Vec<FolderResolution>),
    Cancelled,
    Drift(DriftReport),
}

/// Enumerated members plus the identity hash of a playset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaysetIdentity {
    pub playset_id: String,
    pub name: String,
    pub versions: Vec<VersionRecord>,
    pub playset_hash: String,
}

pub(crate) fn playset_identity(lens: &ModLens, playset_id: &str) -> Result<PlaysetIdentity> {
    let rec = lens.store.get_playset(playset_id)?;
    let mut versions = Vec::with_capacity(rec.version_ids.len());
    for &id in &rec.version_ids {
        versions.push(lens.store.version(id)?);
    }
    Ok(PlaysetIdentity {
        playset_id: rec.playset_id,
        name: rec.name,
        versions,
        playset_hash: rec.playset_hash,
    })
}

/// Compare the stored playset identity against the versions' current roots.
pub(crate) fn verify_playset(lens: &ModLens, playset_id: &str) -> Result<PlaysetStatus> {
    let rec = lens.store.get_playset(playset_id)?;
    let mut actual_roots = Vec::with_capacity(rec.version_ids.len());
    let mut changed = Vec::new();

    for (&version_id, recorded_root) in rec.version_ids.iter().zip(&rec.version_roots) {
        let actual = lens.store.recompute_version_root(version_id)?;
        if &actual != recorded_root {
            for f in lens.store.changed_files_since(version_id, rec.created_seq)? {
                changed.push(ChangedFile {
                    version_id,
                    relpath: f.relpath,
                    content_hash: f.content_hash,
                });
            }
        }
        actual_roots.push(actual);
    }

    let actual_hash = hash::playset_hash(&actual_roots);
    if actual_hash == rec.playset_hash {
        Ok(PlaysetStatus::Current)
    } else {
        info!(
            "resolve: playset {} drifted ({} changed files)",
            playset_id,
            changed.len()
        );
        Ok(PlaysetStatus::Drifted(DriftReport {
            playset_id: rec.playset_id,
            expected_hash: rec.playset_hash,
            actual_hash,
            changed,
        }))
    }
}

pub(crate) async fn resolve_folder(
    lens: &ModLens,
    playset_id: &str,
    folder: &str,
    cancel: &CancelToken,
) -> Result<ResolveOutcome> {
    if let PlaysetStatus::Drifted(report) = verify_playset(lens, playset_id)? {
        return Ok(ResolveOutcome::Drift(report));
    }
    let rec = lens.store.get_playset(playset_id)?;
    let schema = lens
        .registry
        .for_folder(folder)
        .ok_or_else(|| LensError::UnknownFolder(folder.to_string()))?
        .clone();
    resolve_folder_for(lens, &rec, &schema, cancel).await
}

pub(crate) async fn resolve_playset(
    lens: &ModLens,
    playset_id: &str,
    cancel: &CancelToken,
) -> Result<PlaysetResolution> {
    if let PlaysetStatus::Drifted(report) = verify_playset(lens, playset_id)? {
        return Ok(PlaysetResolution::Drift(report));
    }
    let rec = lens.store.get_playset(playset_id)?;
    let mut folders = Vec::new();
    for schema in lens.registry.schemas() {
        if cancel.is_cancelled() {
            return Ok(PlaysetResolution::Cancelled);
        }
        match resolve_folder_for(lens, &rec, schema, cancel).await? {
            ResolveOutcome::Complete(resolution) => folders.push(resolution),
            ResolveOutcome::Cancelled => return Ok(PlaysetResolution::Cancelled),
            ResolveOutcome::Drift(report) => return Ok(PlaysetResolution::Drift(report)),
        }
    }
    Ok(PlaysetResolution::Complete(folders))
}

async fn resolve_folder_for(
    lens: &ModLens,
    rec: &PlaysetRecord,
    schema: &FolderSchema,
    cancel: &CancelToken,
) -> Result<ResolveOutcome> {
    if schema.unit_key == UnitKeyRule::LocalizationKey {
        return resolve_localization(lens, rec, schema, cancel);
    }

    let mut sources = Vec::with_capacity(rec.version_ids.len());
    for (load_order, &version_id) in rec.version_ids.iter().enumerate() {
        let version = lens.store.version(version_id)?;
        let mut files = Vec::new();
        for f in lens.store.files_under(version_id, &schema.folder_prefix())? {
            if cancel.is_cancelled() {
                return Ok(ResolveOutcome::Cancelled);
            }
            if lens.registry.classify(&f.relpath) != ContentClass::Script {
                continue;
            }
            let Some(content_hash) = f.content_hash else {
                continue;
            };
            let (parsed, _) = lens.parse_cached(&content_hash, &f.relpath).await?;
            files.push(ResolverFile {
                relpath: f.relpath,
                ast: parsed.ast.clone(),
                has_diagnostics: parsed.diag_count > 0,
            });
        }
        sources.push(SourceFiles {
            version_id,
            source_name: version.source_name,
            load_order,
            files,
        });
    }

    let known = known_symbol_names(lens, &rec.version_ids)?;
    let resolution = mod_resolver::resolve_folder(schema, &sources, Some(&known));
    Ok(ResolveOutcome::Complete(resolution))
}

/// Localization resolves from the line-format reader: every line is one
/// per-key contribution.
fn resolve_localization(
    lens: &ModLens,
    rec: &PlaysetRecord,
    schema: &FolderSchema,
    cancel: &CancelToken,
) -> Result<ResolveOutcome> {
    let mut contributions = Vec::new();
    for (load_order, &version_id) in rec.version_ids.iter().enumerate() {
        let version = lens.store.version(version_id)?;
        for f in lens.store.files_under(version_id, &schema.folder_prefix())? {
            if cancel.is_cancelled() {
                return Ok(ResolveOutcome::Cancelled);
            }
            if lens.registry.classify(&f.relpath) != ContentClass::Localization {
                continue;
            }
            let Some(content_hash) = f.content_hash else {
                continue;
            };
            let bytes = lens
                .store
                .get_content(&content_hash)?
                .ok_or_else(|| LensError::MissingContent(content_hash.clone()))?;
            let text = String::from_utf8_lossy(&bytes);
            for entry in parse_localization(&text).entries {
                contributions.push(Contribution {
                    source: SourceRef {
                        version_id,
                        source_name: version.source_name.clone(),
                        load_order,
                        relpath: f.relpath.clone(),
                        line: entry.line,
                    },
                    unit_key: entry.key.clone(),
                    payload: loc_payload(&entry.key, &entry.value, entry.line),
                    has_diagnostics: false,
                });
            }
        }
    }
    Ok(ResolveOutcome::Complete(resolve_contributions(
        schema,
        contributions,
        None,
    )))
}

/// Synthesize a `key = "value"` entry for a localization line so policy
/// application and residuals stay uniform across folders.
fn loc_payload(key: &str, value: &str, line: u32) -> Entry {
    let span = Span::new(line, 1, 0, 0);
    Entry::Assignment(Assignment {
        name: Scalar::new(ScalarKind::Identifier, key, span),
        op: Op::Assign,
        value: Value::Scalar(Scalar::new(ScalarKind::QuotedString, value, span)),
        span,
    })
}

pub(crate) fn known_symbol_names(lens: &ModLens, version_ids: &[i64]) -> Result<HashSet<String>> {
    Ok(lens
        .store
        .symbols_for_versions(version_ids)?
        .into_iter()
        .map(|s| s.name)
        .collect())
}
