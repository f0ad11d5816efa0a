//! Ingestion pipeline for one source root.
//!
//! Steps per file: read → normalize+hash+dedupe → record membership →
//! (script) single-flight parse + extract, or (localization) line-format
//! read → persist extraction rows. Files run concurrently up to the
//! configured worker count; the store serializes writes internally. After
//! the file pass, relpaths that vanished from disk get deletion markers and
//! the version is sealed to its root hash.

use crate::ModLens;
use crate::errors::Result;
use crate::scan::{self, ScannedFile};
use content_schema::{ContentClass, Extraction, SymbolType, extract_file, parse_localization};
use content_store::{RefRow, SymbolRow, ids};
use futures::StreamExt;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestSummary {
    pub version_id: i64,
    pub root_hash: String,
    pub files_seen: usize,
    pub bytes_seen: u64,
    /// Files whose content was already present under another path or source.
    pub deduped: usize,
    /// Trees parsed in this run.
    pub parsed: usize,
    /// Trees served from the persistent cache or a shared flight.
    pub cache_hits: usize,
    pub files_with_diagnostics: usize,
    pub symbols: usize,
    pub references: usize,
    pub skipped_ignored: usize,
    pub skipped_too_big: usize,
}

#[derive(Debug, Default)]
struct FileStats {
    deduped: bool,
    parsed: bool,
    cache_hit: bool,
    diagnostics: bool,
    symbols: usize,
    references: usize,
}

pub(crate) async fn ingest_source(
    lens: &ModLens,
    root: &Path,
    source_name: &str,
    version_tag: &str,
) -> Result<IngestSummary> {
    let root = dunce::canonicalize(root)?;
    let scan_result = scan::scan_source_root(&root, &lens.cfg)?;
    let version_id = lens
        .store
        .create_or_refresh_version(source_name, version_tag)?;

    let workers = lens.cfg.workers.parse_workers;
    let results: Vec<Result<FileStats>> = futures::stream::iter(
        scan_result
            .files
            .iter()
            .map(|file| ingest_one(lens, version_id, file)),
    )
    .buffer_unordered(workers)
    .collect()
    .await;

    let mut summary = IngestSummary {
        version_id,
        files_seen: scan_result.files.len(),
        bytes_seen: scan_result.files.iter().map(|f| f.size).sum(),
        skipped_ignored: scan_result.skipped_ignored,
        skipped_too_big: scan_result.skipped_too_big,
        ..Default::default()
    };
    for result in results {
        let stats = result?;
        summary.deduped += usize::from(stats.deduped);
        summary.parsed += usize::from(stats.parsed);
        summary.cache_hits += usize::from(stats.cache_hit);
        summary.files_with_diagnostics += usize::from(stats.diagnostics);
        summary.symbols += stats.symbols;
        summary.references += stats.references;
    }

    // Relpaths recorded in a previous revision of this version but absent
    // from this scan become deletion markers.
    let scanned: HashSet<&str> = scan_result
        .files
        .iter()
        .map(|f| f.relpath.as_str())
        .collect();
    for existing in lens.store.version_files(version_id)? {
        if !scanned.contains(existing.relpath.as_str()) {
            lens.store.record_file(version_id, &existing.relpath, None)?;
            lens.store
                .replace_extractions(version_id, &existing.relpath, &[], &[])?;
        }
    }

    summary.root_hash = lens.store.seal_version(version_id)?;
    info!(
        "ingest: {source_name} {version_tag} -> version={} files={} parsed={} cached={} symbols={}",
        version_id, summary.files_seen, summary.parsed, summary.cache_hits, summary.symbols
    );
    Ok(summary)
}

async fn ingest_one(lens: &ModLens, version_id: i64, file: &ScannedFile) -> Result<FileStats> {
    let path = file.abs_path.clone();
    let bytes = tokio::task::spawn_blocking(move || std::fs::read(path)).await??;
    let (content_hash, newly_stored) = lens.store.put_content(&bytes)?;
    lens.store
        .record_file(version_id, &file.relpath, Some(&content_hash))?;

    let mut stats = FileStats {
        deduped: !newly_stored,
        ..Default::default()
    };

    match lens.registry.classify(&file.relpath) {
        ContentClass::Script => {
            let (parsed, ran_now) = lens.parse_cached(&content_hash, &file.relpath).await?;
            stats.parsed = ran_now && !parsed.from_cache;
            stats.cache_hit = !stats.parsed;
            stats.diagnostics = parsed.diag_count > 0;
            if let Some(schema) = lens.registry.for_relpath(&file.relpath) {
                let extraction = extract_file(schema, &parsed.ast);
                let (symbols, references) =
                    extraction_rows(version_id, &file.relpath, &extraction);
                stats.symbols = symbols.len();
                stats.references = references.len();
                lens.store
                    .replace_extractions(version_id, &file.relpath, &symbols, &references)?;
            }
        }
        ContentClass::Localization => {
            let text = String::from_utf8_lossy(&bytes);
            let loc = parse_localization(&text);
            let scope = loc
                .language
                .clone()
                .unwrap_or_else(|| "localization".to_string());
            let symbols: Vec<SymbolRow> = loc
                .entries
                .iter()
                .enumerate()
                .map(|(ordinal, entry)| SymbolRow {
                    symbol_id: ids::symbol_row_id(
                        version_id,
                        &file.relpath,
                        SymbolType::LocalizationKey.as_str(),
                        &scope,
                        &entry.key,
                        entry.line,
                        ordinal,
                    ),
                    content_version_id: version_id,
                    relpath: file.relpath.clone(),
                    symbol_type: SymbolType::LocalizationKey.as_str().to_string(),
                    scope: scope.clone(),
                    name: entry.key.clone(),
                    line: entry.line,
                })
                .collect();
            stats.symbols = symbols.len();
            lens.store
                .replace_extractions(version_id, &file.relpath, &symbols, &[])?;
        }
        ContentClass::Opaque => {}
    }
    Ok(stats)
}

/// Convert an extraction into persistable rows with stable ids.
fn extraction_rows(
    version_id: i64,
    relpath: &str,
    extraction: &Extraction,
) -> (Vec<SymbolRow>, Vec<RefRow>) {
    let symbols = extraction
        .symbols
        .iter()
        .enumerate()
        .map(|(ordinal, s)| SymbolRow {
            symbol_id: ids::symbol_row_id(
                version_id,
                relpath,
                s.symbol_type.as_str(),
                &s.scope,
                &s.name,
                s.line,
                ordinal,
            ),
            content_version_id: version_id,
            relpath: relpath.to_string(),
            symbol_type: s.symbol_type.as_str().to_string(),
            scope: s.scope.clone(),
            name: s.name.clone(),
            line: s.line,
        })
        .collect();
    let references = extraction
        .references
        .iter()
        .enumerate()
        .map(|(ordinal, r)| RefRow {
            ref_id: ids::ref_row_id(version_id, relpath, &r.ref_type, &r.name, r.line, ordinal),
            content_version_id: version_id,
            relpath: relpath.to_string(),
            ref_type: r.ref_type.clone(),
            name: r.name.clone(),
            line: r.line,
        })
        .collect();
    (symbols, references)
}
