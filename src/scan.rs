//! Filesystem scanning of a source root (base game or one mod).
//!
//! Walks the directory, applies the ignore globs and the size cap, and
//! normalizes relative paths to `/` separators so they are stable across
//! platforms. The file list is sorted by relpath so downstream stages see a
//! deterministic order.

use crate::config::LensConfig;
use crate::errors::{LensError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub abs_path: PathBuf,
    /// Root-relative path with `/` separators.
    pub relpath: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct ScanResult {
    pub root: PathBuf,
    pub files: Vec<ScannedFile>,
    pub skipped_ignored: usize,
    pub skipped_too_big: usize,
}

pub fn scan_source_root(root: &Path, cfg: &LensConfig) -> Result<ScanResult> {
    if !root.exists() {
        return Err(LensError::MissingRoot(root.display().to_string()));
    }
    info!("scan: start -> {}", root.display());

    let ignore_globs = build_globset(&cfg.filters.ignore_globs);

    let mut skipped_ignored = 0usize;
    let mut skipped_too_big = 0usize;
    let mut files = Vec::<ScannedFile>::new();

    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(keep_entry);

    for entry in walker.filter_map(std::result::Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relpath = match path.strip_prefix(root) {
            Ok(rel) => to_unix_sep(&rel.to_string_lossy()),
            Err(_) => continue,
        };

        if is_ignored_by(&relpath, ignore_globs.as_ref()) {
            skipped_ignored += 1;
            debug!("scan: ignore (glob) {}", relpath);
            continue;
        }

        let meta = match fs::metadata(path) {
            Ok(m) => m,
            Err(err) => {
                warn!("scan: metadata failed for {}: {}", path.display(), err);
                continue;
            }
        };
        let size = meta.len();
        if size as usize > cfg.limits.max_file_bytes {
            skipped_too_big += 1;
            debug!(
                "scan: skip (size {} > max {}) {}",
                size, cfg.limits.max_file_bytes, relpath
            );
            continue;
        }

        files.push(ScannedFile {
            abs_path: path.to_path_buf(),
            relpath,
            size,
        });
    }

    files.sort_by(|a, b| a.relpath.cmp(&b.relpath));
    info!(
        "scan: done, total={} (ignored={}, too_big={})",
        files.len(),
        skipped_ignored,
        skipped_too_big
    );

    Ok(ScanResult {
        root: root.to_path_buf(),
        files,
        skipped_ignored,
        skipped_too_big,
    })
}

/// Coarse directory filter to avoid descending into vendor/editor folders.
fn keep_entry(entry: &DirEntry) -> bool {
    if entry.file_type().is_dir() {
        if let Some(name) = entry.file_name().to_str() {
            return !matches!(name, ".git" | ".svn" | ".idea" | ".vscode");
        }
    }
    true
}

/// Replace OS-specific separators with `/`.
pub fn to_unix_sep(s: &str) -> String {
    s.replace('\\', "/")
}

/// Build a [`GlobSet`] from patterns, skipping invalid or empty ones.
fn build_globset(patterns: &[String]) -> Option<GlobSet> {
    if patterns.is_empty() {
        return None;
    }
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        if pat.trim().is_empty() {
            continue;
        }
        if let Ok(g) = Glob::new(pat) {
            builder.add(g);
        }
    }
    builder.build().ok()
}

fn is_ignored_by(relpath: &str, set: Option<&GlobSet>) -> bool {
    set.is_some_and(|gs| gs.is_match(relpath))
}
