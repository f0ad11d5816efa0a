//! Pipeline configuration.
//!
//! Grouped into filters (what to skip while scanning), limits (file size),
//! and workers (parse parallelism). Loading from the environment is
//! intentionally tolerant: unknown variables are ignored and parse failures
//! fall back to defaults; `validate` then enforces sane values.
//!
//! Supported ENV vars (all optional):
//! - `MODLENS_MAX_FILE_BYTES`   (usize)
//! - `MODLENS_WORKERS`          (usize)
//! - `MODLENS_IGNORE_GLOBS`     (comma-separated)

use crate::errors::{LensError, Result};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LensConfig {
    pub filters: Filters,
    pub limits: Limits,
    pub workers: Workers,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            filters: Filters::default(),
            limits: Limits::default(),
            workers: Workers::default(),
        }
    }
}

impl LensConfig {
    /// Load from ENV variables, falling back to defaults.
    pub fn load_from_env_or_default() -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(v) = env_usize("MODLENS_MAX_FILE_BYTES") {
            cfg.limits.max_file_bytes = v;
        }
        if let Some(v) = env_usize("MODLENS_WORKERS") {
            cfg.workers.parse_workers = v;
        }
        if let Some(v) = env_list("MODLENS_IGNORE_GLOBS") {
            cfg.filters.ignore_globs = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.limits.max_file_bytes == 0 {
            return Err(LensError::Config(
                "max_file_bytes must be greater than 0".into(),
            ));
        }
        if self.workers.parse_workers == 0 {
            return Err(LensError::Config(
                "parse_workers must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Scan-time filtering rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filters {
    /// Glob patterns for files to skip entirely.
    pub ignore_globs: Vec<String>,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            ignore_globs: vec![
                String::from("**/.git/**"),
                String::from("**/*.tmp"),
                String::from("**/*.bak"),
            ],
        }
    }
}

/// Size limits for ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum file size to ingest (bytes).
    pub max_file_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_bytes: 2 * 1024 * 1024, // 2 MB
        }
    }
}

/// Parallelism bounds for CPU-bound stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workers {
    /// Concurrent parse/extract tasks during ingest.
    pub parse_workers: usize,
}

impl Default for Workers {
    fn default() -> Self {
        Self { parse_workers: 4 }
    }
}

/* ------------------------- ENV helpers ------------------------- */

fn env_usize(key: &str) -> Option<usize> {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_list(key: &str) -> Option<Vec<String>> {
    let raw = env::var(key).ok()?;
    let list = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect::<Vec<_>>();
    Some(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(LensConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut cfg = LensConfig::default();
        cfg.workers.parse_workers = 0;
        assert!(cfg.validate().is_err());
    }
}
