//! JSONL export of a folder resolution for downstream tooling.

use crate::errors::Result;
use mod_resolver::{ConflictUnit, FolderResolution, ResolvedUnit};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum ExportRecord<'a> {
    ResolvedUnit(&'a ResolvedUnit),
    ConflictUnit(&'a ConflictUnit),
}

pub struct JsonlWriter {
    w: BufWriter<File>,
}

impl JsonlWriter {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let f = File::create(path)?;
        Ok(Self {
            w: BufWriter::new(f),
        })
    }

    pub fn write_obj<T: Serialize>(&mut self, obj: &T) -> Result<()> {
        serde_json::to_writer(&mut self.w, obj)?;
        self.w.write_all(b"\n")?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.w.flush()?;
        Ok(())
    }
}

/// Write one resolution as JSONL: resolved units first, conflict units after,
/// one object per line, in the resolution's (deterministic) order.
pub fn export_folder_resolution(
    path: impl AsRef<Path>,
    resolution: &FolderResolution,
) -> Result<()> {
    let mut w = JsonlWriter::open(path)?;
    for unit in &resolution.units {
        w.write_obj(&ExportRecord::ResolvedUnit(unit))?;
    }
    for conflict in &resolution.conflicts {
        w.write_obj(&ExportRecord::ConflictUnit(conflict))?;
    }
    w.finish()
}
