//! On-disk layout of a run and the CSV tables that live in it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::models::{IndexRow, ListingRecord, MacrozoneSummary};

/// Directories for one dated run: raw pages, per-city tables, summary output
#[derive(Debug, Clone)]
pub struct RunLayout {
    pub json_dir: PathBuf,
    pub csv_dir: PathBuf,
    pub out_dir: PathBuf,
}

impl RunLayout {
    pub fn new(data_root: &Path, run_date: &str) -> Self {
        let base = data_root.join("listings").join(run_date);
        Self {
            json_dir: base.join("json"),
            csv_dir: base.join("csv"),
            out_dir: base.join("out"),
        }
    }

    pub fn summary_path(&self) -> PathBuf {
        self.out_dir.join("summary_table.csv")
    }
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory {}", path.display()))
}

/// Files in `dir` with the given extension, sorted by name
pub fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn read_index_table(path: &Path) -> Result<Vec<IndexRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open index table {}", path.display()))?;

    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row.with_context(|| format!("Malformed row in {}", path.display()))?);
    }
    debug!("Loaded {} index rows from {}", rows.len(), path.display());
    Ok(rows)
}

pub fn write_index_table(path: &Path, rows: &[IndexRow]) -> Result<()> {
    write_serialized(path, rows)
}

pub fn read_listings(path: &Path) -> Result<Vec<ListingRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open city table {}", path.display()))?;

    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record.with_context(|| format!("Malformed row in {}", path.display()))?);
    }
    Ok(records)
}

pub fn write_listings(path: &Path, records: &[ListingRecord]) -> Result<()> {
    write_serialized(path, records)
}

pub fn write_summary(path: &Path, rows: &[MacrozoneSummary]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(MacrozoneSummary::header())?;
    for row in rows {
        writer.write_record(row.to_record())?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn write_serialized<T: serde::Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_directory(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
