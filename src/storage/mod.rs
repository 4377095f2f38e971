//! Persistence layer.
//!
//! CSV files for the scorer output, the day's propositions and the
//! append-only bet history. A missing file loads as an empty list; rows
//! that fail to parse are logged and skipped.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::types::{HistoryEntry, Proposition, ValueBetRow};

fn read_records<T: DeserializeOwned>(path: &Path, what: &str) -> Result<Vec<T>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), what, "File not found, treating as empty");
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to open {}", path.display()));
        }
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(file);

    let mut records = Vec::new();
    for (i, result) in reader.deserialize::<T>().enumerate() {
        match result {
            Ok(record) => records.push(record),
            Err(e) => warn!(path = %path.display(), what, row = i + 1, error = %e, "Skipping malformed row"),
        }
    }
    Ok(records)
}

fn write_records<T: Serialize>(path: &Path, records: &[T], what: &str) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for record in records {
        writer
            .serialize(record)
            .with_context(|| format!("Failed to serialise {what}"))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Value bets
// ---------------------------------------------------------------------------

/// Overwrite the value-bet file.
pub fn save_value_bets(path: &Path, rows: &[ValueBetRow]) -> Result<()> {
    write_records(path, rows, "value bet")?;
    info!(path = %path.display(), rows = rows.len(), "Value bets saved");
    Ok(())
}

pub fn load_value_bets(path: &Path) -> Result<Vec<ValueBetRow>> {
    read_records(path, "value bets")
}

// ---------------------------------------------------------------------------
// Propositions
// ---------------------------------------------------------------------------

/// Overwrite the day's propositions (the dashboard export).
pub fn save_propositions(path: &Path, propositions: &[Proposition]) -> Result<()> {
    write_records(path, propositions, "proposition")?;
    info!(path = %path.display(), rows = propositions.len(), "Propositions exported");
    Ok(())
}

pub fn load_propositions(path: &Path) -> Result<Vec<Proposition>> {
    read_records(path, "propositions")
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

pub fn load_history(path: &Path) -> Result<Vec<HistoryEntry>> {
    let entries = read_records(path, "history")?;
    debug!(path = %path.display(), rows = entries.len(), "History loaded");
    Ok(entries)
}

/// Append settled entries. The header is written only when the file is new
/// or empty.
pub fn append_history(path: &Path, entries: &[HistoryEntry]) -> Result<()> {
    if entries.is_empty() {
        return Ok(());
    }
    let needs_header = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {} for append", path.display()))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_header)
        .from_writer(file);

    for entry in entries {
        writer.serialize(entry).context("Failed to serialise history entry")?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), rows = entries.len(), "History appended");
    Ok(())
}

/// Delete a file if present.
pub fn delete_file(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to delete {}", path.display()))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
