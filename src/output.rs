//! Output formatting and persistence for query results.
//!
//! Supports pretty JSON printing and CSV append.

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use crate::store::QueueSnapshot;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Prints any result as pretty-printed JSON to stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Appends snapshot rows to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_snapshots(path: &str, rows: &[QueueSnapshot]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = rows.len(), "Appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}
