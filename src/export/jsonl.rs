//! JSON-lines storage, one record object per line.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::ExportError;
use crate::export::row::{JsonRow, RowFields};
use crate::generator::TestQueryRecord;

/// Write any serializable rows as JSON lines.
pub fn write_jsonl<T: Serialize>(rows: &[T], output_path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(std::fs::File::create(output_path)?);
    for row in rows {
        serde_json::to_writer(&mut writer, row)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    tracing::info!(
        path = %output_path.display(),
        rows = rows.len(),
        "JSONL file written"
    );

    Ok(())
}

/// Read records from JSON lines, dropping rows with unknown categories.
///
/// Blank lines are skipped; a line that is not a JSON object is an error.
pub fn read_jsonl(input_path: &Path) -> Result<Vec<TestQueryRecord>, ExportError> {
    let reader = BufReader::new(std::fs::File::open(input_path)?);
    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row: JsonRow = serde_json::from_str(&line).map_err(|e| ExportError::InvalidRow {
            row: index + 1,
            reason: e.to_string(),
        })?;
        if let Some(record) = RowFields::from(row).into_record(index + 1) {
            records.push(record);
        }
    }

    tracing::info!(
        path = %input_path.display(),
        rows = records.len(),
        "JSONL file read"
    );

    Ok(records)
}
