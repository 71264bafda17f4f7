//! Dataset storage.
//!
//! Records are stored as flat rows (see [`row::COLUMNS`]) in Parquet, CSV or
//! JSON lines; the format is chosen from the file extension.

pub mod csv_writer;
pub mod jsonl;
pub mod parquet_writer;
pub mod row;

use std::path::Path;

pub use csv_writer::{read_csv, write_csv};
pub use jsonl::{read_jsonl, write_jsonl};
pub use parquet_writer::{dataset_schema, read_parquet, records_to_record_batch, write_parquet};
pub use row::COLUMNS;

use crate::error::ExportError;
use crate::generator::TestQueryRecord;

/// On-disk dataset format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Parquet,
    Csv,
    Jsonl,
}

impl DatasetFormat {
    /// Picks the format from a path's extension.
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "parquet" | "pq" => Ok(Self::Parquet),
            "csv" => Ok(Self::Csv),
            "jsonl" | "ndjson" => Ok(Self::Jsonl),
            _ => Err(ExportError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Writes records in the format implied by `path`.
pub fn write_dataset(records: &[TestQueryRecord], path: &Path) -> Result<(), ExportError> {
    match DatasetFormat::from_path(path)? {
        DatasetFormat::Parquet => write_parquet(records, path),
        DatasetFormat::Csv => write_csv(records, path),
        DatasetFormat::Jsonl => {
            if records.is_empty() {
                return Err(ExportError::NoRecords);
            }
            write_jsonl(records, path)
        }
    }
}

/// Reads records in the format implied by `path`.
pub fn read_dataset(path: &Path) -> Result<Vec<TestQueryRecord>, ExportError> {
    match DatasetFormat::from_path(path)? {
        DatasetFormat::Parquet => read_parquet(path),
        DatasetFormat::Csv => read_csv(path),
        DatasetFormat::Jsonl => read_jsonl(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::Category;

    #[test]
    fn test_format_from_path() {
        assert_eq!(DatasetFormat::from_path(Path::new("a/b.parquet")).unwrap(), DatasetFormat::Parquet);
        assert_eq!(DatasetFormat::from_path(Path::new("b.CSV")).unwrap(), DatasetFormat::Csv);
        assert_eq!(DatasetFormat::from_path(Path::new("b.jsonl")).unwrap(), DatasetFormat::Jsonl);
        assert!(matches!(
            DatasetFormat::from_path(Path::new("b.xlsx")),
            Err(ExportError::UnsupportedFormat(_))
        ));
        assert!(DatasetFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_dispatch_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![TestQueryRecord {
            id: "TYPO-12345678".to_string(),
            query: "到行银的路线".to_string(),
            category: Category::Typo,
            expected_label: "nav.route".to_string(),
            domain: "导航".to_string(),
            difficulty: 2,
            rationale: String::new(),
            tags: vec![],
            context: None,
            group_id: None,
            step: None,
        }];
        for name in ["d.parquet", "d.csv", "d.jsonl"] {
            let path = dir.path().join(name);
            write_dataset(&records, &path).unwrap();
            assert_eq!(read_dataset(&path).unwrap(), records, "{}", name);
        }
        assert!(matches!(
            write_dataset(&[], &dir.path().join("e.jsonl")),
            Err(ExportError::NoRecords)
        ));
    }
}
