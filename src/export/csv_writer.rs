//! Delimited-text storage. Tags are stored as a JSON array in one cell.

use std::path::Path;

use crate::error::ExportError;
use crate::export::row::{CsvRow, RowFields};
use crate::generator::TestQueryRecord;

/// Write records to a CSV file with a header row.
pub fn write_csv(records: &[TestQueryRecord], output_path: &Path) -> Result<(), ExportError> {
    if records.is_empty() {
        return Err(ExportError::NoRecords);
    }

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(output_path)?;
    for record in records {
        writer.serialize(CsvRow::from_record(record)?)?;
    }
    writer.flush()?;

    tracing::info!(
        path = %output_path.display(),
        rows = records.len(),
        "CSV file written"
    );

    Ok(())
}

/// Read records from a CSV file, dropping rows with unknown categories.
pub fn read_csv(input_path: &Path) -> Result<Vec<TestQueryRecord>, ExportError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(input_path)?;

    let mut records = Vec::new();
    for (index, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        if let Some(record) = RowFields::from(row).into_record(index + 1) {
            records.push(record);
        }
    }

    tracing::info!(
        path = %input_path.display(),
        rows = records.len(),
        "CSV file read"
    );

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::Category;

    fn record(id: &str, query: &str, category: Category) -> TestQueryRecord {
        TestQueryRecord {
            id: id.to_string(),
            query: query.to_string(),
            category,
            expected_label: "nav.route".to_string(),
            domain: "导航".to_string(),
            difficulty: 3,
            rationale: "直接表达".to_string(),
            tags: vec!["asr".to_string(), "a,b".to_string()],
            context: None,
            group_id: None,
            step: None,
        }
    }

    #[test]
    fn test_csv_round_trip_keeps_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("cases.csv");
        let mut ctx = record("CTX-1", "那明天呢", Category::Ctx);
        ctx.context = Some("明天北京天气怎么样".to_string());
        ctx.group_id = Some("g1".to_string());
        ctx.step = Some(2);
        let records = vec![record("BASE-1", "导航到银行", Category::Base), ctx];

        write_csv(&records, &path).unwrap();
        let header = std::fs::read_to_string(&path).unwrap();
        assert!(header.starts_with(
            "id,query,category,expected_label,domain,difficulty,rationale,tags,context,group_id,step"
        ));

        let back = read_csv(&path).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn test_csv_reader_accepts_legacy_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.csv");
        std::fs::write(
            &path,
            "case_id,query,test_type,expected_intent,design_logic,tags\n\
             A1,打开空调,BASE,climate.on,直接,\"['x']\"\n\
             A2,随便聊聊,CHITCHAT,,,\n\
             A3,关下窗,slang,window.close,,\n",
        )
        .unwrap();
        let records = read_csv(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].expected_label, "climate.on");
        assert_eq!(records[0].rationale, "直接");
        assert_eq!(records[0].tags, vec!["x"]);
        assert_eq!(records[0].domain, "general");
        assert_eq!(records[1].category, Category::Slang);
    }

    #[test]
    fn test_csv_refuses_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_csv(&[], &dir.path().join("x.csv")).unwrap_err();
        assert!(matches!(err, ExportError::NoRecords));
    }
}
