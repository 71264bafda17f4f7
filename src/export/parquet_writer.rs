//! Parquet storage for test-query datasets.
//!
//! One flat row per record in [`COLUMNS`](super::row::COLUMNS) order; tags
//! are a JSON-encoded string column.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, Int32Array, Int64Array, StringArray, StringBuilder, UInt32Array,
    UInt32Builder, UInt8Array, UInt8Builder,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::ExportError;
use crate::export::row::{parse_tags, RowFields};
use crate::generator::TestQueryRecord;

/// Schema of a test-query dataset file.
pub fn dataset_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("query", DataType::Utf8, false),
        Field::new("category", DataType::Utf8, false),
        Field::new("expected_label", DataType::Utf8, false),
        Field::new("domain", DataType::Utf8, false),
        Field::new("difficulty", DataType::UInt8, false),
        Field::new("rationale", DataType::Utf8, false),
        Field::new("tags", DataType::Utf8, false),
        Field::new("context", DataType::Utf8, true),
        Field::new("group_id", DataType::Utf8, true),
        Field::new("step", DataType::UInt32, true),
    ])
}

/// Convert records into an Arrow RecordBatch.
pub fn records_to_record_batch(records: &[TestQueryRecord]) -> Result<RecordBatch, ExportError> {
    let schema = Arc::new(dataset_schema());

    let mut id = StringBuilder::new();
    let mut query = StringBuilder::new();
    let mut category = StringBuilder::new();
    let mut expected_label = StringBuilder::new();
    let mut domain = StringBuilder::new();
    let mut difficulty = UInt8Builder::new();
    let mut rationale = StringBuilder::new();
    let mut tags = StringBuilder::new();
    let mut context = StringBuilder::new();
    let mut group_id = StringBuilder::new();
    let mut step = UInt32Builder::new();

    for record in records {
        id.append_value(&record.id);
        query.append_value(&record.query);
        category.append_value(record.category.as_str());
        expected_label.append_value(&record.expected_label);
        domain.append_value(&record.domain);
        difficulty.append_value(record.difficulty);
        rationale.append_value(&record.rationale);
        tags.append_value(serde_json::to_string(&record.tags)?);
        context.append_option(record.context.as_deref());
        group_id.append_option(record.group_id.as_deref());
        step.append_option(record.step);
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(id.finish()),
        Arc::new(query.finish()),
        Arc::new(category.finish()),
        Arc::new(expected_label.finish()),
        Arc::new(domain.finish()),
        Arc::new(difficulty.finish()),
        Arc::new(rationale.finish()),
        Arc::new(tags.finish()),
        Arc::new(context.finish()),
        Arc::new(group_id.finish()),
        Arc::new(step.finish()),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

/// Write records to a Parquet file on disk.
pub fn write_parquet(records: &[TestQueryRecord], output_path: &Path) -> Result<(), ExportError> {
    if records.is_empty() {
        return Err(ExportError::NoRecords);
    }

    let batch = records_to_record_batch(records)?;

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::File::create(output_path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(Default::default()))
        .build();

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    tracing::info!(
        path = %output_path.display(),
        rows = records.len(),
        "Parquet file written"
    );

    Ok(())
}

/// Read records from a Parquet file.
///
/// Accepts the legacy column names `case_id`, `test_type`,
/// `expected_intent` and `design_logic`. Rows with an unknown category are
/// dropped.
pub fn read_parquet(input_path: &Path) -> Result<Vec<TestQueryRecord>, ExportError> {
    let file = std::fs::File::open(input_path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut records = Vec::new();
    let mut row_number = 0usize;

    for batch_result in reader {
        let batch = batch_result?;
        let num_rows = batch.num_rows();

        let get_string = |names: &[&str]| -> Vec<Option<String>> {
            names
                .iter()
                .find_map(|name| {
                    batch
                        .column_by_name(name)
                        .and_then(|col| col.as_any().downcast_ref::<StringArray>())
                })
                .map(|arr| {
                    (0..num_rows)
                        .map(|i| (!arr.is_null(i)).then(|| arr.value(i).to_string()))
                        .collect()
                })
                .unwrap_or_else(|| vec![None; num_rows])
        };

        let get_int = |name: &str| -> Vec<Option<i64>> {
            let Some(col) = batch.column_by_name(name) else {
                return vec![None; num_rows];
            };
            let any = col.as_any();
            (0..num_rows)
                .map(|i| {
                    if col.is_null(i) {
                        return None;
                    }
                    if let Some(arr) = any.downcast_ref::<UInt8Array>() {
                        Some(i64::from(arr.value(i)))
                    } else if let Some(arr) = any.downcast_ref::<UInt32Array>() {
                        Some(i64::from(arr.value(i)))
                    } else if let Some(arr) = any.downcast_ref::<Int32Array>() {
                        Some(i64::from(arr.value(i)))
                    } else {
                        any.downcast_ref::<Int64Array>().map(|arr| arr.value(i))
                    }
                })
                .collect()
        };

        let ids = get_string(&["id", "case_id"]);
        let queries = get_string(&["query"]);
        let categories = get_string(&["category", "test_type"]);
        let labels = get_string(&["expected_label", "expected_intent"]);
        let domains = get_string(&["domain"]);
        let rationales = get_string(&["rationale", "design_logic"]);
        let tags = get_string(&["tags"]);
        let contexts = get_string(&["context"]);
        let group_ids = get_string(&["group_id"]);
        let difficulties = get_int("difficulty");
        let steps = get_int("step");

        for i in 0..num_rows {
            row_number += 1;
            let fields = RowFields {
                id: ids[i].clone(),
                query: queries[i].clone(),
                category: categories[i].clone(),
                expected_label: labels[i].clone(),
                domain: domains[i].clone(),
                difficulty: difficulties[i].and_then(|d| u8::try_from(d).ok()),
                rationale: rationales[i].clone(),
                tags: tags[i].as_deref().map(parse_tags).unwrap_or_default(),
                context: contexts[i].clone(),
                group_id: group_ids[i].clone(),
                step: steps[i].and_then(|s| u32::try_from(s).ok()),
            };
            if let Some(record) = fields.into_record(row_number) {
                records.push(record);
            }
        }
    }

    tracing::info!(
        path = %input_path.display(),
        rows = records.len(),
        "Parquet file read"
    );

    Ok(records)
}
