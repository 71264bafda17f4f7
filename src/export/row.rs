//! Flat row shape shared by every storage format.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::categories::Category;
use crate::generator::record::{TestQueryRecord, DEFAULT_DIFFICULTY, DEFAULT_DOMAIN, DEFAULT_LABEL};

/// Column order of every tabular output.
pub const COLUMNS: [&str; 11] = [
    "id",
    "query",
    "category",
    "expected_label",
    "domain",
    "difficulty",
    "rationale",
    "tags",
    "context",
    "group_id",
    "step",
];

/// Loosely-typed row as read from disk, before category validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowFields {
    pub id: Option<String>,
    pub query: Option<String>,
    pub category: Option<String>,
    pub expected_label: Option<String>,
    pub domain: Option<String>,
    pub difficulty: Option<u8>,
    pub rationale: Option<String>,
    pub tags: Vec<String>,
    pub context: Option<String>,
    pub group_id: Option<String>,
    pub step: Option<u32>,
}

impl RowFields {
    /// Builds a record, or `None` when the category is missing or unknown.
    ///
    /// `row` is the 1-based position used in the warning.
    pub fn into_record(self, row: usize) -> Option<TestQueryRecord> {
        let raw_category = self.category.unwrap_or_default();
        let category = match raw_category.parse::<Category>() {
            Ok(c) => c,
            Err(_) => {
                warn!(row, category = %raw_category, "Dropping row with unknown category");
                return None;
            }
        };

        Some(TestQueryRecord {
            id: self.id.unwrap_or_default(),
            query: self.query.unwrap_or_default(),
            category,
            expected_label: non_blank(self.expected_label).unwrap_or_else(|| DEFAULT_LABEL.to_string()),
            domain: non_blank(self.domain).unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
            difficulty: self.difficulty.unwrap_or(DEFAULT_DIFFICULTY),
            rationale: self.rationale.unwrap_or_default(),
            tags: self.tags,
            context: non_blank(self.context),
            group_id: non_blank(self.group_id),
            step: self.step,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parses a tags cell: a JSON array, or a `,`/`|` separated list.
pub fn parse_tags(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if let Ok(tags) = serde_json::from_str::<Vec<String>>(trimmed) {
        return tags;
    }
    trimmed
        .split([',', '|'])
        .map(|t| t.trim().trim_matches(|c| c == '\'' || c == '"' || c == '[' || c == ']'))
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Parses an integer cell that may have been written as a float ("2.0").
pub fn parse_small_int<T: TryFrom<i64>>(raw: &str) -> Option<T> {
    let trimmed = raw.trim();
    let value = trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.round() as i64))?;
    T::try_from(value).ok()
}

/// Row shape for delimited text. Tags are a JSON-encoded array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CsvRow {
    #[serde(default, alias = "case_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default, alias = "test_type")]
    pub category: Option<String>,
    #[serde(default, alias = "expected_intent")]
    pub expected_label: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default, alias = "design_logic")]
    pub rationale: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub step: Option<String>,
}

impl CsvRow {
    pub fn from_record(record: &TestQueryRecord) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: Some(record.id.clone()),
            query: Some(record.query.clone()),
            category: Some(record.category.to_string()),
            expected_label: Some(record.expected_label.clone()),
            domain: Some(record.domain.clone()),
            difficulty: Some(record.difficulty.to_string()),
            rationale: Some(record.rationale.clone()),
            tags: Some(serde_json::to_string(&record.tags)?),
            context: record.context.clone(),
            group_id: record.group_id.clone(),
            step: record.step.map(|s| s.to_string()),
        })
    }
}

impl From<CsvRow> for RowFields {
    fn from(row: CsvRow) -> Self {
        Self {
            id: row.id,
            query: row.query,
            category: row.category,
            expected_label: row.expected_label,
            domain: row.domain,
            difficulty: row.difficulty.as_deref().and_then(parse_small_int),
            rationale: row.rationale,
            tags: row.tags.as_deref().map(parse_tags).unwrap_or_default(),
            context: row.context,
            group_id: row.group_id,
            step: row.step.as_deref().and_then(parse_small_int),
        }
    }
}

/// Row shape for JSON lines. Accepts the same aliases as the CSV reader.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonRow {
    #[serde(default, alias = "case_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default, alias = "test_type")]
    pub category: Option<String>,
    #[serde(default, alias = "expected_intent")]
    pub expected_label: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub difficulty: Option<serde_json::Value>,
    #[serde(default, alias = "design_logic")]
    pub rationale: Option<String>,
    #[serde(default)]
    pub tags: Option<serde_json::Value>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub group_id: Option<serde_json::Value>,
    #[serde(default)]
    pub step: Option<serde_json::Value>,
}

fn json_int<T: TryFrom<i64>>(value: &serde_json::Value) -> Option<T> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .and_then(|i| T::try_from(i).ok()),
        serde_json::Value::String(s) => parse_small_int(s),
        _ => None,
    }
}

impl From<JsonRow> for RowFields {
    fn from(row: JsonRow) -> Self {
        let tags = match row.tags {
            Some(serde_json::Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| match v {
                    serde_json::Value::String(s) => Some(s),
                    serde_json::Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect(),
            Some(serde_json::Value::String(s)) => parse_tags(&s),
            _ => Vec::new(),
        };
        let group_id = match row.group_id {
            Some(serde_json::Value::String(s)) => Some(s),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        Self {
            id: row.id,
            query: row.query,
            category: row.category,
            expected_label: row.expected_label,
            domain: row.domain,
            difficulty: row.difficulty.as_ref().and_then(json_int),
            rationale: row.rationale,
            tags,
            context: row.context,
            group_id,
            step: row.step.as_ref().and_then(json_int),
        }
    }
}
