//! Sequential replay of a dataset against a predictor.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use crate::error::ExportError;
use crate::eval::predictor::Predictor;
use crate::generator::TestQueryRecord;

/// The predictor's answer for one record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    #[serde(alias = "case_id")]
    pub id: String,
    #[serde(alias = "intent_pred", default)]
    pub predicted_label: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(alias = "topk", default, deserialize_with = "de_top_k")]
    pub top_k: Vec<String>,
    #[serde(default)]
    pub latency_ms: u64,
    #[serde(alias = "errors", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Accepts a list or a JSON-encoded list string.
fn de_top_k<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TopK {
        List(Vec<String>),
        Encoded(String),
    }
    Ok(match Option::<TopK>::deserialize(deserializer)? {
        Some(TopK::List(items)) => items,
        Some(TopK::Encoded(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
        None => Vec::new(),
    })
}

/// Replays records one at a time.
pub struct EvalRunner {
    predictor: Arc<dyn Predictor>,
}

impl EvalRunner {
    pub fn new(predictor: Arc<dyn Predictor>) -> Self {
        Self { predictor }
    }

    /// Produces one row per record, in record order.
    ///
    /// Predictor failures are recorded in the row's `error` and never stop
    /// the replay.
    pub async fn run(&self, records: &[TestQueryRecord]) -> Vec<PredictionRow> {
        let mut rows = Vec::with_capacity(records.len());
        let mut failures = 0usize;

        for (index, record) in records.iter().enumerate() {
            let started = Instant::now();
            let result = self
                .predictor
                .predict(&record.query, record.context.as_deref())
                .await;
            let row = match result {
                Ok(prediction) => PredictionRow {
                    id: record.id.clone(),
                    predicted_label: prediction.label,
                    confidence: prediction.confidence,
                    top_k: prediction.top_k,
                    latency_ms: started.elapsed().as_millis() as u64,
                    error: None,
                },
                Err(err) => {
                    failures += 1;
                    warn!(id = %record.id, error = %err, "Prediction failed");
                    PredictionRow {
                        id: record.id.clone(),
                        error: Some(err.to_string()),
                        ..PredictionRow::default()
                    }
                }
            };
            debug!(index, id = %row.id, predicted = %row.predicted_label, "Replayed record");
            rows.push(row);
        }

        info!(records = records.len(), failures, "Replay finished");
        rows
    }
}

/// Reads prediction rows from a JSON-lines file.
pub fn read_predictions(path: &Path) -> Result<Vec<PredictionRow>, ExportError> {
    let raw = std::fs::read_to_string(path)?;
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|e| ExportError::InvalidRow {
                row: index + 1,
                reason: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::Category;
    use crate::error::EvalError;
    use crate::eval::predictor::Prediction;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct KeywordPredictor {
        seen_context: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl Predictor for KeywordPredictor {
        async fn predict(&self, query: &str, context: Option<&str>) -> Result<Prediction, EvalError> {
            self.seen_context.lock().unwrap().push(context.map(String::from));
            if query.contains("坏") {
                return Err(EvalError::RequestFailed("connection reset".to_string()));
            }
            let label = if query.contains("导航") { "nav" } else { "other" };
            Ok(Prediction {
                label: label.to_string(),
                confidence: 0.9,
                top_k: vec![label.to_string()],
            })
        }
    }

    fn record(id: &str, query: &str) -> TestQueryRecord {
        TestQueryRecord {
            id: id.to_string(),
            query: query.to_string(),
            category: Category::Base,
            expected_label: "nav".to_string(),
            domain: "导航".to_string(),
            difficulty: 2,
            rationale: String::new(),
            tags: vec![],
            context: None,
            group_id: None,
            step: None,
        }
    }

    #[tokio::test]
    async fn test_replay_records_failures_and_continues() {
        let predictor = Arc::new(KeywordPredictor {
            seen_context: Mutex::new(Vec::new()),
        });
        let mut ctx = record("c", "那明天呢");
        ctx.context = Some("导航到公司".to_string());
        let records = vec![record("a", "导航到银行"), record("b", "坏请求"), ctx];

        let rows = EvalRunner::new(predictor.clone()).run(&records).await;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].predicted_label, "nav");
        assert!(rows[0].error.is_none());
        assert_eq!(rows[1].id, "b");
        assert!(rows[1].error.as_deref().unwrap().contains("connection reset"));
        assert_eq!(rows[1].predicted_label, "");
        assert_eq!(rows[2].predicted_label, "other");
        assert_eq!(
            predictor.seen_context.lock().unwrap()[2].as_deref(),
            Some("导航到公司")
        );
    }

    #[test]
    fn test_read_predictions_accepts_legacy_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preds.jsonl");
        std::fs::write(
            &path,
            "{\"case_id\":\"a\",\"intent_pred\":\"nav\",\"topk\":\"[\\\"nav\\\",\\\"poi\\\"]\",\"errors\":\"\"}\n\
             {\"id\":\"b\",\"predicted_label\":\"x\",\"top_k\":[\"x\"],\"latency_ms\":12}\n",
        )
        .unwrap();
        let rows = read_predictions(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "a");
        assert_eq!(rows[0].top_k, vec!["nav", "poi"]);
        assert_eq!(rows[1].latency_ms, 12);
    }
}
