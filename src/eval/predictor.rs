//! Prediction backends for replaying a dataset.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EvalError;

/// Default per-request timeout for [`HttpPredictor`].
pub const DEFAULT_PREDICT_TIMEOUT: Duration = Duration::from_secs(10);

/// What a system under test answered for one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
    pub top_k: Vec<String>,
}

/// Something that maps a query (and optional prior turn) to a label.
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(&self, query: &str, context: Option<&str>) -> Result<Prediction, EvalError>;
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
}

/// Posts `{"query", "context"?}` to an HTTP endpoint.
pub struct HttpPredictor {
    url: String,
    http_client: Client,
}

impl HttpPredictor {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, EvalError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EvalError::RequestFailed(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            url: url.into(),
            http_client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Predictor for HttpPredictor {
    async fn predict(&self, query: &str, context: Option<&str>) -> Result<Prediction, EvalError> {
        let response = self
            .http_client
            .post(&self.url)
            .json(&PredictRequest {
                query,
                context: context.filter(|c| !c.trim().is_empty()),
            })
            .send()
            .await
            .map_err(|e| EvalError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(EvalError::BadStatus {
                code: status.as_u16(),
                message,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| EvalError::InvalidResponse(e.to_string()))?;
        prediction_from_json(&body)
    }
}

/// Reads `intent`/`label`, `confidence` and `top_k`/`topk` from a reply.
///
/// `top_k` entries may be strings or objects carrying `intent` or `label`.
pub fn prediction_from_json(body: &Value) -> Result<Prediction, EvalError> {
    let obj = body
        .as_object()
        .ok_or_else(|| EvalError::InvalidResponse("expected a JSON object".to_string()))?;

    let label = ["intent", "label"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();

    let confidence = obj
        .get("confidence")
        .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        .unwrap_or(0.0);

    let top_k = ["top_k", "topk"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_array))
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(o) => ["intent", "label"]
                        .iter()
                        .find_map(|k| o.get(*k).and_then(Value::as_str))
                        .map(String::from),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Prediction {
        label,
        confidence,
        top_k,
    })
}
