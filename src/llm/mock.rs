//! Scripted provider for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::client::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};
use crate::error::LlmError;

/// One scripted backend outcome.
#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(String),
    Fail(LlmError),
    /// Sleeps far longer than any test timeout.
    Hang,
}

/// Replays outcomes in order, then repeats `fallback` forever.
pub struct MockLlmProvider {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Scripted,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockLlmProvider {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Scripted::Reply("[]".to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider that always returns `reply`.
    pub fn always(reply: impl Into<String>) -> Self {
        Self::new(vec![]).with_fallback(Scripted::Reply(reply.into()))
    }

    pub fn with_fallback(mut self, fallback: Scripted) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("lock poisoned").len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        self.requests.lock().expect("lock poisoned").push(request);
        let next = self
            .script
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match next {
            Scripted::Reply(content) => Ok(GenerationResponse {
                id: "test-id".to_string(),
                model: "test-model".to_string(),
                choices: vec![Choice {
                    index: 0,
                    message: Message::assistant(content),
                    finish_reason: "stop".to_string(),
                }],
                usage: Usage::default(),
            }),
            Scripted::Fail(err) => Err(err),
            Scripted::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(LlmError::RequestFailed("unreachable".to_string()))
            }
        }
    }
}

/// Renders `queries` as the JSON array a well-behaved backend would return.
pub fn reply_with(queries: &[&str]) -> String {
    let items: Vec<serde_json::Value> = queries
        .iter()
        .map(|q| serde_json::json!({"query": q, "expected_label": "test_intent"}))
        .collect();
    serde_json::Value::Array(items).to_string()
}
