//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use query_forge::llm::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};
use query_forge::LlmError;

/// Replays replies in order, then answers `[]` forever.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replies(replies: &[String]) -> Self {
        Self::new(replies.iter().cloned().map(Ok).collect())
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        self.prompts
            .lock()
            .unwrap()
            .push(request.user_content().unwrap_or_default().to_string());
        let next = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("[]".to_string()))?;
        Ok(GenerationResponse {
            id: "scripted".to_string(),
            model: "scripted-model".to_string(),
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(next),
                finish_reason: "stop".to_string(),
            }],
            usage: Usage::default(),
        })
    }
}

/// A JSON array of candidate objects.
pub fn candidates(queries: &[&str]) -> String {
    let items: Vec<serde_json::Value> = queries
        .iter()
        .map(|q| serde_json::json!({"query": q, "expected_label": "nav.route", "difficulty": 2}))
        .collect();
    serde_json::Value::Array(items).to_string()
}
