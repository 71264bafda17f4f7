//! Live tests against a real OpenAI-compatible backend.
//!
//! Run with: LLM_API_KEY=... LLM_BASE_URL=... LLM_MODEL=... cargo test --test llm_integration -- --ignored

use std::sync::Arc;
use std::time::Duration;

use query_forge::categories::Category;
use query_forge::llm::{GenerationRequest, LlmProvider, Message, OpenAiCompatClient};
use query_forge::pipeline::{GenerationRun, QuotaSpec, RunConfig};

fn env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| panic!("{} must be set for integration tests", key))
}

fn create_test_client() -> OpenAiCompatClient {
    OpenAiCompatClient::new(
        env("LLM_BASE_URL"),
        env("LLM_API_KEY"),
        env("LLM_MODEL"),
        Duration::from_secs(60),
    )
    .expect("client should build")
}

#[tokio::test]
#[ignore] // Run with: cargo test --test llm_integration -- --ignored
async fn test_simple_generation() {
    let client = create_test_client();
    let request = GenerationRequest::new(
        env("LLM_MODEL"),
        vec![
            Message::system("You are a helpful assistant. Reply concisely."),
            Message::user("What is 2 + 2? Reply with just the number."),
        ],
    )
    .with_max_tokens(10)
    .with_temperature(0.0);

    let response = client.generate(request).await;
    assert!(response.is_ok(), "Generation failed: {:?}", response.err());
    let response = response.expect("Should have response");
    let content = response.first_content().expect("Should have content");
    assert!(content.contains('4'), "Response should contain '4', got: {}", content);
}

#[tokio::test]
#[ignore]
async fn test_small_generation_run() {
    let config = RunConfig::new()
        .with_scenario("车载语音助手，支持导航、音乐和空调控制")
        .with_backend(env("LLM_BASE_URL"), env("LLM_API_KEY"), env("LLM_MODEL"))
        .with_quotas(QuotaSpec::Explicit(vec![(Category::Base, 3), (Category::Typo, 2)]))
        .with_backend_timeout(Duration::from_secs(60));
    let run = GenerationRun::new(config, Arc::new(create_test_client())).expect("valid config");

    let output = run.run().await.expect("run should finish");
    assert!(!output.taxonomy.domains.is_empty());
    assert!(!output.dataset.is_empty(), "report: {}", output.report.shortfall_summary());
    for record in &output.dataset.records {
        let len = record.query.chars().count();
        assert!((4..=40).contains(&len), "out of bounds: {}", record.query);
    }
}
