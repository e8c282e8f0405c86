//! Chat flow integration tests.
//!
//! These tests drive the orchestrator through the HTTP API with a scripted
//! model.

mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::json;

use conduit_agent::{OrchestratorConfig, RetryPolicy};
use conduit_llm::{LlmError, MockModel, MockReply, ModelOutput, ToolCallRequest};

#[tokio::test]
async fn test_chat_endpoint_returns_answer() -> Result<()> {
    let server = common::TestServer::start().await?;

    let resp = server
        .post("/api/v1/chat")
        .json(&json!({ "message": "Hello, world!" }))
        .send()
        .await?;

    assert!(resp.status().is_success(), "Chat request should succeed");
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["answer"], "Test response");
    assert_eq!(body["rounds"], 0);
    assert!(body["session_id"].is_string());
    Ok(())
}

#[tokio::test]
async fn test_chat_echoes_session_id() -> Result<()> {
    let server = common::TestServer::start().await?;
    let session_id = "6f1c1c2e-8f51-4c3b-9a57-0b9a3f3f0d11";

    let body: serde_json::Value = server
        .post("/api/v1/chat")
        .json(&json!({ "message": "hi", "session_id": session_id }))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(body["session_id"], session_id);
    Ok(())
}

#[tokio::test]
async fn test_chat_with_tool_round() -> Result<()> {
    let model = MockModel::new(Vec::new())
        .then_call(vec![ToolCallRequest::new(
            "call_1",
            "web_search",
            json!({"query": "weather in Oslo"}),
        )])
        .then_answer("It is sunny in Oslo.");
    let server = common::TestServer::start_with_model(model).await?;

    let body: serde_json::Value = server
        .post("/api/v1/chat")
        .json(&json!({ "message": "What's the weather in Oslo?" }))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(body["answer"], "It is sunny in Oslo.");
    assert_eq!(body["rounds"], 1);
    Ok(())
}

#[tokio::test]
async fn test_empty_message_is_400() -> Result<()> {
    let server = common::TestServer::start().await?;

    let resp = server
        .post("/api/v1/chat")
        .json(&json!({ "message": "" }))
        .send()
        .await?;

    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["code"], "invalid_input");
    Ok(())
}

#[tokio::test]
async fn test_missing_message_is_400() -> Result<()> {
    let server = common::TestServer::start().await?;

    let resp = server
        .post("/api/v1/chat")
        .json(&json!({ "session_id": "abc" }))
        .send()
        .await?;

    assert_eq!(resp.status().as_u16(), 400);
    Ok(())
}

#[tokio::test]
async fn test_invalid_session_id_is_400() -> Result<()> {
    let server = common::TestServer::start().await?;

    let resp = server
        .post("/api/v1/chat")
        .json(&json!({ "message": "hi", "session_id": "not-a-uuid" }))
        .send()
        .await?;

    assert_eq!(resp.status().as_u16(), 400);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_model_is_502() -> Result<()> {
    let model = Arc::new(MockModel::always_failing(LlmError::unavailable(
        "connection refused",
    )));
    let config = OrchestratorConfig::default().with_retry(RetryPolicy {
        max_retries: 2,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(20),
    });
    let server = common::TestServer::start_with(model.clone(), config).await?;

    let resp = server
        .post("/api/v1/chat")
        .json(&json!({ "message": "hi" }))
        .send()
        .await?;

    assert_eq!(resp.status().as_u16(), 502);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["code"], "upstream_unavailable");
    assert!(!body["message"].as_str().unwrap_or_default().contains("refused"));
    assert_eq!(model.request_count(), 3);
    Ok(())
}

#[tokio::test]
async fn test_turn_limit_is_502() -> Result<()> {
    let model = Arc::new(MockModel::always_calling(vec![ToolCallRequest::new(
        "1",
        "web_search",
        json!({"query": "again"}),
    )]));
    let config = OrchestratorConfig::default().with_max_turns(2);
    let server = common::TestServer::start_with(model, config).await?;

    let resp = server
        .post("/api/v1/chat")
        .json(&json!({ "message": "loop" }))
        .send()
        .await?;

    assert_eq!(resp.status().as_u16(), 502);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["code"], "turn_limit_exceeded");
    Ok(())
}

#[tokio::test]
async fn test_deadline_is_504() -> Result<()> {
    let model = MockModel::new(vec![MockReply::Delayed(
        Duration::from_secs(30),
        Box::new(MockReply::Output(ModelOutput::FinalAnswer("late".into()))),
    )]);
    let server = common::TestServer::start_with_model(model).await?;

    let started = std::time::Instant::now();
    let resp = server
        .post("/api/v1/chat")
        .json(&json!({ "message": "hi", "timeout_secs": 1 }))
        .send()
        .await?;

    assert_eq!(resp.status().as_u16(), 504);
    assert!(started.elapsed() < Duration::from_secs(10));
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["code"], "deadline_exceeded");
    Ok(())
}
