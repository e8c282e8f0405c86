//! Discovery and end-to-end runs against an in-process tool server.
//!
//! The server speaks MCP on `/mcp` and also answers chat completions for
//! deployment tools.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use conduit_agent::{
    AgentError, INTERPRETER_OUTPUT_LIMIT, Orchestrator, ToolKind, ToolSpec, TurnRequest, discover,
};
use conduit_llm::{FailureKind, MockModel, ToolCallRequest};

// ─────────────────────────────────────────────────────────────────────────────
// Mock tool server
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Counters {
    methods: Mutex<Vec<String>>,
    completions: Mutex<Vec<Value>>,
}

struct ToolServer {
    addr: SocketAddr,
    counters: Arc<Counters>,
}

impl ToolServer {
    async fn start() -> Result<Self> {
        let counters = Arc::new(Counters::default());
        let app = Router::new()
            .route("/mcp", post(handle))
            .route("/openai/deployments/{deployment}/chat/completions", post(complete))
            .with_state(counters.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(Self { addr, counters })
    }

    fn url(&self) -> String {
        format!("http://{}/mcp", self.addr)
    }

    fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn count(&self, method: &str) -> usize {
        self.counters.methods.lock().iter().filter(|m| *m == method).count()
    }
}

async fn handle(State(counters): State<Arc<Counters>>, body: String) -> Response {
    let Ok(message) = serde_json::from_str::<Value>(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let method = message["method"].as_str().unwrap_or_default().to_string();
    counters.methods.lock().push(method.clone());

    let Some(id) = message.get("id").cloned() else {
        return StatusCode::ACCEPTED.into_response();
    };

    let result = match method.as_str() {
        "initialize" => json!({
            "protocolVersion": "2024-11-05",
            "capabilities": { "tools": {} },
            "serverInfo": { "name": "tool-server", "version": "0.1.0" }
        }),
        "tools/list" => json!({
            "tools": [
                {
                    "name": "bing_search",
                    "description": "Search the web",
                    "inputSchema": {
                        "type": "object",
                        "properties": { "query": { "type": "string" } },
                        "required": ["query"]
                    }
                },
                {
                    "name": "run_python",
                    "description": "Run Python code",
                    "inputSchema": {
                        "type": "object",
                        "properties": { "code": { "type": "string" } },
                        "required": ["code"]
                    }
                }
            ]
        }),
        "tools/call" => call(&message["params"]),
        "resources/read" => match message["params"]["uri"].as_str() {
            Some("files/plot.png") => json!({
                "contents": [{ "uri": "files/plot.png", "mimeType": "image/png", "blob": "iVBORw0KGgo=" }]
            }),
            _ => {
                return axum::Json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32002, "message": "Resource not found" }
                }))
                .into_response();
            }
        },
        other => {
            return axum::Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": format!("Method not found: {}", other) }
            }))
            .into_response();
        }
    };

    axum::Json(json!({ "jsonrpc": "2.0", "id": id, "result": result })).into_response()
}

fn call(params: &Value) -> Value {
    let text = match params["name"].as_str().unwrap_or_default() {
        "bing_search" => json!({
            "results": [{ "title": "Oslo weather", "snippet": "Sunny, 21C" }],
            "query": params["arguments"]["query"]
        })
        .to_string(),
        "run_python" => json!({
            "output": ["y".repeat(1000)],
            "files": [{ "name": "plot.png", "mime_type": "image/png", "uri": "files/plot.png" }]
        })
        .to_string(),
        _ => "unknown".to_string(),
    };
    json!({ "content": [{ "type": "text", "text": text }], "isError": false })
}

async fn complete(
    State(counters): State<Arc<Counters>>,
    Path(deployment): Path<String>,
    axum::Json(body): axum::Json<Value>,
) -> Response {
    counters.completions.lock().push(body);
    axum::Json(json!({
        "choices": [{ "message": {
            "content": format!("{} drew the picture.", deployment),
            "custom_content": { "attachments": [
                { "type": "image/png", "title": "cat.png", "url": "files/cat.png" }
            ]}
        }}]
    }))
    .into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_discover_with_remote_names() -> Result<()> {
    let server = ToolServer::start().await?;
    let specs = vec![
        ToolSpec::new("web_search", server.url(), ToolKind::WebSearch).with_remote_name("bing_search"),
        ToolSpec::new("code_interpreter", server.url(), ToolKind::CodeInterpreter)
            .with_remote_name("run_python")
            .with_timeout(Duration::from_secs(60)),
    ];

    let registry = discover(&specs).await?;

    assert_eq!(registry.names(), vec!["code_interpreter", "web_search"]);
    let search = registry.resolve("web_search").unwrap();
    assert_eq!(search.description, "Search the web");
    assert_eq!(search.endpoint, server.url());
    assert_eq!(search.schema["required"], json!(["query"]));
    assert_eq!(
        registry.resolve("code_interpreter").unwrap().timeout,
        Some(Duration::from_secs(60))
    );

    // Both tools share one endpoint, so one handshake.
    assert_eq!(server.count("initialize"), 1);
    assert_eq!(server.count("tools/list"), 1);
    Ok(())
}

#[tokio::test]
async fn test_discover_missing_tool() -> Result<()> {
    let server = ToolServer::start().await?;
    let specs = vec![ToolSpec::new("translate", server.url(), ToolKind::Generic)];

    let err = discover(&specs).await.unwrap_err();
    assert!(matches!(err, AgentError::Tool(_)));
    let message = err.to_string();
    assert!(message.contains("translate"));
    assert!(message.contains("bing_search"));
    Ok(())
}

#[tokio::test]
async fn test_config_overrides_discovered_metadata() -> Result<()> {
    let server = ToolServer::start().await?;
    let mut spec = ToolSpec::new("web_search", server.url(), ToolKind::WebSearch)
        .with_remote_name("bing_search");
    spec.description = Some("Look things up".into());
    spec.schema = Some(json!({"type": "object"}));

    let registry = discover(&[spec]).await?;
    let entry = registry.resolve("web_search").unwrap();
    assert_eq!(entry.description, "Look things up");
    assert_eq!(entry.schema, json!({"type": "object"}));
    Ok(())
}

#[tokio::test]
async fn test_search_round_end_to_end() -> Result<()> {
    let server = ToolServer::start().await?;
    let registry = discover(&[
        ToolSpec::new("web_search", server.url(), ToolKind::WebSearch).with_remote_name("bing_search"),
    ])
    .await?;

    let model = Arc::new(
        MockModel::new(Vec::new())
            .then_call(vec![ToolCallRequest::new(
                "call_1",
                "web_search",
                json!({"query": "weather in Oslo"}),
            )])
            .then_answer("Sunny, 21C."),
    );
    let orchestrator = Orchestrator::builder()
        .with_shared_model(model.clone())
        .with_registry(registry)
        .build()?;

    let answer = orchestrator.answer(TurnRequest::new("Weather in Oslo?")).await?;
    assert_eq!(answer.text, "Sunny, 21C.");
    assert_eq!(answer.rounds, 1);

    let transcript = &model.requests()[1].transcript;
    let result = transcript[2].tool_call_result().unwrap();
    assert!(result.is_success());
    assert!(result.to_model_content().contains("Oslo weather"));
    assert_eq!(server.count("tools/call"), 1);
    Ok(())
}

#[tokio::test]
async fn test_interpreter_output_is_shaped() -> Result<()> {
    let server = ToolServer::start().await?;
    let registry = discover(&[ToolSpec::new("code_interpreter", server.url(), ToolKind::CodeInterpreter)
        .with_remote_name("run_python")])
    .await?;

    let model = Arc::new(
        MockModel::new(Vec::new())
            .then_call(vec![ToolCallRequest::new(
                "c1",
                "code_interpreter",
                json!({"code": "print('y' * 1000)"}),
            )])
            .then_answer("Plotted."),
    );
    let orchestrator = Orchestrator::builder()
        .with_shared_model(model.clone())
        .with_registry(registry)
        .build()?;
    let answer = orchestrator.answer(TurnRequest::new("Plot it")).await?;

    assert_eq!(answer.attachments.len(), 1);
    assert_eq!(answer.attachments[0].title, "plot.png");
    assert_eq!(answer.attachments[0].mime_type.as_deref(), Some("image/png"));
    assert_eq!(answer.attachments[0].base64.as_deref(), Some("iVBORw0KGgo="));
    assert_eq!(server.count("resources/read"), 1);

    let transcript = &model.requests()[1].transcript;
    let result = transcript[2].tool_call_result().unwrap();
    let conduit_llm::ToolOutcome::Success { payload } = &result.outcome else {
        panic!("expected success, got {:?}", result.outcome);
    };
    assert_eq!(
        payload["output"][0].as_str().unwrap().len(),
        INTERPRETER_OUTPUT_LIMIT
    );
    assert!(
        payload["instructions"]
            .as_str()
            .unwrap()
            .contains("provided to the user")
    );
    assert!(!result.to_model_content().contains("iVBORw0KGgo="));
    Ok(())
}

#[tokio::test]
async fn test_deployment_tool_round() -> Result<()> {
    let server = ToolServer::start().await?;
    let registry = discover(&[
        ToolSpec::new("image_gen", server.base_url(), ToolKind::Deployment)
            .with_remote_name("dall-e-3")
            .with_api_key("sk-test"),
    ])
    .await?;
    // No MCP handshake for deployment tools.
    assert_eq!(server.count("initialize"), 0);

    let model = Arc::new(
        MockModel::new(Vec::new())
            .then_call(vec![ToolCallRequest::new(
                "c1",
                "image_gen",
                json!({"prompt": "a cat", "size": "1024x1024"}),
            )])
            .then_answer("Here is your cat."),
    );
    let orchestrator = Orchestrator::builder()
        .with_shared_model(model.clone())
        .with_registry(registry)
        .build()?;
    let answer = orchestrator.answer(TurnRequest::new("Draw a cat")).await?;

    assert_eq!(answer.text, "Here is your cat.");
    assert_eq!(answer.attachments.len(), 1);
    assert_eq!(answer.attachments[0].url.as_deref(), Some("files/cat.png"));

    let sent = server.counters.completions.lock()[0].clone();
    assert_eq!(sent["messages"][0]["content"], "a cat");
    assert_eq!(sent["custom_fields"]["configuration"], json!({"size": "1024x1024"}));

    let transcript = &model.requests()[1].transcript;
    let result = transcript[2].tool_call_result().unwrap();
    assert_eq!(result.to_model_content(), "dall-e-3 drew the picture.");
    Ok(())
}

#[tokio::test]
async fn test_invalid_arguments_skip_the_server() -> Result<()> {
    let server = ToolServer::start().await?;
    let registry = discover(&[
        ToolSpec::new("web_search", server.url(), ToolKind::WebSearch).with_remote_name("bing_search"),
    ])
    .await?;

    let model = Arc::new(
        MockModel::new(Vec::new())
            .then_call(vec![ToolCallRequest::new("c1", "web_search", json!({"q": "typo"}))])
            .then_answer("Sorry."),
    );
    let orchestrator = Orchestrator::builder()
        .with_shared_model(model.clone())
        .with_registry(registry)
        .build()?;
    orchestrator.answer(TurnRequest::new("Search")).await?;

    let transcript = &model.requests()[1].transcript;
    let failure = transcript[2]
        .tool_call_result()
        .and_then(|r| r.failure_descriptor().cloned())
        .unwrap();
    assert_eq!(failure.kind, FailureKind::InvalidArguments);
    assert_eq!(server.count("tools/call"), 0);
    Ok(())
}
