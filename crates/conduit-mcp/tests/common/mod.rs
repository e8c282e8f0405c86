//! In-process mock MCP server for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const SESSION_ID: &str = "mock-session-1";

/// How the mock server behaves.
#[derive(Debug, Clone, Default)]
pub struct MockOptions {
    /// Answer with `text/event-stream` bodies.
    pub sse: bool,
    /// Split `tools/list` into two pages.
    pub paginate: bool,
    /// Reject requests after `initialize` that lack the session header.
    pub require_session: bool,
}

#[derive(Default)]
struct Shared {
    options: MockOptions,
    methods: Mutex<Vec<String>>,
}

/// A mock server running on an ephemeral port.
pub struct MockMcpServer {
    pub addr: SocketAddr,
    shared: Arc<Shared>,
    _handle: JoinHandle<()>,
}

impl MockMcpServer {
    pub async fn start(options: MockOptions) -> Result<Self> {
        let shared = Arc::new(Shared {
            options,
            methods: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/mcp", post(handle))
            .with_state(shared.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            addr,
            shared,
            _handle: handle,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}/mcp", self.addr)
    }

    /// Methods received so far, notifications included.
    pub fn methods(&self) -> Vec<String> {
        self.shared.methods.lock().clone()
    }
}

fn tool_list() -> Vec<Value> {
    vec![
        json!({
            "name": "echo",
            "description": "Echo back the input",
            "inputSchema": {
                "type": "object",
                "properties": { "message": { "type": "string" } },
                "required": ["message"]
            }
        }),
        json!({
            "name": "add",
            "description": "Add two numbers",
            "inputSchema": {
                "type": "object",
                "properties": { "a": { "type": "number" }, "b": { "type": "number" } },
                "required": ["a", "b"]
            }
        }),
        json!({
            "name": "slow",
            "description": "Sleeps before answering",
            "inputSchema": {
                "type": "object",
                "properties": { "delay_ms": { "type": "integer" } }
            }
        }),
        json!({
            "name": "fail",
            "description": "Always reports a tool error",
            "inputSchema": { "type": "object" }
        }),
    ]
}

async fn handle(State(shared): State<Arc<Shared>>, headers: HeaderMap, body: String) -> Response {
    let Ok(message) = serde_json::from_str::<Value>(&body) else {
        let error = json!({
            "jsonrpc": "2.0",
            "id": null,
            "error": { "code": -32700, "message": "Parse error" }
        });
        return (StatusCode::OK, axum::Json(error)).into_response();
    };

    let method = message["method"].as_str().unwrap_or_default().to_string();
    shared.methods.lock().push(method.clone());

    let has_session = headers
        .get("mcp-session-id")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == SESSION_ID);
    if shared.options.require_session && method != "initialize" && !has_session {
        return (StatusCode::BAD_REQUEST, "missing session").into_response();
    }

    let Some(id) = message.get("id").cloned() else {
        return StatusCode::ACCEPTED.into_response();
    };

    let reply = match dispatch(&method, &message["params"], &shared.options).await {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err((code, msg)) => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": code, "message": msg }
        }),
    };

    let mut response = if shared.options.sse {
        let body = format!(
            "event: message\ndata: {}\n\nevent: message\ndata: {}\n\n",
            json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {"level": "info"}}),
            reply
        );
        ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
    } else {
        axum::Json(reply).into_response()
    };

    if method == "initialize" {
        response
            .headers_mut()
            .insert("mcp-session-id", header::HeaderValue::from_static(SESSION_ID));
    }
    response
}

async fn dispatch(
    method: &str,
    params: &Value,
    options: &MockOptions,
) -> std::result::Result<Value, (i64, String)> {
    match method {
        "initialize" => Ok(json!({
            "protocolVersion": "2024-11-05",
            "capabilities": { "tools": {} },
            "serverInfo": { "name": "mock-mcp-server", "version": "1.0.0" }
        })),
        "tools/list" => {
            let tools = tool_list();
            if !options.paginate {
                return Ok(json!({ "tools": tools }));
            }
            match params.get("cursor").and_then(Value::as_str) {
                None => Ok(json!({ "tools": tools[..2], "nextCursor": "page-2" })),
                Some("page-2") => Ok(json!({ "tools": tools[2..] })),
                Some(other) => Err((-32602, format!("bad cursor {}", other))),
            }
        }
        "tools/call" => {
            let name = params["name"].as_str().unwrap_or_default();
            let args = &params["arguments"];
            match name {
                "echo" => Ok(text_result(args["message"].as_str().unwrap_or_default(), false)),
                "add" => {
                    let sum = args["a"].as_f64().unwrap_or(0.0) + args["b"].as_f64().unwrap_or(0.0);
                    Ok(text_result(&sum.to_string(), false))
                }
                "slow" => {
                    let delay = args["delay_ms"].as_u64().unwrap_or(1000);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    Ok(text_result(&format!("slept {} ms", delay), false))
                }
                "fail" => Ok(text_result("tool exploded", true)),
                other => Err((-32602, format!("Unknown tool: {}", other))),
            }
        }
        "resources/read" => match params["uri"].as_str().unwrap_or_default() {
            "files/report.txt" => Ok(json!({
                "contents": [{ "uri": "files/report.txt", "mimeType": "text/plain", "text": "total: 42" }]
            })),
            "files/plot.png" => Ok(json!({
                "contents": [{ "uri": "files/plot.png", "mimeType": "image/png", "blob": "iVBORw0KGgo=" }]
            })),
            "files/empty" => Ok(json!({ "contents": [] })),
            other => Err((-32002, format!("Resource not found: {}", other))),
        },
        other => Err((-32601, format!("Method not found: {}", other))),
    }
}

fn text_result(text: &str, is_error: bool) -> Value {
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error
    })
}
