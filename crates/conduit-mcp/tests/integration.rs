//! Client tests against an in-process mock MCP server.

mod common;

use std::time::Duration;

use anyhow::Result;
use serde_json::json;

use common::{MockMcpServer, MockOptions, SESSION_ID};
use conduit_mcp::{
    HttpTransport, HttpTransportConfig, JsonRpcRequest, McpClient, McpError, McpServerConfig,
};

async fn connected(server: &MockMcpServer) -> Result<McpClient> {
    let client = McpClient::connect(McpServerConfig::http("mock", server.url()))?;
    client.initialize().await?;
    Ok(client)
}

#[tokio::test]
async fn test_initialize_handshake() -> Result<()> {
    let server = MockMcpServer::start(MockOptions::default()).await?;
    let client = McpClient::connect(McpServerConfig::http("mock", server.url()))?;

    let info = client.initialize().await?;
    assert_eq!(info.name, "mock-mcp-server");
    assert!(client.is_initialized());

    // A second call does not repeat the handshake.
    client.initialize().await?;
    assert_eq!(server.methods(), vec!["initialize", "notifications/initialized"]);
    Ok(())
}

#[tokio::test]
async fn test_list_and_call_tools() -> Result<()> {
    let server = MockMcpServer::start(MockOptions::default()).await?;
    let client = connected(&server).await?;

    let tools = client.list_tools().await?;
    let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["echo", "add", "slow", "fail"]);
    assert!(tools[0].input_schema.is_some());

    let result = client
        .call_tool("echo", Some(json!({"message": "hello"})))
        .await?;
    assert!(!result.is_error());
    assert_eq!(result.text(), "hello");

    let result = client.call_tool("add", Some(json!({"a": 2, "b": 2}))).await?;
    assert_eq!(result.text(), "4");
    Ok(())
}

#[tokio::test]
async fn test_tool_error_is_not_a_client_error() -> Result<()> {
    let server = MockMcpServer::start(MockOptions::default()).await?;
    let client = connected(&server).await?;

    let result = client.call_tool("fail", Some(json!({}))).await?;
    assert!(result.is_error());
    assert_eq!(result.text(), "tool exploded");
    Ok(())
}

#[tokio::test]
async fn test_unknown_tool_is_server_error() -> Result<()> {
    let server = MockMcpServer::start(MockOptions::default()).await?;
    let client = connected(&server).await?;

    let err = client.call_tool("nope", None).await.unwrap_err();
    match err {
        McpError::ServerError { code, message, .. } => {
            assert_eq!(code, -32602);
            assert!(message.contains("nope"));
        }
        other => panic!("expected server error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_read_text_and_blob_resources() -> Result<()> {
    let server = MockMcpServer::start(MockOptions::default()).await?;
    let client = connected(&server).await?;

    let report = client.read_resource("files/report.txt").await?;
    assert_eq!(report.mime_type.as_deref(), Some("text/plain"));
    assert_eq!(report.text.as_deref(), Some("total: 42"));
    assert!(report.blob.is_none());

    let plot = client.read_resource("files/plot.png").await?;
    assert_eq!(plot.blob.as_deref(), Some("iVBORw0KGgo="));
    assert!(plot.text.is_none());

    assert!(server.methods().contains(&"resources/read".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_read_resource_failures() -> Result<()> {
    let server = MockMcpServer::start(MockOptions::default()).await?;
    let client = connected(&server).await?;

    let err = client.read_resource("files/empty").await.unwrap_err();
    assert!(matches!(err, McpError::Protocol(_)), "got {err:?}");

    let err = client.read_resource("files/missing").await.unwrap_err();
    assert!(matches!(err, McpError::ServerError { code: -32002, .. }), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn test_event_stream_responses() -> Result<()> {
    let server = MockMcpServer::start(MockOptions {
        sse: true,
        ..Default::default()
    })
    .await?;
    let client = connected(&server).await?;

    assert_eq!(client.list_tools().await?.len(), 4);
    let result = client
        .call_tool("echo", Some(json!({"message": "streamed"})))
        .await?;
    assert_eq!(result.text(), "streamed");
    Ok(())
}

#[tokio::test]
async fn test_session_id_is_echoed() -> Result<()> {
    let server = MockMcpServer::start(MockOptions {
        require_session: true,
        ..Default::default()
    })
    .await?;
    let client = connected(&server).await?;

    let result = client.call_tool("echo", Some(json!({"message": "s"}))).await?;
    assert_eq!(result.text(), "s");
    Ok(())
}

#[tokio::test]
async fn test_missing_session_is_http_error() -> Result<()> {
    let server = MockMcpServer::start(MockOptions {
        require_session: true,
        ..Default::default()
    })
    .await?;

    // A bare transport never ran the handshake, so it has no session.
    let transport = HttpTransport::new(HttpTransportConfig::new(server.url()))?;
    let err = transport
        .send_request(&JsonRpcRequest::new(1, "tools/list", None))
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::Http { status: 400, .. }), "got {err:?}");

    let client = connected(&server).await?;
    assert_eq!(client.list_tools().await?.len(), 4);
    Ok(())
}

#[tokio::test]
async fn test_session_captured_by_transport() -> Result<()> {
    let server = MockMcpServer::start(MockOptions::default()).await?;
    let transport = HttpTransport::new(HttpTransportConfig::new(server.url()))?;
    assert_eq!(transport.session_id(), None);

    let params = serde_json::to_value(conduit_mcp::InitializeParams::default())?;
    transport
        .send_request(&JsonRpcRequest::new(1, "initialize", Some(params)))
        .await?;
    assert_eq!(transport.session_id().as_deref(), Some(SESSION_ID));
    Ok(())
}

#[tokio::test]
async fn test_paginated_tool_list() -> Result<()> {
    let server = MockMcpServer::start(MockOptions {
        paginate: true,
        ..Default::default()
    })
    .await?;
    let client = connected(&server).await?;

    let tools = client.list_tools().await?;
    assert_eq!(tools.len(), 4);
    assert_eq!(
        server.methods().iter().filter(|m| *m == "tools/list").count(),
        2
    );
    Ok(())
}

#[tokio::test]
async fn test_connection_level_timeout() -> Result<()> {
    let server = MockMcpServer::start(MockOptions::default()).await?;
    let client = McpClient::connect(
        McpServerConfig::http("mock", server.url()).with_timeout(Duration::from_millis(200)),
    )?;
    client.initialize().await?;

    let err = client
        .call_tool("slow", Some(json!({"delay_ms": 2000})))
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::Timeout), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn test_unreachable_server() -> Result<()> {
    // Port 9 (discard) is almost never listening locally.
    let client = McpClient::connect(McpServerConfig::http("down", "http://127.0.0.1:9/mcp"))?;
    let err = client.initialize().await.unwrap_err();
    assert!(err.is_connection_failure(), "got {err:?}");
    Ok(())
}
