//! MCP (Model Context Protocol) client for Conduit.
//!
//! Conduit's tools (the code interpreter, web search) live behind MCP
//! servers reachable over HTTP. This crate discovers and invokes them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  McpClient                                                  │
//! │  - initialize, tools/list, tools/call, resources/read       │
//! │  - shareable across tasks (&self everywhere)                │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  HttpTransport                                              │
//! │  - JSON-RPC 2.0, one HTTP POST per message                  │
//! │  - JSON or text/event-stream replies, Mcp-Session-Id        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use conduit_mcp::{McpClient, McpServerConfig};
//!
//! let client = McpClient::connect(McpServerConfig::http("search", "http://localhost:8931/mcp"))?;
//! client.initialize().await?;
//!
//! for tool in client.list_tools().await? {
//!     println!("{} - {:?}", tool.name, tool.description);
//! }
//!
//! let result = client.call_tool("web_search", Some(json!({"query": "rust"}))).await?;
//! println!("{}", result.text());
//! ```
//!
//! The protocol flow is:
//! 1. Client sends `initialize` with its info
//! 2. Server responds with its capabilities (and maybe a session id)
//! 3. Client sends `notifications/initialized`
//! 4. Client can now call `tools/list`, `tools/call` and `resources/read`

pub mod client;
pub mod error;
pub mod protocol;
pub mod transport;

pub use client::{McpClient, McpServerConfig};
pub use error::{McpError, Result};
pub use protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, ReadResourceResult,
    ResourceContents, ServerInfo, ToolContent, ToolInfo,
};
pub use transport::{HttpTransport, HttpTransportConfig, SESSION_HEADER};
