//! MCP client for a single HTTP tool server.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{McpError, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcNotification,
    JsonRpcRequest, ListToolsParams, ListToolsResult, ReadResourceParams, ReadResourceResult,
    ResourceContents, ServerInfo, ToolInfo, methods,
};
use crate::transport::{HttpTransport, HttpTransportConfig};

/// Upper bound on `tools/list` pages, guards against a cursor loop.
const MAX_LIST_PAGES: usize = 64;

/// Configuration for one MCP server.
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// Name used in logs.
    pub name: String,
    /// Endpoint URL.
    pub url: String,
    /// Extra headers (e.g. authentication).
    pub headers: Vec<(String, String)>,
    /// Connection-level timeout. Transport default when unset.
    pub timeout: Option<Duration>,
}

impl McpServerConfig {
    /// Config for an HTTP server.
    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// An MCP client connected to a single server.
///
/// All methods take `&self`, so one client can be shared behind an `Arc`
/// and used by concurrent tool calls.
#[derive(Debug)]
pub struct McpClient {
    config: McpServerConfig,
    transport: HttpTransport,
    server_info: RwLock<Option<ServerInfo>>,
    request_id: AtomicU64,
}

impl McpClient {
    /// Create a client. No I/O happens until [`initialize`](Self::initialize).
    pub fn connect(config: McpServerConfig) -> Result<Self> {
        let mut http = HttpTransportConfig::new(&config.url);
        if let Some(timeout) = config.timeout {
            http = http.with_timeout(timeout);
        }
        for (key, value) in &config.headers {
            http = http.with_header(key, value);
        }
        let transport = HttpTransport::new(http)?;

        Ok(Self {
            config,
            transport,
            server_info: RwLock::new(None),
            request_id: AtomicU64::new(1),
        })
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Get the endpoint URL.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Server info, once initialized.
    pub fn server_info(&self) -> Option<ServerInfo> {
        self.server_info.read().clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.server_info.read().is_some()
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Option<Value>) -> Result<T> {
        let request = JsonRpcRequest::new(self.next_request_id(), method, params);
        let response = self.transport.send_request(&request).await?;
        let result = response
            .into_result()
            .map_err(|e| McpError::server_error(e.code, e.message, e.data))?;
        Ok(serde_json::from_value(result)?)
    }

    /// Perform the MCP handshake. Calling it again is a no-op.
    pub async fn initialize(&self) -> Result<ServerInfo> {
        if let Some(info) = self.server_info() {
            return Ok(info);
        }

        let params = serde_json::to_value(InitializeParams::default())?;
        let result: InitializeResult = self.request(methods::INITIALIZE, Some(params)).await?;

        tracing::info!(
            server = %self.config.name,
            remote = %result.server_info.name,
            version = %result.server_info.version,
            protocol = %result.protocol_version,
            "MCP server initialized"
        );

        self.transport
            .send_notification(&JsonRpcNotification::new(methods::INITIALIZED, None))
            .await?;

        *self.server_info.write() = Some(result.server_info.clone());
        Ok(result.server_info)
    }

    /// List every tool the server offers, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>> {
        if !self.is_initialized() {
            return Err(McpError::NotInitialized);
        }

        let mut tools = Vec::new();
        let mut cursor = None;
        for _ in 0..MAX_LIST_PAGES {
            let params = match cursor.take() {
                Some(cursor) => Some(serde_json::to_value(ListToolsParams {
                    cursor: Some(cursor),
                })?),
                None => None,
            };
            let page: ListToolsResult = self.request(methods::TOOLS_LIST, params).await?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => {
                    tracing::debug!(
                        server = %self.config.name,
                        tool_count = tools.len(),
                        "listed MCP tools"
                    );
                    return Ok(tools);
                }
            }
        }

        Err(McpError::protocol(format!(
            "tools/list did not finish after {} pages",
            MAX_LIST_PAGES
        )))
    }

    /// Call a tool on the server.
    ///
    /// A tool-reported failure (`isError: true`) is returned as `Ok`; the
    /// caller decides what it means.
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        if !self.is_initialized() {
            return Err(McpError::NotInitialized);
        }

        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments,
        })?;
        let result: CallToolResult = self.request(methods::TOOLS_CALL, Some(params)).await?;

        if result.is_error() {
            tracing::warn!(server = %self.config.name, tool = %name, "tool call returned error");
        } else {
            tracing::debug!(server = %self.config.name, tool = %name, "tool call succeeded");
        }

        Ok(result)
    }

    /// Read a resource by URI and return its first body.
    ///
    /// Servers may return several bodies for one URI; only the first is
    /// used. An empty `contents` list is a protocol error.
    pub async fn read_resource(&self, uri: &str) -> Result<ResourceContents> {
        if !self.is_initialized() {
            return Err(McpError::NotInitialized);
        }

        let params = serde_json::to_value(ReadResourceParams {
            uri: uri.to_string(),
        })?;
        let result: ReadResourceResult = self.request(methods::RESOURCES_READ, Some(params)).await?;

        tracing::debug!(
            server = %self.config.name,
            uri = %uri,
            parts = result.contents.len(),
            "read MCP resource"
        );

        result
            .contents
            .into_iter()
            .next()
            .ok_or_else(|| McpError::protocol(format!("resource {} has no contents", uri)))
    }
}
