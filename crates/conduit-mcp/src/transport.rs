//! HTTP transport for MCP.
//!
//! Every message is one HTTP POST. The server may answer with a plain JSON
//! body or with a `text/event-stream` body whose `data:` lines carry the
//! JSON-RPC messages. A session id issued by the server is echoed on every
//! later request.

use std::time::Duration;

use parking_lot::RwLock;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};

use crate::error::{McpError, Result};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Header carrying the server-issued session id.
pub const SESSION_HEADER: &str = "mcp-session-id";

const EVENT_STREAM: &str = "text/event-stream";

/// Configuration for HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Endpoint URL of the MCP server.
    pub url: String,
    /// Connection-level request timeout.
    pub timeout: Duration,
    /// Extra headers sent with every request (e.g. authentication).
    pub headers: Vec<(String, String)>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout: Duration::from_secs(300),
            headers: Vec::new(),
        }
    }
}

impl HttpTransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

/// HTTP transport to a single MCP endpoint.
///
/// Safe to share between tasks; requests are not serialized.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: url::Url,
    session_id: RwLock<Option<String>>,
}

impl HttpTransport {
    /// Build a transport. Performs no I/O.
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let url = url::Url::parse(&config.url)
            .map_err(|e| McpError::InvalidUrl(format!("{}: {}", config.url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(McpError::InvalidUrl(format!(
                "{}: unsupported scheme '{}'",
                config.url,
                url.scheme()
            )));
        }

        let mut headers = HeaderMap::new();
        for (key, value) in &config.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| McpError::transport(format!("invalid header name '{}': {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| McpError::transport(format!("invalid value for '{}': {}", key, e)))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .pool_max_idle_per_host(5)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| McpError::transport(format!("failed to build HTTP client: {}", e)))?;

        tracing::debug!(
            url = %url,
            timeout_secs = config.timeout.as_secs(),
            "created MCP HTTP transport"
        );

        Ok(Self {
            client,
            url,
            session_id: RwLock::new(None),
        })
    }

    /// Endpoint URL.
    pub fn url(&self) -> &url::Url {
        &self.url
    }

    /// Session id issued by the server, if any.
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    /// Send a request and wait for its response.
    pub async fn send_request(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        let body = serde_json::to_vec(request)?;
        tracing::trace!(url = %self.url, method = %request.method, id = request.id, "sending MCP request");

        let response = self.post(body).await?;
        let is_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with(EVENT_STREAM));
        let text = response.text().await?;

        tracing::trace!(json = %text, "received MCP response");

        let reply = if is_stream {
            parse_event_stream(&text, request.id)?
        } else {
            serde_json::from_str::<JsonRpcResponse>(&text)?
        };

        if !reply.answers(request.id) && !reply.is_error() {
            return Err(McpError::protocol(format!(
                "response id {:?} does not match request id {}",
                reply.id, request.id
            )));
        }
        Ok(reply)
    }

    /// Send a notification. Any response body is ignored.
    pub async fn send_notification(&self, notification: &JsonRpcNotification) -> Result<()> {
        let body = serde_json::to_vec(notification)?;
        tracing::trace!(url = %self.url, method = %notification.method, "sending MCP notification");
        self.post(body).await?;
        Ok(())
    }

    async fn post(&self, body: Vec<u8>) -> Result<reqwest::Response> {
        let mut req = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .body(body);
        if let Some(session) = self.session_id() {
            req = req.header(SESSION_HEADER, session);
        }

        let response = req.send().await?;

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            let mut current = self.session_id.write();
            if current.as_deref() != Some(session) {
                tracing::debug!(url = %self.url, session = %session, "MCP session established");
                *current = Some(session.to_string());
            }
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Pull the response for `id` out of an SSE body.
///
/// Events are separated by blank lines; the data of one event is the
/// concatenation of its `data:` lines. Events that are not JSON-RPC
/// responses (server notifications, pings) are skipped.
pub(crate) fn parse_event_stream(body: &str, id: u64) -> Result<JsonRpcResponse> {
    let mut data = String::new();
    let mut events = Vec::new();

    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            if !data.is_empty() {
                events.push(std::mem::take(&mut data));
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if !data.is_empty() {
        events.push(data);
    }

    let mut fallback = None;
    for event in events {
        let Ok(message) = serde_json::from_str::<JsonRpcResponse>(&event) else {
            continue;
        };
        if message.answers(id) {
            return Ok(message);
        }
        if message.is_error() && message.id.is_none() {
            fallback = Some(message);
        }
    }

    fallback.ok_or_else(|| McpError::protocol(format!("no response for request {} in event stream", id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_transport_config() {
        let config = HttpTransportConfig::new("http://localhost:3000/mcp")
            .with_timeout(Duration::from_secs(5))
            .with_header("Authorization", "Bearer token");
        assert_eq!(config.url, "http://localhost:3000/mcp");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.headers.len(), 1);
    }

    #[test]
    fn test_transport_rejects_bad_urls() {
        let err = HttpTransport::new(HttpTransportConfig::new("not a url")).unwrap_err();
        assert!(matches!(err, McpError::InvalidUrl(_)));

        let err = HttpTransport::new(HttpTransportConfig::new("ftp://host/mcp")).unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn test_transport_rejects_bad_header() {
        let config = HttpTransportConfig::new("http://localhost/mcp").with_header("bad header", "x");
        assert!(matches!(
            HttpTransport::new(config),
            Err(McpError::Transport(_))
        ));
    }

    #[test]
    fn test_transport_starts_without_session() {
        let transport = HttpTransport::new(HttpTransportConfig::new("http://localhost/mcp")).unwrap();
        assert_eq!(transport.session_id(), None);
        assert_eq!(transport.url().path(), "/mcp");
    }

    #[test]
    fn test_parse_event_stream_single_event() {
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":3,\"result\":{\"ok\":true}}\n\n";
        let resp = parse_event_stream(body, 3).unwrap();
        assert!(resp.answers(3));
        assert_eq!(resp.result.unwrap()["ok"], true);
    }

    #[test]
    fn test_parse_event_stream_skips_notifications() {
        let body = concat!(
            "data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\",\"params\":{}}\r\n",
            "\r\n",
            ": keep-alive\r\n",
            "\r\n",
            "data: {\"jsonrpc\":\"2.0\",\"id\":9,\r\n",
            "data: \"result\":{\"tools\":[]}}\r\n",
            "\r\n",
        );
        let resp = parse_event_stream(body, 9).unwrap();
        assert!(resp.answers(9));
    }

    #[test]
    fn test_parse_event_stream_missing_response() {
        let body = "data: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n";
        let err = parse_event_stream(body, 2).unwrap_err();
        assert!(matches!(err, McpError::Protocol(_)));
    }
}
