//! Tool providers: the things a registry entry actually calls.
//!
//! [`McpToolProvider`] adapts a tool served over MCP.
//! [`DeploymentToolProvider`] forwards a prompt to another model deployment.
//! [`MockProvider`] is a scripted stand-in for tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use conduit_llm::{Attachment, DeploymentClient, LlmError};
use conduit_mcp::{CallToolResult, McpClient, McpError, ResourceContents};

/// Interpreter output lines longer than this are cut before the model sees them.
pub const INTERPRETER_OUTPUT_LIMIT: usize = 200;

const INTERPRETER_FILES_NOTE: &str = "Generated files have been provided to the user. \
Do not include links to them in the answer.";

// ─────────────────────────────────────────────────────────────────────────────
// ToolProvider Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Failure reported by a provider.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// The provider could not be reached.
    #[error("tool provider unreachable: {0}")]
    Unreachable(String),

    /// The tool ran and reported an error.
    #[error("tool reported an error: {0}")]
    ToolFailed(String),

    /// The provider answered with something unusable.
    #[error("tool provider protocol error: {0}")]
    Protocol(String),
}

impl From<McpError> for ProviderError {
    fn from(err: McpError) -> Self {
        if err.is_connection_failure() {
            Self::Unreachable(err.to_string())
        } else {
            Self::Protocol(err.to_string())
        }
    }
}

impl From<LlmError> for ProviderError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Unavailable(_) | LlmError::Timeout(_) => Self::Unreachable(err.to_string()),
            LlmError::InvalidResponse(_) => Self::Protocol(err.to_string()),
            _ => Self::ToolFailed(err.to_string()),
        }
    }
}

/// What a provider hands back for one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    /// What the model reads.
    pub payload: Value,
    /// Files for the end user.
    pub attachments: Vec<Attachment>,
}

impl ToolOutput {
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

impl From<Value> for ToolOutput {
    fn from(payload: Value) -> Self {
        Self {
            payload,
            attachments: Vec::new(),
        }
    }
}

/// Something that executes a tool call.
///
/// `invoke` may take arbitrarily long; the dispatcher owns the timeout and
/// drops the future when it fires.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    async fn invoke(&self, arguments: &Value) -> Result<ToolOutput, ProviderError>;
}

/// What a configured tool is, which decides result post-processing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    CodeInterpreter,
    WebSearch,
    /// Another model deployment, called with a prompt instead of over MCP.
    Deployment,
    #[default]
    Generic,
}

// ─────────────────────────────────────────────────────────────────────────────
// MCP Provider
// ─────────────────────────────────────────────────────────────────────────────

/// A tool served by an MCP server.
#[derive(Debug)]
pub struct McpToolProvider {
    client: Arc<McpClient>,
    remote_name: String,
    kind: ToolKind,
}

impl McpToolProvider {
    /// Wrap `remote_name` on an initialized client.
    pub fn new(client: Arc<McpClient>, remote_name: impl Into<String>, kind: ToolKind) -> Self {
        Self {
            client,
            remote_name: remote_name.into(),
            kind,
        }
    }

    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    pub fn kind(&self) -> ToolKind {
        self.kind
    }
}

#[async_trait]
impl ToolProvider for McpToolProvider {
    async fn invoke(&self, arguments: &Value) -> Result<ToolOutput, ProviderError> {
        tracing::debug!(
            server = %self.client.name(),
            tool = %self.remote_name,
            "invoking MCP tool"
        );

        let result = self
            .client
            .call_tool(&self.remote_name, Some(arguments.clone()))
            .await?;

        if result.is_error() {
            let text = result.text();
            return Err(ProviderError::ToolFailed(if text.is_empty() {
                "tool returned an error without detail".to_string()
            } else {
                text
            }));
        }

        let payload = result_payload(&result);
        match self.kind {
            ToolKind::CodeInterpreter => {
                let attachments = fetch_interpreter_files(&self.client, &payload).await?;
                Ok(ToolOutput::from(shape_interpreter_output(payload)).with_attachments(attachments))
            }
            ToolKind::WebSearch | ToolKind::Deployment | ToolKind::Generic => Ok(payload.into()),
        }
    }
}

/// Download every file listed under `files` in an interpreter result.
///
/// Entries look like `{"name", "mime_type", "uri"}`; ones without a `uri`
/// are skipped. One unreadable file fails the whole call.
async fn fetch_interpreter_files(
    client: &McpClient,
    payload: &Value,
) -> Result<Vec<Attachment>, ProviderError> {
    let Some(files) = payload.get("files").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let mut attachments = Vec::with_capacity(files.len());
    for file in files {
        let Some(uri) = file.get("uri").and_then(Value::as_str) else {
            continue;
        };
        let title = file.get("name").and_then(Value::as_str).unwrap_or(uri);
        let mime_type = file.get("mime_type").and_then(Value::as_str).map(str::to_string);

        let contents = client.read_resource(uri).await?;
        attachments.push(file_attachment(title, mime_type, contents)?);
    }

    tracing::debug!(
        server = %client.name(),
        files = attachments.len(),
        "fetched interpreter files"
    );
    Ok(attachments)
}

fn file_attachment(
    title: &str,
    mime_type: Option<String>,
    contents: ResourceContents,
) -> Result<Attachment, ProviderError> {
    let mime_type = mime_type.or(contents.mime_type);
    match (contents.text, contents.blob) {
        (Some(text), _) => Ok(Attachment::text(title, mime_type, text)),
        (None, Some(blob)) => Ok(Attachment::blob(title, mime_type, blob)),
        (None, None) => Err(ProviderError::Protocol(format!(
            "resource {} has neither text nor blob",
            contents.uri
        ))),
    }
}

/// Structured content wins; otherwise text that parses as JSON is passed on
/// as a value and anything else as a string.
fn result_payload(result: &CallToolResult) -> Value {
    if let Some(structured) = &result.structured_content {
        return structured.clone();
    }
    let text = result.text();
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

/// Trim interpreter output so one noisy cell cannot flood the transcript.
///
/// Each string in `output` is cut to [`INTERPRETER_OUTPUT_LIMIT`] characters.
/// When the run produced files the model is told not to link them, since the
/// links are only valid inside the interpreter session.
pub fn shape_interpreter_output(mut payload: Value) -> Value {
    let Some(object) = payload.as_object_mut() else {
        return payload;
    };

    if let Some(Value::Array(lines)) = object.get_mut("output") {
        for line in lines.iter_mut() {
            if let Value::String(s) = line
                && s.chars().count() > INTERPRETER_OUTPUT_LIMIT
            {
                *s = s.chars().take(INTERPRETER_OUTPUT_LIMIT).collect();
            }
        }
    }

    let has_files = object
        .get("files")
        .and_then(Value::as_array)
        .is_some_and(|files| !files.is_empty());
    if has_files {
        object.insert("instructions".to_string(), json!(INTERPRETER_FILES_NOTE));
    }

    payload
}

// ─────────────────────────────────────────────────────────────────────────────
// Deployment Provider
// ─────────────────────────────────────────────────────────────────────────────

/// Argument schema for deployment tools: a prompt plus free-form settings.
pub fn deployment_tool_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "prompt": {
                "type": "string",
                "description": "Request for the deployment, in natural language"
            }
        },
        "required": ["prompt"]
    })
}

/// A model deployment used as a tool.
///
/// `prompt` becomes the single user message. Every other argument is passed
/// through as the deployment's configuration. The answer text goes back to
/// the model and any attachments go to the user.
pub struct DeploymentToolProvider {
    client: DeploymentClient,
}

impl DeploymentToolProvider {
    pub fn new(client: DeploymentClient) -> Self {
        Self { client }
    }

    pub fn deployment(&self) -> &str {
        self.client.deployment()
    }
}

impl std::fmt::Debug for DeploymentToolProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentToolProvider")
            .field("deployment", &self.client.deployment())
            .finish()
    }
}

#[async_trait]
impl ToolProvider for DeploymentToolProvider {
    async fn invoke(&self, arguments: &Value) -> Result<ToolOutput, ProviderError> {
        let mut configuration = arguments.as_object().cloned().unwrap_or_default();
        let Some(Value::String(prompt)) = configuration.remove("prompt") else {
            return Err(ProviderError::ToolFailed(
                "argument 'prompt' must be a string".to_string(),
            ));
        };

        tracing::debug!(deployment = %self.client.deployment(), "invoking deployment tool");

        let reply = self
            .client
            .prompt(&prompt, Value::Object(configuration))
            .await?;
        Ok(ToolOutput::from(Value::String(reply.content)).with_attachments(reply.attachments))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Provider
// ─────────────────────────────────────────────────────────────────────────────

/// A scripted provider for tests.
///
/// Always gives the same answer, optionally after a delay, and records the
/// arguments of every call.
#[derive(Debug)]
pub struct MockProvider {
    reply: Result<ToolOutput, ProviderError>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Value>>,
}

impl MockProvider {
    /// A provider that succeeds with `payload`.
    pub fn returning(payload: Value) -> Self {
        Self {
            reply: Ok(payload.into()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A provider that fails with `error`.
    pub fn failing(error: ProviderError) -> Self {
        Self {
            reply: Err(error),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Hand these files to the user on success.
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        if let Ok(output) = &mut self.reply {
            output.attachments = attachments;
        }
        self
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Arguments of every call received, including ones still sleeping.
    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ToolProvider for MockProvider {
    async fn invoke(&self, arguments: &Value) -> Result<ToolOutput, ProviderError> {
        self.calls.lock().push(arguments.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone()
    }
}
