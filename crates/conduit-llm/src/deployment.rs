//! Chat-completions client for a named model deployment.
//!
//! Talks to an Azure-OpenAI-style endpoint:
//! `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version=..`
//! authenticated with an `Api-Key` header.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::ModelClient;
use crate::error::{LlmError, Result};
use crate::types::{
    Attachment, CompletionRequest, ModelOutput, Role, ToolCallRequest, Turn, TurnContent,
    validate_transcript,
};

/// Default API version sent with every request.
pub const DEFAULT_API_VERSION: &str = "2025-01-01-preview";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for a [`DeploymentClient`].
#[derive(Debug, Clone)]
pub struct DeploymentConfig {
    /// Base URL of the model endpoint.
    pub endpoint: String,
    /// Deployment identifier (model name/version on the endpoint).
    pub deployment: String,
    /// API key.
    pub api_key: String,
    /// API version query parameter.
    pub api_version: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Name used in logs.
    pub name: String,
}

impl DeploymentConfig {
    /// Create a config with default API version and timeout.
    pub fn new(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            deployment: deployment.into(),
            api_key: api_key.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            name: "deployment".to_string(),
        }
    }

    /// Set the API version.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the client name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// Reply to a one-shot [`DeploymentClient::prompt`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeploymentReply {
    /// Text the deployment answered with.
    pub content: String,
    /// Files the deployment attached to its answer.
    pub attachments: Vec<Attachment>,
}

/// Model client for a single deployment.
pub struct DeploymentClient {
    client: Client,
    config: DeploymentConfig,
}

impl DeploymentClient {
    /// Create a new client.
    pub fn new(config: DeploymentConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(LlmError::Config("model endpoint is empty".to_string()));
        }
        if config.deployment.trim().is_empty() {
            return Err(LlmError::Config("deployment identifier is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// The deployment this client targets.
    pub fn deployment(&self) -> &str {
        &self.config.deployment
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.deployment,
            self.config.api_version
        )
    }

    fn to_chat_request(&self, request: &CompletionRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.transcript.len() + 1);

        if let Some(ref system) = request.system {
            messages.push(ChatMessage::text("system", system));
        }
        messages.extend(request.transcript.iter().map(ChatMessage::from_turn));

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|t| ChatTool {
                        tool_type: "function".to_string(),
                        function: ChatFunction {
                            name: t.name.clone(),
                            description: Some(t.description.clone()),
                            parameters: t.parameters.clone(),
                        },
                    })
                    .collect(),
            )
        };

        ChatRequest {
            messages,
            tools,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            custom_fields: None,
        }
    }

    async fn send(&self, body: &ChatRequest) -> Result<ChatResponse> {
        let response = self
            .client
            .post(self.completions_url())
            .header(header::CONTENT_TYPE, "application/json")
            .header("Api-Key", &self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), error_message(&text)));
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Send a single user message to the deployment.
    ///
    /// `configuration` travels as `custom_fields.configuration`, which is how
    /// deployments that act as tools receive their parameters. Tool calls in
    /// the reply are ignored.
    pub async fn prompt(&self, prompt: &str, configuration: Value) -> Result<DeploymentReply> {
        if prompt.trim().is_empty() {
            return Err(LlmError::invalid_request("prompt is empty"));
        }

        let body = ChatRequest {
            messages: vec![ChatMessage::text("user", prompt)],
            tools: None,
            max_tokens: None,
            temperature: None,
            custom_fields: Some(CustomFields { configuration }),
        };

        tracing::debug!(
            client = %self.config.name,
            deployment = %self.config.deployment,
            "Sending deployment prompt"
        );

        let message = self
            .send(&body)
            .await?
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::invalid_response("response has no choices"))?
            .message;

        Ok(DeploymentReply {
            content: message.content.unwrap_or_default(),
            attachments: message
                .custom_content
                .map(|custom| custom.attachments)
                .unwrap_or_default(),
        })
    }
}

#[async_trait]
impl ModelClient for DeploymentClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<ModelOutput> {
        validate_transcript(&request.transcript).map_err(LlmError::invalid_request)?;

        let body = self.to_chat_request(request);

        tracing::debug!(
            client = %self.config.name,
            deployment = %self.config.deployment,
            messages = body.messages.len(),
            tools = body.tools.as_ref().map(|t| t.len()).unwrap_or(0),
            "Sending chat completion request"
        );

        let output = ModelOutput::try_from(self.send(&body).await?)?;

        match &output {
            ModelOutput::FinalAnswer(answer) => tracing::debug!(
                client = %self.config.name,
                answer_len = answer.len(),
                "Model returned final answer"
            ),
            ModelOutput::ToolCallsRequested(calls) => tracing::debug!(
                client = %self.config.name,
                tool_calls = calls.len(),
                "Model requested tool calls"
            ),
        }

        Ok(output)
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}

/// Pull the message out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ChatErrorResponse>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) if body.is_empty() => "empty response body".to_string(),
        Err(_) => body.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest {
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ChatTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_fields: Option<CustomFields>,
}

#[derive(Debug, Serialize)]
struct CustomFields {
    configuration: Value,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl ChatMessage {
    fn text(role: &'static str, content: &str) -> Self {
        Self {
            role,
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    fn from_turn(turn: &Turn) -> Self {
        match (&turn.role, &turn.content) {
            (_, TurnContent::ToolResult { result }) => Self {
                role: "tool",
                content: Some(result.to_model_content()),
                tool_calls: None,
                tool_call_id: Some(result.call_id.clone()),
                name: Some(result.tool.clone()),
            },
            (_, TurnContent::ToolCalls { calls }) => Self {
                role: "assistant",
                content: None,
                tool_calls: Some(calls.iter().map(WireToolCall::from_request).collect()),
                tool_call_id: None,
                name: None,
            },
            (Role::User, TurnContent::Text { text }) => Self::text("user", text),
            (_, TurnContent::Text { text }) => Self::text("assistant", text),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: ChatFunction,
}

#[derive(Debug, Serialize)]
struct ChatFunction {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    parameters: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: WireFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

impl WireToolCall {
    fn from_request(call: &ToolCallRequest) -> Self {
        Self {
            id: call.id.clone(),
            call_type: function_type(),
            function: WireFunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.to_string(),
            },
        }
    }

    fn into_request(self) -> ToolCallRequest {
        let raw = self.function.arguments;
        // Unparseable argument strings are kept verbatim so schema validation
        // reports them to the model instead of failing the whole response.
        let arguments = if raw.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&raw).unwrap_or(Value::String(raw))
        };
        ToolCallRequest {
            id: self.id,
            name: self.function.name,
            arguments,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default)]
    custom_content: Option<CustomContent>,
}

#[derive(Debug, Deserialize)]
struct CustomContent {
    #[serde(default)]
    attachments: Vec<Attachment>,
}

impl TryFrom<ChatResponse> for ModelOutput {
    type Error = LlmError;

    fn try_from(resp: ChatResponse) -> Result<Self> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::invalid_response("response has no choices"))?;

        match choice.message.tool_calls {
            Some(calls) if !calls.is_empty() => Ok(ModelOutput::ToolCallsRequested(
                calls.into_iter().map(WireToolCall::into_request).collect(),
            )),
            _ => Ok(ModelOutput::FinalAnswer(
                choice.message.content.unwrap_or_default(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatErrorResponse {
    error: ChatError,
}

#[derive(Debug, Deserialize)]
struct ChatError {
    message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
