//! Transcript and model output types.
//!
//! A transcript is an append-only list of [`Turn`]s. Model turns that request
//! tools are followed by exactly one tool-result turn per requested call
//! before the next model turn; [`validate_transcript`] checks that shape.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Tool calls
// ─────────────────────────────────────────────────────────────────────────────

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Call identifier, unique within the model turn.
    pub id: String,
    /// Registered tool name.
    pub name: String,
    /// Argument payload, validated against the tool schema before dispatch.
    pub arguments: Value,
}

impl ToolCallRequest {
    /// Create a new tool call request.
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Why a tool call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The tool is not in the registry.
    UnknownTool,
    /// The arguments did not match the tool schema.
    InvalidArguments,
    /// The provider did not answer within the call timeout.
    ToolTimeout,
    /// The provider answered with an error or could not be reached.
    ToolProviderError,
}

impl FailureKind {
    /// Stable snake_case code.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::UnknownTool => "unknown_tool",
            FailureKind::InvalidArguments => "invalid_arguments",
            FailureKind::ToolTimeout => "tool_timeout",
            FailureKind::ToolProviderError => "tool_provider_error",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure half of a tool call outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureDescriptor {
    /// Failure category.
    pub kind: FailureKind,
    /// Human-readable detail, shown to the model.
    pub message: String,
}

/// Outcome of a single tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    /// The provider returned a payload.
    Success {
        /// Structured payload from the provider.
        payload: Value,
    },
    /// The call failed; the model sees the descriptor.
    Failure(FailureDescriptor),
}

/// Result of one tool call, correlated to its request by call id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// The call identifier this result answers.
    pub call_id: String,
    /// Name of the tool that was requested.
    pub tool: String,
    /// Success payload or failure descriptor.
    pub outcome: ToolOutcome,
    /// Files produced for the end user. Never rendered for the model.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl ToolCallResult {
    /// Create a successful result.
    pub fn success(call_id: impl Into<String>, tool: impl Into<String>, payload: Value) -> Self {
        Self {
            call_id: call_id.into(),
            tool: tool.into(),
            outcome: ToolOutcome::Success { payload },
            attachments: Vec::new(),
        }
    }

    /// Attach files for the end user.
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Create a failed result.
    pub fn failure(
        call_id: impl Into<String>,
        tool: impl Into<String>,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool: tool.into(),
            outcome: ToolOutcome::Failure(FailureDescriptor {
                kind,
                message: message.into(),
            }),
            attachments: Vec::new(),
        }
    }

    /// Whether the call succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success { .. })
    }

    /// The failure descriptor, if the call failed.
    pub fn failure_descriptor(&self) -> Option<&FailureDescriptor> {
        match &self.outcome {
            ToolOutcome::Failure(descriptor) => Some(descriptor),
            ToolOutcome::Success { .. } => None,
        }
    }

    /// Render the outcome as the text the model reads.
    pub fn to_model_content(&self) -> String {
        match &self.outcome {
            ToolOutcome::Success { payload } => match payload {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
            ToolOutcome::Failure(FailureDescriptor { kind, message }) => {
                format!("ERROR ({}) during tool call execution: {}", kind, message)
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Turns
// ─────────────────────────────────────────────────────────────────────────────

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The end user.
    User,
    /// The language model.
    Model,
    /// A tool provider, via the dispatcher.
    ToolResult,
}

/// Content of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnContent {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// Tool calls requested by the model, in the order the model gave them.
    ToolCalls {
        /// The requested calls.
        calls: Vec<ToolCallRequest>,
    },
    /// Result of one tool call.
    ToolResult {
        /// The result.
        result: ToolCallResult,
    },
}

/// One entry in the conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced this turn.
    pub role: Role,
    /// What the turn carries.
    pub content: TurnContent,
    /// When the turn was appended.
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// A user text turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Text { text: text.into() },
            created_at: Utc::now(),
        }
    }

    /// A model text turn.
    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: TurnContent::Text { text: text.into() },
            created_at: Utc::now(),
        }
    }

    /// A model turn requesting tool calls.
    pub fn model_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Model,
            content: TurnContent::ToolCalls { calls },
            created_at: Utc::now(),
        }
    }

    /// A tool-result turn.
    pub fn tool_result(result: ToolCallResult) -> Self {
        Self {
            role: Role::ToolResult,
            content: TurnContent::ToolResult { result },
            created_at: Utc::now(),
        }
    }

    /// Text content, if this is a text turn.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            TurnContent::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Requested calls, if this is a model tool-call turn.
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match &self.content {
            TurnContent::ToolCalls { calls } => calls,
            _ => &[],
        }
    }

    /// Tool result, if this is a tool-result turn.
    pub fn tool_call_result(&self) -> Option<&ToolCallResult> {
        match &self.content {
            TurnContent::ToolResult { result } => Some(result),
            _ => None,
        }
    }
}

/// Check that a transcript is non-empty and every round is complete.
///
/// A round is a model tool-call turn followed by one tool-result turn per
/// requested call, each answering a call id of that turn. Results that do not
/// follow an open round, or a model/user turn issued while a round is still
/// open, make the transcript malformed.
pub fn validate_transcript(turns: &[Turn]) -> Result<(), String> {
    let first = turns.first().ok_or_else(|| "transcript is empty".to_string())?;
    if first.role != Role::User {
        return Err("transcript must start with a user turn".to_string());
    }

    // Call ids of the open round that still await a result.
    let mut pending: Option<Vec<String>> = None;

    for (index, turn) in turns.iter().enumerate() {
        match (&turn.role, &turn.content) {
            (Role::ToolResult, TurnContent::ToolResult { result }) => {
                let open = pending.as_mut().ok_or_else(|| {
                    format!("tool result at turn {} does not follow a tool call", index)
                })?;
                let pos = open
                    .iter()
                    .position(|id| *id == result.call_id)
                    .ok_or_else(|| {
                        format!(
                            "tool result at turn {} answers unknown call id '{}'",
                            index, result.call_id
                        )
                    })?;
                open.remove(pos);
                if open.is_empty() {
                    pending = None;
                }
            }
            (Role::ToolResult, _) => {
                return Err(format!("turn {} has role tool_result but no result", index));
            }
            (_, TurnContent::ToolResult { .. }) => {
                return Err(format!("turn {} carries a tool result with the wrong role", index));
            }
            (role, content) => {
                if let Some(open) = &pending {
                    return Err(format!(
                        "turn {} starts before {} tool result(s) arrived",
                        index,
                        open.len()
                    ));
                }
                if let TurnContent::ToolCalls { calls } = content {
                    if *role != Role::Model {
                        return Err(format!("turn {} requests tools but is not a model turn", index));
                    }
                    if !calls.is_empty() {
                        pending = Some(calls.iter().map(|c| c.id.clone()).collect());
                    }
                }
            }
        }
    }

    match pending {
        Some(open) => Err(format!("{} tool result(s) missing at end of transcript", open.len())),
        None => Ok(()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Model I/O
// ─────────────────────────────────────────────────────────────────────────────

/// Tool definition offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// JSON schema of the arguments.
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A completion request: the full transcript plus what the model may use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Conversation so far.
    pub transcript: Vec<Turn>,
    /// Tools the model may request.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    /// System prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Create a request for the given transcript.
    pub fn new(transcript: Vec<Turn>) -> Self {
        Self {
            transcript,
            tools: Vec::new(),
            system: None,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Set the tools offered to the model.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the maximum tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// What the model produced for one call.
///
/// Final answers and tool requests are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ModelOutput {
    /// The model is done.
    FinalAnswer(String),
    /// The model wants these tools run, in this order.
    ToolCallsRequested(Vec<ToolCallRequest>),
}

impl ModelOutput {
    /// Whether this is a final answer.
    pub fn is_final(&self) -> bool {
        matches!(self, ModelOutput::FinalAnswer(_))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Attachments
// ─────────────────────────────────────────────────────────────────────────────

/// A file or link a tool produced for the end user rather than the model.
///
/// Exactly one of `url`, `data` or `base64` is normally set. Attachments are
/// never shown to the model; they travel alongside the final answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Display title, usually the file name.
    #[serde(default)]
    pub title: String,
    /// MIME type, when known.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Where the content can be fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Inline text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Inline binary content, base64 encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
}

impl Attachment {
    /// Attachment carrying inline text.
    pub fn text(
        title: impl Into<String>,
        mime_type: Option<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            mime_type,
            data: Some(data.into()),
            ..Default::default()
        }
    }

    /// Attachment carrying base64 encoded bytes.
    pub fn blob(
        title: impl Into<String>,
        mime_type: Option<String>,
        base64: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            mime_type,
            base64: Some(base64.into()),
            ..Default::default()
        }
    }
}
