//! Model client for Conduit.
//!
//! This crate owns the conversation transcript types and the client that
//! sends a transcript to the language-model endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  ModelClient trait                      │
//! │  - complete(transcript) -> ModelOutput  │
//! └─────────────────────────────────────────┘
//!                    │
//!          ┌─────────┴─────────┐
//!          ▼                   ▼
//!  ┌────────────────┐   ┌───────────┐
//!  │DeploymentClient│   │ MockModel │
//!  └────────────────┘   └───────────┘
//! ```
//!
//! [`ModelOutput`] is either a final answer or an ordered list of tool calls,
//! never both. Clients do not retry; failures are classified by
//! [`UpstreamKind`] so the caller can decide.

pub mod backend;
pub mod deployment;
pub mod error;
pub mod types;

pub use backend::{MockModel, MockReply, ModelClient, SharedModelClient};
pub use deployment::{DEFAULT_API_VERSION, DeploymentClient, DeploymentConfig, DeploymentReply};
pub use error::{LlmError, Result, UpstreamKind};
pub use types::{
    Attachment, CompletionRequest, FailureDescriptor, FailureKind, ModelOutput, Role,
    ToolCallRequest, ToolCallResult, ToolDefinition, ToolOutcome, Turn, TurnContent,
    validate_transcript,
};
