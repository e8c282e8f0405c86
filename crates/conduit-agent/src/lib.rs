//! Agent core for Conduit.
//!
//! This crate owns the orchestration loop: it sends the transcript to a model,
//! dispatches the tool calls the model asks for, feeds the results back and
//! repeats until the model answers or a bound is hit.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Orchestrator                                               │
//! │  - Drives one ConversationState per request                 │
//! │  - Enforces turn limit, deadline and retry budget           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┴───────────────┐
//!              ▼                               ▼
//!       ┌─────────────┐                ┌──────────────┐
//!       │ ModelClient │                │ToolDispatcher│
//!       │(conduit-llm)│                └──────────────┘
//!       └─────────────┘                        │
//!                                              ▼
//!                                      ┌──────────────┐
//!                                      │ ToolRegistry │──► McpToolProvider
//!                                      └──────────────┘    (conduit-mcp)
//!                                              │
//!                                              └─────────► DeploymentToolProvider
//!                                                          (conduit-llm)
//! ```
//!
//! # Core Components
//!
//! - [`Orchestrator`]: the loop, shared across requests
//! - [`ConversationState`]: transcript and counters of one request
//! - [`ToolRegistry`]: immutable name-to-provider map, built by [`discover`]
//! - [`ToolDispatcher`]: runs one round of calls concurrently
//!
//! Tools may hand files to the user alongside their payload. Those travel as
//! [`conduit_llm::Attachment`]s on the [`Answer`], never through the model.

pub mod dispatcher;
pub mod error;
pub mod orchestrator;
pub mod provider;
pub mod registry;
pub mod retry;
pub mod schema;
pub mod types;

pub use conduit_llm::Attachment;
pub use error::{AgentError, Result};
pub use types::{ConversationState, SessionId};

pub use dispatcher::ToolDispatcher;
pub use orchestrator::{
    Answer, LoopState, Orchestrator, OrchestratorBuilder, OrchestratorConfig, RunOutcome,
    TurnRequest,
};
pub use provider::{
    DeploymentToolProvider, INTERPRETER_OUTPUT_LIMIT, McpToolProvider, MockProvider,
    ProviderError, ToolKind, ToolOutput, ToolProvider, deployment_tool_schema,
    shape_interpreter_output,
};
pub use registry::{ToolRegistry, ToolRegistryBuilder, ToolRegistryEntry, ToolSpec, discover};
pub use retry::RetryPolicy;
pub use schema::{SchemaError, validate};
