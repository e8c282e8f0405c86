//! The orchestration loop.
//!
//! One [`Orchestrator`] serves every request; each call to
//! [`run`](Orchestrator::run) owns a fresh [`ConversationState`] and drives it
//! through the state machine:
//!
//! ```text
//!   Start ──► AwaitingModel ──FinalAnswer──► Done(answer)
//!                 ▲    │
//!                 │    └──ToolCallsRequested──► AwaitingTools
//!                 │                                  │
//!                 └──────────── results ◄────────────┘
//!
//!   any state ──► Failed(error)   turn limit, deadline, upstream failure
//! ```
//!
//! The deadline and the turn limit are checked before every model call and
//! every dispatch. In-flight calls are raced against the deadline and
//! dropped when it fires.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::Instrument;

use conduit_llm::{
    Attachment, CompletionRequest, LlmError, ModelClient, ModelOutput, SharedModelClient,
    ToolCallRequest,
};

use crate::dispatcher::ToolDispatcher;
use crate::error::{AgentError, Result};
use crate::registry::ToolRegistry;
use crate::retry::RetryPolicy;
use crate::types::{ConversationState, SessionId, instant_after};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Loop bounds and model request settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Most model turns one request may take.
    pub max_turns: u32,
    /// Wall-clock budget for one request, retries included.
    pub request_timeout: Duration,
    /// Per-call tool timeout when the registry entry sets none.
    pub tool_timeout: Duration,
    pub retry: RetryPolicy,
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            request_timeout: Duration::from_secs(120),
            tool_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            system_prompt: None,
            max_tokens: None,
            temperature: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Requests and outcomes
// ─────────────────────────────────────────────────────────────────────────────

/// One inbound request.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// Echoed back; a new id is minted when absent.
    pub session_id: Option<SessionId>,
    pub message: String,
    /// Shortens the configured request timeout; never extends it.
    pub timeout: Option<Duration>,
}

impl TurnRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            session_id: None,
            message: message.into(),
            timeout: None,
        }
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Where the loop is.
#[derive(Debug, Clone)]
pub enum LoopState {
    Start,
    AwaitingModel,
    /// Calls of the current round, not yet dispatched.
    AwaitingTools(Vec<ToolCallRequest>),
    Done(String),
    Failed(AgentError),
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Done(_) | LoopState::Failed(_))
    }
}

/// How a run ended, with its counters.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub session_id: SessionId,
    /// Always `Done` or `Failed`.
    pub state: LoopState,
    /// Completed tool rounds.
    pub rounds: u32,
    /// Model requests sent, retries included.
    pub model_calls: u32,
    /// Tool calls dispatched.
    pub tool_calls: u32,
    /// Files tools produced for the user, in dispatch order.
    pub attachments: Vec<Attachment>,
}

impl RunOutcome {
    /// The answer, if the run finished.
    pub fn answer(&self) -> Option<&str> {
        match &self.state {
            LoopState::Done(text) => Some(text),
            _ => None,
        }
    }

    /// The error, if the run failed.
    pub fn error(&self) -> Option<&AgentError> {
        match &self.state {
            LoopState::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// A finished run's answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub session_id: SessionId,
    pub text: String,
    pub rounds: u32,
    pub model_calls: u32,
    pub tool_calls: u32,
    pub attachments: Vec<Attachment>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

/// Drives requests to completion. Cheap to share; holds no per-request state.
#[derive(Clone)]
pub struct Orchestrator {
    model: SharedModelClient,
    dispatcher: ToolDispatcher,
    config: OrchestratorConfig,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("model", &self.model.name())
            .field("tools", &self.dispatcher.registry().names())
            .field("config", &self.config)
            .finish()
    }
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        self.dispatcher.registry()
    }

    /// Run one request to a terminal state.
    pub async fn run(&self, request: TurnRequest) -> RunOutcome {
        let session_id = request.session_id.unwrap_or_default();
        let timeout = request
            .timeout
            .map_or(self.config.request_timeout, |t| t.min(self.config.request_timeout));

        let span = tracing::info_span!("run", %session_id);
        let mut run = Run {
            orchestrator: self,
            state: ConversationState::new(session_id, timeout),
            rounds: 0,
            model_calls: 0,
            tool_calls: 0,
            attachments: Vec::new(),
        };
        let state = run.drive(request.message).instrument(span).await;

        RunOutcome {
            session_id,
            state,
            rounds: run.rounds,
            model_calls: run.model_calls,
            tool_calls: run.tool_calls,
            attachments: run.attachments,
        }
    }

    /// Run one request and return its answer, or the reason it failed.
    pub async fn answer(&self, request: TurnRequest) -> Result<Answer> {
        let outcome = self.run(request).await;
        match outcome.state {
            LoopState::Done(text) => Ok(Answer {
                session_id: outcome.session_id,
                text,
                rounds: outcome.rounds,
                model_calls: outcome.model_calls,
                tool_calls: outcome.tool_calls,
                attachments: outcome.attachments,
            }),
            LoopState::Failed(e) => Err(e),
            other => Err(AgentError::internal(format!(
                "run ended in non-terminal state {:?}",
                other
            ))),
        }
    }
}

/// Per-request loop state.
struct Run<'a> {
    orchestrator: &'a Orchestrator,
    state: ConversationState,
    rounds: u32,
    model_calls: u32,
    tool_calls: u32,
    attachments: Vec<Attachment>,
}

impl Run<'_> {
    async fn drive(&mut self, message: String) -> LoopState {
        tracing::info!(message_len = message.len(), "run started");

        let mut current = LoopState::Start;
        let mut message = Some(message);
        while !current.is_terminal() {
            current = match current {
                LoopState::Start => self.start(message.take().unwrap_or_default()),
                LoopState::AwaitingModel => self.await_model().await,
                LoopState::AwaitingTools(calls) => self.await_tools(calls).await,
                terminal => terminal,
            };
        }

        match &current {
            LoopState::Done(answer) => tracing::info!(
                rounds = self.rounds,
                model_calls = self.model_calls,
                tool_calls = self.tool_calls,
                answer_len = answer.len(),
                elapsed_ms = self.state.elapsed().as_millis() as u64,
                "run completed"
            ),
            LoopState::Failed(e) => tracing::warn!(
                rounds = self.rounds,
                model_calls = self.model_calls,
                kind = e.kind(),
                error = %e,
                "run failed"
            ),
            _ => {}
        }
        current
    }

    fn start(&mut self, message: String) -> LoopState {
        if message.trim().is_empty() {
            return LoopState::Failed(AgentError::invalid_input("message must not be empty"));
        }
        match self.state.push_user(message) {
            Ok(()) => LoopState::AwaitingModel,
            Err(e) => LoopState::Failed(e),
        }
    }

    fn deadline_exceeded(&self) -> AgentError {
        AgentError::DeadlineExceeded {
            elapsed: self.state.elapsed(),
        }
    }

    async fn await_model(&mut self) -> LoopState {
        if self.state.is_expired() {
            return LoopState::Failed(self.deadline_exceeded());
        }
        let config = &self.orchestrator.config;
        let turn = self.state.record_model_call();
        if turn > config.max_turns {
            return LoopState::Failed(AgentError::TurnLimitExceeded {
                limit: config.max_turns,
            });
        }

        let mut request = CompletionRequest::new(self.state.transcript().to_vec())
            .with_tools(self.orchestrator.registry().definitions());
        if let Some(system) = &config.system_prompt {
            request = request.with_system(system.clone());
        }
        if let Some(max_tokens) = config.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        if let Some(temperature) = config.temperature {
            request = request.with_temperature(temperature);
        }

        tracing::debug!(turn, transcript_len = request.transcript.len(), "calling model");

        let output = match self.complete_with_retry(&request).await {
            Ok(output) => output,
            Err(e) => return LoopState::Failed(e),
        };

        let appended = match output {
            ModelOutput::FinalAnswer(text) => {
                self.state.push_model_text(text.clone()).map(|()| LoopState::Done(text))
            }
            ModelOutput::ToolCallsRequested(calls) if calls.is_empty() => Err(AgentError::Upstream(
                LlmError::invalid_response("model requested an empty set of tool calls"),
            )),
            ModelOutput::ToolCallsRequested(calls) => {
                tracing::debug!(
                    turn,
                    tool_count = calls.len(),
                    tools = %calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", "),
                    "model requested tools"
                );
                self.state
                    .push_model_calls(calls.clone())
                    .map(|()| LoopState::AwaitingTools(calls))
            }
        };
        appended.unwrap_or_else(LoopState::Failed)
    }

    /// Call the model, retrying failures with backoff inside the deadline.
    async fn complete_with_retry(&mut self, request: &CompletionRequest) -> Result<ModelOutput> {
        let config = &self.orchestrator.config;
        let model = &self.orchestrator.model;
        let deadline = self.state.deadline();
        let mut retry = 0;

        loop {
            if self.state.is_expired() {
                return Err(self.deadline_exceeded());
            }
            self.model_calls += 1;
            let attempt = retry + 1;

            let error = match tokio::time::timeout_at(deadline, model.complete(request)).await {
                Ok(Ok(output)) => return Ok(output),
                Ok(Err(e)) => e,
                Err(_) => {
                    tracing::warn!(attempt, "model call cut off by the request deadline");
                    return Err(self.deadline_exceeded());
                }
            };

            retry += 1;
            let backoff = if error.is_retryable() {
                config.retry.backoff(retry)
            } else {
                None
            };
            let Some(backoff) = backoff else {
                tracing::warn!(attempt, kind = %error.kind(), error = %error, "model call failed");
                return Err(AgentError::Upstream(error));
            };

            tracing::warn!(
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                kind = %error.kind(),
                error = %error,
                "model call failed, retrying"
            );
            tokio::time::sleep_until(instant_after(Instant::now(), backoff).min(deadline)).await;
        }
    }

    async fn await_tools(&mut self, calls: Vec<ToolCallRequest>) -> LoopState {
        if self.state.is_expired() {
            return LoopState::Failed(self.deadline_exceeded());
        }

        self.rounds += 1;
        self.tool_calls += calls.len() as u32;
        let round = self.rounds;

        let mut results = self
            .orchestrator
            .dispatcher
            .dispatch(&calls, Some(self.state.deadline()))
            .await;
        for result in &mut results {
            self.attachments.append(&mut result.attachments);
        }
        let failed = results.iter().filter(|r| !r.is_success()).count();
        tracing::debug!(round, calls = calls.len(), failed, "round completed");

        match self.state.push_tool_results(results) {
            Ok(()) => LoopState::AwaitingModel,
            Err(e) => LoopState::Failed(e),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for [`Orchestrator`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    model: Option<SharedModelClient>,
    registry: Option<Arc<ToolRegistry>>,
    config: OrchestratorConfig,
}

impl OrchestratorBuilder {
    pub fn with_model(mut self, model: impl ModelClient + 'static) -> Self {
        self.model = Some(Arc::new(model));
        self
    }

    pub fn with_shared_model(mut self, model: SharedModelClient) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_registry(mut self, registry: impl Into<Arc<ToolRegistry>>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        let model = self
            .model
            .ok_or_else(|| AgentError::config("a model client is required"))?;
        if self.config.max_turns == 0 {
            return Err(AgentError::config("max_turns must be at least 1"));
        }
        if self.config.request_timeout.is_zero() {
            return Err(AgentError::config("request timeout must be positive"));
        }
        if self.config.tool_timeout.is_zero() {
            return Err(AgentError::config("tool timeout must be positive"));
        }

        let registry = self.registry.unwrap_or_default();
        let dispatcher = ToolDispatcher::new(registry, self.config.tool_timeout);
        Ok(Orchestrator {
            model,
            dispatcher,
            config: self.config,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
