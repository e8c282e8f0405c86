//! Core types for the agent crate.
//!
//! - [`SessionId`]: identifier echoed back to the caller
//! - [`ConversationState`]: the transcript and loop counters of one request

use std::str::FromStr;
use std::time::Duration;

use conduit_llm::{ToolCallRequest, ToolCallResult, Turn, TurnContent};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{AgentError, Result};

/// Stand-in for "no limit" when a timeout is too large to represent.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// `start + wait`, saturating at a far-future instant instead of panicking.
pub(crate) fn instant_after(start: Instant, wait: Duration) -> Instant {
    start
        .checked_add(wait)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}

// ─────────────────────────────────────────────────────────────────────────────
// ID Types
// ─────────────────────────────────────────────────────────────────────────────

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| AgentError::invalid_input(format!("invalid session id '{}': {}", s, e)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversation State
// ─────────────────────────────────────────────────────────────────────────────

/// Transcript and counters for one in-flight request.
///
/// Owned by a single orchestrator run and dropped when it ends. Turns are
/// append-only; a model turn that requests tools must be followed by exactly
/// one result per call before anything else is appended.
#[derive(Debug, Clone)]
pub struct ConversationState {
    session_id: SessionId,
    turns: Vec<Turn>,
    turn_count: u32,
    started_at: Instant,
    deadline: Instant,
}

impl ConversationState {
    /// Start a conversation that must finish within `timeout`.
    pub fn new(session_id: SessionId, timeout: Duration) -> Self {
        let started_at = Instant::now();
        Self {
            session_id,
            turns: Vec::new(),
            turn_count: 0,
            started_at,
            deadline: instant_after(started_at, timeout),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// The transcript in causal order.
    pub fn transcript(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of model calls issued so far.
    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    /// Count one model call and return the new total.
    pub fn record_model_call(&mut self) -> u32 {
        self.turn_count += 1;
        self.turn_count
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Calls of the model turn still waiting for results, if any.
    pub fn open_round(&self) -> Option<&[ToolCallRequest]> {
        match self.turns.last().map(|t| &t.content) {
            Some(TurnContent::ToolCalls { calls }) if !calls.is_empty() => Some(calls),
            _ => None,
        }
    }

    fn ensure_no_open_round(&self, what: &str) -> Result<()> {
        match self.open_round() {
            Some(calls) => Err(AgentError::internal(format!(
                "cannot append {} while {} tool call(s) await results",
                what,
                calls.len()
            ))),
            None => Ok(()),
        }
    }

    /// Append the user's message.
    pub fn push_user(&mut self, text: impl Into<String>) -> Result<()> {
        self.ensure_no_open_round("a user turn")?;
        self.turns.push(Turn::user(text));
        Ok(())
    }

    /// Append a model turn with its final text.
    pub fn push_model_text(&mut self, text: impl Into<String>) -> Result<()> {
        self.ensure_no_open_round("a model turn")?;
        self.turns.push(Turn::model_text(text));
        Ok(())
    }

    /// Append a model turn that requests tools, opening a round.
    pub fn push_model_calls(&mut self, calls: Vec<ToolCallRequest>) -> Result<()> {
        self.ensure_no_open_round("a model turn")?;
        if calls.is_empty() {
            return Err(AgentError::internal("model turn requests no tool calls"));
        }
        self.turns.push(Turn::model_calls(calls));
        Ok(())
    }

    /// Close the open round with its results.
    ///
    /// The call ids of `results` must match the ids of the open round exactly,
    /// counting repeats. Nothing is appended when they do not.
    pub fn push_tool_results(&mut self, results: Vec<ToolCallResult>) -> Result<()> {
        let calls = self
            .open_round()
            .ok_or_else(|| AgentError::internal("tool results without an open round"))?;

        let mut expected: Vec<&str> = calls.iter().map(|c| c.id.as_str()).collect();
        let mut actual: Vec<&str> = results.iter().map(|r| r.call_id.as_str()).collect();
        expected.sort_unstable();
        actual.sort_unstable();
        if expected != actual {
            return Err(AgentError::internal(format!(
                "round expects results for {:?}, got {:?}",
                expected, actual
            )));
        }

        self.turns.extend(results.into_iter().map(Turn::tool_result));
        Ok(())
    }
}
