//! Error types for the agent crate.

use std::time::Duration;

use conduit_llm::LlmError;
use thiserror::Error;

/// Result type alias using the agent error type.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error type for agent operations.
///
/// At run time these are the reasons a request ends in `Failed`. Tool-level
/// failures never show up here; they travel as data inside tool results.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    /// The model endpoint failed and the retry budget is spent.
    #[error("model call failed: {0}")]
    Upstream(#[from] LlmError),

    /// The model kept asking for tools past the turn limit.
    #[error("turn limit of {limit} model calls exceeded")]
    TurnLimitExceeded { limit: u32 },

    /// The request deadline passed.
    #[error("request deadline exceeded after {}ms", elapsed.as_millis())]
    DeadlineExceeded { elapsed: Duration },

    /// The inbound request was unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Tool discovery or registration failed at startup.
    #[error("tool error: {0}")]
    Tool(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a tool error.
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable snake_case code for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Upstream(e) => e.kind().as_str(),
            AgentError::TurnLimitExceeded { .. } => "turn_limit_exceeded",
            AgentError::DeadlineExceeded { .. } => "deadline_exceeded",
            AgentError::InvalidInput(_) => "invalid_input",
            AgentError::Config(_) => "config_error",
            AgentError::Tool(_) => "tool_error",
            AgentError::Internal(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::TurnLimitExceeded { limit: 10 };
        assert_eq!(err.to_string(), "turn limit of 10 model calls exceeded");

        let err = AgentError::DeadlineExceeded {
            elapsed: Duration::from_millis(1500),
        };
        assert!(err.to_string().contains("1500ms"));
    }

    #[test]
    fn test_kind_codes() {
        let cases = [
            (AgentError::from(LlmError::unavailable("dns")), "upstream_unavailable"),
            (AgentError::from(LlmError::rejected(401, "bad key")), "upstream_rejected"),
            (AgentError::from(LlmError::timeout("slow")), "upstream_timeout"),
            (AgentError::TurnLimitExceeded { limit: 1 }, "turn_limit_exceeded"),
            (
                AgentError::DeadlineExceeded {
                    elapsed: Duration::ZERO,
                },
                "deadline_exceeded",
            ),
            (AgentError::invalid_input("empty"), "invalid_input"),
            (AgentError::internal("broken"), "internal_error"),
        ];
        for (err, code) in cases {
            assert_eq!(err.kind(), code, "{err}");
        }
    }
}
