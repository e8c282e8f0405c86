//! Error types for the server.
//!
//! Every failure leaves the server as `{code, message}`. The message is a
//! fixed description of the code; the underlying detail only goes to the log.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use conduit_agent::AgentError;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Malformed or invalid request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request body over the configured limit.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// A run ended in `Failed`.
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ServerError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// HTTP status, stable code and fixed message for this error.
    pub fn classify(&self) -> (StatusCode, &'static str, &'static str) {
        match self {
            ServerError::BadRequest(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_input",
                "The request is invalid.",
            ),
            ServerError::PayloadTooLarge(_) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                "The request body is too large.",
            ),
            ServerError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "The server failed to process the request.",
            ),
            ServerError::Agent(e) => classify_agent_error(e),
        }
    }
}

fn classify_agent_error(e: &AgentError) -> (StatusCode, &'static str, &'static str) {
    let code = e.kind();
    match code {
        "upstream_unavailable" => (
            StatusCode::BAD_GATEWAY,
            code,
            "The model service is unavailable.",
        ),
        "upstream_rejected" => (
            StatusCode::BAD_GATEWAY,
            code,
            "The model service rejected the request.",
        ),
        "upstream_timeout" => (
            StatusCode::BAD_GATEWAY,
            code,
            "The model service did not respond in time.",
        ),
        "turn_limit_exceeded" => (
            StatusCode::BAD_GATEWAY,
            code,
            "The request needed more model turns than allowed.",
        ),
        "deadline_exceeded" => (
            StatusCode::GATEWAY_TIMEOUT,
            code,
            "The request did not finish within its time limit.",
        ),
        "invalid_input" => (StatusCode::BAD_REQUEST, code, "The request is invalid."),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "The server failed to process the request.",
        ),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.classify();
        let detail = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status.as_u16(), code, error = %detail, "Server error");
        } else {
            tracing::warn!(status = %status.as_u16(), code, error = %detail, "Client error");
        }

        let body = ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
