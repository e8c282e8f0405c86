//! Chat endpoint: one orchestrated request per call.

use std::time::Duration;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use conduit_agent::{Attachment, SessionId, TurnRequest};

use crate::error::ServerError;
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Request/Response Types
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for the chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,

    /// Optional session ID, echoed back. A new one is minted when absent.
    #[serde(default)]
    pub session_id: Option<String>,

    /// Shortens the server's request timeout for this call.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ChatRequest {
    /// Validate and convert into an orchestrator request.
    pub fn into_turn(self) -> Result<TurnRequest, ServerError> {
        if self.message.trim().is_empty() {
            return Err(ServerError::bad_request("message must not be empty"));
        }

        let mut turn = TurnRequest::new(self.message);
        if let Some(raw) = self.session_id {
            let id: SessionId = raw
                .parse()
                .map_err(|_| ServerError::bad_request(format!("invalid session_id '{}'", raw)))?;
            turn = turn.with_session(id);
        }
        match self.timeout_secs {
            Some(0) => return Err(ServerError::bad_request("timeout_secs must be positive")),
            Some(secs) => turn = turn.with_timeout(Duration::from_secs(secs)),
            None => {}
        }
        Ok(turn)
    }
}

/// Response from the chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The session ID (given or new).
    pub session_id: String,

    /// The model's final answer.
    pub answer: String,

    /// Tool rounds it took.
    pub rounds: u32,

    /// Files tools produced for the user.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/chat - Run the message to completion and return the answer.
pub async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ServerError> {
    let Json(request) = payload.map_err(from_rejection)?;
    let turn = request.into_turn()?;

    let answer = state.orchestrator.answer(turn).await?;

    Ok(Json(ChatResponse {
        session_id: answer.session_id.to_string(),
        answer: answer.text,
        rounds: answer.rounds,
        attachments: answer.attachments,
    }))
}

fn from_rejection(rejection: JsonRejection) -> ServerError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge(rejection.body_text())
    } else {
        ServerError::BadRequest(rejection.body_text())
    }
}
