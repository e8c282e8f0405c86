//! Error types for the model client.

use thiserror::Error;

/// Result type alias using the LLM error type.
pub type Result<T> = std::result::Result<T, LlmError>;

// ─────────────────────────────────────────────────────────────────────────────
// Upstream classification
// ─────────────────────────────────────────────────────────────────────────────

/// Coarse classification of a model endpoint failure.
///
/// This is what callers branch on and what ends up in user-facing error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamKind {
    /// Connection, DNS or server-side failure.
    Unavailable,
    /// Authentication or malformed-request error.
    Rejected,
    /// The endpoint did not answer in time.
    Timeout,
}

impl UpstreamKind {
    /// Stable snake_case code.
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamKind::Unavailable => "upstream_unavailable",
            UpstreamKind::Rejected => "upstream_rejected",
            UpstreamKind::Timeout => "upstream_timeout",
        }
    }
}

impl std::fmt::Display for UpstreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LlmError
// ─────────────────────────────────────────────────────────────────────────────

/// Error type for model client operations.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// The endpoint could not be reached or reported a server-side failure.
    #[error("model endpoint unavailable: {0}")]
    Unavailable(String),

    /// The endpoint refused the request.
    #[error("model endpoint rejected the request (HTTP {status}): {message}")]
    Rejected {
        /// HTTP status returned by the endpoint.
        status: u16,
        /// Error message from the endpoint.
        message: String,
    },

    /// The request did not complete in time.
    #[error("model endpoint timed out: {0}")]
    Timeout(String),

    /// The endpoint answered with something we could not decode.
    #[error("invalid response from model endpoint: {0}")]
    InvalidResponse(String),

    /// The request was rejected locally before any I/O.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The client could not be constructed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Create an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a rejected error.
    pub fn rejected(status: u16, msg: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: msg.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an invalid response error.
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Create an invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Classify an HTTP error status from the model endpoint.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            408 => Self::Timeout(format!("HTTP {}: {}", status, message)),
            429 | 500..=599 => Self::Unavailable(format!("HTTP {}: {}", status, message)),
            _ => Self::Rejected { status, message },
        }
    }

    /// The upstream category this error belongs to.
    pub fn kind(&self) -> UpstreamKind {
        match self {
            LlmError::Unavailable(_) => UpstreamKind::Unavailable,
            LlmError::Timeout(_) => UpstreamKind::Timeout,
            LlmError::Rejected { .. }
            | LlmError::InvalidResponse(_)
            | LlmError::InvalidRequest(_)
            | LlmError::Config(_) => UpstreamKind::Rejected,
        }
    }

    /// Whether repeating the same request could succeed.
    ///
    /// Locally detected problems are deterministic and never retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, LlmError::InvalidRequest(_) | LlmError::Config(_))
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(err.to_string())
        } else if err.is_decode() {
            LlmError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            LlmError::from_status(status.as_u16(), err.to_string())
        } else {
            LlmError::Unavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::InvalidResponse(err.to_string())
    }
}
