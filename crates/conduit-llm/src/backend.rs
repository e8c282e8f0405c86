//! Model client trait and a scripted mock implementation.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{LlmError, Result};
use crate::types::{CompletionRequest, ModelOutput, ToolCallRequest};

// ─────────────────────────────────────────────────────────────────────────────
// ModelClient Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A language-model endpoint.
///
/// One call to [`complete`](ModelClient::complete) is one outbound request
/// carrying the whole transcript. Implementations never retry; retry policy
/// belongs to the caller.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send the transcript and return the model's output.
    async fn complete(&self, request: &CompletionRequest) -> Result<ModelOutput>;

    /// Client name for logs.
    fn name(&self) -> &str;
}

/// Shared model client handle.
pub type SharedModelClient = Arc<dyn ModelClient>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Model
// ─────────────────────────────────────────────────────────────────────────────

/// A scripted reply from [`MockModel`].
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this output.
    Output(ModelOutput),
    /// Fail with this error.
    Error(LlmError),
    /// Wait this long, then return the inner reply.
    Delayed(std::time::Duration, Box<MockReply>),
}

/// A mock model for tests.
///
/// Replies are returned in order. Once the script is exhausted every further
/// call fails with [`LlmError::Unavailable`]. Every request is recorded.
#[derive(Debug)]
pub struct MockModel {
    name: String,
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<CompletionRequest>>,
    fallback: Option<MockReply>,
}

impl MockModel {
    /// Create a mock with the given script.
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            name: "mock".to_string(),
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            fallback: None,
        }
    }

    /// A mock that answers once with the given text.
    pub fn with_answer(text: impl Into<String>) -> Self {
        Self::new(vec![MockReply::Output(ModelOutput::FinalAnswer(text.into()))])
    }

    /// A mock that fails every call with the given error.
    pub fn always_failing(error: LlmError) -> Self {
        Self::new(Vec::new()).with_fallback(MockReply::Error(error))
    }

    /// A mock that requests the same tool calls forever.
    pub fn always_calling(calls: Vec<ToolCallRequest>) -> Self {
        Self::new(Vec::new())
            .with_fallback(MockReply::Output(ModelOutput::ToolCallsRequested(calls)))
    }

    /// Reply used once the script is exhausted.
    pub fn with_fallback(mut self, reply: MockReply) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// Append a final answer to the script.
    pub fn then_answer(self, text: impl Into<String>) -> Self {
        self.replies
            .lock()
            .push_back(MockReply::Output(ModelOutput::FinalAnswer(text.into())));
        self
    }

    /// Append a tool-call request to the script.
    pub fn then_call(self, calls: Vec<ToolCallRequest>) -> Self {
        self.replies
            .lock()
            .push_back(MockReply::Output(ModelOutput::ToolCallsRequested(calls)));
        self
    }

    /// Append an error to the script.
    pub fn then_fail(self, error: LlmError) -> Self {
        self.replies.lock().push_back(MockReply::Error(error));
        self
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    async fn play(reply: MockReply) -> Result<ModelOutput> {
        let mut reply = reply;
        loop {
            match reply {
                MockReply::Output(output) => return Ok(output),
                MockReply::Error(error) => return Err(error),
                MockReply::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
            }
        }
    }
}

#[async_trait]
impl ModelClient for MockModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<ModelOutput> {
        self.requests.lock().push(request.clone());

        let next = self.replies.lock().pop_front();
        let reply = match next.or_else(|| self.fallback.clone()) {
            Some(reply) => reply,
            None => {
                return Err(LlmError::unavailable(
                    "MockModel: no more replies available",
                ));
            }
        };

        Self::play(reply).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
