//! Tool dispatcher: runs one round of tool calls.
//!
//! Every call in a round runs concurrently and every call yields exactly one
//! [`ToolCallResult`]. Lookup failures, bad arguments, provider errors and
//! timeouts all come back as failure results; nothing here returns `Err`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;

use conduit_llm::{FailureKind, ToolCallRequest, ToolCallResult};

use crate::registry::ToolRegistry;
use crate::schema;
use crate::types::instant_after;

/// Dispatches tool calls against a registry.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    default_timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, default_timeout: Duration) -> Self {
        Self {
            registry,
            default_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Run `calls` concurrently and return their results in request order.
    ///
    /// A call is cut off at its own timeout or at `deadline`, whichever comes
    /// first. A call id seen earlier in the same batch is not dispatched
    /// again; that call gets an `InvalidArguments` failure.
    pub async fn dispatch(
        &self,
        calls: &[ToolCallRequest],
        deadline: Option<Instant>,
    ) -> Vec<ToolCallResult> {
        let mut seen = HashSet::with_capacity(calls.len());
        let duplicates: Vec<bool> = calls.iter().map(|c| !seen.insert(c.id.as_str())).collect();

        let pending = calls
            .iter()
            .zip(duplicates)
            .map(|(call, duplicate)| self.dispatch_one(call, duplicate, deadline));
        join_all(pending).await
    }

    async fn dispatch_one(
        &self,
        call: &ToolCallRequest,
        duplicate: bool,
        deadline: Option<Instant>,
    ) -> ToolCallResult {
        let started = Instant::now();
        let result = if duplicate {
            ToolCallResult::failure(
                &call.id,
                &call.name,
                FailureKind::InvalidArguments,
                format!("duplicate call id '{}' in this round", call.id),
            )
        } else {
            self.execute(call, deadline).await
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        match result.failure_descriptor() {
            None => tracing::debug!(
                tool = %call.name,
                call_id = %call.id,
                duration_ms,
                "tool call succeeded"
            ),
            Some(failure) => tracing::warn!(
                tool = %call.name,
                call_id = %call.id,
                duration_ms,
                kind = %failure.kind,
                error = %failure.message,
                "tool call failed"
            ),
        }
        result
    }

    async fn execute(&self, call: &ToolCallRequest, deadline: Option<Instant>) -> ToolCallResult {
        let fail = |kind, message: String| ToolCallResult::failure(&call.id, &call.name, kind, message);

        let Some(entry) = self.registry.resolve(&call.name) else {
            return fail(
                FailureKind::UnknownTool,
                format!(
                    "no tool named '{}' is registered (available: {})",
                    call.name,
                    self.registry.names().join(", ")
                ),
            );
        };

        if let Err(e) = schema::validate(&entry.schema, &call.arguments) {
            return fail(FailureKind::InvalidArguments, e.to_string());
        }

        let timeout = entry.timeout.unwrap_or(self.default_timeout);
        let own_limit = instant_after(Instant::now(), timeout);
        let limit = match deadline {
            Some(deadline) if deadline < own_limit => deadline,
            _ => own_limit,
        };

        match tokio::time::timeout_at(limit, entry.provider.invoke(&call.arguments)).await {
            Ok(Ok(output)) => ToolCallResult::success(&call.id, &call.name, output.payload)
                .with_attachments(output.attachments),
            Ok(Err(e)) => fail(FailureKind::ToolProviderError, e.to_string()),
            Err(_) if limit < own_limit => fail(
                FailureKind::ToolTimeout,
                "cut off by the request deadline".to_string(),
            ),
            Err(_) => fail(
                FailureKind::ToolTimeout,
                format!("no response within {}ms", timeout.as_millis()),
            ),
        }
    }
}
