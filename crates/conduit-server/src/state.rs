//! Application state shared across handlers.

use std::sync::Arc;

use conduit_agent::{Orchestrator, ToolRegistry};

use crate::config::ServerConfig;

/// Application state shared across all handlers.
///
/// Holds no per-request data; every chat request gets its own conversation
/// state inside the orchestrator.
#[derive(Clone)]
pub struct AppState {
    /// The orchestrator serving chat requests.
    pub orchestrator: Arc<Orchestrator>,

    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(orchestrator: Orchestrator, config: ServerConfig) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            config: Arc::new(config),
        }
    }

    /// The frozen tool registry.
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        self.orchestrator.registry()
    }
}
