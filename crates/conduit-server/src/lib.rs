//! HTTP API server for Conduit.
//!
//! A thin boundary over the orchestrator: it decodes requests, runs them,
//! and maps terminal failures onto HTTP status codes.
//!
//! # Routes
//!
//! - `GET /health`
//! - `GET /api/v1/tools`
//! - `POST /api/v1/chat`
//!
//! # Example
//!
//! ```ignore
//! use conduit_server::{Server, ServerConfig};
//!
//! let config = ServerConfig::new().with_bind_address("127.0.0.1:8080".parse()?);
//! Server::new(orchestrator, config).run().await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{ErrorResponse, Result, ServerError};
pub use routes::{ChatRequest, ChatResponse, HealthResponse, ListToolsResponse, ToolSummary};
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;

use axum::{Router, extract::DefaultBodyLimit};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use conduit_agent::Orchestrator;

/// The Conduit HTTP server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a new server with the given orchestrator and configuration.
    pub fn new(orchestrator: Orchestrator, config: ServerConfig) -> Self {
        Self {
            state: AppState::new(orchestrator, config),
        }
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(routes::health_routes())
            .nest("/api/v1", self.api_routes())
            .layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                middleware::request_logging_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// API routes (v1).
    fn api_routes(&self) -> Router<AppState> {
        use axum::routing::{get, post};

        Router::new()
            .route("/chat", post(routes::chat_handler))
            .route("/tools", get(routes::list_tools_handler))
            .layer(DefaultBodyLimit::max(self.state.config.max_body_size))
    }

    /// Run the server on the configured address.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        self.run_on(addr).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        self.run_until(addr, std::future::pending()).await
    }

    /// Run until `shutdown` resolves, then finish in-flight requests.
    pub async fn run_until(
        self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let router = self.router();

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind {}: {}", addr, e)))?;
        let local = listener
            .local_addr()
            .map_err(|e| ServerError::Internal(format!("Failed to read local address: {}", e)))?;

        info!(
            addr = %local,
            tools = self.state.registry().len(),
            "Starting server"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;

        info!("Server stopped");
        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}
