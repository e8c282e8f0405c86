//! Liveness check for load balancers and deploy scripts.

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Body of `GET /health`.
///
/// The server only starts listening after tool discovery succeeded, so a
/// response here means every configured tool endpoint answered at startup.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"`.
    pub status: String,
    /// Crate version of the running binary.
    pub version: String,
    /// Number of tools the model can call.
    pub tools: usize,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        tools: state.registry().len(),
    })
}

/// Routes mounted at the root, outside `/api/v1`.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
