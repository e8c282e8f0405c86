//! Tool listing endpoint.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// One registered tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
    /// Provider endpoint; empty for in-process tools.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub endpoint: String,
}

/// Response for GET /api/v1/tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResponse {
    pub tools: Vec<ToolSummary>,
}

/// GET /api/v1/tools - Registered tools, sorted by name.
pub async fn list_tools_handler(State(state): State<AppState>) -> Json<ListToolsResponse> {
    let tools = state
        .registry()
        .entries()
        .map(|entry| ToolSummary {
            name: entry.name.clone(),
            description: entry.description.clone(),
            endpoint: entry.endpoint.clone(),
        })
        .collect();
    Json(ListToolsResponse { tools })
}
