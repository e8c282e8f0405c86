//! API routes.

pub mod chat;
pub mod health;
pub mod tools;

pub use chat::{ChatRequest, ChatResponse, chat_handler};
pub use health::{HealthResponse, health_routes};
pub use tools::{ListToolsResponse, ToolSummary, list_tools_handler};
