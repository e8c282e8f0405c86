//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [model]                  # chat-completions deployment
//! [agent]                  # loop bounds and retry policy
//! [server]                 # HTTP listener
//! [logging]                # optional JSON log directory
//! [[tools]]                # one entry per tool endpoint
//! ```

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// API version sent to the deployment when none is configured.
pub const DEFAULT_API_VERSION: &str = "2025-01-01-preview";

/// Placeholder shown instead of a secret.
pub const REDACTED: &str = "********";

/// Longest accepted timeout, for requests, model calls and tools (one day).
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Longest accepted retry backoff (ten minutes).
pub const MAX_BACKOFF_MS: u64 = 10 * 60 * 1000;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConduitConfig {
    /// Model deployment (`[model]`).
    pub model: Option<ModelConfig>,

    /// Orchestration loop bounds (`[agent]`).
    pub agent: Option<AgentConfig>,

    /// HTTP listener (`[server]`).
    pub server: Option<ServerConfig>,

    /// Log output (`[logging]`).
    pub logging: Option<LoggingConfig>,

    /// Tool endpoints (`[[tools]]`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolEntry>,
}

impl ConduitConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced whole. Tools are matched by name: a tool in
    /// `other` replaces the one with the same name, new names are appended.
    pub fn merge(&mut self, other: ConduitConfig) {
        if other.model.is_some() {
            self.model = other.model;
        }
        if other.agent.is_some() {
            self.agent = other.agent;
        }
        if other.server.is_some() {
            self.server = other.server;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }
        for tool in other.tools {
            self.upsert_tool(tool);
        }
    }

    /// Apply command-line overrides on top of the loaded layers.
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        let model = self.model.get_or_insert_with(ModelConfig::default);
        if let Some(key) = &overrides.api_key {
            model.api_key = Some(key.clone());
        }
        if let Some(deployment) = &overrides.deployment {
            model.deployment = Some(deployment.clone());
        }
        if let Some(endpoint) = &overrides.model_endpoint {
            model.endpoint = Some(endpoint.clone());
        }

        if let Some(max_turns) = overrides.max_turns {
            self.agent.get_or_insert_with(AgentConfig::default).max_turns = max_turns;
        }

        if overrides.bind.is_some() || overrides.port.is_some() {
            let server = self.server.get_or_insert_with(ServerConfig::default);
            if let Some(bind) = &overrides.bind {
                server.bind = bind.clone();
            }
            if let Some(port) = overrides.port {
                server.port = port;
            }
        }

        if let Some(url) = &overrides.interpreter_url {
            self.set_tool_url("code_interpreter", url, ToolKind::CodeInterpreter);
        }
        if let Some(url) = &overrides.search_url {
            self.set_tool_url("web_search", url, ToolKind::WebSearch);
        }
    }

    /// Insert a tool, replacing any tool with the same name.
    pub fn upsert_tool(&mut self, tool: ToolEntry) {
        match self.tools.iter_mut().find(|t| t.name == tool.name) {
            Some(existing) => *existing = tool,
            None => self.tools.push(tool),
        }
    }

    /// Point an existing tool at `url`, or define it.
    fn set_tool_url(&mut self, name: &str, url: &str, kind: ToolKind) {
        match self.tools.iter_mut().find(|t| t.name == name) {
            Some(existing) => {
                existing.url = url.to_string();
                existing.kind = kind;
                existing.enabled = true;
            }
            None => self.tools.push(ToolEntry::new(name, url, kind)),
        }
    }

    /// The model section, or defaults.
    pub fn model(&self) -> ModelConfig {
        self.model.clone().unwrap_or_default()
    }

    /// The agent section, or defaults.
    pub fn agent(&self) -> AgentConfig {
        self.agent.clone().unwrap_or_default()
    }

    /// The server section, or defaults.
    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    /// The logging section, or defaults.
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// Tools with `enabled = true`, in file order.
    pub fn enabled_tools(&self) -> impl Iterator<Item = &ToolEntry> {
        self.tools.iter().filter(|t| t.enabled)
    }

    /// Check the resolved config once, before anything is built from it.
    pub fn validate(&self) -> Result<()> {
        let model = self.model();
        if model.endpoint.as_deref().is_none_or(|s| s.trim().is_empty()) {
            return Err(ConfigError::missing("endpoint", "[model]"));
        }
        if model.deployment.as_deref().is_none_or(|s| s.trim().is_empty()) {
            return Err(ConfigError::missing("deployment", "[model]"));
        }
        if model.api_key.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::ApiKeyNotFound {
                env_var: crate::secrets::API_KEY_ENV.to_string(),
            });
        }
        if let Some(temperature) = model.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(ConfigError::invalid(
                "model.temperature",
                "must be between 0.0 and 2.0",
            ));
        }

        if let Some(secs) = model.timeout_secs {
            check_timeout("model.timeout_secs", secs)?;
        }

        let agent = self.agent();
        if agent.max_turns == 0 {
            return Err(ConfigError::invalid("agent.max_turns", "must be at least 1"));
        }
        check_timeout("agent.request_timeout_secs", agent.request_timeout_secs)?;
        check_timeout("agent.tool_timeout_secs", agent.tool_timeout_secs)?;
        for (field, ms) in [
            ("agent.retry_backoff_ms", agent.retry_backoff_ms),
            ("agent.retry_backoff_max_ms", agent.retry_backoff_max_ms),
        ] {
            if ms > MAX_BACKOFF_MS {
                return Err(ConfigError::invalid(
                    field,
                    format!("must be at most {}", MAX_BACKOFF_MS),
                ));
            }
        }

        self.validate_tools()
    }

    /// Tool names unique, URLs present. Disabled tools are skipped.
    pub fn validate_tools(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for tool in self.enabled_tools() {
            if tool.name.trim().is_empty() {
                return Err(ConfigError::missing("name", "[[tools]]"));
            }
            if !seen.insert(tool.name.as_str()) {
                return Err(ConfigError::DuplicateTool(tool.name.clone()));
            }
            if tool.url.trim().is_empty() && tool.kind != ToolKind::Deployment {
                return Err(ConfigError::missing("url", format!("[[tools]] '{}'", tool.name)));
            }
            if let Some(secs) = tool.timeout_secs {
                check_timeout(&format!("tools.{}.timeout_secs", tool.name), secs)?;
            }
        }
        Ok(())
    }

    /// A copy safe to print, with the API key masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(model) = copy.model.as_mut()
            && model.api_key.is_some()
        {
            model.api_key = Some(REDACTED.to_string());
        }
        for tool in &mut copy.tools {
            for header in &mut tool.headers {
                if is_secret_header(&header[0]) {
                    header[1] = REDACTED.to_string();
                }
            }
        }
        copy
    }
}

fn check_timeout(field: &str, secs: u64) -> Result<()> {
    if !(1..=MAX_TIMEOUT_SECS).contains(&secs) {
        return Err(ConfigError::invalid(
            field,
            format!("must be between 1 and {} seconds", MAX_TIMEOUT_SECS),
        ));
    }
    Ok(())
}

fn is_secret_header(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name == "authorization" || name.contains("key") || name.contains("token")
}

// ─────────────────────────────────────────────────────────────────────────────
// CLI Overrides
// ─────────────────────────────────────────────────────────────────────────────

/// Values given on the command line, applied over every file layer.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub deployment: Option<String>,
    pub model_endpoint: Option<String>,
    /// Defines or replaces the `code_interpreter` tool.
    pub interpreter_url: Option<String>,
    /// Defines or replaces the `web_search` tool.
    pub search_url: Option<String>,
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub max_turns: Option<u32>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Model Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Chat-completions deployment settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL of the resource, e.g. `https://example.openai.azure.com`.
    pub endpoint: Option<String>,
    /// Deployment name.
    pub deployment: Option<String>,
    /// API key (prefer the env var; warns if set here).
    pub api_key: Option<String>,
    pub api_version: Option<String>,
    /// Per-request HTTP timeout in seconds.
    pub timeout_secs: Option<u64>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system_prompt: Option<String>,
}

impl ModelConfig {
    /// Returns true if an API key is stored directly in the config file.
    pub fn has_plaintext_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn api_version(&self) -> &str {
        self.api_version.as_deref().unwrap_or(DEFAULT_API_VERSION)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(60))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Loop bounds and retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Most model turns per request.
    pub max_turns: u32,
    /// Wall-clock budget per request.
    pub request_timeout_secs: u64,
    /// Retries after a failed model call.
    pub retry_max: u32,
    /// First backoff; doubles per retry.
    pub retry_backoff_ms: u64,
    pub retry_backoff_max_ms: u64,
    /// Default per-call tool timeout.
    pub tool_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            request_timeout_secs: 120,
            retry_max: 3,
            retry_backoff_ms: 500,
            retry_backoff_max_ms: 8000,
            tool_timeout_secs: 30,
        }
    }
}

impl AgentConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn retry_backoff_max(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_max_ms)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind: String,
    /// Port to listen on.
    pub port: u16,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8080,
            max_body_bytes: 1024 * 1024,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for daily-rolling JSON log files.
    pub dir: Option<PathBuf>,
    /// Emit JSON on the console too.
    pub json: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// What a tool endpoint serves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    CodeInterpreter,
    WebSearch,
    /// Another deployment on a model endpoint, called with a prompt.
    Deployment,
    #[default]
    Generic,
}

/// One tool endpoint.
///
/// ```toml
/// [[tools]]
/// name = "web_search"
/// url = "http://localhost:7001/mcp"
/// kind = "web_search"
/// remote_name = "bing_search"
/// timeout_secs = 20
/// headers = [["Authorization", "Bearer ..."]]
/// ```
///
/// Deployment tools name the deployment in `remote_name` and may leave `url`
/// empty to use the `[model]` endpoint and key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEntry {
    /// Registry key, the name the model sees.
    pub name: String,
    /// MCP endpoint URL, or model endpoint for deployment tools.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub kind: ToolKind,
    /// Tool name on the server. Defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_name: Option<String>,
    /// Overrides the discovered description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Overrides the discovered input schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// HTTP headers as [key, value] pairs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<[String; 2]>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ToolEntry {
    pub fn new(name: impl Into<String>, url: impl Into<String>, kind: ToolKind) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind,
            remote_name: None,
            description: None,
            schema: None,
            timeout_secs: None,
            headers: Vec::new(),
            enabled: true,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
