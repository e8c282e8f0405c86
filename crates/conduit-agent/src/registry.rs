//! Tool registry: tool name to provider, endpoint and input schema.
//!
//! The registry is assembled once at startup, either by hand through
//! [`ToolRegistryBuilder`] or from configured endpoints by [`discover`], and
//! is read-only afterwards. Share it behind an `Arc`; it needs no locking.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use conduit_llm::{DeploymentClient, DeploymentConfig, ToolDefinition};
use conduit_mcp::{McpClient, McpServerConfig, ToolInfo};

use crate::error::{AgentError, Result};
use crate::provider::{
    DeploymentToolProvider, McpToolProvider, ToolKind, ToolProvider, deployment_tool_schema,
};

// ─────────────────────────────────────────────────────────────────────────────
// Entries
// ─────────────────────────────────────────────────────────────────────────────

/// One registered tool.
#[derive(Clone)]
pub struct ToolRegistryEntry {
    /// Unique registry key, the name the model uses.
    pub name: String,
    /// Description offered to the model.
    pub description: String,
    /// Where the provider lives, for logs and listings.
    pub endpoint: String,
    /// JSON Schema the arguments are validated against.
    pub schema: Value,
    /// Per-call timeout override.
    pub timeout: Option<Duration>,
    pub provider: Arc<dyn ToolProvider>,
}

impl ToolRegistryEntry {
    /// An entry accepting any object, with no description or endpoint.
    pub fn new(name: impl Into<String>, provider: Arc<dyn ToolProvider>) -> Self {
        let name = name.into();
        Self {
            description: format!("{} tool", name),
            name,
            endpoint: String::new(),
            schema: json!({"type": "object"}),
            timeout: None,
            provider,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The definition offered to the model.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(&self.name, &self.description, self.schema.clone())
    }
}

impl std::fmt::Debug for ToolRegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistryEntry")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Immutable set of tools, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    entries: BTreeMap<String, ToolRegistryEntry>,
}

impl ToolRegistry {
    /// A registry with no tools.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Look up a tool by name.
    pub fn resolve(&self, name: &str) -> Option<&ToolRegistryEntry> {
        self.entries.get(name)
    }

    /// Definitions for every tool, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.entries.values().map(ToolRegistryEntry::definition).collect()
    }

    /// Tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ToolRegistryEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collects entries and checks them once in [`build`](Self::build).
#[derive(Debug, Default)]
pub struct ToolRegistryBuilder {
    entries: Vec<ToolRegistryEntry>,
}

impl ToolRegistryBuilder {
    pub fn register(mut self, entry: ToolRegistryEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Freeze the registry. Empty or repeated names are configuration errors.
    pub fn build(self) -> Result<ToolRegistry> {
        let mut entries = BTreeMap::new();
        for entry in self.entries {
            if entry.name.trim().is_empty() {
                return Err(AgentError::config("tool name must not be empty"));
            }
            if entries.contains_key(&entry.name) {
                return Err(AgentError::config(format!(
                    "tool '{}' is registered more than once",
                    entry.name
                )));
            }
            entries.insert(entry.name.clone(), entry);
        }
        Ok(ToolRegistry { entries })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Discovery
// ─────────────────────────────────────────────────────────────────────────────

/// A configured tool endpoint to discover.
#[derive(Clone)]
pub struct ToolSpec {
    /// Registry key.
    pub name: String,
    /// MCP endpoint URL, or the model endpoint for deployment tools.
    pub url: String,
    pub kind: ToolKind,
    /// Tool name on the server, if it differs from `name`.
    pub remote_name: Option<String>,
    /// Overrides the discovered description.
    pub description: Option<String>,
    /// Overrides the discovered input schema.
    pub schema: Option<Value>,
    pub timeout: Option<Duration>,
    /// Extra HTTP headers for the endpoint.
    pub headers: Vec<(String, String)>,
    /// Key sent to deployment tools.
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("kind", &self.kind)
            .field("remote_name", &self.remote_name)
            .field("timeout", &self.timeout)
            .field("api_key", &self.api_key.as_ref().map(|_| "********"))
            .finish_non_exhaustive()
    }
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, url: impl Into<String>, kind: ToolKind) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind,
            remote_name: None,
            description: None,
            schema: None,
            timeout: None,
            headers: Vec::new(),
            api_key: None,
        }
    }

    pub fn with_remote_name(mut self, remote_name: impl Into<String>) -> Self {
        self.remote_name = Some(remote_name.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn remote(&self) -> &str {
        self.remote_name.as_deref().unwrap_or(&self.name)
    }
}

/// Connect to every configured endpoint and build the registry.
///
/// Each distinct MCP URL gets one client, initialized and listed once, shared
/// by every tool that points at it. A tool missing from its server's listing
/// is an error. Deployment tools are registered without any I/O.
pub async fn discover(specs: &[ToolSpec]) -> Result<ToolRegistry> {
    let mut servers: HashMap<&str, (Arc<McpClient>, Vec<ToolInfo>)> = HashMap::new();
    let mut builder = ToolRegistry::builder();

    for spec in specs {
        if spec.kind == ToolKind::Deployment {
            builder = builder.register(deployment_entry(spec)?);
            continue;
        }
        if !servers.contains_key(spec.url.as_str()) {
            let server = connect(spec).await?;
            servers.insert(spec.url.as_str(), server);
        }
        let Some((client, listing)) = servers.get(spec.url.as_str()) else {
            continue;
        };

        let remote = spec.remote();
        let info = listing.iter().find(|t| t.name == remote).ok_or_else(|| {
            let offered: Vec<&str> = listing.iter().map(|t| t.name.as_str()).collect();
            AgentError::tool(format!(
                "tool '{}' is not offered by {} (available: {})",
                remote,
                spec.url,
                offered.join(", ")
            ))
        })?;

        let provider = McpToolProvider::new(Arc::clone(client), remote, spec.kind);
        let mut entry = ToolRegistryEntry::new(&spec.name, Arc::new(provider))
            .with_endpoint(&spec.url)
            .with_schema(
                spec.schema
                    .clone()
                    .or_else(|| info.input_schema.clone())
                    .unwrap_or_else(|| json!({"type": "object"})),
            );
        if let Some(description) = spec.description.clone().or_else(|| info.description.clone()) {
            entry = entry.with_description(description);
        }
        if let Some(timeout) = spec.timeout {
            entry = entry.with_timeout(timeout);
        }

        tracing::info!(tool = %spec.name, remote = %remote, url = %spec.url, kind = ?spec.kind, "registered tool");
        builder = builder.register(entry);
    }

    builder.build()
}

fn deployment_entry(spec: &ToolSpec) -> Result<ToolRegistryEntry> {
    let deployment = spec.remote();
    let mut config = DeploymentConfig::new(
        &spec.url,
        deployment,
        spec.api_key.as_deref().unwrap_or_default(),
    )
    .with_name(&spec.name);
    if let Some(timeout) = spec.timeout {
        config = config.with_timeout(timeout);
    }
    let client = DeploymentClient::new(config)
        .map_err(|e| AgentError::tool(format!("deployment tool {}: {}", spec.name, e)))?;

    let description = spec
        .description
        .clone()
        .unwrap_or_else(|| format!("Send a request to the {} deployment", deployment));
    let provider = Arc::new(DeploymentToolProvider::new(client));
    let mut entry = ToolRegistryEntry::new(&spec.name, provider)
        .with_endpoint(&spec.url)
        .with_description(description)
        .with_schema(spec.schema.clone().unwrap_or_else(deployment_tool_schema));
    if let Some(timeout) = spec.timeout {
        entry = entry.with_timeout(timeout);
    }

    tracing::info!(
        tool = %spec.name,
        deployment = %deployment,
        url = %spec.url,
        "registered deployment tool"
    );
    Ok(entry)
}

async fn connect(spec: &ToolSpec) -> Result<(Arc<McpClient>, Vec<ToolInfo>)> {
    let mut config = McpServerConfig::http(&spec.name, &spec.url);
    for (key, value) in &spec.headers {
        config = config.with_header(key, value);
    }

    let fail = |e: conduit_mcp::McpError| {
        AgentError::tool(format!("tool endpoint {} ({}): {}", spec.url, spec.name, e))
    };
    let client = McpClient::connect(config).map_err(fail)?;
    client.initialize().await.map_err(fail)?;
    let tools = client.list_tools().await.map_err(fail)?;

    Ok((Arc::new(client), tools))
}
