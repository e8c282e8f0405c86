//! CLI command handlers.

pub mod ask;
pub mod config;
pub mod serve;
pub mod tools;

use anyhow::{Context as _, Result};

use conduit_agent::{Orchestrator, OrchestratorConfig, RetryPolicy, ToolKind, ToolSpec};
use conduit_config::{
    AgentConfig, ConduitConfig, ConfigSource, ModelConfig, SecretSource, ToolEntry,
};
use conduit_llm::{DeploymentClient, DeploymentConfig};

use crate::Cli;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Fully resolved configuration, overrides and API key applied.
    pub config: ConduitConfig,
    /// Config files that were checked.
    pub sources: Vec<ConfigSource>,
    /// Problems found while loading, reported once logging is up.
    pub warnings: Vec<String>,
    /// Where the API key came from, if one was found.
    pub key_source: Option<SecretSource>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Load config layers and fold the command line into them.
    pub fn load(cli: &Cli) -> Result<Self> {
        let loaded = match &cli.config {
            Some(path) => conduit_config::load_explicit(path)?,
            None => conduit_config::load_config(None)?,
        };

        let mut config = loaded.config;
        config.apply_overrides(&cli.overrides());

        let resolved = conduit_config::resolve_api_key(
            cli.api_key.as_deref(),
            config.model.as_ref().and_then(|m| m.api_key.as_deref()),
        );
        let key_source = resolved.map(|secret| {
            config.model.get_or_insert_with(ModelConfig::default).api_key = Some(secret.value);
            secret.source
        });

        Ok(Self {
            config,
            sources: loaded.sources,
            warnings: loaded.warnings,
            key_source,
            json_output: cli.json,
            verbose: cli.verbose,
        })
    }

    /// Validate the config and build a ready orchestrator.
    ///
    /// Tool discovery talks to every configured endpoint, so this fails
    /// when one of them is down.
    pub async fn build_orchestrator(&self) -> Result<Orchestrator> {
        self.config.validate()?;

        let model = deployment_client(&self.config.model())?;
        let registry = conduit_agent::discover(&self.tool_specs())
            .await
            .context("tool discovery failed")?;

        tracing::info!(
            deployment = %model.deployment(),
            tools = registry.len(),
            "orchestrator ready"
        );

        let orchestrator = Orchestrator::builder()
            .with_model(model)
            .with_registry(registry)
            .with_config(orchestrator_config(&self.config.agent(), &self.config.model()))
            .build()?;
        Ok(orchestrator)
    }

    /// Runtime specs for every enabled tool.
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        let model = self.config.model();
        self.config
            .enabled_tools()
            .map(|entry| tool_spec(entry, &model))
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config → runtime wiring
// ─────────────────────────────────────────────────────────────────────────────

fn deployment_client(model: &ModelConfig) -> Result<DeploymentClient> {
    let (Some(endpoint), Some(deployment), Some(api_key)) = (
        model.endpoint.as_deref(),
        model.deployment.as_deref(),
        model.api_key.as_deref(),
    ) else {
        anyhow::bail!("model endpoint, deployment and API key must all be configured");
    };

    let config = DeploymentConfig::new(endpoint, deployment, api_key)
        .with_api_version(model.api_version())
        .with_timeout(model.timeout())
        .with_name(deployment);
    Ok(DeploymentClient::new(config)?)
}

pub(crate) fn orchestrator_config(agent: &AgentConfig, model: &ModelConfig) -> OrchestratorConfig {
    let mut config = OrchestratorConfig::default()
        .with_max_turns(agent.max_turns)
        .with_request_timeout(agent.request_timeout())
        .with_tool_timeout(agent.tool_timeout())
        .with_retry(RetryPolicy {
            max_retries: agent.retry_max,
            initial_backoff: agent.retry_backoff(),
            max_backoff: agent.retry_backoff_max(),
        });
    if let Some(prompt) = &model.system_prompt {
        config = config.with_system_prompt(prompt.clone());
    }
    config.max_tokens = model.max_tokens;
    config.temperature = model.temperature;
    config
}

/// Deployment tools fall back to the model endpoint and always use the model key.
pub(crate) fn tool_spec(entry: &ToolEntry, model: &ModelConfig) -> ToolSpec {
    let kind = match entry.kind {
        conduit_config::ToolKind::CodeInterpreter => ToolKind::CodeInterpreter,
        conduit_config::ToolKind::WebSearch => ToolKind::WebSearch,
        conduit_config::ToolKind::Deployment => ToolKind::Deployment,
        conduit_config::ToolKind::Generic => ToolKind::Generic,
    };

    let url = match (kind, entry.url.trim().is_empty(), model.endpoint.as_deref()) {
        (ToolKind::Deployment, true, Some(endpoint)) => endpoint,
        _ => entry.url.as_str(),
    };
    let mut spec = ToolSpec::new(&entry.name, url, kind);
    if kind == ToolKind::Deployment
        && let Some(key) = &model.api_key
    {
        spec = spec.with_api_key(key.clone());
    }
    if let Some(remote) = &entry.remote_name {
        spec = spec.with_remote_name(remote.clone());
    }
    if let Some(timeout) = entry.timeout() {
        spec = spec.with_timeout(timeout);
    }
    spec.description = entry.description.clone();
    spec.schema = entry.schema.clone();
    spec.headers = entry
        .headers
        .iter()
        .map(|[name, value]| (name.clone(), value.clone()))
        .collect();
    spec
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_orchestrator_config_from_sections() {
        let agent = AgentConfig {
            max_turns: 4,
            request_timeout_secs: 20,
            retry_max: 1,
            retry_backoff_ms: 100,
            retry_backoff_max_ms: 400,
            tool_timeout_secs: 5,
        };
        let model = ModelConfig {
            system_prompt: Some("Be brief.".into()),
            max_tokens: Some(256),
            temperature: Some(0.2),
            ..Default::default()
        };

        let config = orchestrator_config(&agent, &model);
        assert_eq!(config.max_turns, 4);
        assert_eq!(config.request_timeout, Duration::from_secs(20));
        assert_eq!(config.tool_timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.initial_backoff, Duration::from_millis(100));
        assert_eq!(config.retry.max_backoff, Duration::from_millis(400));
        assert_eq!(config.system_prompt.as_deref(), Some("Be brief."));
        assert_eq!(config.max_tokens, Some(256));
        assert_eq!(config.temperature, Some(0.2));
    }

    #[test]
    fn test_tool_spec_from_entry() {
        let mut entry = ToolEntry::new(
            "web_search",
            "http://search/mcp",
            conduit_config::ToolKind::WebSearch,
        );
        entry.remote_name = Some("bing_search".into());
        entry.timeout_secs = Some(7);
        entry.headers = vec![["Authorization".into(), "Bearer x".into()]];

        let model = ModelConfig {
            api_key: Some("sk-model".into()),
            ..Default::default()
        };
        let spec = tool_spec(&entry, &model);
        assert_eq!(spec.name, "web_search");
        assert!(spec.api_key.is_none());
        assert_eq!(spec.kind, ToolKind::WebSearch);
        assert_eq!(spec.remote_name.as_deref(), Some("bing_search"));
        assert_eq!(spec.timeout, Some(Duration::from_secs(7)));
        assert_eq!(
            spec.headers,
            vec![("Authorization".to_string(), "Bearer x".to_string())]
        );
    }

    #[test]
    fn test_deployment_tool_spec_uses_model_endpoint() {
        let mut entry = ToolEntry::new("image_gen", "", conduit_config::ToolKind::Deployment);
        entry.remote_name = Some("dall-e-3".into());
        let model = ModelConfig {
            endpoint: Some("https://dial.example.com".into()),
            api_key: Some("sk-model".into()),
            ..Default::default()
        };

        let spec = tool_spec(&entry, &model);
        assert_eq!(spec.kind, ToolKind::Deployment);
        assert_eq!(spec.url, "https://dial.example.com");
        assert_eq!(spec.api_key.as_deref(), Some("sk-model"));
        assert_eq!(spec.remote_name.as_deref(), Some("dall-e-3"));

        entry.url = "https://images.example.com".into();
        assert_eq!(tool_spec(&entry, &model).url, "https://images.example.com");
    }

    #[test]
    fn test_deployment_client_requires_all_fields() {
        let model = ModelConfig {
            endpoint: Some("https://example.openai.azure.com".into()),
            deployment: Some("gpt-4o".into()),
            ..Default::default()
        };
        assert!(deployment_client(&model).is_err());
    }
}
