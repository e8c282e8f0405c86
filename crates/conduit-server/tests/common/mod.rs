//! Common test utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use conduit_agent::{MockProvider, Orchestrator, OrchestratorConfig, ToolRegistry, ToolRegistryEntry};
use conduit_llm::MockModel;
use conduit_server::{Server, ServerConfig};

/// A test server that runs in the background.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// HTTP client configured for this server.
    pub client: Client,
    /// Handle to the server task.
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a server whose model always answers "Test response".
    pub async fn start() -> Result<Self> {
        Self::start_with_model(MockModel::with_answer("Test response")).await
    }

    /// Start a server around a scripted model, with a mock `web_search` tool.
    pub async fn start_with_model(model: MockModel) -> Result<Self> {
        Self::start_with(Arc::new(model), OrchestratorConfig::default()).await
    }

    /// Start a server with full control over the model and loop config.
    pub async fn start_with(model: Arc<MockModel>, config: OrchestratorConfig) -> Result<Self> {
        let addr = find_available_port().await?;

        let registry = ToolRegistry::builder()
            .register(
                ToolRegistryEntry::new(
                    "web_search",
                    Arc::new(MockProvider::returning(serde_json::json!({
                        "results": [{"title": "Oslo", "snippet": "Sunny"}]
                    }))),
                )
                .with_description("Search the web"),
            )
            .build()?;

        let orchestrator = Orchestrator::builder()
            .with_shared_model(model)
            .with_registry(registry)
            .with_config(config)
            .build()?;

        let config = ServerConfig::new()
            .with_bind_address(addr)
            .with_request_logging(false);

        let server = Server::new(orchestrator, config);
        let handle = tokio::spawn(async move {
            let _ = server.run_on(addr).await;
        });

        let client = Client::new();
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            client,
            _handle: handle,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(format!("{}{}", self.base_url(), path))
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(format!("{}{}", self.base_url(), path))
    }

    /// Check if server is healthy.
    pub async fn health(&self) -> Result<bool> {
        let resp = self.get("/health").send().await?;
        Ok(resp.status().is_success())
    }
}

/// Find an available port for the test server.
async fn find_available_port() -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

/// Wait for the server to become ready.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
