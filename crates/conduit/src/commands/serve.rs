//! Serve command - run the HTTP server.

use std::net::SocketAddr;

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::{info, warn};

use conduit_server::{Server, ServerConfig};

use super::Context;

/// Arguments for the serve command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "CONDUIT_BIND")]
    pub bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "CONDUIT_PORT")]
    pub port: Option<u16>,
}

/// Run the serve command.
///
/// Bind and port were already folded into the config as overrides.
pub async fn run(_args: ServeArgs, ctx: &Context) -> Result<()> {
    let orchestrator = ctx.build_orchestrator().await?;

    let section = ctx.config.server();
    let addr: SocketAddr = format!("{}:{}", section.bind, section.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", section.bind, section.port))?;

    let config = ServerConfig::new()
        .with_bind_address(addr)
        .with_max_body_size(section.max_body_bytes);

    let server = Server::new(orchestrator, config);
    server.run_until(addr, shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested, draining in-flight requests"),
        Err(e) => {
            warn!(error = %e, "Cannot listen for ctrl-c, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
