//! Conduit - tool-using LLM agent service
//!
//! Main entry point for the Conduit CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod logging;

use commands::{ask, config, serve, tools};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Conduit - tool-using LLM agent service
#[derive(Parser)]
#[command(name = "conduit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to config file (replaces discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Model API key (or set CONDUIT_API_KEY)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Model deployment name
    #[arg(long, global = true, env = "CONDUIT_DEPLOYMENT")]
    pub deployment: Option<String>,

    /// Model endpoint base URL
    #[arg(long, global = true, env = "CONDUIT_MODEL_ENDPOINT")]
    pub model_endpoint: Option<String>,

    /// Code interpreter tool endpoint
    #[arg(long, global = true, env = "CONDUIT_INTERPRETER_URL")]
    pub interpreter_url: Option<String>,

    /// Web search tool endpoint
    #[arg(long, global = true, env = "CONDUIT_SEARCH_URL")]
    pub search_url: Option<String>,

    /// Maximum model turns per request
    #[arg(long, global = true)]
    pub max_turns: Option<u32>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve(serve::ServeArgs),

    /// Run one request in-process and print the answer
    Ask(ask::AskArgs),

    /// Discover and list the configured tools
    Tools(tools::ToolsArgs),

    /// Show the resolved configuration
    Config(config::ConfigArgs),
}

impl Cli {
    fn overrides(&self) -> conduit_config::Overrides {
        let (bind, port) = match &self.command {
            Commands::Serve(args) => (args.bind.clone(), args.port),
            _ => (None, None),
        };
        conduit_config::Overrides {
            // The key goes through secret resolution instead.
            api_key: None,
            deployment: self.deployment.clone(),
            model_endpoint: self.model_endpoint.clone(),
            interpreter_url: self.interpreter_url.clone(),
            search_url: self.search_url.clone(),
            bind,
            port,
            max_turns: self.max_turns,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = commands::Context::load(&cli)?;
    let _guard = logging::init(cli.verbose, &ctx.config.logging())?;

    for warning in &ctx.warnings {
        tracing::warn!("{}", warning);
    }
    if let Some(source) = &ctx.key_source {
        tracing::debug!(source = %source, "resolved model API key");
    }

    match cli.command {
        Commands::Serve(args) => serve::run(args, &ctx).await,
        Commands::Ask(args) => ask::run(args, &ctx).await,
        Commands::Tools(args) => tools::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
