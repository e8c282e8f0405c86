//! Tools command - discover configured tool endpoints.

use anyhow::{Context as _, Result};
use clap::Args;

use super::Context;

/// Arguments for the tools command.
#[derive(Args, Debug)]
pub struct ToolsArgs {
    /// Show the input schema of each tool
    #[arg(long)]
    pub schema: bool,
}

/// Run the tools command.
///
/// Connects to every enabled endpoint, so this doubles as a reachability
/// check for the tool servers.
pub async fn run(args: ToolsArgs, ctx: &Context) -> Result<()> {
    ctx.config.validate_tools()?;

    let specs = ctx.tool_specs();
    if specs.is_empty() {
        if ctx.json_output {
            println!("[]");
        } else {
            println!("No tools configured.");
        }
        return Ok(());
    }

    let registry = conduit_agent::discover(&specs)
        .await
        .context("tool discovery failed")?;

    if ctx.json_output {
        let tools: Vec<_> = registry
            .entries()
            .map(|entry| {
                serde_json::json!({
                    "name": entry.name,
                    "description": entry.description,
                    "endpoint": entry.endpoint,
                    "schema": entry.schema,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    for entry in registry.entries() {
        println!("{}  ({})", entry.name, entry.endpoint);
        if !entry.description.is_empty() {
            println!("    {}", entry.description);
        }
        if args.schema {
            let schema = serde_json::to_string_pretty(&entry.schema)?;
            for line in schema.lines() {
                println!("    {}", line);
            }
        }
    }

    Ok(())
}
