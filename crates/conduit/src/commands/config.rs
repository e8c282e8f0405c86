//! Config command - inspect the resolved configuration.

use anyhow::Result;
use clap::{Args, Subcommand};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: Option<ConfigCommand>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the merged configuration with secrets masked (default)
    Show,

    /// Show which config files were checked and loaded
    Which,

    /// Show the user config file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Path => cmd_path(ctx),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let redacted = ctx.config.redacted();

    if ctx.json_output {
        let body = serde_json::json!({
            "sources": loaded_paths(ctx),
            "warnings": ctx.warnings,
            "api_key_source": ctx.key_source.as_ref().map(|s| s.to_string()),
            "config": redacted,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let loaded = loaded_paths(ctx);
    if loaded.is_empty() {
        println!("# Config files: none (defaults)");
    } else {
        println!("# Config files:");
        for path in loaded {
            println!("#   {}", path);
        }
    }
    if let Some(source) = &ctx.key_source {
        println!("# API key from: {}", source);
    }
    for warning in &ctx.warnings {
        println!("# warning: {}", warning);
    }
    println!();
    print!("{}", redacted.to_toml()?);
    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    if ctx.json_output {
        let sources: Vec<_> = ctx
            .sources
            .iter()
            .map(|s| {
                serde_json::json!({
                    "layer": s.layer.to_string(),
                    "path": s.path.display().to_string(),
                    "loaded": s.loaded,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&sources)?);
        return Ok(());
    }

    println!("Config files (lowest precedence first):");
    for source in &ctx.sources {
        let status = if source.loaded { "loaded" } else { "not found" };
        println!("  {:<8} {} [{}]", source.layer, source.path.display(), status);
    }
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    match conduit_config::xdg_config_path() {
        Some(path) if ctx.json_output => {
            println!("{}", serde_json::json!({ "path": path.display().to_string() }));
        }
        Some(path) => println!("{}", path.display()),
        None => anyhow::bail!("no user config directory on this platform"),
    }
    Ok(())
}

fn loaded_paths(ctx: &Context) -> Vec<String> {
    ctx.sources
        .iter()
        .filter(|s| s.loaded)
        .map(|s| s.path.display().to_string())
        .collect()
}
