//! Tracing setup: console on stderr plus an optional rotating JSON file.

use anyhow::{Context as _, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use conduit_config::LoggingConfig;

const CONSOLE_FILTER: &str = "conduit=info,conduit_agent=info,conduit_llm=info,conduit_mcp=info,conduit_server=info,warn";
const VERBOSE_FILTER: &str = "conduit=debug,conduit_agent=debug,conduit_llm=debug,conduit_mcp=debug,conduit_server=debug,conduit_config=debug,info";
const FILE_FILTER: &str = "conduit=trace,conduit_agent=trace,conduit_llm=trace,conduit_mcp=trace,conduit_server=trace,info";

/// Install the global subscriber.
///
/// `RUST_LOG` replaces the console filter when set. The returned guard must
/// live until exit or buffered file output is lost.
pub fn init(verbose: bool, config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let console_filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.is_empty() => EnvFilter::new(directives),
        _ if verbose => EnvFilter::new(VERBOSE_FILTER),
        _ => EnvFilter::new(CONSOLE_FILTER),
    };

    // stdout carries command output, so logs go to stderr.
    let console = if config.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    };

    let (file, guard) = match &config.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("cannot create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "conduit.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(EnvFilter::new(FILE_FILTER));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("tracing subscriber already installed")?;

    Ok(guard)
}
