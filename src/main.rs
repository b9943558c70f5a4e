//! computer-use-mcp server binary
//!
//! Speaks MCP over stdio by default, or the line-delimited JSON protocol
//! with `--lines`. Stdout carries protocol data only; all diagnostics go to
//! stderr.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use computer_use_mcp::{
    BackendKind, ComputerUseServer, Dispatcher, ServerConfig,
    providers::{MockDesktop, Providers},
    tools::{ToolContext, builtin_registry},
    wire::{ProtocolWriter, serve_lines},
};
use rmcp::{ServiceExt, transport::stdio};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

/// Selects the diagnostic output format
const ENV_LOG_FORMAT: &str = "CU_MCP_LOG_FORMAT";

#[derive(Debug, Parser)]
#[command(name = "computer-use-mcp", version, about)]
struct Cli {
    /// Serve line-delimited JSON requests instead of MCP
    #[arg(long)]
    lines: bool,

    /// Provider backend (overrides CU_MCP_BACKEND)
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,
}

fn init_tracing() {
    // Respects RUST_LOG; default keeps the execution log and startup info.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("computer_use_mcp=info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false);

    if std::env::var(ENV_LOG_FORMAT).is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = ServerConfig::from_env();
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    info!("computer-use-mcp {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Backend: {}, max screenshot edge: {}, tool timeout: {:?}",
        config.backend, config.max_screenshot_edge, config.tool_timeout
    );

    let providers = match config.backend {
        BackendKind::System => Providers::system(),
        BackendKind::Mock => Providers::mock(Arc::new(MockDesktop::new())),
    };
    let registry = builtin_registry().context("Failed to build the tool registry")?;
    info!("Registered {} tools", registry.len());

    let context = ToolContext::new(providers, config.clone());
    let dispatcher = Arc::new(Dispatcher::new(registry, context, &config));

    if cli.lines {
        info!("Transport: line-delimited JSON on stdio");
        let writer = ProtocolWriter::new(tokio::io::stdout());
        let stats = serve_lines(&dispatcher, BufReader::new(tokio::io::stdin()), &writer)
            .await
            .context("Line transport failed")?;
        info!(
            "Served {} requests ({} failed)",
            stats.requests, stats.failures
        );
        return Ok(());
    }

    info!("Transport: MCP on stdio");
    let service = ComputerUseServer::new(dispatcher).serve(stdio()).await?;
    service.waiting().await?;

    info!("computer-use-mcp shutting down");
    Ok(())
}
