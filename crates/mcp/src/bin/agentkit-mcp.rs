// Standalone MCP server binary

use agentkit_mcp::server::ToolServer;
use agentkit_mcp::tools::*;
use anyhow::Result;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries protocol traffic, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::info!("Agentkit MCP server starting...");

    // Workspace root (current directory by default)
    let workspace = match std::env::var("AGENTKIT_WORKSPACE") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => std::env::current_dir()?,
    };

    let mut registry = calculator_registry()?;
    registry.register(ReadFileTool::new(workspace).definition())?;

    tracing::info!("Registered {} tools", registry.len());

    let server = ToolServer::new("agentkit", registry);
    server.serve_stdio().await?;

    Ok(())
}
