//! Custom tools example.
//!
//! Registers the calculator tools in-process, serves them to the agent as the
//! `calc` MCP server, and runs a short conversation that uses them.
//!
//! Run with: cargo run --example custom_tools_agent

use agentkit_mcp::tools::{add_tool, multiply_tool, power_tool};
use agentkit_sdk::config::{API_KEY_VAR, DEFAULT_CONFIG_FILE};
use agentkit_sdk::{
    qualified_tool_name, AgentClient, AgentError, AgentOptions, AgentResult, ClientConfig,
    Credentials, ToolRegistry, ToolServer,
};
use std::path::Path;
use std::process::ExitCode;

const SERVER_NAME: &str = "calc";

fn calculator() -> AgentResult<ToolServer> {
    let registry = ToolRegistry::new()
        .with(add_tool())?
        .with(multiply_tool())?
        .with(power_tool())?;
    Ok(ToolServer::new(SERVER_NAME, registry))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> AgentResult<()> {
    let credentials = Credentials::from_env()?;
    let config = ClientConfig::load(Path::new(DEFAULT_CONFIG_FILE))?;
    let cwd = std::env::current_dir()
        .map_err(|e| AgentError::Configuration(format!("no working directory: {}", e)))?;

    let server = calculator()?;
    let allowed: Vec<String> = server
        .list_tools()
        .iter()
        .map(|tool| qualified_tool_name(SERVER_NAME, &tool.name))
        .collect();

    let options = AgentOptions::builder()
        .system_prompt(
            "You are a helpful math assistant. Use the calculator tools to perform calculations.",
        )
        .mcp_server(SERVER_NAME, server)
        .allowed_tools(allowed)
        .cwd(cwd)
        .cli_path(config.cli_path.clone())
        .env(API_KEY_VAR, credentials.api_key())
        .build()?;

    let mut client = AgentClient::connect(options).await?;

    let prompts = [
        "What is 42 + 58?",
        "Now multiply that result by 7.",
        "Finally, raise 2 to the power of 10.",
    ];

    let outcome = async {
        for prompt in prompts {
            println!("\nUser: {}", prompt);
            println!("{}", "-".repeat(40));

            client.query(prompt).await?;
            let mut response = client.receive_response();
            while let Some(message) = response.next_message().await {
                if let Some(text) = message?.assistant_text() {
                    println!("Agent: {}", text);
                }
            }
        }
        Ok::<_, AgentError>(())
    }
    .await;

    client.close().await?;
    outcome?;

    println!("\n{}", "=".repeat(50));
    println!("Conversation complete!");
    Ok(())
}
