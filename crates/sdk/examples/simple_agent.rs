//! One-shot query example.
//!
//! Sends a single prompt and prints the agent's text replies.
//!
//! Run with: cargo run --example simple_agent

use agentkit_sdk::config::{API_KEY_VAR, DEFAULT_CONFIG_FILE};
use agentkit_sdk::{query, AgentOptions, AgentResult, ClientConfig, Credentials, PermissionMode};
use std::path::Path;
use std::process::ExitCode;

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

    let options = AgentOptions::builder()
        .system_prompt("You are a helpful coding assistant. Be concise and clear.")
        .allowed_tools(["Read", "Bash"])
        .permission_mode(PermissionMode::Default)
        .cwd(std::env::current_dir().map_err(|e| {
            agentkit_sdk::AgentError::Configuration(format!("no working directory: {}", e))
        })?)
        .cli_path(config.cli_path.clone())
        .env(API_KEY_VAR, credentials.api_key())
        .build()?;

    let prompt = "Which Rust toolchain is installed on this system? Use the Bash tool to check.";
    println!("Prompt: {}\n", prompt);
    println!("{}", "-".repeat(50));

    let mut stream = query(prompt, options).await?;
    while let Some(message) = stream.next_message().await {
        if let Some(text) = message?.assistant_text() {
            println!("Agent: {}", text);
        }
    }

    println!("{}", "-".repeat(50));
    println!("Done!");
    Ok(())
}
