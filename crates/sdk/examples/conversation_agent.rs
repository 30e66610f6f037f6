//! Multi-turn conversation example.
//!
//! Keeps one session open so follow-up prompts can build on earlier answers.
//!
//! Run with: cargo run --example conversation_agent

use agentkit_sdk::config::{API_KEY_VAR, DEFAULT_CONFIG_FILE};
use agentkit_sdk::{AgentClient, AgentError, AgentOptions, AgentResult, ClientConfig, Credentials};
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
    let cwd = std::env::current_dir()
        .map_err(|e| AgentError::Configuration(format!("no working directory: {}", e)))?;

    let options = AgentOptions::builder()
        .system_prompt(
            "You are a knowledgeable assistant helping with Rust programming. \
             Remember previous context in our conversation and build upon it.",
        )
        .allowed_tools(["Read", "Bash"])
        .cwd(cwd)
        .cli_path(config.cli_path.clone())
        .env(API_KEY_VAR, credentials.api_key())
        .build()?;

    println!("Multi-turn Conversation Demo");
    println!("{}", "=".repeat(50));

    let mut client = AgentClient::connect(options).await?;

    let prompts = [
        "What is a Rust trait? Give a brief explanation.",
        "Can you show me a simple example of what you just explained?",
        "How would I use this pattern to time how long a function takes?",
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
