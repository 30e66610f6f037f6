//! Subagents example.
//!
//! Registers specialist subagents, each limited to its own tools, and lets the
//! main agent delegate to them.
//!
//! Run with: cargo run --example subagents

use agentkit_sdk::config::{API_KEY_VAR, DEFAULT_CONFIG_FILE};
use agentkit_sdk::{
    query, AgentError, AgentOptions, AgentResult, ClientConfig, Credentials, Message,
    SubagentDefinition, SubagentModel, SubagentRegistry,
};
use std::path::Path;
use std::process::ExitCode;

fn specialists() -> SubagentRegistry {
    [
        (
            "code-reviewer",
            SubagentDefinition::new(
                "Expert code reviewer. Use for quality and security reviews.",
                "You are a code review specialist. When reviewing code:\n\
                 - Identify potential bugs and security vulnerabilities\n\
                 - Check for performance issues\n\
                 - Suggest idiomatic improvements\n\
                 - Be concise but thorough",
            )
            .with_tools(["Read", "Grep", "Glob"])
            .with_model(SubagentModel::Sonnet),
        ),
        (
            "test-writer",
            SubagentDefinition::new(
                "Test specialist. Use for writing and analyzing tests.",
                "You are a testing specialist. When working with tests:\n\
                 - Write unit tests in #[cfg(test)] modules\n\
                 - Cover edge cases and error conditions\n\
                 - Keep tests readable and maintainable",
            )
            .with_tools(["Read", "Write", "Bash"])
            .with_model(SubagentModel::Sonnet),
        ),
        (
            "doc-writer",
            SubagentDefinition::new(
                "Documentation specialist. Use for creating documentation.",
                "You are a documentation specialist. When writing docs:\n\
                 - Write clear, concise rustdoc comments\n\
                 - Include usage examples\n\
                 - Make documentation accessible to all skill levels",
            )
            .with_tools(["Read", "Write"])
            .with_model(SubagentModel::Haiku),
        ),
    ]
    .into_iter()
    .collect()
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

    let options = AgentOptions::builder()
        .system_prompt("You are a project manager that delegates tasks to specialized agents.")
        .agents(specialists())
        .allowed_tools(["Read", "Write", "Bash", "Grep", "Glob"])
        .cwd(cwd)
        .cli_path(config.cli_path.clone())
        .env(API_KEY_VAR, credentials.api_key())
        .build()?;

    println!("Subagents Demo");
    println!("{}", "=".repeat(50));
    println!("The main agent will delegate to specialized subagents as needed.\n");

    let prompt = "Please help me with this Rust project:\n\
                  1. Review the code in crates/sdk/examples/simple_agent.rs for any issues\n\
                  2. Suggest what tests should be written for it\n\
                  3. Summarize what documentation would be helpful\n\n\
                  Use the appropriate specialist for each task.";

    println!("Prompt: {}\n", prompt);
    println!("{}", "-".repeat(50));

    let mut stream = query(prompt, options).await?;
    while let Some(message) = stream.next_message().await {
        match message? {
            Message::Assistant(assistant) => {
                let text = assistant.text();
                if text.is_empty() {
                    continue;
                }
                match &assistant.parent_tool_use_id {
                    Some(_) => println!("Subagent: {}", text),
                    None => println!("Agent: {}", text),
                }
            }
            Message::Result(result) => {
                tracing::info!(
                    num_turns = result.num_turns,
                    duration_ms = result.duration_ms,
                    "Delegation finished"
                );
            }
            _ => {}
        }
    }

    println!("{}", "-".repeat(50));
    println!("Done!");
    Ok(())
}
