//! Error handling example.
//!
//! Shows matching on error kinds, retrying with exponential backoff, bounding a
//! query with a timeout, and degrading to smaller tool sets.
//!
//! Run with: cargo run --example error_handling

use agentkit_sdk::config::{API_KEY_VAR, DEFAULT_CONFIG_FILE};
use agentkit_sdk::{
    query, retry_with_backoff, with_timeout, AgentError, AgentOptions, AgentResult, ClientConfig,
    Credentials,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Settings shared by every scenario.
struct Session {
    cwd: PathBuf,
    config: ClientConfig,
    credentials: Credentials,
}

impl Session {
    fn options<I, S>(&self, tools: I) -> AgentOptions
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AgentOptions {
            allowed_tools: tools.into_iter().map(Into::into).collect(),
            cwd: Some(self.cwd.clone()),
            cli_path: Some(self.config.cli_path.clone()),
            env: [(API_KEY_VAR.to_string(), self.credentials.api_key().to_string())]
                .into_iter()
                .collect(),
            ..Default::default()
        }
    }
}

async fn print_replies(prompt: &str, options: AgentOptions) -> AgentResult<()> {
    let mut stream = query(prompt, options).await?;
    while let Some(message) = stream.next_message().await {
        if let Some(text) = message?.assistant_text() {
            println!("Agent: {}", text);
        }
    }
    Ok(())
}

async fn basic_error_handling(session: &Session) {
    println!("\n1. Basic Error Handling");
    println!("{}", "-".repeat(40));

    let result = print_replies(
        "What files are in the current directory?",
        session.options(["Read", "Bash"]),
    )
    .await;

    match result {
        Ok(()) => println!("Completed"),
        Err(AgentError::Configuration(message)) => {
            println!("Configuration problem: {}", message);
            println!("   Install the agent CLI or set cli_path in {}", DEFAULT_CONFIG_FILE);
        }
        Err(AgentError::Process { exit_code, stderr }) => {
            println!("Process error (exit code {:?})", exit_code);
            println!("   stderr: {}", stderr.trim());
        }
        Err(AgentError::Protocol(message)) => println!("Failed to parse response: {}", message),
        Err(e) => println!("Unexpected error ({}): {}", e.kind(), e),
    }
}

async fn retry_example(session: &Session) {
    println!("\n2. Retry with Exponential Backoff");
    println!("{}", "-".repeat(40));

    let policy = &session.config.retry;
    let result = retry_with_backoff(policy, |attempt| {
        if attempt > 0 {
            println!("Attempt {} of {}...", attempt + 1, policy.max_attempts);
        }
        print_replies(
            "Read the Cargo.toml file and summarize it.",
            session.options(["Read"]),
        )
    })
    .await;

    match result {
        Ok(()) => println!("Succeeded"),
        Err(e) if e.is_retryable() => println!("All {} attempts failed: {}", policy.max_attempts, e),
        Err(e) => println!("Not retried ({}): {}", e.kind(), e),
    }
}

async fn timeout_example(session: &Session) {
    println!("\n3. Timeout Handling");
    println!("{}", "-".repeat(40));

    let mut options = session.options(["Read", "Glob"]);
    // Limit turns to keep a runaway agent in check
    options.max_turns = Some(5);

    let deadline = session.config.timeout();
    let result = with_timeout(
        deadline,
        print_replies("List all Rust source files in the crates directory.", options),
    )
    .await;

    match result {
        Ok(()) => println!("Completed within timeout"),
        Err(AgentError::Timeout(after)) => println!("Operation timed out after {:?}", after),
        Err(e) => println!("Error: {}", e),
    }
}

async fn graceful_degradation(session: &Session) {
    println!("\n4. Graceful Degradation");
    println!("{}", "-".repeat(40));

    let tool_sets: [(&[&str], &str); 3] = [
        (&["Read", "Write", "Bash", "Grep", "Glob"], "Full capabilities"),
        (&["Read", "Bash"], "Limited capabilities"),
        (&["Read"], "Minimal capabilities"),
    ];

    for (tools, description) in tool_sets {
        println!("Trying with {}...", description);

        let result = print_replies(
            "What is this project about? Check the README.",
            session.options(tools.iter().copied()),
        )
        .await;

        match result {
            Ok(()) => {
                println!("Succeeded with {}", description);
                return;
            }
            Err(e) => println!("Failed with {}: {}", description, e),
        }
    }

    println!("All capability levels failed");
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
    let session = Session {
        credentials: Credentials::from_env()?,
        config: ClientConfig::load(Path::new(DEFAULT_CONFIG_FILE))?,
        cwd: std::env::current_dir()
            .map_err(|e| AgentError::Configuration(format!("no working directory: {}", e)))?,
    };

    println!("Error Handling Demo");
    println!("{}", "=".repeat(50));
    println!("Demonstrating various error handling patterns.\n");

    basic_error_handling(&session).await;
    retry_example(&session).await;
    timeout_example(&session).await;
    graceful_degradation(&session).await;

    println!("\n{}", "=".repeat(50));
    println!("All examples complete!");
    Ok(())
}
