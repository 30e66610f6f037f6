//! Structured output example.
//!
//! Constrains the final answer with a JSON Schema and reads the validated
//! result as typed data.
//!
//! Run with: cargo run --example structured_output

use agentkit_sdk::config::{API_KEY_VAR, DEFAULT_CONFIG_FILE};
use agentkit_sdk::{
    json_schema_array, json_schema_object, json_schema_string, json_schema_typed, query,
    AgentError, AgentOptions, AgentResult, ClientConfig, Credentials, Message, OutputFormat,
    ParamType,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::process::ExitCode;

#[derive(Debug, Deserialize)]
struct CodeAnalysis {
    file_name: String,
    summary: String,
    issues: Vec<Issue>,
    metrics: Metrics,
    recommendations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Issue {
    severity: String,
    category: String,
    description: String,
    #[serde(default)]
    suggestion: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Metrics {
    lines_of_code: u64,
    functions_count: u64,
    complexity_score: u8,
}

fn code_analysis_schema() -> Value {
    let issue = json_schema_object(
        json!({
            "severity": {"type": "string", "enum": ["low", "medium", "high"]},
            "category": {
                "type": "string",
                "enum": ["bug", "security", "performance", "style", "maintainability"]
            },
            "description": {"type": "string"},
            "line_number": {"type": "integer"},
            "suggestion": {"type": "string"}
        }),
        vec!["severity", "category", "description"],
    );

    let metrics = json_schema_object(
        json!({
            "lines_of_code": {"type": "integer"},
            "functions_count": {"type": "integer"},
            "complexity_score": {"type": "integer", "minimum": 1, "maximum": 10}
        }),
        vec!["lines_of_code", "functions_count", "complexity_score"],
    );

    json_schema_object(
        json!({
            "file_name": json_schema_string("Name of the analyzed file"),
            "summary": json_schema_string("Brief summary of what the code does"),
            "issues": json_schema_array(issue, "List of identified issues"),
            "metrics": metrics,
            "recommendations": json_schema_array(
                json_schema_typed(ParamType::String, "A recommendation"),
                "List of improvement recommendations"
            )
        }),
        vec!["file_name", "summary", "issues", "metrics", "recommendations"],
    )
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
        .system_prompt("You are a code analysis tool. Analyze code and return structured results.")
        .output_format(OutputFormat::json_schema(code_analysis_schema()))
        .allowed_tools(["Read"])
        .cwd(cwd)
        .cli_path(config.cli_path.clone())
        .env(API_KEY_VAR, credentials.api_key())
        .build()?;

    println!("Structured Output Demo");
    println!("{}", "=".repeat(50));
    println!("Analyzing code and returning structured JSON...\n");

    let prompt = "Analyze the file crates/sdk/examples/simple_agent.rs and provide a structured analysis.";
    println!("Prompt: {}\n", prompt);
    println!("{}", "-".repeat(50));

    let mut stream = query(prompt, options).await?;
    while let Some(message) = stream.next_message().await {
        let Message::Result(result) = message? else {
            continue;
        };
        // Already validated against the schema by the client
        let Some(output) = result.structured_output else {
            continue;
        };
        let analysis: CodeAnalysis = serde_json::from_value(output)?;
        print_analysis(&analysis);
    }

    println!("\n{}", "-".repeat(50));
    println!("Done!");
    Ok(())
}

fn print_analysis(analysis: &CodeAnalysis) {
    println!("\nCode Analysis Results");
    println!("{}", "=".repeat(40));
    println!("File: {}", analysis.file_name);
    println!("\nSummary:\n{}", analysis.summary);

    println!("\nMetrics:");
    println!("  - Lines of code: {}", analysis.metrics.lines_of_code);
    println!("  - Functions: {}", analysis.metrics.functions_count);
    println!("  - Complexity: {}/10", analysis.metrics.complexity_score);

    if analysis.issues.is_empty() {
        println!("\nNo issues found!");
    } else {
        println!("\nIssues Found ({}):", analysis.issues.len());
        for issue in &analysis.issues {
            println!("  [{}] [{}] {}", issue.severity, issue.category, issue.description);
            if let Some(suggestion) = &issue.suggestion {
                println!("      suggestion: {}", suggestion);
            }
        }
    }

    if !analysis.recommendations.is_empty() {
        println!("\nRecommendations:");
        for recommendation in &analysis.recommendations {
            println!("  - {}", recommendation);
        }
    }
}
