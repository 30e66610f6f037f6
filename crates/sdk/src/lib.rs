//! # Agentkit SDK
//!
//! Drive an agent CLI from Rust, with custom tools served in-process over MCP.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agentkit_sdk::{query, AgentOptions, AgentResult};
//!
//! #[tokio::main]
//! async fn main() -> AgentResult<()> {
//!     let options = AgentOptions::builder()
//!         .system_prompt("You are a helpful coding assistant.")
//!         .allowed_tools(["Read", "Bash"])
//!         .build()?;
//!
//!     let mut stream = query("Which Rust toolchain is installed?", options).await?;
//!     while let Some(message) = stream.next_message().await {
//!         if let Some(text) = message?.assistant_text() {
//!             println!("Agent: {}", text);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Custom Tools
//!
//! ```rust,no_run
//! use agentkit_sdk::{AgentOptions, ParamType, ParameterSchema, ToolDefinition, ToolRegistry, ToolResult, ToolServer};
//!
//! # fn example() -> agentkit_sdk::AgentResult<()> {
//! let double = ToolDefinition::new(
//!     "double",
//!     "Double a number",
//!     ParameterSchema::new().required("x", ParamType::Number, "Value to double"),
//!     |args| async move {
//!         let x = args.f64("x").unwrap_or_default();
//!         Ok(ToolResult::text((x * 2.0).to_string()))
//!     },
//! );
//!
//! let server = ToolServer::new("math", ToolRegistry::new().with(double)?);
//! let options = AgentOptions::builder()
//!     .mcp_server("math", server)
//!     .allowed_tools(["mcp__math__double"])
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod control;
pub mod message;
pub mod options;
pub mod query;
pub mod retry;
pub mod transport;

pub use client::{AgentClient, ResponseStream};
pub use config::{ClientConfig, Credentials, RetryPolicy};
pub use message::{
    AssistantMessage, ContentBlock, Message, ResultMessage, StreamEvent, SystemMessage,
    UserMessage,
};
pub use options::{AgentOptions, AgentOptionsBuilder, McpServerConfig};
pub use query::{query, QueryStream};
pub use retry::{retry_with_backoff, with_timeout};

// Re-export core types for convenience
pub use agentkit_core::{
    schema::{json_schema_array, json_schema_object, json_schema_string, json_schema_typed},
    AgentError, AgentResult, Arguments, ErrorKind, OutputFormat, ParamType, ParameterSchema,
    PermissionDecision, PermissionHandler, PermissionMode, PermissionRequest, SubagentDefinition,
    SubagentModel, SubagentRegistry,
};
pub use agentkit_mcp::{qualified_tool_name, ToolDefinition, ToolHandler, ToolRegistry, ToolResult, ToolServer};
