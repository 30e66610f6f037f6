// MCP (Model Context Protocol) tool server
// Registers typed tools and serves them to agent processes

pub mod protocol;
pub mod server;
pub mod tools;

pub use server::ToolServer;
pub use tools::{ToolDefinition, ToolHandler, ToolRegistry, ToolResult};

/// Name under which the agent sees a tool of an MCP server.
pub fn qualified_tool_name(server: &str, tool: &str) -> String {
    format!("mcp__{}__{}", server, tool)
}
