pub mod calculator;
pub mod workspace;
mod definition;
mod registry;

pub use calculator::{add_tool, calculator_registry, calculator_server, multiply_tool, power_tool};
pub use definition::{ToolDefinition, ToolHandler, ToolResult};
pub use registry::ToolRegistry;
pub use workspace::ReadFileTool;
