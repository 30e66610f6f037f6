//! Error taxonomy shared by the tool server and the agent client.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result type for agentkit operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Errors surfaced by tool registration, tool invocation, and agent sessions.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Missing credential, invalid options, or a tool registered twice.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Tool arguments did not match the declared parameter schema.
    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    /// No tool with this name is registered.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// The tool handler failed.
    #[error("Tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// The final response did not validate against the requested output schema.
    #[error("Output does not match schema: {0}")]
    OutputSchemaViolation(String),

    /// A tool call was refused by the permission policy or a subagent scope.
    #[error("Permission denied for tool '{tool}': {reason}")]
    PermissionDenied { tool: String, reason: String },

    /// The connection to the agent process failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The agent process exited unsuccessfully.
    #[error("Agent process exited with code {exit_code:?}: {stderr}")]
    Process {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The agent process sent something we could not interpret.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The operation did not finish before its deadline.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// Check if this error is worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Process { .. } | Self::Timeout(_)
        )
    }

    /// The wire-level kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::ConfigurationError,
            Self::SchemaValidation(_) => ErrorKind::SchemaValidationError,
            Self::ToolNotFound(_) => ErrorKind::ToolNotFoundError,
            Self::ToolExecution { .. } => ErrorKind::ToolExecutionError,
            Self::OutputSchemaViolation(_) => ErrorKind::OutputSchemaViolation,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::Transport(_) | Self::Process { .. } => ErrorKind::TransportError,
            Self::Protocol(_) | Self::Json(_) => ErrorKind::ProtocolError,
            Self::Timeout(_) => ErrorKind::TimeoutError,
        }
    }

    pub fn tool_execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn permission_denied(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}

/// Error kind as carried in protocol error objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ConfigurationError,
    SchemaValidationError,
    ToolNotFoundError,
    ToolExecutionError,
    OutputSchemaViolation,
    PermissionDenied,
    TransportError,
    ProtocolError,
    TimeoutError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigurationError => "ConfigurationError",
            Self::SchemaValidationError => "SchemaValidationError",
            Self::ToolNotFoundError => "ToolNotFoundError",
            Self::ToolExecutionError => "ToolExecutionError",
            Self::OutputSchemaViolation => "OutputSchemaViolation",
            Self::PermissionDenied => "PermissionDenied",
            Self::TransportError => "TransportError",
            Self::ProtocolError => "ProtocolError",
            Self::TimeoutError => "TimeoutError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(AgentError::Transport("broken pipe".into()).is_retryable());
        assert!(AgentError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(AgentError::Process {
            exit_code: Some(1),
            stderr: "boom".into()
        }
        .is_retryable());

        assert!(!AgentError::Configuration("no key".into()).is_retryable());
        assert!(!AgentError::SchemaValidation("bad".into()).is_retryable());
        assert!(!AgentError::ToolNotFound("nope".into()).is_retryable());
    }

    #[test]
    fn test_error_kind_wire_names() {
        assert_eq!(
            AgentError::ToolNotFound("x".into()).kind().as_str(),
            "ToolNotFoundError"
        );
        assert_eq!(
            serde_json::to_value(ErrorKind::SchemaValidationError).unwrap(),
            serde_json::json!("SchemaValidationError")
        );
        assert_eq!(
            AgentError::tool_execution("add", "overflow").kind(),
            ErrorKind::ToolExecutionError
        );
    }
}
