// Tool definitions: name, description, parameter schema and handler

use crate::protocol::{CallToolResult, ToolContent, ToolSchema};
use agentkit_core::{AgentError, AgentResult, Arguments, ParameterSchema};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

/// Successful tool output: one or more content blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
}

impl ToolResult {
    pub fn new(content: Vec<ToolContent>) -> Self {
        Self { content }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(text)],
        }
    }

    /// Text of the first text block.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(ToolContent::as_text)
    }
}

impl From<ToolResult> for CallToolResult {
    fn from(result: ToolResult) -> Self {
        CallToolResult {
            content: result.content,
            is_error: None,
        }
    }
}

/// Tool executor trait
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    /// Execute the tool with validated arguments
    async fn call(&self, arguments: Arguments) -> anyhow::Result<ToolResult>;
}

struct FnHandler<F>(F);

#[async_trait::async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Arguments) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<ToolResult>> + Send + 'static,
{
    async fn call(&self, arguments: Arguments) -> anyhow::Result<ToolResult> {
        (self.0)(arguments).await
    }
}

/// A registered tool.
#[derive(Clone)]
pub struct ToolDefinition {
    name: String,
    description: String,
    parameters: ParameterSchema,
    handler: Arc<dyn ToolHandler>,
    /// Present when the handler is not reentrant; calls queue on it.
    exclusive: Option<Arc<Mutex<()>>>,
}

impl ToolDefinition {
    /// Define a tool from an async closure.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ParameterSchema,
        handler: F,
    ) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ToolResult>> + Send + 'static,
    {
        Self::from_handler(name, description, parameters, Arc::new(FnHandler(handler)))
    }

    /// Define a tool backed by a handler object.
    pub fn from_handler(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ParameterSchema,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler,
            exclusive: None,
        }
    }

    /// Serialize all calls to this tool.
    pub fn non_reentrant(mut self) -> Self {
        self.exclusive = Some(Arc::new(Mutex::new(())));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &ParameterSchema {
        &self.parameters
    }

    pub fn is_reentrant(&self) -> bool {
        self.exclusive.is_none()
    }

    /// Get the tool schema for MCP
    pub fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.parameters.to_json_schema(),
        }
    }

    /// Validate raw arguments and run the handler.
    pub async fn invoke(&self, arguments: &serde_json::Value) -> AgentResult<ToolResult> {
        let arguments = self.parameters.validate(arguments)?;

        let _guard = match &self.exclusive {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        // Own task so a panicking handler becomes an error; dropping the set aborts it
        let mut task = JoinSet::new();
        let handler = self.handler.clone();
        task.spawn(async move { handler.call(arguments).await });

        let result = match task.join_next().await {
            Some(Ok(outcome)) => {
                outcome.map_err(|e| AgentError::tool_execution(&self.name, format!("{:#}", e)))?
            }
            Some(Err(e)) if e.is_panic() => {
                tracing::error!(tool = %self.name, "Tool handler panicked");
                return Err(AgentError::tool_execution(&self.name, "handler panicked"));
            }
            Some(Err(e)) => return Err(AgentError::tool_execution(&self.name, e.to_string())),
            None => return Err(AgentError::tool_execution(&self.name, "handler did not run")),
        };

        if result.content.is_empty() {
            return Err(AgentError::tool_execution(
                &self.name,
                "handler returned no content",
            ));
        }

        Ok(result)
    }
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .field("reentrant", &self.is_reentrant())
            .finish()
    }
}
