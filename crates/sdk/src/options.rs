//! Session options and their translation into agent CLI arguments.

use crate::config::DEFAULT_CLI;
use agentkit_core::{
    AgentError, AgentResult, OutputFormat, PermissionGate, PermissionHandler, PermissionMode,
    PermissionPolicy, SubagentDefinition, SubagentRegistry,
};
use agentkit_mcp::ToolServer;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// An MCP server made available to the agent.
#[derive(Debug, Clone)]
pub enum McpServerConfig {
    /// Tool server hosted inside this process; calls are routed over the control channel.
    Sdk(ToolServer),
    /// External server the CLI launches itself.
    Stdio {
        command: String,
        args: Vec<String>,
        env: BTreeMap<String, String>,
    },
}

impl McpServerConfig {
    pub fn stdio(command: impl Into<String>) -> Self {
        Self::Stdio {
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    fn to_cli_json(&self, name: &str) -> Value {
        match self {
            Self::Sdk(_) => json!({ "type": "sdk", "name": name }),
            Self::Stdio { command, args, env } => json!({
                "type": "stdio",
                "command": command,
                "args": args,
                "env": env,
            }),
        }
    }
}

impl From<ToolServer> for McpServerConfig {
    fn from(server: ToolServer) -> Self {
        Self::Sdk(server)
    }
}

/// Configuration for one agent session.
#[derive(Clone, Default)]
pub struct AgentOptions {
    pub system_prompt: Option<String>,
    pub allowed_tools: Vec<String>,
    pub disallowed_tools: Vec<String>,
    pub permission_mode: PermissionMode,
    pub cwd: Option<PathBuf>,
    pub mcp_servers: BTreeMap<String, McpServerConfig>,
    pub agents: SubagentRegistry,
    pub output_format: Option<OutputFormat>,
    pub model: Option<String>,
    pub max_turns: Option<u32>,
    pub env: BTreeMap<String, String>,
    pub cli_path: Option<PathBuf>,
    pub permission_handler: Option<Arc<dyn PermissionHandler>>,
}

impl AgentOptions {
    pub fn builder() -> AgentOptionsBuilder {
        AgentOptionsBuilder::new()
    }

    /// Executable to launch.
    pub fn cli_program(&self) -> PathBuf {
        self.cli_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CLI))
    }

    /// In-process tool servers, keyed by the name the agent knows them by.
    pub fn sdk_servers(&self) -> BTreeMap<String, ToolServer> {
        self.mcp_servers
            .iter()
            .filter_map(|(name, config)| match config {
                McpServerConfig::Sdk(server) => Some((name.clone(), server.clone())),
                McpServerConfig::Stdio { .. } => None,
            })
            .collect()
    }

    /// The gate that answers `can_use_tool` requests for this session.
    pub fn permission_gate(&self) -> PermissionGate {
        let policy = PermissionPolicy::new(self.permission_mode)
            .with_allowed(self.allowed_tools.iter().cloned())
            .with_disallowed(self.disallowed_tools.iter().cloned());
        let gate = PermissionGate::new(policy, self.agents.clone());
        match &self.permission_handler {
            Some(handler) => gate.with_handler(handler.clone()),
            None => gate,
        }
    }

    /// Value of `--mcp-config`, if any servers are registered.
    pub fn mcp_config_json(&self) -> Option<Value> {
        if self.mcp_servers.is_empty() {
            return None;
        }
        let servers: serde_json::Map<String, Value> = self
            .mcp_servers
            .iter()
            .map(|(name, config)| (name.clone(), config.to_cli_json(name)))
            .collect();
        Some(json!({ "mcpServers": servers }))
    }

    /// Command-line arguments for the agent CLI in streaming mode.
    pub fn to_cli_args(&self) -> AgentResult<Vec<String>> {
        let mut args: Vec<String> = [
            "--output-format",
            "stream-json",
            "--input-format",
            "stream-json",
            "--verbose",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        if let Some(prompt) = &self.system_prompt {
            args.push("--system-prompt".to_string());
            args.push(prompt.clone());
        }
        if !self.allowed_tools.is_empty() {
            args.push("--allowedTools".to_string());
            args.push(self.allowed_tools.join(","));
        }
        if !self.disallowed_tools.is_empty() {
            args.push("--disallowedTools".to_string());
            args.push(self.disallowed_tools.join(","));
        }
        args.push("--permission-mode".to_string());
        args.push(self.permission_mode.as_str().to_string());
        // Tool approvals come back to this process as control requests
        args.push("--permission-prompt-tool".to_string());
        args.push("stdio".to_string());

        if let Some(model) = &self.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        if let Some(max_turns) = self.max_turns {
            args.push("--max-turns".to_string());
            args.push(max_turns.to_string());
        }
        if let Some(config) = self.mcp_config_json() {
            args.push("--mcp-config".to_string());
            args.push(serde_json::to_string(&config)?);
        }
        if !self.agents.is_empty() {
            args.push("--agents".to_string());
            args.push(serde_json::to_string(&self.agents)?);
        }
        if let Some(format) = &self.output_format {
            args.push("--json-schema".to_string());
            args.push(serde_json::to_string(format.schema())?);
        }

        Ok(args)
    }

    /// Check the options before a session is started.
    pub fn validate(&self) -> AgentResult<()> {
        self.agents.validate()?;
        if let Some(format) = &self.output_format {
            format.validator()?;
        }
        for (name, config) in &self.mcp_servers {
            if name.trim().is_empty() || name.contains("__") {
                return Err(AgentError::Configuration(format!(
                    "invalid MCP server name '{}'",
                    name
                )));
            }
            if let McpServerConfig::Stdio { command, .. } = config {
                if command.trim().is_empty() {
                    return Err(AgentError::Configuration(format!(
                        "MCP server '{}' has an empty command",
                        name
                    )));
                }
            }
        }
        if self.max_turns == Some(0) {
            return Err(AgentError::Configuration(
                "max_turns must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for AgentOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentOptions")
            .field("system_prompt", &self.system_prompt)
            .field("allowed_tools", &self.allowed_tools)
            .field("disallowed_tools", &self.disallowed_tools)
            .field("permission_mode", &self.permission_mode)
            .field("cwd", &self.cwd)
            .field("mcp_servers", &self.mcp_servers.keys().collect::<Vec<_>>())
            .field("agents", &self.agents)
            .field("output_format", &self.output_format)
            .field("model", &self.model)
            .field("max_turns", &self.max_turns)
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .field("cli_path", &self.cli_path)
            .field("permission_handler", &self.permission_handler.is_some())
            .finish()
    }
}

/// Builder for [`AgentOptions`].
#[derive(Default)]
pub struct AgentOptionsBuilder {
    options: AgentOptions,
}

impl AgentOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.options.system_prompt = Some(prompt.into());
        self
    }

    pub fn allowed_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.allowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn disallowed_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.disallowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn permission_mode(mut self, mode: PermissionMode) -> Self {
        self.options.permission_mode = mode;
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.options.cwd = Some(cwd.into());
        self
    }

    pub fn mcp_server(mut self, name: impl Into<String>, config: impl Into<McpServerConfig>) -> Self {
        self.options.mcp_servers.insert(name.into(), config.into());
        self
    }

    pub fn agent(mut self, name: impl Into<String>, definition: SubagentDefinition) -> Self {
        self.options.agents.insert(name, definition);
        self
    }

    pub fn agents(mut self, agents: SubagentRegistry) -> Self {
        self.options.agents = agents;
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.options.output_format = Some(format);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.options.model = Some(model.into());
        self
    }

    pub fn max_turns(mut self, max_turns: u32) -> Self {
        self.options.max_turns = Some(max_turns);
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.env.insert(key.into(), value.into());
        self
    }

    pub fn cli_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.cli_path = Some(path.into());
        self
    }

    pub fn permission_handler(mut self, handler: Arc<dyn PermissionHandler>) -> Self {
        self.options.permission_handler = Some(handler);
        self
    }

    pub fn build(self) -> AgentResult<AgentOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}
