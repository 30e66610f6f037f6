//! Control requests sent by the agent CLI: MCP calls into in-process tool
//! servers and tool permission checks.

use agentkit_core::{AgentError, AgentResult, PermissionGate, PermissionRequest};
use agentkit_mcp::protocol::{JsonRpcRequest, JSONRPC_VERSION};
use agentkit_mcp::ToolServer;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const CONTROL_REQUEST: &str = "control_request";
pub const CONTROL_RESPONSE: &str = "control_response";
pub const CONTROL_CANCEL_REQUEST: &str = "control_cancel_request";

#[derive(Debug, Deserialize)]
struct ControlEnvelope {
    request_id: String,
    request: ControlRequest,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
enum ControlRequest {
    McpMessage {
        server_name: String,
        message: Value,
    },
    CanUseTool {
        tool_name: String,
        #[serde(default)]
        input: Value,
        #[serde(default)]
        agent: Option<String>,
    },
    #[serde(other)]
    Unsupported,
}

/// Answers control requests on behalf of one session.
#[derive(Debug)]
pub struct ControlHandler {
    servers: BTreeMap<String, ToolServer>,
    gate: PermissionGate,
}

impl ControlHandler {
    pub fn new(servers: BTreeMap<String, ToolServer>, gate: PermissionGate) -> Self {
        Self { servers, gate }
    }

    /// Build the `control_response` line for a `control_request` line.
    pub async fn handle(&self, message: Value) -> AgentResult<Value> {
        let envelope: ControlEnvelope = serde_json::from_value(message)
            .map_err(|e| AgentError::Protocol(format!("malformed control request: {}", e)))?;
        let request_id = envelope.request_id;

        let outcome = match envelope.request {
            ControlRequest::McpMessage {
                server_name,
                message,
            } => self.route_mcp(&server_name, message).await,
            ControlRequest::CanUseTool {
                tool_name,
                input,
                agent,
            } => Ok(self.can_use_tool(tool_name, input, agent).await),
            ControlRequest::Unsupported => Err("unsupported control request".to_string()),
        };

        let response = match outcome {
            Ok(response) => json!({
                "subtype": "success",
                "request_id": request_id,
                "response": response,
            }),
            Err(error) => {
                tracing::warn!(%request_id, %error, "Control request failed");
                json!({
                    "subtype": "error",
                    "request_id": request_id,
                    "error": error,
                })
            }
        };

        Ok(json!({ "type": CONTROL_RESPONSE, "response": response }))
    }

    async fn route_mcp(&self, server_name: &str, message: Value) -> Result<Value, String> {
        let server = self
            .servers
            .get(server_name)
            .ok_or_else(|| format!("unknown MCP server '{}'", server_name))?;

        let request: JsonRpcRequest = serde_json::from_value(message)
            .map_err(|e| format!("invalid JSON-RPC message: {}", e))?;
        tracing::debug!(server = server_name, method = %request.method, "Routing MCP message");

        let response = match server.handle_request(request).await {
            Some(response) => serde_json::to_value(response).map_err(|e| e.to_string())?,
            // Notifications still need an answer on the control channel
            None => json!({ "jsonrpc": JSONRPC_VERSION, "result": {} }),
        };
        Ok(json!({ "mcp_response": response }))
    }

    async fn can_use_tool(&self, tool_name: String, input: Value, agent: Option<String>) -> Value {
        let mut request = PermissionRequest::new(tool_name, input);
        if let Some(agent) = agent {
            request = request.for_agent(agent);
        }

        match self.gate.check(&request).await {
            Ok(()) => json!({ "behavior": "allow", "updatedInput": request.input }),
            Err(e) => json!({ "behavior": "deny", "message": e.to_string() }),
        }
    }
}
