// MCP server: exposes a tool registry over JSON-RPC

use crate::protocol::*;
use crate::tools::{ToolRegistry, ToolResult};
use agentkit_core::{AgentError, AgentResult};
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// A named set of tools served over MCP.
#[derive(Debug, Clone)]
pub struct ToolServer {
    name: String,
    version: String,
    registry: Arc<ToolRegistry>,
}

impl ToolServer {
    pub fn new(name: impl Into<String>, registry: ToolRegistry) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            registry: Arc::new(registry),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Metadata for every registered tool.
    pub fn list_tools(&self) -> Vec<ToolSchema> {
        self.registry.list_schemas()
    }

    /// Look up and run a tool.
    pub async fn invoke(&self, name: &str, arguments: &Value) -> AgentResult<ToolResult> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;

        let start = Instant::now();
        let result = tool.invoke(arguments).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => tracing::debug!(server = %self.name, tool = name, duration_ms, "Tool call completed"),
            Err(e) => tracing::warn!(
                server = %self.name,
                tool = name,
                duration_ms,
                kind = %e.kind(),
                error = %e,
                "Tool call failed"
            ),
        }

        result
    }

    /// Handle one JSON-RPC message. Notifications produce no response.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            tracing::debug!(method = %request.method, "Received notification");
            return None;
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(id, JsonRpcError::invalid_request()));
        }

        let outcome = match request.method.as_str() {
            "initialize" => Ok(self.initialize(request.params)),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => serde_json::to_value(ListToolsResult {
                tools: self.list_tools(),
            })
            .map_err(|e| JsonRpcError::internal_error(e.to_string())),
            "tools/call" => self.call_tool(request.params).await,
            other => Err(JsonRpcError::method_not_found(other)),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::error(id, error),
        })
    }

    fn initialize(&self, params: Option<Value>) -> Value {
        let requested = params
            .and_then(|p| serde_json::from_value::<InitializeParams>(p).ok())
            .map(|p| {
                tracing::info!(client = %p.client_info.name, version = %p.client_info.version, "MCP client connected");
                p.protocol_version
            });

        let result = InitializeResult {
            protocol_version: requested.unwrap_or_else(|| PROTOCOL_VERSION.to_string()),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: false }),
                experimental: Value::Object(Default::default()),
            },
            server_info: ServerInfo {
                name: self.name.clone(),
                version: self.version.clone(),
            },
        };
        serde_json::to_value(result).unwrap_or(Value::Null)
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = params
            .ok_or_else(|| JsonRpcError::invalid_params("missing params"))
            .and_then(|p| {
                serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(e.to_string()))
            })?;

        match self.invoke(&params.name, &params.arguments).await {
            Ok(result) => serde_json::to_value(CallToolResult::from(result))
                .map_err(|e| JsonRpcError::internal_error(e.to_string())),
            Err(err) => Err(JsonRpcError::from(&err)),
        }
    }

    /// Serve newline-delimited JSON-RPC until the reader reaches EOF.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<String>(64);

        // Single writer keeps response lines whole
        let writer_task = tokio::spawn(async move {
            let mut writer = BufWriter::new(writer);
            while let Some(line) = rx.recv().await {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<_, std::io::Error>(())
        });

        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut in_flight = JoinSet::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }

            let trimmed = match std::str::from_utf8(&buf) {
                Ok(line) => line.trim(),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding non-UTF-8 JSON-RPC message");
                    tx.send(parse_error_line()?).await?;
                    continue;
                }
            };
            if trimmed.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding malformed JSON-RPC message");
                    tx.send(parse_error_line()?).await?;
                    continue;
                }
            };

            let server = self.clone();
            let tx = tx.clone();
            in_flight.spawn(async move {
                if let Some(response) = server.handle_request(request).await {
                    match serde_json::to_string(&response) {
                        Ok(line) => {
                            let _ = tx.send(line).await;
                        }
                        Err(e) => tracing::error!(error = %e, "Failed to serialize response"),
                    }
                }
            });

            while let Some(finished) = in_flight.try_join_next() {
                if let Err(e) = finished {
                    tracing::error!(error = %e, "Request task failed");
                }
            }
        }

        while let Some(finished) = in_flight.join_next().await {
            if let Err(e) = finished {
                tracing::error!(error = %e, "Request task failed");
            }
        }

        drop(tx);
        writer_task.await??;
        tracing::info!(server = %self.name, "MCP client disconnected");
        Ok(())
    }

    /// Serve over stdin/stdout.
    pub async fn serve_stdio(&self) -> Result<()> {
        tracing::info!(server = %self.name, tools = self.registry.len(), "MCP server started on stdio");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }
}

fn parse_error_line() -> serde_json::Result<String> {
    serde_json::to_string(&JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error()))
}
