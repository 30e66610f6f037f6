//! Persistent agent session.

use crate::control::{ControlHandler, CONTROL_CANCEL_REQUEST, CONTROL_REQUEST, CONTROL_RESPONSE};
use crate::message::{parse_message, Message};
use crate::options::AgentOptions;
use crate::transport::{SubprocessTransport, Transport, TransportChannels, CHANNEL_CAPACITY};
use agentkit_core::{AgentError, AgentResult, OutputValidator};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A conversation with the agent that persists across [`AgentClient::query`] calls.
///
/// ```rust,no_run
/// use agentkit_sdk::{AgentClient, AgentOptions, AgentResult};
///
/// # async fn example() -> AgentResult<()> {
/// let options = AgentOptions::builder().allowed_tools(["Read"]).build()?;
/// let mut client = AgentClient::connect(options).await?;
///
/// client.query("What does this project do?").await?;
/// let mut response = client.receive_response();
/// while let Some(message) = response.next_message().await {
///     if let Some(text) = message?.assistant_text() {
///         println!("{}", text);
///     }
/// }
///
/// client.close().await
/// # }
/// ```
pub struct AgentClient {
    transport: Box<dyn Transport>,
    outbound: mpsc::Sender<Value>,
    messages: mpsc::Receiver<AgentResult<Message>>,
    validator: Option<OutputValidator>,
    session_id: String,
    cancel: CancellationToken,
    router: Option<JoinHandle<()>>,
    response_done: bool,
    /// Prompts whose result message has not been read off the channel yet.
    unfinished_turns: usize,
    closed: bool,
}

impl AgentClient {
    /// Launch the agent CLI described by `options`.
    pub async fn connect(options: AgentOptions) -> AgentResult<Self> {
        options.validate()?;
        let transport = SubprocessTransport::from_options(&options)?;
        Self::with_transport(options, Box::new(transport)).await
    }

    /// Start a session over an already-constructed transport.
    pub async fn with_transport(
        options: AgentOptions,
        mut transport: Box<dyn Transport>,
    ) -> AgentResult<Self> {
        let validator = options
            .output_format
            .as_ref()
            .map(|format| format.validator())
            .transpose()?;
        let handler = Arc::new(ControlHandler::new(
            options.sdk_servers(),
            options.permission_gate(),
        ));

        let TransportChannels { outbound, inbound } = transport.connect().await?;
        let (messages_tx, messages_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let router = tokio::spawn(route_messages(
            inbound,
            outbound.clone(),
            messages_tx,
            handler,
            cancel.clone(),
        ));

        let client = Self {
            transport,
            outbound,
            messages: messages_rx,
            validator,
            session_id: "default".to_string(),
            cancel,
            router: Some(router),
            response_done: true,
            unfinished_turns: 0,
            closed: false,
        };

        // The reply arrives as a control_response and is only logged
        client
            .send(json!({
                "type": CONTROL_REQUEST,
                "request_id": format!("req_{}", uuid::Uuid::new_v4().simple()),
                "request": { "subtype": "initialize", "hooks": null },
            }))
            .await?;

        info!("Agent session connected");
        Ok(client)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Send a user prompt. Read the reply with [`AgentClient::receive_response`].
    pub async fn query(&mut self, prompt: impl Into<String>) -> AgentResult<()> {
        let prompt = prompt.into();
        debug!(session_id = %self.session_id, prompt_len = prompt.len(), "Sending prompt");

        self.send(json!({
            "type": "user",
            "message": { "role": "user", "content": prompt },
            "parent_tool_use_id": null,
            "session_id": self.session_id,
        }))
        .await?;
        self.response_done = false;
        self.unfinished_turns += 1;
        Ok(())
    }

    /// Messages for the most recent prompt, ending with its result message.
    ///
    /// Whatever is left of earlier responses that were not read to the end is
    /// discarded.
    pub fn receive_response(&mut self) -> ResponseStream<'_> {
        ResponseStream { client: self }
    }

    /// Stop the agent and release the session. Further queries fail.
    pub async fn close(&mut self) -> AgentResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.response_done = true;
        self.cancel.cancel();

        let result = self.transport.close().await;
        if let Some(router) = self.router.take() {
            if let Err(e) = router.await {
                warn!(error = %e, "Message router ended abnormally");
            }
        }
        info!("Agent session closed");
        result
    }

    async fn send(&self, value: Value) -> AgentResult<()> {
        if self.closed {
            return Err(AgentError::Transport("session is closed".to_string()));
        }
        self.outbound
            .send(value)
            .await
            .map_err(|_| AgentError::Transport("agent process is not accepting input".to_string()))
    }

    /// Next message of the current response, `None` once it has ended.
    pub(crate) async fn next_response_message(&mut self) -> Option<AgentResult<Message>> {
        if self.response_done {
            return None;
        }

        let next = loop {
            let Some(next) = self.messages.recv().await else {
                self.response_done = true;
                return Some(Err(AgentError::Transport(
                    "agent stream ended before the result message".to_string(),
                )));
            };
            if self.unfinished_turns <= 1 {
                break next;
            }
            // Tail of an earlier response
            match next {
                Ok(Message::Result(_)) => {
                    self.unfinished_turns -= 1;
                    debug!(remaining = self.unfinished_turns, "Discarded rest of an earlier response");
                }
                Ok(_) | Err(AgentError::Protocol(_)) => {}
                Err(e) => break Err(e),
            }
        };

        let message = match next {
            Ok(Message::Result(mut result)) => {
                self.response_done = true;
                self.unfinished_turns = 0;
                if let Some(validator) = &self.validator {
                    let checked = match result.structured_output.take() {
                        Some(output) => validator.validate(&output).map(|()| output),
                        None => validator.validate_text(result.result.as_deref().unwrap_or_default()),
                    };
                    match checked {
                        Ok(output) => result.structured_output = Some(output),
                        Err(e) => return Some(Err(e)),
                    }
                }
                debug!(
                    session_id = %result.session_id,
                    num_turns = result.num_turns,
                    duration_ms = result.duration_ms,
                    is_error = result.is_error,
                    "Response complete"
                );
                Ok(Message::Result(result))
            }
            Ok(message) => Ok(message),
            Err(e) => {
                self.response_done = true;
                Err(e)
            }
        };
        Some(message)
    }
}

impl Drop for AgentClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Lazy, finite stream of the messages answering one prompt.
pub struct ResponseStream<'a> {
    client: &'a mut AgentClient,
}

impl ResponseStream<'_> {
    pub async fn next_message(&mut self) -> Option<AgentResult<Message>> {
        self.client.next_response_message().await
    }

    /// Drain the response, returning every message.
    pub async fn collect(mut self) -> AgentResult<Vec<Message>> {
        let mut messages = Vec::new();
        while let Some(message) = self.next_message().await {
            messages.push(message?);
        }
        Ok(messages)
    }
}

/// Hand a message to the response stream. False once the stream is gone or
/// the session is cancelled, even while the backlog is full.
async fn deliver(
    messages: &mpsc::Sender<AgentResult<Message>>,
    cancel: &CancellationToken,
    message: AgentResult<Message>,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = messages.send(message) => sent.is_ok(),
    }
}

async fn route_messages(
    mut inbound: mpsc::Receiver<AgentResult<Value>>,
    outbound: mpsc::Sender<Value>,
    messages: mpsc::Sender<AgentResult<Message>>,
    handler: Arc<ControlHandler>,
    cancel: CancellationToken,
) {
    let mut control_tasks = JoinSet::new();

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = inbound.recv() => next,
        };
        let Some(next) = next else { break };

        let value = match next {
            Ok(value) => value,
            Err(e) => {
                if !deliver(&messages, &cancel, Err(e)).await {
                    break;
                }
                continue;
            }
        };

        match value.get("type").and_then(Value::as_str) {
            Some(CONTROL_REQUEST) => {
                let handler = handler.clone();
                let outbound = outbound.clone();
                control_tasks.spawn(async move {
                    match handler.handle(value).await {
                        Ok(response) => {
                            if outbound.send(response).await.is_err() {
                                debug!("Agent input closed before control response was sent");
                            }
                        }
                        Err(e) => warn!(error = %e, "Dropping control request"),
                    }
                });
            }
            Some(CONTROL_RESPONSE) => debug!(response = %value["response"], "Control response received"),
            Some(CONTROL_CANCEL_REQUEST) => debug!("Control request cancelled by agent"),
            _ => match parse_message(value) {
                Ok(Some(message)) => {
                    if !deliver(&messages, &cancel, Ok(message)).await {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    if !deliver(&messages, &cancel, Err(e)).await {
                        break;
                    }
                }
            },
        }

        while let Some(finished) = control_tasks.try_join_next() {
            if let Err(e) = finished {
                warn!(error = %e, "Control request task failed");
            }
        }
    }

    drop(inbound);
    control_tasks.shutdown().await;
    debug!("Message router stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{AgentPeer, ChannelTransport};
    use agentkit_core::{OutputFormat, PermissionMode};
    use agentkit_mcp::tools::calculator_server;
    use std::time::Duration;

    async fn connect(options: AgentOptions) -> (AgentClient, AgentPeer) {
        let (transport, mut peer) = ChannelTransport::new();
        let client = AgentClient::with_transport(options, Box::new(transport))
            .await
            .unwrap();
        let init = peer.recv().await.unwrap();
        assert_eq!(init["request"]["subtype"], "initialize");
        (client, peer)
    }

    fn assistant(text: &str) -> Value {
        json!({
            "type": "assistant",
            "message": {"model": "test", "content": [{"type": "text", "text": text}]}
        })
    }

    fn result(result: &str) -> Value {
        json!({
            "type": "result",
            "subtype": "success",
            "is_error": false,
            "num_turns": 1,
            "duration_ms": 10,
            "session_id": "default",
            "result": result
        })
    }

    #[tokio::test]
    async fn test_query_streams_until_result() {
        let (mut client, mut peer) = connect(AgentOptions::default()).await;

        client.query("hello").await.unwrap();
        let prompt = peer.recv().await.unwrap();
        assert_eq!(prompt["type"], "user");
        assert_eq!(prompt["message"]["content"], "hello");

        peer.send(json!({"type": "system", "subtype": "init", "session_id": "default"}))
            .await;
        peer.send(assistant("Hi there")).await;
        peer.send(result("Hi there")).await;

        let messages = client.receive_response().collect().await.unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].assistant_text().unwrap(), "Hi there");
        assert!(messages[2].is_result());

        // The stream is finite and not restartable
        assert!(client.receive_response().next_message().await.is_none());
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_conversation_persists_across_queries() {
        let (mut client, mut peer) = connect(AgentOptions::default()).await;

        for (prompt, reply) in [("first", "one"), ("second", "two")] {
            client.query(prompt).await.unwrap();
            let sent = peer.recv_type("user").await.unwrap();
            assert_eq!(sent["message"]["content"], prompt);
            assert_eq!(sent["session_id"], "default");

            peer.send(assistant(reply)).await;
            peer.send(result(reply)).await;

            let messages = client.receive_response().collect().await.unwrap();
            assert_eq!(messages[0].assistant_text().unwrap(), reply);
        }

        client.close().await.unwrap();
        assert!(matches!(client.query("third").await, Err(AgentError::Transport(_))));
    }

    #[tokio::test]
    async fn test_control_requests_answered_over_transport() {
        let options = AgentOptions::builder()
            .mcp_server("calc", calculator_server().unwrap())
            .allowed_tools(["mcp__calc__add"])
            .permission_mode(PermissionMode::DontAsk)
            .build()
            .unwrap();
        let (mut client, mut peer) = connect(options).await;
        client.query("What is 2 + 3?").await.unwrap();
        peer.recv_type("user").await.unwrap();

        peer.send(json!({
            "type": "control_request",
            "request_id": "perm_1",
            "request": {"subtype": "can_use_tool", "tool_name": "mcp__calc__add", "input": {"a": 2, "b": 3}}
        }))
        .await;
        let reply = peer.recv_type("control_response").await.unwrap();
        assert_eq!(reply["response"]["request_id"], "perm_1");
        assert_eq!(reply["response"]["response"]["behavior"], "allow");

        peer.send(json!({
            "type": "control_request",
            "request_id": "mcp_1",
            "request": {
                "subtype": "mcp_message",
                "server_name": "calc",
                "message": {"jsonrpc": "2.0", "id": 3, "method": "tools/call",
                            "params": {"name": "add", "arguments": {"a": 2, "b": 3}}}
            }
        }))
        .await;
        let reply = peer.recv_type("control_response").await.unwrap();
        assert_eq!(reply["response"]["request_id"], "mcp_1");
        assert_eq!(
            reply["response"]["response"]["mcp_response"]["result"]["content"][0]["text"],
            "The sum is: 5"
        );

        peer.send(result("5")).await;
        let messages = client.receive_response().collect().await.unwrap();
        // Control traffic never reaches the response stream
        assert_eq!(messages.len(), 1);
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_structured_output_validated() {
        let schema = json!({
            "type": "object",
            "properties": {"file_name": {"type": "string"}},
            "required": ["file_name"]
        });
        let options = AgentOptions::builder()
            .output_format(OutputFormat::json_schema(schema))
            .build()
            .unwrap();
        let (mut client, peer) = connect(options).await;

        client.query("analyze").await.unwrap();
        peer.send(result(r#"{"file_name": "main.rs"}"#)).await;
        let messages = client.receive_response().collect().await.unwrap();
        let Message::Result(ok) = &messages[0] else {
            panic!("expected result");
        };
        assert_eq!(ok.structured_output.as_ref().unwrap()["file_name"], "main.rs");

        client.query("analyze again").await.unwrap();
        peer.send(json!({
            "type": "result",
            "subtype": "success",
            "structured_output": {"summary": "no file name"}
        }))
        .await;
        let err = client.receive_response().collect().await.unwrap_err();
        assert!(matches!(err, AgentError::OutputSchemaViolation(_)));

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_transport_failure_ends_response() {
        let (mut client, mut peer) = connect(AgentOptions::default()).await;
        client.query("hello").await.unwrap();
        peer.recv_type("user").await.unwrap();

        peer.fail(AgentError::Process {
            exit_code: Some(1),
            stderr: "crashed".to_string(),
        })
        .await;

        let mut response = client.receive_response();
        let err = response.next_message().await.unwrap().unwrap_err();
        assert!(err.is_retryable());
        assert!(response.next_message().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_closed_without_result() {
        let (mut client, peer) = connect(AgentOptions::default()).await;
        client.query("hello").await.unwrap();
        drop(peer);

        let err = client.receive_response().collect().await.unwrap_err();
        assert!(matches!(err, AgentError::Transport(_)));
    }

    #[tokio::test]
    async fn test_close_with_unread_backlog() {
        let (mut client, mut peer) = connect(AgentOptions::default()).await;
        client.query("talk a lot").await.unwrap();
        peer.recv_type("user").await.unwrap();

        let chatter = tokio::spawn(async move {
            let mut sent = 0;
            for i in 0..200 {
                if !peer.send(assistant(&format!("line {}", i))).await {
                    break;
                }
                sent += 1;
            }
            sent
        });
        // Let both channels fill up
        tokio::time::sleep(Duration::from_millis(50)).await;

        tokio::time::timeout(Duration::from_secs(3), client.close())
            .await
            .expect("close should not wait on the unread backlog")
            .unwrap();

        let sent = tokio::time::timeout(Duration::from_secs(3), chatter)
            .await
            .unwrap()
            .unwrap();
        assert!(sent < 200);
    }

    #[tokio::test]
    async fn test_error_mid_response_does_not_leak_into_next() {
        let (mut client, mut peer) = connect(AgentOptions::default()).await;

        client.query("first").await.unwrap();
        peer.recv_type("user").await.unwrap();
        peer.fail(AgentError::Protocol("invalid JSON from agent".to_string()))
            .await;
        peer.send(assistant("tail of first turn")).await;
        peer.send(result("first")).await;

        let err = client.receive_response().collect().await.unwrap_err();
        assert!(matches!(err, AgentError::Protocol(_)));

        client.query("second").await.unwrap();
        peer.recv_type("user").await.unwrap();
        peer.send(assistant("answer to second")).await;
        peer.send(result("second")).await;

        let messages = client.receive_response().collect().await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].assistant_text().unwrap(), "answer to second");
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_unread_response_is_skipped() {
        let (mut client, mut peer) = connect(AgentOptions::default()).await;

        client.query("ignored").await.unwrap();
        peer.recv_type("user").await.unwrap();
        peer.send(assistant("nobody reads this")).await;
        peer.send(result("ignored")).await;

        client.query("wanted").await.unwrap();
        peer.recv_type("user").await.unwrap();
        peer.send(assistant("read this")).await;
        peer.send(result("wanted")).await;

        let messages = client.receive_response().collect().await.unwrap();
        assert_eq!(messages[0].assistant_text().unwrap(), "read this");
        let Message::Result(done) = &messages[1] else {
            panic!("expected result");
        };
        assert_eq!(done.result.as_deref(), Some("wanted"));
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_messages_skipped() {
        let (mut client, mut peer) = connect(AgentOptions::default()).await;
        client.query("hello").await.unwrap();
        peer.recv_type("user").await.unwrap();

        peer.send(json!({"type": "keep_alive"})).await;
        peer.send(result("done")).await;

        let messages = client.receive_response().collect().await.unwrap();
        assert_eq!(messages.len(), 1);
    }
}
